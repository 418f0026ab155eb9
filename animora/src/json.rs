//! JSON animation asset loader.
//!
//! ```json
//! {
//!   "format": "1.0",
//!   "animations": [
//!     { "name": "fade", "property": "opacity", "keys": [{ "time": 0, "value": 0 }] }
//!   ],
//!   "clips": [{ "name": "intro", "start": 0, "end": 1, "animations": ["fade"] }],
//!   "sequences": [{ "name": "show", "entries": [{ "clip": "intro", "start": 0.5 }] }]
//! }
//! ```

use serde::Deserialize;

use crate::asset::{
    AnimationDoc, AssetDoc, ClipDoc, ItemRef, MemberDoc, SequenceDoc, build_library, malformed,
    parse_attribute, validate_format_version,
};
use crate::{AnimationLibrary, Curve, Error, Keyframe, WeightBlendMode};

#[derive(Debug, Deserialize)]
struct Root {
    format: Option<String>,
    #[serde(default)]
    animations: Vec<AnimationDef>,
    #[serde(default)]
    clips: Vec<ClipDef>,
    #[serde(default)]
    sequences: Vec<SequenceDef>,
}

#[derive(Debug, Deserialize)]
struct AnimationDef {
    name: String,
    property: String,
    #[serde(default)]
    attribute: String,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    duration: Option<f32>,
    #[serde(default)]
    keys: Vec<KeyDef>,
}

#[derive(Debug, Deserialize)]
struct KeyDef {
    #[serde(default)]
    time: f32,
    value: f32,
    #[serde(default)]
    curve: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ClipDef {
    name: String,
    #[serde(default)]
    start: Option<f32>,
    #[serde(default)]
    end: Option<f32>,
    #[serde(default)]
    relative: bool,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    animations: Vec<String>,
    #[serde(default)]
    children: Vec<String>,
}

fn default_one() -> f32 {
    1.0
}

#[derive(Debug, Deserialize)]
struct SequenceDef {
    name: String,
    #[serde(default)]
    entries: Vec<MemberDef>,
}

#[derive(Debug, Deserialize)]
struct MemberDef {
    #[serde(default)]
    animation: Option<String>,
    #[serde(default)]
    clip: Option<String>,
    #[serde(default)]
    sequence: Option<String>,
    #[serde(default)]
    start: f32,
    #[serde(default)]
    stop: Option<f32>,
    #[serde(default = "default_one")]
    weight: f32,
    #[serde(default)]
    blend: Option<String>,
    #[serde(default)]
    target: Option<String>,
}

impl AnimationLibrary {
    pub fn from_json_str(input: &str) -> Result<Self, Error> {
        let root: Root = serde_json::from_str(input).map_err(|e| Error::JsonParse {
            message: e.to_string(),
        })?;

        let format = root.format.ok_or_else(|| Error::AssetVersion {
            value: "<missing>".to_string(),
        })?;
        validate_format_version(&format)?;

        let mut doc = AssetDoc::default();

        for anim in root.animations {
            let attribute = parse_attribute(&anim.attribute)?;
            let mut keys = Vec::with_capacity(anim.keys.len());
            for (i, key) in anim.keys.iter().enumerate() {
                let context = format!("animations.{}.keys[{i}]", anim.name);
                keys.push(Keyframe {
                    time: key.time,
                    value: key.value,
                    curve: parse_curve(key.curve.as_ref(), &context)?,
                });
            }
            doc.animations.push(AnimationDoc {
                name: anim.name,
                property: anim.property,
                attribute,
                target: anim.target,
                duration: anim.duration,
                keys,
            });
        }

        for clip in root.clips {
            let window = match (clip.start, clip.end) {
                (Some(start), Some(end)) => Some((start, end)),
                (None, None) => None,
                _ => {
                    return Err(malformed(format!(
                        "clip '{}' needs both start and end",
                        clip.name
                    )));
                }
            };
            doc.clips.push(ClipDoc {
                name: clip.name,
                window,
                relative: clip.relative,
                target: clip.target,
                animations: clip.animations,
                children: clip.children,
            });
        }

        for sequence in root.sequences {
            let mut members = Vec::with_capacity(sequence.entries.len());
            for member in sequence.entries {
                let item = match (member.animation, member.clip, member.sequence) {
                    (Some(name), None, None) => ItemRef::Animation(name),
                    (None, Some(name), None) => ItemRef::Clip(name),
                    (None, None, Some(name)) => ItemRef::Sequence(name),
                    _ => {
                        return Err(malformed(format!(
                            "sequence '{}' entry must name exactly one of animation, clip or sequence",
                            sequence.name
                        )));
                    }
                };
                let blend = match member.blend.as_deref() {
                    None | Some("override") => WeightBlendMode::Override,
                    Some("additive") => WeightBlendMode::Additive,
                    Some(other) => {
                        return Err(malformed(format!("unknown blend mode '{other}'")));
                    }
                };
                members.push(MemberDoc {
                    item,
                    start: member.start,
                    stop: member.stop,
                    weight: member.weight,
                    blend,
                    target: member.target,
                });
            }
            doc.sequences.push(SequenceDoc {
                name: sequence.name,
                members,
            });
        }

        build_library(doc)
    }
}

fn parse_curve(value: Option<&serde_json::Value>, context: &str) -> Result<Curve, Error> {
    let Some(value) = value else {
        return Ok(Curve::Linear);
    };

    if let Some(s) = value.as_str() {
        return match s {
            "linear" => Ok(Curve::Linear),
            "stepped" => Ok(Curve::Stepped),
            other => Err(Error::JsonParse {
                message: format!("{context}: unknown curve '{other}'"),
            }),
        };
    }

    let Some(arr) = value.as_array() else {
        return Err(Error::JsonParse {
            message: format!("{context}: curve must be a string or 4 numbers"),
        });
    };
    if arr.len() != 4 {
        return Err(Error::JsonParse {
            message: format!("{context}: expected 4 numbers, got {}", arr.len()),
        });
    }

    let number = |i: usize| {
        arr[i]
            .as_f64()
            .map(|v| v as f32)
            .ok_or_else(|| Error::JsonParse {
                message: format!("{context}: curve[{i}] must be a number"),
            })
    };
    Ok(Curve::Bezier {
        cx1: number(0)?,
        cy1: number(1)?,
        cx2: number(2)?,
        cy2: number(3)?,
    })
}
