//! Format-neutral description of an animation asset, shared by the JSON and binary loaders.

use std::collections::{HashMap, HashSet};

use crate::{
    ASSET_FORMAT_MAJOR, Animation, AnimationItem, AnimationLibrary, Attribute, ClipId, Error,
    Keyframe, SequenceId, WeightBlendMode,
};

#[derive(Debug)]
pub(crate) struct AnimationDoc {
    pub(crate) name: String,
    pub(crate) property: String,
    pub(crate) attribute: Attribute,
    pub(crate) target: Option<String>,
    pub(crate) duration: Option<f32>,
    pub(crate) keys: Vec<Keyframe>,
}

#[derive(Debug)]
pub(crate) struct ClipDoc {
    pub(crate) name: String,
    /// `(start, end)`; child clips have none.
    pub(crate) window: Option<(f32, f32)>,
    pub(crate) relative: bool,
    pub(crate) target: Option<String>,
    pub(crate) animations: Vec<String>,
    pub(crate) children: Vec<String>,
}

#[derive(Debug)]
pub(crate) enum ItemRef {
    Animation(String),
    Clip(String),
    Sequence(String),
}

#[derive(Debug)]
pub(crate) struct MemberDoc {
    pub(crate) item: ItemRef,
    pub(crate) start: f32,
    pub(crate) stop: Option<f32>,
    pub(crate) weight: f32,
    pub(crate) blend: WeightBlendMode,
    pub(crate) target: Option<String>,
}

#[derive(Debug)]
pub(crate) struct SequenceDoc {
    pub(crate) name: String,
    pub(crate) members: Vec<MemberDoc>,
}

#[derive(Debug, Default)]
pub(crate) struct AssetDoc {
    pub(crate) animations: Vec<AnimationDoc>,
    pub(crate) clips: Vec<ClipDoc>,
    pub(crate) sequences: Vec<SequenceDoc>,
}

pub(crate) fn malformed(message: impl Into<String>) -> Error {
    Error::MalformedAsset {
        message: message.into(),
    }
}

/// Accepts any `MAJOR[.MINOR...]` string whose major matches [`ASSET_FORMAT_MAJOR`].
pub(crate) fn validate_format_version(value: &str) -> Result<(), Error> {
    let version_error = || Error::AssetVersion {
        value: value.to_string(),
    };
    let major = value.split('.').next().ok_or_else(version_error)?;
    let major: u32 = major.trim().parse().map_err(|_| version_error())?;
    if major != ASSET_FORMAT_MAJOR {
        return Err(version_error());
    }
    Ok(())
}

pub(crate) fn parse_attribute(raw: &str) -> Result<Attribute, Error> {
    match raw {
        "" | "value" => Ok(Attribute::Value),
        "x" => Ok(Attribute::X),
        "y" => Ok(Attribute::Y),
        "z" => Ok(Attribute::Z),
        "w" => Ok(Attribute::W),
        other => Err(malformed(format!("unknown attribute '{other}'"))),
    }
}

/// Turns a parsed document into a library, rejecting every structural problem up front so
/// playback never sees a malformed graph.
pub(crate) fn build_library(doc: AssetDoc) -> Result<AnimationLibrary, Error> {
    let mut library = AnimationLibrary::new();

    let mut animations = HashMap::new();
    for anim in doc.animations {
        if anim.keys.is_empty() {
            return Err(malformed(format!("animation '{}' has no keys", anim.name)));
        }
        if anim
            .keys
            .iter()
            .any(|k| !k.time.is_finite() || !k.value.is_finite())
        {
            return Err(malformed(format!(
                "animation '{}' has non-finite keys",
                anim.name
            )));
        }
        let mut animation = Animation::new(
            anim.name.clone(),
            anim.property.as_str(),
            anim.attribute,
            anim.keys,
        );
        if let Some(duration) = anim.duration {
            if !duration.is_finite() || duration < 0.0 {
                return Err(malformed(format!(
                    "animation '{}' has an invalid duration",
                    anim.name
                )));
            }
            animation = animation.with_duration(duration);
        }
        animation.target_path = anim.target;
        let id = library.add_animation(animation);
        if animations.insert(anim.name.clone(), id).is_some() {
            return Err(malformed(format!("duplicate animation '{}'", anim.name)));
        }
    }

    let mut clips: HashMap<String, ClipId> = HashMap::new();
    for clip in &doc.clips {
        let id = match clip.window {
            Some((start, end)) => library
                .create_root_clip(clip.name.clone(), start, end)
                .map_err(|e| malformed(format!("clip '{}': {e}", clip.name)))?,
            None => {
                if clip.relative {
                    return Err(malformed(format!(
                        "child clip '{}' cannot be relative",
                        clip.name
                    )));
                }
                library.create_child_clip(clip.name.clone())
            }
        };
        if clips.insert(clip.name.clone(), id).is_some() {
            return Err(malformed(format!("duplicate clip '{}'", clip.name)));
        }
        if clip.relative {
            library.set_clip_relative(id, true)?;
        }
        library.set_clip_target_path(id, clip.target.clone())?;
        for name in &clip.animations {
            let animation = animations.get(name).copied().ok_or_else(|| {
                malformed(format!("clip '{}' references unknown animation '{name}'", clip.name))
            })?;
            library.add_clip_animation(id, animation)?;
        }
    }

    let mut parented = HashSet::new();
    for clip in &doc.clips {
        let parent = clips[&clip.name];
        for name in &clip.children {
            let child = clips.get(name).copied().ok_or_else(|| {
                malformed(format!("clip '{}' references unknown child '{name}'", clip.name))
            })?;
            if !parented.insert(child) {
                return Err(malformed(format!("clip '{name}' has more than one parent")));
            }
            library
                .add_animation_clip(parent, child)
                .map_err(|e| malformed(format!("clip '{}' -> '{name}': {e}", clip.name)))?;
        }
    }
    for clip in &doc.clips {
        if clip.window.is_none() && !parented.contains(&clips[&clip.name]) {
            return Err(malformed(format!(
                "child clip '{}' has no parent",
                clip.name
            )));
        }
    }

    let mut sequences: HashMap<String, SequenceId> = HashMap::new();
    for sequence in &doc.sequences {
        let id = library.create_sequence(sequence.name.clone());
        if sequences.insert(sequence.name.clone(), id).is_some() {
            return Err(malformed(format!("duplicate sequence '{}'", sequence.name)));
        }
    }
    for sequence in doc.sequences {
        let id = sequences[&sequence.name];
        for member in sequence.members {
            let item = match &member.item {
                ItemRef::Animation(name) => animations.get(name).copied().map(AnimationItem::from),
                ItemRef::Clip(name) => clips.get(name).copied().map(AnimationItem::from),
                ItemRef::Sequence(name) => sequences.get(name).copied().map(AnimationItem::from),
            }
            .ok_or_else(|| {
                malformed(format!(
                    "sequence '{}' references unknown item {:?}",
                    sequence.name, member.item
                ))
            })?;
            let entry = library
                .add_entry(id, item, member.start)
                .map_err(|e| malformed(format!("sequence '{}': {e}", sequence.name)))?;
            library
                .set_entry_stop_time(entry, member.stop)
                .and_then(|_| library.set_entry_weight(entry, member.weight))
                .map_err(|e| malformed(format!("sequence '{}': {e}", sequence.name)))?;
            library.set_entry_blend_mode(entry, member.blend)?;
            library.set_entry_target_path(entry, member.target)?;
        }
        library.sort_animations(id)?;
    }

    Ok(library)
}
