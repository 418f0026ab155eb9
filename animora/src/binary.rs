//! Packed binary animation asset loader.
//!
//! The loader is IO-free: it operates on an in-memory byte slice. All numbers are big-endian;
//! counts and string lengths are varints.

use byteorder::{BigEndian, ByteOrder};

use crate::asset::{
    AnimationDoc, AssetDoc, ClipDoc, ItemRef, MemberDoc, SequenceDoc, build_library,
    validate_format_version,
};
use crate::{AnimationLibrary, Attribute, Curve, Error, Keyframe, WeightBlendMode};

pub(crate) const MAGIC: &[u8; 4] = b"ANIM";

pub(crate) const CURVE_LINEAR: i8 = 0;
pub(crate) const CURVE_STEPPED: i8 = 1;
pub(crate) const CURVE_BEZIER: i8 = 2;

pub(crate) const ITEM_ANIMATION: u8 = 0;
pub(crate) const ITEM_CLIP: u8 = 1;
pub(crate) const ITEM_SEQUENCE: u8 = 2;

pub(crate) const BLEND_OVERRIDE: u8 = 0;
pub(crate) const BLEND_ADDITIVE: u8 = 1;

// Guards `Vec::with_capacity` against absurd counts in corrupt input.
const MAX_PREALLOC: usize = 4096;

struct BinaryInput<'a> {
    bytes: &'a [u8],
    cursor: usize,
}

impl<'a> BinaryInput<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, cursor: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.cursor)
    }

    fn eof(&self) -> Error {
        Error::BinaryParse {
            message: format!("unexpected EOF at offset {}", self.cursor),
        }
    }

    fn read_u8(&mut self) -> Result<u8, Error> {
        if self.cursor >= self.bytes.len() {
            return Err(self.eof());
        }
        let b = self.bytes[self.cursor];
        self.cursor += 1;
        Ok(b)
    }

    fn read_i8(&mut self) -> Result<i8, Error> {
        Ok(self.read_u8()? as i8)
    }

    fn read_bool(&mut self) -> Result<bool, Error> {
        Ok(self.read_u8()? != 0)
    }

    fn read_f32_be(&mut self) -> Result<f32, Error> {
        if self.remaining() < 4 {
            return Err(self.eof());
        }
        let v = BigEndian::read_f32(&self.bytes[self.cursor..self.cursor + 4]);
        self.cursor += 4;
        Ok(v)
    }

    fn read_varint(&mut self) -> Result<u32, Error> {
        let mut value = 0u32;
        for shift in (0..35).step_by(7) {
            let b = self.read_u8()?;
            value |= ((b & 0x7F) as u32) << shift;
            if (b & 0x80) == 0 {
                return Ok(value);
            }
        }
        Err(Error::BinaryParse {
            message: format!("varint too long at offset {}", self.cursor),
        })
    }

    fn read_count(&mut self) -> Result<usize, Error> {
        Ok(self.read_varint()? as usize)
    }

    /// Length-prefixed UTF-8: 0 is `None`, 1 is the empty string, otherwise `len - 1` bytes.
    fn read_string(&mut self) -> Result<Option<String>, Error> {
        let length = self.read_count()?;
        if length == 0 {
            return Ok(None);
        }
        let byte_len = length - 1;
        if self.remaining() < byte_len {
            return Err(Error::BinaryParse {
                message: format!(
                    "unexpected EOF while reading string (len={byte_len}) at offset {}",
                    self.cursor
                ),
            });
        }
        let offset = self.cursor;
        let bytes = &self.bytes[self.cursor..self.cursor + byte_len];
        self.cursor += byte_len;
        let s = std::str::from_utf8(bytes).map_err(|e| Error::BinaryParse {
            message: format!("invalid utf-8 in string at offset {offset}: {e}"),
        })?;
        Ok(Some(s.to_string()))
    }

    fn read_name(&mut self, what: &str) -> Result<String, Error> {
        let offset = self.cursor;
        self.read_string()?.ok_or_else(|| Error::BinaryParse {
            message: format!("missing {what} name at offset {offset}"),
        })
    }

    fn read_optional_f32(&mut self) -> Result<Option<f32>, Error> {
        if self.read_bool()? {
            Ok(Some(self.read_f32_be()?))
        } else {
            Ok(None)
        }
    }

    fn read_names(&mut self, what: &str) -> Result<Vec<String>, Error> {
        let count = self.read_count()?;
        let mut names = Vec::with_capacity(count.min(MAX_PREALLOC));
        for _ in 0..count {
            names.push(self.read_name(what)?);
        }
        Ok(names)
    }
}

impl AnimationLibrary {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut input = BinaryInput::new(bytes);

        if !bytes.starts_with(MAGIC) {
            return Err(Error::BinaryParse {
                message: "missing ANIM header".to_string(),
            });
        }
        input.cursor = MAGIC.len();

        let version = input.read_string()?.unwrap_or_default();
        validate_format_version(&version)?;

        let mut doc = AssetDoc::default();

        let animation_count = input.read_count()?;
        doc.animations.reserve(animation_count.min(MAX_PREALLOC));
        for _ in 0..animation_count {
            doc.animations.push(read_animation(&mut input)?);
        }

        let clip_count = input.read_count()?;
        doc.clips.reserve(clip_count.min(MAX_PREALLOC));
        for _ in 0..clip_count {
            doc.clips.push(read_clip(&mut input)?);
        }

        let sequence_count = input.read_count()?;
        doc.sequences.reserve(sequence_count.min(MAX_PREALLOC));
        for _ in 0..sequence_count {
            doc.sequences.push(read_sequence(&mut input)?);
        }

        if input.remaining() != 0 {
            return Err(Error::BinaryParse {
                message: format!("{} trailing bytes", input.remaining()),
            });
        }

        build_library(doc)
    }
}

fn read_attribute(input: &mut BinaryInput<'_>) -> Result<Attribute, Error> {
    match input.read_u8()? {
        0 => Ok(Attribute::Value),
        1 => Ok(Attribute::X),
        2 => Ok(Attribute::Y),
        3 => Ok(Attribute::Z),
        4 => Ok(Attribute::W),
        other => Err(Error::BinaryParse {
            message: format!("unknown attribute code {other}"),
        }),
    }
}

fn read_animation(input: &mut BinaryInput<'_>) -> Result<AnimationDoc, Error> {
    let name = input.read_name("animation")?;
    let property = input.read_name("property")?;
    let attribute = read_attribute(input)?;
    let target = input.read_string()?;
    let duration = input.read_optional_f32()?;

    let key_count = input.read_count()?;
    let mut keys = Vec::with_capacity(key_count.min(MAX_PREALLOC));
    for _ in 0..key_count {
        let time = input.read_f32_be()?;
        let value = input.read_f32_be()?;
        let curve = match input.read_i8()? {
            CURVE_LINEAR => Curve::Linear,
            CURVE_STEPPED => Curve::Stepped,
            CURVE_BEZIER => Curve::Bezier {
                cx1: input.read_f32_be()?,
                cy1: input.read_f32_be()?,
                cx2: input.read_f32_be()?,
                cy2: input.read_f32_be()?,
            },
            other => {
                return Err(Error::BinaryParse {
                    message: format!("animation '{name}': unknown curve type {other}"),
                });
            }
        };
        keys.push(Keyframe { time, value, curve });
    }

    Ok(AnimationDoc {
        name,
        property,
        attribute,
        target,
        duration,
        keys,
    })
}

fn read_clip(input: &mut BinaryInput<'_>) -> Result<ClipDoc, Error> {
    let name = input.read_name("clip")?;
    let window = if input.read_bool()? {
        Some((input.read_f32_be()?, input.read_f32_be()?))
    } else {
        None
    };
    let relative = input.read_bool()?;
    let target = input.read_string()?;
    let animations = input.read_names("animation")?;
    let children = input.read_names("child clip")?;
    Ok(ClipDoc {
        name,
        window,
        relative,
        target,
        animations,
        children,
    })
}

fn read_sequence(input: &mut BinaryInput<'_>) -> Result<SequenceDoc, Error> {
    let name = input.read_name("sequence")?;
    let member_count = input.read_count()?;
    let mut members = Vec::with_capacity(member_count.min(MAX_PREALLOC));
    for _ in 0..member_count {
        let kind = input.read_u8()?;
        let item_name = input.read_name("sequence item")?;
        let item = match kind {
            ITEM_ANIMATION => ItemRef::Animation(item_name),
            ITEM_CLIP => ItemRef::Clip(item_name),
            ITEM_SEQUENCE => ItemRef::Sequence(item_name),
            other => {
                return Err(Error::BinaryParse {
                    message: format!("sequence '{name}': unknown item kind {other}"),
                });
            }
        };
        let start = input.read_f32_be()?;
        let stop = input.read_optional_f32()?;
        let weight = input.read_f32_be()?;
        let blend = match input.read_u8()? {
            BLEND_OVERRIDE => WeightBlendMode::Override,
            BLEND_ADDITIVE => WeightBlendMode::Additive,
            other => {
                return Err(Error::BinaryParse {
                    message: format!("sequence '{name}': unknown blend mode {other}"),
                });
            }
        };
        let target = input.read_string()?;
        members.push(MemberDoc {
            item,
            start,
            stop,
            weight,
            blend,
            target,
        });
    }
    Ok(SequenceDoc { name, members })
}
