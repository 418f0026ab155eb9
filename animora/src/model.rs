use slotmap::{SlotMap, new_key_type};
use std::fmt;
use std::sync::Arc;

new_key_type! {
    pub struct AnimationId;
    pub struct ClipId;
    pub struct SequenceId;
    pub struct SequenceEntryId;
}

/// Opaque handle of a scene-graph object. The engine never looks inside it.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ObjectId(pub u64);

/// Name of an animatable property, shared so samples can clone it cheaply.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct PropertyType(Arc<str>);

impl PropertyType {
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PropertyType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Scalar component of a property. Single-valued properties use [`Attribute::Value`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Default)]
pub enum Attribute {
    #[default]
    Value,
    X,
    Y,
    Z,
    W,
}

/// The `(object, property, attribute)` triple that composition and the modifier stack key on.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ModifierKey {
    pub object: ObjectId,
    pub property: PropertyType,
    pub attribute: Attribute,
}

impl ModifierKey {
    pub fn new(object: ObjectId, property: impl Into<PropertyType>, attribute: Attribute) -> Self {
        Self {
            object,
            property: property.into(),
            attribute,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Curve {
    Linear,
    Stepped,
    Bezier {
        cx1: f32,
        cy1: f32,
        cx2: f32,
        cy2: f32,
    },
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Keyframe {
    pub time: f32,
    pub value: f32,
    /// Interpolation towards the next key.
    pub curve: Curve,
}

impl Keyframe {
    pub fn linear(time: f32, value: f32) -> Self {
        Self {
            time,
            value,
            curve: Curve::Linear,
        }
    }

    pub fn stepped(time: f32, value: f32) -> Self {
        Self {
            time,
            value,
            curve: Curve::Stepped,
        }
    }
}

/// A raw keyframe curve driving one property attribute.
#[derive(Clone, Debug)]
pub struct Animation {
    pub name: String,
    pub target_path: Option<String>,
    pub property: PropertyType,
    pub attribute: Attribute,
    duration: f32,
    keys: Vec<Keyframe>,
}

impl Animation {
    /// Duration defaults to the time of the last key.
    pub fn new(
        name: impl Into<String>,
        property: impl Into<PropertyType>,
        attribute: Attribute,
        mut keys: Vec<Keyframe>,
    ) -> Self {
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        let duration = keys.last().map(|k| k.time.max(0.0)).unwrap_or(0.0);
        Self {
            name: name.into(),
            target_path: None,
            property: property.into(),
            attribute,
            duration,
            keys,
        }
    }

    pub fn with_duration(mut self, duration: f32) -> Self {
        if duration.is_finite() && duration >= 0.0 {
            self.duration = duration;
        }
        self
    }

    pub fn with_target_path(mut self, path: impl Into<String>) -> Self {
        self.target_path = Some(path.into());
        self
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn keys(&self) -> &[Keyframe] {
        &self.keys
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ClipKind {
    Root { start_time: f32, end_time: f32 },
    Child,
}

/// A time window over a set of animations, optionally nesting child clips.
#[derive(Clone, Debug)]
pub struct AnimationClip {
    pub name: String,
    pub target_path: Option<String>,
    pub(crate) kind: ClipKind,
    pub(crate) is_relative: bool,
    pub(crate) parent: Option<ClipId>,
    pub(crate) children: Vec<ClipId>,
    pub(crate) animations: Vec<AnimationId>,
}

impl AnimationClip {
    pub fn kind(&self) -> ClipKind {
        self.kind
    }

    pub fn is_root(&self) -> bool {
        matches!(self.kind, ClipKind::Root { .. })
    }

    pub fn is_relative(&self) -> bool {
        self.is_relative
    }

    pub fn parent(&self) -> Option<ClipId> {
        self.parent
    }

    pub fn children(&self) -> &[ClipId] {
        &self.children
    }

    pub fn animations(&self) -> &[AnimationId] {
        &self.animations
    }

    /// `(start, end)` for root clips.
    pub fn window(&self) -> Option<(f32, f32)> {
        match self.kind {
            ClipKind::Root {
                start_time,
                end_time,
            } => Some((start_time, end_time)),
            ClipKind::Child => None,
        }
    }
}

/// How a sample combines with other samples on the same property.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum WeightBlendMode {
    #[default]
    Override,
    Additive,
}

/// Anything the player can start.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum AnimationItem {
    Animation(AnimationId),
    Clip(ClipId),
    Sequence(SequenceId),
}

impl From<AnimationId> for AnimationItem {
    fn from(value: AnimationId) -> Self {
        Self::Animation(value)
    }
}

impl From<ClipId> for AnimationItem {
    fn from(value: ClipId) -> Self {
        Self::Clip(value)
    }
}

impl From<SequenceId> for AnimationItem {
    fn from(value: SequenceId) -> Self {
        Self::Sequence(value)
    }
}

/// A member of a [`TimelineSequence`].
#[derive(Clone, Debug)]
pub struct SequenceEntry {
    pub id: SequenceEntryId,
    pub item: AnimationItem,
    pub start_time: f32,
    /// Local stop time measured from `start_time`; `None` plays the item to its end.
    pub stop_time: Option<f32>,
    pub weight: f32,
    pub blend_mode: WeightBlendMode,
    pub target_path: Option<String>,
}

impl SequenceEntry {
    /// Local time after which this member no longer contributes.
    pub fn local_end(&self, library: &AnimationLibrary) -> f32 {
        let duration = self.item.duration(library);
        match self.stop_time {
            Some(stop) => stop.min(duration),
            None => duration,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct TimelineSequence {
    pub name: String,
    pub(crate) entries: Vec<SequenceEntry>,
}

impl TimelineSequence {
    pub fn entries(&self) -> &[SequenceEntry] {
        &self.entries
    }

    pub fn entry(&self, id: SequenceEntryId) -> Option<&SequenceEntry> {
        self.entries.iter().find(|e| e.id == id)
    }
}

/// Owner of all authored animation data. Containers reference each other by key.
#[derive(Clone, Debug, Default)]
pub struct AnimationLibrary {
    pub(crate) animations: SlotMap<AnimationId, Animation>,
    pub(crate) clips: SlotMap<ClipId, AnimationClip>,
    pub(crate) sequences: SlotMap<SequenceId, TimelineSequence>,
    pub(crate) memberships: SlotMap<SequenceEntryId, SequenceId>,
}

impl AnimationLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn animation(&self, id: AnimationId) -> Option<&Animation> {
        self.animations.get(id)
    }

    pub fn clip(&self, id: ClipId) -> Option<&AnimationClip> {
        self.clips.get(id)
    }

    pub fn sequence(&self, id: SequenceId) -> Option<&TimelineSequence> {
        self.sequences.get(id)
    }

    pub fn animations(&self) -> impl Iterator<Item = (AnimationId, &Animation)> {
        self.animations.iter()
    }

    pub fn clips(&self) -> impl Iterator<Item = (ClipId, &AnimationClip)> {
        self.clips.iter()
    }

    pub fn sequences(&self) -> impl Iterator<Item = (SequenceId, &TimelineSequence)> {
        self.sequences.iter()
    }

    pub fn find_animation(&self, name: &str) -> Option<AnimationId> {
        self.animations
            .iter()
            .find(|(_, a)| a.name == name)
            .map(|(id, _)| id)
    }

    pub fn find_clip(&self, name: &str) -> Option<ClipId> {
        self.clips
            .iter()
            .find(|(_, c)| c.name == name)
            .map(|(id, _)| id)
    }

    pub fn find_sequence(&self, name: &str) -> Option<SequenceId> {
        self.sequences
            .iter()
            .find(|(_, s)| s.name == name)
            .map(|(id, _)| id)
    }

    pub fn contains_item(&self, item: AnimationItem) -> bool {
        match item {
            AnimationItem::Animation(id) => self.animations.contains_key(id),
            AnimationItem::Clip(id) => self.clips.contains_key(id),
            AnimationItem::Sequence(id) => self.sequences.contains_key(id),
        }
    }

    pub fn add_animation(&mut self, animation: Animation) -> AnimationId {
        self.animations.insert(animation)
    }

    /// Deletes an animation and detaches it from every clip that referenced it.
    pub fn remove_animation(&mut self, id: AnimationId) -> Option<Animation> {
        let animation = self.animations.remove(id)?;
        for (_, clip) in self.clips.iter_mut() {
            clip.animations.retain(|a| *a != id);
        }
        self.drop_sequence_members(AnimationItem::Animation(id));
        Some(animation)
    }

    fn drop_sequence_members(&mut self, item: AnimationItem) {
        for (_, sequence) in self.sequences.iter_mut() {
            let memberships = &mut self.memberships;
            sequence.entries.retain(|entry| {
                if entry.item == item {
                    memberships.remove(entry.id);
                    false
                } else {
                    true
                }
            });
        }
    }

    /// Deletes a clip together with its child clips.
    pub fn remove_clip(&mut self, id: ClipId) -> Option<AnimationClip> {
        let clip = self.clips.remove(id)?;
        if let Some(parent) = clip.parent.and_then(|p| self.clips.get_mut(p)) {
            parent.children.retain(|c| *c != id);
        }
        for child in clip.children.clone() {
            if let Some(child_clip) = self.clips.get_mut(child) {
                child_clip.parent = None;
            }
            self.remove_clip(child);
        }
        self.drop_sequence_members(AnimationItem::Clip(id));
        Some(clip)
    }

    /// Deletes a sequence and every entry it owns.
    pub fn remove_sequence(&mut self, id: SequenceId) -> Option<TimelineSequence> {
        let sequence = self.sequences.remove(id)?;
        for entry in &sequence.entries {
            self.memberships.remove(entry.id);
        }
        self.drop_sequence_members(AnimationItem::Sequence(id));
        Some(sequence)
    }
}

impl AnimationItem {
    pub fn duration(self, library: &AnimationLibrary) -> f32 {
        match self {
            Self::Animation(id) => library.animation(id).map(Animation::duration).unwrap_or(0.0),
            Self::Clip(id) => library.clip_duration(id),
            Self::Sequence(id) => library.sequence_duration(id),
        }
    }

    pub fn name(self, library: &AnimationLibrary) -> Option<&str> {
        match self {
            Self::Animation(id) => library.animation(id).map(|a| a.name.as_str()),
            Self::Clip(id) => library.clip(id).map(|c| c.name.as_str()),
            Self::Sequence(id) => library.sequence(id).map(|s| s.name.as_str()),
        }
    }
}
