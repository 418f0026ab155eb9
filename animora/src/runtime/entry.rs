use std::collections::HashMap;

use crate::runtime::compose::AnimationSample;
use crate::runtime::events::PlaybackListener;
use crate::{
    AnimationId, AnimationItem, ClipId, ModifierKey, ObjectId, SequenceEntryId, StartOptions,
    WeightBlendMode,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct EntryId {
    pub(crate) index: usize,
    pub(crate) generation: u32,
}

#[derive(Debug)]
pub(crate) struct EntrySlot {
    pub(crate) generation: u32,
    pub(crate) entry: Option<TimelineEntry>,
}

/// Stable reference to a player entry. Stale handles resolve to nothing once the entry is
/// disposed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryHandle {
    pub(crate) id: EntryId,
}

/// Lifecycle of a [`TimelineEntry`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EntryState {
    Ready,
    /// Resolving targets and claiming modifier records.
    Preparing,
    Playing,
    Finishing,
    Dead,
}

impl EntryState {
    pub fn is_live(self) -> bool {
        !matches!(self, Self::Finishing | Self::Dead)
    }
}

/// One `(clip, animation)` pair an entry produces samples for. Raw animations use `clip: None`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct TargetSlot {
    pub(crate) clip: Option<ClipId>,
    pub(crate) animation: AnimationId,
}

/// A running instance of an [`AnimationItem`].
pub struct TimelineEntry {
    pub item: AnimationItem,
    pub context_object: Option<ObjectId>,
    pub relative_time: f32,
    pub weight: f32,
    pub weight_blend_mode: WeightBlendMode,
    pub looped: bool,
    pub time_scale: f32,

    pub(crate) state: EntryState,
    pub(crate) priority: u64,
    pub(crate) owner: Option<EntryId>,
    pub(crate) member: Option<SequenceEntryId>,
    /// Target path segments inherited from enclosing sequence members.
    pub(crate) base_path: Option<String>,
    pub(crate) children: Vec<EntryId>,
    /// Set while a sequence child sits outside its member span.
    pub(crate) suspended: bool,

    pub(crate) driver: Option<ModifierKey>,
    pub(crate) dirty: bool,

    pub(crate) targets_resolved: bool,
    pub(crate) cached_targets: HashMap<TargetSlot, Option<ModifierKey>>,
    /// Samples from the last time the entry was sampled. Driven entries replay them until
    /// dirty; the player also recomposes from them when another claimant is released.
    pub(crate) cached_samples: Vec<AnimationSample>,
    pub(crate) claims: Vec<ModifierKey>,

    pub(crate) listener: Option<Box<dyn PlaybackListener>>,
}

impl std::fmt::Debug for TimelineEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimelineEntry")
            .field("item", &self.item)
            .field("context_object", &self.context_object)
            .field("relative_time", &self.relative_time)
            .field("weight", &self.weight)
            .field("weight_blend_mode", &self.weight_blend_mode)
            .field("looped", &self.looped)
            .field("time_scale", &self.time_scale)
            .field("state", &self.state)
            .field("priority", &self.priority)
            .field("owner", &self.owner)
            .field("children", &self.children)
            .field("suspended", &self.suspended)
            .field("driver", &self.driver)
            .field("dirty", &self.dirty)
            .field("claims", &self.claims)
            .finish()
    }
}

impl TimelineEntry {
    pub(crate) fn new(
        item: AnimationItem,
        context_object: Option<ObjectId>,
        options: &StartOptions,
        priority: u64,
    ) -> Self {
        Self {
            item,
            context_object,
            relative_time: 0.0,
            weight: options.weight,
            weight_blend_mode: options.blend_mode,
            looped: options.looped,
            time_scale: options.time_scale,
            state: EntryState::Ready,
            priority,
            owner: None,
            member: None,
            base_path: None,
            children: Vec::new(),
            suspended: false,
            driver: None,
            dirty: false,
            targets_resolved: false,
            cached_targets: HashMap::new(),
            cached_samples: Vec::new(),
            claims: Vec::new(),
            listener: None,
        }
    }

    pub fn state(&self) -> EntryState {
        self.state
    }

    pub fn is_relative(&self) -> bool {
        self.weight_blend_mode == WeightBlendMode::Additive
    }

    pub fn is_driven(&self) -> bool {
        self.driver.is_some()
    }

    /// Driven entries only recompute after a change notification or a cache flush.
    pub(crate) fn is_update_required(&self) -> bool {
        self.driver.is_none() || self.dirty || !self.targets_resolved
    }

    /// Playback time on the item's own timeline.
    pub(crate) fn local_time(&self, duration: f32, epsilon: f32) -> f32 {
        if self.looped && duration > epsilon {
            let t = self.relative_time % duration;
            if t < 0.0 { t + duration } else { t }
        } else {
            self.relative_time.clamp(0.0, duration.max(0.0))
        }
    }

    pub(crate) fn reset_caches(&mut self) {
        self.targets_resolved = false;
        self.cached_targets.clear();
        self.cached_samples.clear();
        if self.driver.is_some() {
            self.dirty = true;
        }
    }

    pub(crate) fn add_claim(&mut self, key: &ModifierKey) {
        if !self.claims.contains(key) {
            self.claims.push(key.clone());
        }
    }
}
