use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::runtime::clip::join_paths;
use crate::runtime::compose::{AnimationSample, compose_animation_samples};
use crate::runtime::entry::{EntryHandle, EntryId, EntrySlot, EntryState, TargetSlot, TimelineEntry};
use crate::runtime::events::{
    Command, Commands, EntrySnapshot, PlaybackEvent, PlaybackListener, QueuedEvent,
};
use crate::runtime::modifier::{ModifierRecord, ModifierStack};
use crate::runtime::property::PropertyAccess;
use crate::{
    AnimationItem, AnimationLibrary, Attribute, ClipId, Error, ModifierKey, ObjectId, PlayerConfig,
    SequenceEntry, SequenceId, StartOptions, WeightBlendMode,
};

impl EntryHandle {
    fn with_entry_mut(&self, player: &mut AnimationPlayer, f: impl FnOnce(&mut TimelineEntry)) {
        if let Some(entry) = player.entry_mut(self.id) {
            f(entry);
        }
    }

    pub fn set_listener<L: PlaybackListener + 'static>(
        &self,
        player: &mut AnimationPlayer,
        listener: L,
    ) {
        self.with_entry_mut(player, |entry| {
            entry.listener = Some(Box::new(listener));
        });
    }

    pub fn set_weight(&self, player: &mut AnimationPlayer, weight: f32) {
        self.with_entry_mut(player, |entry| {
            entry.weight = weight;
            entry.dirty = entry.driver.is_some();
        });
    }

    pub fn set_weight_blend_mode(&self, player: &mut AnimationPlayer, mode: WeightBlendMode) {
        self.with_entry_mut(player, |entry| {
            entry.weight_blend_mode = mode;
            entry.dirty = entry.driver.is_some();
        });
    }

    pub fn set_time_scale(&self, player: &mut AnimationPlayer, time_scale: f32) {
        self.with_entry_mut(player, |entry| {
            entry.time_scale = time_scale;
        });
    }

    pub fn set_looped(&self, player: &mut AnimationPlayer, looped: bool) {
        self.with_entry_mut(player, |entry| {
            entry.looped = looped;
        });
    }
}

/// Read-only view of an entry for tooling and tests.
#[derive(Clone, Debug, PartialEq)]
pub struct EntryInfo {
    pub handle: EntryHandle,
    pub item: AnimationItem,
    pub state: EntryState,
    pub relative_time: f32,
    pub duration: f32,
    pub priority: u64,
    pub weight: f32,
    pub weight_blend_mode: WeightBlendMode,
    pub looped: bool,
    pub suspended: bool,
    pub context_object: Option<ObjectId>,
    pub owner: Option<EntryHandle>,
    pub children: Vec<EntryHandle>,
    /// Attributes the entry currently holds modifier records for.
    pub targets: Vec<ModifierKey>,
}

struct UpdatePass {
    root: Option<ObjectId>,
    samples: Vec<AnimationSample>,
    /// Entries that ran out this tick; `true` when they reached their natural end.
    finishing: Vec<(EntryId, bool)>,
}

/// Drives every running entry and writes composed values back through [`PropertyAccess`].
pub struct AnimationPlayer {
    config: PlayerConfig,
    library: AnimationLibrary,
    entries: Vec<EntrySlot>,
    free_list: Vec<usize>,
    top_level: Vec<EntryId>,
    modifiers: ModifierStack,
    event_queue: VecDeque<QueuedEvent>,
    deferred: VecDeque<Command>,
    listener: Option<Box<dyn PlaybackListener>>,
    next_priority: u64,
    library_changed: bool,
    time: f32,
}

impl AnimationPlayer {
    pub fn new(library: AnimationLibrary) -> Self {
        Self::with_config(library, PlayerConfig::default())
    }

    pub fn with_config(library: AnimationLibrary, config: PlayerConfig) -> Self {
        Self {
            modifiers: ModifierStack::with_capacity_limit(config.max_modifier_records),
            config,
            library,
            entries: Vec::new(),
            free_list: Vec::new(),
            top_level: Vec::new(),
            event_queue: VecDeque::new(),
            deferred: VecDeque::new(),
            listener: None,
            next_priority: 0,
            library_changed: false,
            time: 0.0,
        }
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn library(&self) -> &AnimationLibrary {
        &self.library
    }

    /// Edits to the library take effect at the start of the next update, when every entry
    /// re-resolves its targets and sequence entries pick up added or removed members.
    pub fn library_mut(&mut self) -> &mut AnimationLibrary {
        self.library_changed = true;
        &mut self.library
    }

    pub fn set_listener<L: PlaybackListener + 'static>(&mut self, listener: L) {
        self.listener = Some(Box::new(listener));
    }

    pub fn clear_listener(&mut self) {
        self.listener = None;
    }

    /// Total time advanced so far.
    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn start(
        &mut self,
        item: impl Into<AnimationItem>,
        context: Option<ObjectId>,
        props: &mut dyn PropertyAccess,
    ) -> Result<EntryHandle, Error> {
        let options = self.config.start_options();
        self.start_with(item, context, options, props)
    }

    pub fn start_with(
        &mut self,
        item: impl Into<AnimationItem>,
        context: Option<ObjectId>,
        options: StartOptions,
        props: &mut dyn PropertyAccess,
    ) -> Result<EntryHandle, Error> {
        let id = self.start_root(item.into(), context, options, None, props)?;
        self.queue_start_events(id);
        self.drain_events(props);
        Ok(EntryHandle { id })
    }

    /// Starts an entry whose time is read from `driver` instead of the clock. It keeps playing
    /// until it is finished explicitly.
    pub fn start_driven(
        &mut self,
        item: impl Into<AnimationItem>,
        context: Option<ObjectId>,
        driver: ModifierKey,
        props: &mut dyn PropertyAccess,
    ) -> Result<EntryHandle, Error> {
        let options = self.config.start_options();
        let id = self.start_root(item.into(), context, options, Some(driver), props)?;
        self.queue_start_events(id);
        self.drain_events(props);
        Ok(EntryHandle { id })
    }

    pub fn update(&mut self, delta: f32, props: &mut dyn PropertyAccess) -> Result<(), Error> {
        self.update_within(delta, None, props)
    }

    /// Advances every entry by `delta` seconds and writes the composed values. With `root`
    /// set, only objects inside that subtree are written. Only
    /// [`Error::ModifierStackExhausted`] is returned; per-sample failures are logged.
    pub fn update_within(
        &mut self,
        delta: f32,
        root: Option<ObjectId>,
        props: &mut dyn PropertyAccess,
    ) -> Result<(), Error> {
        if !delta.is_finite() || delta < 0.0 {
            log::warn!("ignoring update with invalid delta {delta}");
            return Ok(());
        }
        self.time += delta;

        if self.library_changed {
            self.library_changed = false;
            self.refresh_library(props);
        }

        let mut pass = UpdatePass {
            root,
            samples: Vec::new(),
            finishing: Vec::new(),
        };

        for id in self.top_level.clone() {
            self.advance_entry(id, delta, &mut pass, &*props);
        }
        let result = self.sample_and_compose(&mut pass, props);

        for (id, completed) in std::mem::take(&mut pass.finishing) {
            self.finish_entry_internal(id, completed, props);
        }
        self.drain_events(props);
        result
    }

    fn sample_and_compose(
        &mut self,
        pass: &mut UpdatePass,
        props: &mut dyn PropertyAccess,
    ) -> Result<(), Error> {
        for id in self.top_level.clone() {
            self.sample_entry(id, pass, props)?;
        }
        self.compose(pass, props)
    }

    /// Stops the entry now, restoring every attribute it was the last claimant of.
    pub fn finish(
        &mut self,
        handle: EntryHandle,
        props: &mut dyn PropertyAccess,
    ) -> Result<(), Error> {
        if !self.is_live(handle) {
            return Err(Error::not_found("entry"));
        }
        self.finish_entry_internal(handle.id, false, props);
        self.drain_events(props);
        Ok(())
    }

    pub fn finish_all(&mut self, props: &mut dyn PropertyAccess) {
        for id in self.top_level.clone() {
            self.finish_entry_internal(id, false, props);
        }
        self.drain_events(props);
    }

    /// Cancels every top-level entry playing on `object`. Returns how many were stopped.
    pub fn finish_object(&mut self, object: ObjectId, props: &mut dyn PropertyAccess) -> usize {
        let targets = self
            .top_level
            .iter()
            .copied()
            .filter(|id| {
                self.entry(*id)
                    .is_some_and(|e| e.context_object == Some(object) && e.state.is_live())
            })
            .collect::<Vec<_>>();
        for id in &targets {
            self.finish_entry_internal(*id, false, props);
        }
        self.drain_events(props);
        targets.len()
    }

    /// Marks entries driven by this attribute for recomputation on the next update.
    pub fn notify_property_changed(
        &mut self,
        object: ObjectId,
        property: &str,
        attribute: Attribute,
    ) -> usize {
        self.mark_driven_dirty(&ModifierKey::new(object, property, attribute))
    }

    pub fn clear_entry_caches(&mut self, handle: EntryHandle) {
        if let Some(entry) = self.entry_mut(handle.id) {
            entry.reset_caches();
        }
    }

    pub fn entry_info(&self, handle: EntryHandle) -> Option<EntryInfo> {
        let entry = self.entry(handle.id)?;
        Some(EntryInfo {
            handle,
            item: entry.item,
            state: entry.state,
            relative_time: entry.relative_time,
            duration: entry.item.duration(&self.library),
            priority: entry.priority,
            weight: entry.weight,
            weight_blend_mode: entry.weight_blend_mode,
            looped: entry.looped,
            suspended: entry.suspended,
            context_object: entry.context_object,
            owner: entry.owner.map(|id| EntryHandle { id }),
            children: entry.children.iter().map(|id| EntryHandle { id: *id }).collect(),
            targets: entry.claims.clone(),
        })
    }

    pub fn top_level_entries(&self) -> Vec<EntryHandle> {
        self.top_level.iter().map(|id| EntryHandle { id: *id }).collect()
    }

    /// Last value written for `key`, or its original value if nothing was written yet.
    pub fn current_value(&self, key: &ModifierKey) -> Option<f32> {
        self.modifiers.record(key).map(|r| r.value)
    }

    pub fn original_value(&self, key: &ModifierKey) -> Option<f32> {
        self.modifiers.record(key).map(|r| r.start_value)
    }

    pub fn modifier(&self, key: &ModifierKey) -> Option<&ModifierRecord> {
        self.modifiers.record(key)
    }

    pub fn modifier_count(&self) -> usize {
        self.modifiers.len()
    }

    pub fn is_live(&self, handle: EntryHandle) -> bool {
        self.entry(handle.id).is_some_and(|e| e.state.is_live())
    }

    pub fn live_entry_count(&self) -> usize {
        self.entries
            .iter()
            .filter_map(|slot| slot.entry.as_ref())
            .filter(|e| e.state.is_live())
            .count()
    }

    fn next_priority(&mut self) -> u64 {
        let priority = self.next_priority;
        self.next_priority += 1;
        priority
    }

    fn start_root(
        &mut self,
        item: AnimationItem,
        context: Option<ObjectId>,
        options: StartOptions,
        driver: Option<ModifierKey>,
        props: &mut dyn PropertyAccess,
    ) -> Result<EntryId, Error> {
        self.validate_start(item)?;
        if !options.weight.is_finite() || !options.time_scale.is_finite() {
            return Err(Error::invalid_value("weight and time scale must be finite"));
        }

        let priority = self.next_priority();
        let mut entry = TimelineEntry::new(item, context, &options, priority);
        entry.dirty = driver.is_some();
        entry.driver = driver;
        let id = self.alloc_entry(entry);
        self.top_level.push(id);

        if let Err(err) = self.prepare_entry(id, props) {
            log::debug!("discarding entry for {item:?}: {err}");
            self.discard_entry(id, props);
            return Err(err);
        }
        Ok(id)
    }

    fn validate_start(&self, item: AnimationItem) -> Result<(), Error> {
        if !self.library.contains_item(item) {
            return Err(Error::not_found(format!("{item:?}")));
        }
        if let AnimationItem::Clip(id) = item {
            if let Some(clip) = self.library.clip(id).filter(|c| !c.is_root()) {
                return Err(Error::IncompatibleItem {
                    message: format!("child clip '{}' has no playback window", clip.name),
                });
            }
        }
        Ok(())
    }

    /// Ready -> Preparing -> Playing. Sequence entries spawn one child per member; everything
    /// else resolves and claims its targets.
    fn prepare_entry(&mut self, id: EntryId, props: &mut dyn PropertyAccess) -> Result<(), Error> {
        let Some(entry) = self.entry_mut(id) else {
            return Err(Error::not_found("entry"));
        };
        entry.state = EntryState::Preparing;
        let item = entry.item;

        match item {
            AnimationItem::Sequence(sequence) => {
                for member in self.sequence_members(sequence) {
                    self.spawn_child(id, &member, props)?;
                }
                if let Some(entry) = self.entry_mut(id) {
                    entry.targets_resolved = true;
                }
            }
            _ => {
                let targets = self.resolve_targets(id, &*props, true)?;
                self.apply_targets(id, targets, props)?;
            }
        }

        if let Some(entry) = self.entry_mut(id) {
            entry.state = EntryState::Playing;
        }
        Ok(())
    }

    fn sequence_members(&self, sequence: SequenceId) -> Vec<SequenceEntry> {
        self.library
            .sequence(sequence)
            .map(|s| s.entries().to_vec())
            .unwrap_or_default()
    }

    fn spawn_child(
        &mut self,
        parent: EntryId,
        member: &SequenceEntry,
        props: &mut dyn PropertyAccess,
    ) -> Result<EntryId, Error> {
        let Some(parent_entry) = self.entry(parent) else {
            return Err(Error::not_found("sequence entry"));
        };
        let context = parent_entry.context_object;
        let base_path = join_paths(
            parent_entry
                .base_path
                .iter()
                .cloned()
                .chain(member.target_path.clone()),
        );
        let options = StartOptions {
            weight: member.weight,
            blend_mode: member.blend_mode,
            looped: false,
            time_scale: 1.0,
        };

        let priority = self.next_priority();
        let mut entry = TimelineEntry::new(member.item, context, &options, priority);
        entry.owner = Some(parent);
        entry.member = Some(member.id);
        entry.base_path = base_path;
        entry.relative_time = -member.start_time;
        entry.suspended = member.start_time > 0.0;
        let id = self.alloc_entry(entry);
        if let Some(parent_entry) = self.entry_mut(parent) {
            parent_entry.children.push(id);
        }

        if let Err(err) = self.prepare_entry(id, props) {
            self.discard_entry(id, props);
            return Err(err);
        }
        Ok(id)
    }

    fn target_slots(&self, item: AnimationItem) -> Vec<TargetSlot> {
        match item {
            AnimationItem::Animation(animation) => vec![TargetSlot {
                clip: None,
                animation,
            }],
            AnimationItem::Clip(clip) => self
                .library
                .clip_targets(clip)
                .into_iter()
                .map(|(clip, animation)| TargetSlot {
                    clip: Some(clip),
                    animation,
                })
                .collect(),
            AnimationItem::Sequence(_) => Vec::new(),
        }
    }

    /// Resolves every target path of the entry. With `strict`, the first unresolvable path
    /// is an error; otherwise it is cached as unresolved and its samples are dropped.
    fn resolve_targets(
        &self,
        id: EntryId,
        props: &dyn PropertyAccess,
        strict: bool,
    ) -> Result<Vec<(TargetSlot, Option<ModifierKey>)>, Error> {
        let entry = self.entry(id).ok_or_else(|| Error::not_found("entry"))?;
        let mut resolved = Vec::new();
        for slot in self.target_slots(entry.item) {
            let Some(animation) = self.library.animation(slot.animation) else {
                continue;
            };
            let own_path = match slot.clip {
                Some(clip) => self.library.clip_target_path(clip, slot.animation),
                None => animation.target_path.clone(),
            };
            let path = join_paths(entry.base_path.iter().cloned().chain(own_path));
            let object = match &path {
                Some(path) => props.resolve(entry.context_object, path),
                None => entry.context_object,
            };
            match object {
                Some(object) => resolved.push((
                    slot,
                    Some(ModifierKey::new(
                        object,
                        animation.property.clone(),
                        animation.attribute,
                    )),
                )),
                None => {
                    let path = path.unwrap_or_else(|| "<context>".to_string());
                    if strict {
                        return Err(Error::InvalidTarget { path });
                    }
                    log::warn!("cannot resolve target '{path}' of '{}'", animation.name);
                    resolved.push((slot, None));
                }
            }
        }
        Ok(resolved)
    }

    /// Claims the records for freshly resolved targets, then lets go of the ones the entry no
    /// longer reaches.
    fn apply_targets(
        &mut self,
        id: EntryId,
        targets: Vec<(TargetSlot, Option<ModifierKey>)>,
        props: &mut dyn PropertyAccess,
    ) -> Result<(), Error> {
        let (_, additive) = self.effective_blend(id);
        let mut keys: Vec<(ModifierKey, bool)> = Vec::new();
        for (slot, key) in &targets {
            let Some(key) = key else {
                continue;
            };
            if keys.iter().any(|(k, _)| k == key) {
                continue;
            }
            let is_relative = additive || slot.clip.is_some_and(|c| self.clip_is_relative(c));
            keys.push((key.clone(), is_relative));
        }

        for (key, is_relative) in &keys {
            match self.claim(id, key, *is_relative, &*props) {
                Ok(()) => {}
                Err(err) if err.is_recoverable() => {
                    log::debug!("deferring claim of {}.{:?}: {err}", key.property, key.attribute);
                }
                Err(err) => return Err(err),
            }
        }

        let stale = match self.entry_mut(id) {
            Some(entry) => {
                let (keep, stale): (Vec<_>, Vec<_>) = std::mem::take(&mut entry.claims)
                    .into_iter()
                    .partition(|key| keys.iter().any(|(k, _)| k == key));
                entry.claims = keep;
                entry.cached_targets = targets.into_iter().collect::<HashMap<_, _>>();
                entry.cached_samples.clear();
                entry.targets_resolved = true;
                entry.dirty = entry.driver.is_some();
                stale
            }
            None => Vec::new(),
        };
        for key in stale {
            self.modifiers.release(&key, id, props);
        }
        Ok(())
    }

    fn clip_is_relative(&self, clip: ClipId) -> bool {
        self.library
            .clip_root(clip)
            .and_then(|root| self.library.clip(root))
            .is_some_and(|root| root.is_relative())
    }

    fn claim(
        &mut self,
        id: EntryId,
        key: &ModifierKey,
        is_relative: bool,
        props: &dyn PropertyAccess,
    ) -> Result<(), Error> {
        self.modifiers.claim(key, id, is_relative, props)?;
        if let Some(entry) = self.entry_mut(id) {
            entry.add_claim(key);
        }
        Ok(())
    }

    /// Drops every claim of `id`. Attributes other entries still hold are recomposed from
    /// their last samples, falling back to the original value when none of them has
    /// composed yet.
    fn release_claims(&mut self, id: EntryId, props: &mut dyn PropertyAccess) {
        let claims = self
            .entry_mut(id)
            .map(|entry| std::mem::take(&mut entry.claims))
            .unwrap_or_default();
        for key in claims {
            if !self.modifiers.release(&key, id, props) {
                self.recompose(&key, props);
            }
        }
    }

    fn recompose(&mut self, key: &ModifierKey, props: &mut dyn PropertyAccess) {
        let Some(record) = self.modifiers.record(key) else {
            return;
        };
        let base = record.start_value;
        let mut group = record
            .claimants()
            .iter()
            .filter(|id| self.is_composing(**id))
            .filter_map(|id| self.entry(*id))
            .flat_map(|entry| entry.cached_samples.iter().filter(move |s| &s.target == key))
            .cloned()
            .collect::<Vec<_>>();
        let value = compose_animation_samples(base, &mut group).unwrap_or(base);
        log::trace!(
            "recomposed {}.{:?} on {:?} from {} remaining samples: {value}",
            key.property,
            key.attribute,
            key.object,
            group.len()
        );
        self.write_composed(key, value, props);
    }

    /// Whether the entry and every enclosing sequence entry still contribute samples.
    fn is_composing(&self, id: EntryId) -> bool {
        let Some(entry) = self.entry(id) else {
            return false;
        };
        if entry.state != EntryState::Playing || entry.suspended {
            return false;
        }
        let mut next = entry.owner;
        while let Some(owner) = next {
            match self.entry(owner) {
                Some(parent) if parent.state == EntryState::Playing => next = parent.owner,
                _ => return false,
            }
        }
        true
    }

    /// Weight and additive flag after folding in every enclosing sequence entry.
    fn effective_blend(&self, id: EntryId) -> (f32, bool) {
        let mut weight = 1.0;
        let mut additive = false;
        let mut next = Some(id);
        while let Some(current) = next {
            let Some(entry) = self.entry(current) else {
                break;
            };
            weight *= entry.weight;
            additive |= entry.is_relative();
            next = entry.owner;
        }
        (weight, additive)
    }

    fn advance_entry(
        &mut self,
        id: EntryId,
        delta: f32,
        pass: &mut UpdatePass,
        props: &dyn PropertyAccess,
    ) {
        let epsilon = self.config.time_epsilon;
        let Some(entry) = self.entry(id) else {
            return;
        };
        if entry.state != EntryState::Playing {
            return;
        }
        let duration = entry.item.duration(&self.library);
        let Some(entry) = self.entry_mut(id) else {
            return;
        };

        if let Some(driver) = entry.driver.clone() {
            if entry.dirty {
                match props.read(driver.object, &driver.property, driver.attribute) {
                    Ok(time) => entry.relative_time = time,
                    Err(err) => log::warn!("cannot read driver {}: {err}", driver.property),
                }
            }
        } else {
            entry.relative_time += delta * entry.time_scale;
            if !entry.looped && entry.relative_time + epsilon >= duration {
                entry.state = EntryState::Finishing;
                pass.finishing.push((id, true));
                return;
            }
        }

        if matches!(entry.item, AnimationItem::Sequence(_)) {
            self.advance_children(id, duration, pass);
        }
    }

    fn advance_children(&mut self, parent: EntryId, parent_duration: f32, pass: &mut UpdatePass) {
        let epsilon = self.config.time_epsilon;
        let Some(parent_entry) = self.entry(parent) else {
            return;
        };
        let local = parent_entry.local_time(parent_duration, epsilon);
        let repeats =
            parent_entry.looped || parent_entry.driver.is_some() || parent_entry.suspended;
        let children = parent_entry.children.clone();

        for child in children {
            let Some(child_entry) = self.entry(child) else {
                continue;
            };
            if child_entry.state != EntryState::Playing {
                continue;
            }
            let Some(member) = child_entry
                .member
                .and_then(|m| self.library.sequence_entry(m))
            else {
                continue;
            };
            let time = local - member.start_time;
            let end = member.local_end(&self.library);
            let child_duration = child_entry.item.duration(&self.library);
            let past_end = time + epsilon >= end;

            let Some(child_entry) = self.entry_mut(child) else {
                continue;
            };
            child_entry.relative_time = time;
            if past_end && !repeats {
                child_entry.state = EntryState::Finishing;
                pass.finishing.push((child, true));
                continue;
            }
            child_entry.suspended = time < 0.0 || past_end;

            if matches!(child_entry.item, AnimationItem::Sequence(_)) {
                self.advance_children(child, child_duration, pass);
            }
        }
    }

    fn sample_entry(
        &mut self,
        id: EntryId,
        pass: &mut UpdatePass,
        props: &mut dyn PropertyAccess,
    ) -> Result<(), Error> {
        let epsilon = self.config.time_epsilon;
        let Some(entry) = self.entry(id) else {
            return Ok(());
        };
        if entry.state != EntryState::Playing || entry.suspended {
            return Ok(());
        }
        if !entry.targets_resolved {
            let targets = self.resolve_targets(id, &*props, false)?;
            self.apply_targets(id, targets, props)?;
        }
        let Some(entry) = self.entry(id) else {
            return Ok(());
        };

        if matches!(entry.item, AnimationItem::Sequence(_)) {
            for child in entry.children.clone() {
                self.sample_entry(child, pass, props)?;
            }
            if let Some(entry) = self.entry_mut(id) {
                entry.dirty = false;
            }
            return Ok(());
        }

        if !entry.is_update_required() {
            pass.samples.extend(entry.cached_samples.iter().cloned());
            return Ok(());
        }

        let item = entry.item;
        let time = entry.local_time(item.duration(&self.library), epsilon);
        let mut raw = Vec::new();
        match item {
            AnimationItem::Animation(animation) => {
                if let Some(value) = self.library.animation(animation).and_then(|a| a.sample(time))
                {
                    let slot = TargetSlot {
                        clip: None,
                        animation,
                    };
                    raw.push((slot, value, time, false));
                }
            }
            AnimationItem::Clip(clip) => {
                let mut out = Vec::new();
                self.library.animate_clip(clip, time, &mut out);
                raw.extend(out.into_iter().map(|s| {
                    let slot = TargetSlot {
                        clip: Some(s.clip),
                        animation: s.animation,
                    };
                    (slot, s.value, s.time, s.is_relative)
                }));
            }
            AnimationItem::Sequence(_) => {}
        }

        let (weight, additive) = self.effective_blend(id);
        let Some(entry) = self.entry(id) else {
            return Ok(());
        };
        let mut samples = Vec::with_capacity(raw.len());
        for (slot, value, time, clip_relative) in raw {
            let Some(Some(target)) = entry.cached_targets.get(&slot) else {
                log::trace!("dropping sample of {:?}: target unresolved", slot.animation);
                continue;
            };
            samples.push(AnimationSample {
                value,
                entry: EntryHandle { id },
                animation: slot.animation,
                clip: slot.clip,
                relative_time: entry.relative_time,
                time,
                is_relative: clip_relative || additive,
                weight,
                priority: entry.priority,
                target: target.clone(),
                consumed: false,
                invalid_multi_sample: false,
            });
        }

        if let Some(entry) = self.entry_mut(id) {
            entry.cached_samples = samples.clone();
            entry.dirty = false;
        }
        pass.samples.extend(samples);
        Ok(())
    }

    fn compose(
        &mut self,
        pass: &mut UpdatePass,
        props: &mut dyn PropertyAccess,
    ) -> Result<(), Error> {
        let mut groups: BTreeMap<ModifierKey, Vec<AnimationSample>> = BTreeMap::new();
        let mut stale_entries = Vec::new();
        for mut sample in pass.samples.drain(..) {
            if let Some(root) = pass.root {
                if !props.is_within(sample.target.object, root) {
                    continue;
                }
            }
            if !props.is_alive(sample.target.object) {
                sample.invalid_multi_sample = true;
                if !stale_entries.contains(&sample.entry.id) {
                    stale_entries.push(sample.entry.id);
                }
            }
            groups.entry(sample.target.clone()).or_default().push(sample);
        }

        // Every record is claimed before anything is written, so running out of records
        // leaves the scene exactly as the previous frame left it.
        let mut skipped = Vec::new();
        'claims: for (key, group) in &groups {
            for sample in group.iter().filter(|s| !s.invalid_multi_sample) {
                if let Err(err) = self.claim(sample.entry.id, key, sample.is_relative, &*props) {
                    if !err.is_recoverable() {
                        return Err(err);
                    }
                    log::warn!("skipping {}.{:?}: {err}", key.property, key.attribute);
                    skipped.push(key.clone());
                    continue 'claims;
                }
            }
        }

        for (key, mut group) in groups {
            if skipped.contains(&key) {
                continue;
            }
            let Some(base) = self.modifiers.record(&key).map(|r| r.start_value) else {
                continue;
            };
            let Some(value) = compose_animation_samples(base, &mut group) else {
                continue;
            };
            log::trace!(
                "composed {}.{:?} on {:?} from {} samples: {value}",
                key.property,
                key.attribute,
                key.object,
                group.iter().filter(|s| s.consumed).count()
            );
            self.write_composed(&key, value, props);
        }

        for id in stale_entries {
            if let Some(entry) = self.entry_mut(id) {
                entry.reset_caches();
            }
        }
        Ok(())
    }

    /// Writes a composed value. Entries driven by the attribute are only marked dirty when
    /// the value actually moved.
    fn write_composed(&mut self, key: &ModifierKey, value: f32, props: &mut dyn PropertyAccess) {
        match props.write(key.object, &key.property, key.attribute, value) {
            Ok(()) => {
                let changed = self.modifiers.record(key).is_some_and(|r| r.value != value);
                self.modifiers.set_value(key, value);
                if changed {
                    self.mark_driven_dirty(key);
                }
            }
            Err(err) => {
                log::warn!(
                    "failed to write {}.{:?} on {:?}: {err}",
                    key.property,
                    key.attribute,
                    key.object
                );
            }
        }
    }

    fn mark_driven_dirty(&mut self, key: &ModifierKey) -> usize {
        let mut marked = 0;
        for entry in self.entries.iter_mut().filter_map(|slot| slot.entry.as_mut()) {
            if entry.driver.as_ref() == Some(key) && entry.state.is_live() {
                entry.dirty = true;
                marked += 1;
            }
        }
        marked
    }

    /// Playing/Finishing -> Dead. Children go first; claims are released (restoring values)
    /// before the entry's events are queued.
    fn finish_entry_internal(
        &mut self,
        id: EntryId,
        completed: bool,
        props: &mut dyn PropertyAccess,
    ) {
        let Some(entry) = self.entry_mut(id) else {
            return;
        };
        if entry.state == EntryState::Dead {
            return;
        }
        entry.state = EntryState::Finishing;
        let children = std::mem::take(&mut entry.children);
        let owner = entry.owner;
        for child in children {
            self.finish_entry_internal(child, completed, props);
        }

        self.release_claims(id, props);
        if let Some(entry) = self.entry_mut(id) {
            entry.reset_caches();
            entry.state = EntryState::Dead;
        }
        log::debug!("entry {id:?} finished (completed: {completed})");

        if completed {
            push_event(&mut self.event_queue, id, PlaybackEvent::Complete);
        }
        push_event(&mut self.event_queue, id, PlaybackEvent::End);
        push_event(&mut self.event_queue, id, PlaybackEvent::Dispose);
        self.detach_from_owner(id, owner);
    }

    /// Drops an entry that never started, without events.
    fn discard_entry(&mut self, id: EntryId, props: &mut dyn PropertyAccess) {
        let Some(entry) = self.entry_mut(id) else {
            return;
        };
        let children = std::mem::take(&mut entry.children);
        let owner = entry.owner;
        for child in children {
            self.discard_entry(child, props);
        }
        self.release_claims(id, props);
        self.detach_from_owner(id, owner);
        self.free_entry(id);
    }

    fn detach_from_owner(&mut self, id: EntryId, owner: Option<EntryId>) {
        match owner {
            Some(owner) => {
                if let Some(parent) = self.entry_mut(owner) {
                    parent.children.retain(|c| *c != id);
                }
            }
            None => self.top_level.retain(|e| *e != id),
        }
    }

    fn queue_start_events(&mut self, id: EntryId) {
        push_event(&mut self.event_queue, id, PlaybackEvent::Start);
        let children = self
            .entry(id)
            .map(|e| e.children.clone())
            .unwrap_or_default();
        for child in children {
            self.queue_start_events(child);
        }
    }

    fn refresh_library(&mut self, props: &mut dyn PropertyAccess) {
        log::debug!("library changed; refreshing {} entries", self.top_level.len());
        for id in self.top_level.clone() {
            self.refresh_entry(id, props);
        }
    }

    fn refresh_entry(&mut self, id: EntryId, props: &mut dyn PropertyAccess) {
        let Some(entry) = self.entry(id) else {
            return;
        };
        if !entry.state.is_live() {
            return;
        }
        let item = entry.item;
        if !self.library.contains_item(item) {
            log::warn!("{item:?} was removed from the library; finishing its entry");
            self.finish_entry_internal(id, false, props);
            return;
        }
        match item {
            AnimationItem::Sequence(sequence) => self.reconcile_children(id, sequence, props),
            _ => {
                if let Some(entry) = self.entry_mut(id) {
                    entry.reset_caches();
                }
            }
        }
    }

    /// Brings a sequence entry's children in line with the sequence's current members.
    fn reconcile_children(
        &mut self,
        id: EntryId,
        sequence: SequenceId,
        props: &mut dyn PropertyAccess,
    ) {
        let members = self.sequence_members(sequence);
        let children = self
            .entry(id)
            .map(|e| e.children.clone())
            .unwrap_or_default();

        for child in children {
            let Some(child_entry) = self.entry(child) else {
                continue;
            };
            let keep = child_entry
                .member
                .and_then(|m| members.iter().find(|member| member.id == m))
                .is_some_and(|member| member.item == child_entry.item);
            if keep {
                self.refresh_entry(child, props);
            } else {
                self.finish_entry_internal(child, false, props);
            }
        }

        for member in &members {
            let present = self.entry(id).is_some_and(|e| {
                e.children
                    .iter()
                    .any(|c| self.entry(*c).is_some_and(|c| c.member == Some(member.id)))
            });
            if present {
                continue;
            }
            match self.spawn_child(id, member, props) {
                Ok(child) => self.queue_start_events(child),
                Err(err) => log::warn!("cannot start sequence member {:?}: {err}", member.item),
            }
        }

        let order = |entries: &[EntrySlot], child: &EntryId| {
            let member = entries
                .get(child.index)
                .and_then(|slot| slot.entry.as_ref())
                .and_then(|e| e.member);
            members
                .iter()
                .position(|m| Some(m.id) == member)
                .unwrap_or(usize::MAX)
        };
        let mut children = self
            .entry(id)
            .map(|e| e.children.clone())
            .unwrap_or_default();
        children.sort_by_key(|c| order(&self.entries, c));
        if let Some(entry) = self.entry_mut(id) {
            entry.children = children;
        }
    }

    fn apply_command(&mut self, command: Command, props: &mut dyn PropertyAccess) {
        match command {
            Command::Start {
                item,
                context,
                options,
            } => {
                let options = options.unwrap_or_else(|| self.config.start_options());
                match self.start_root(item, context, options, None, props) {
                    Ok(id) => self.queue_start_events(id),
                    Err(err) => log::warn!("deferred start of {item:?} failed: {err}"),
                }
            }
            Command::Finish(handle) => {
                if self.is_live(handle) {
                    self.finish_entry_internal(handle.id, false, props);
                }
            }
            Command::FinishAll => {
                for id in self.top_level.clone() {
                    self.finish_entry_internal(id, false, props);
                }
            }
        }
    }

    fn drain_events(&mut self, props: &mut dyn PropertyAccess) {
        loop {
            while let Some(queued) = self.event_queue.pop_front() {
                let entry_id = queued.entry;
                let event = queued.event;
                let mut commands = Commands::default();

                if let Some(snapshot) = self.snapshot(entry_id) {
                    let mut entry_listener =
                        self.entry_mut(entry_id).and_then(|e| e.listener.take());
                    if let Some(listener) = entry_listener.as_mut() {
                        listener.on_event(&mut commands, &snapshot, &event);
                    }
                    if let Some(listener) = self.listener.as_mut() {
                        listener.on_event(&mut commands, &snapshot, &event);
                    }
                    if let Some(listener) = entry_listener {
                        if let Some(entry) = self.entry_mut(entry_id) {
                            entry.listener = Some(listener);
                        }
                    }
                }

                if matches!(event, PlaybackEvent::Dispose) {
                    self.free_entry(entry_id);
                }
                self.deferred.extend(commands.queue);
            }

            let Some(command) = self.deferred.pop_front() else {
                break;
            };
            self.apply_command(command, props);
        }
    }

    fn snapshot(&self, id: EntryId) -> Option<EntrySnapshot> {
        let entry = self.entry(id)?;
        Some(EntrySnapshot {
            handle: EntryHandle { id },
            item: entry.item,
            item_name: entry
                .item
                .name(&self.library)
                .unwrap_or("<removed>")
                .to_string(),
            relative_time: entry.relative_time,
            context_object: entry.context_object,
            owner: entry.owner.map(|id| EntryHandle { id }),
        })
    }

    fn alloc_entry(&mut self, entry: TimelineEntry) -> EntryId {
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.entries[index];
            slot.entry = Some(entry);
            EntryId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.entries.len();
            self.entries.push(EntrySlot {
                generation: 0,
                entry: Some(entry),
            });
            EntryId {
                index,
                generation: 0,
            }
        }
    }

    fn entry(&self, id: EntryId) -> Option<&TimelineEntry> {
        let slot = self.entries.get(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_ref()
    }

    fn entry_mut(&mut self, id: EntryId) -> Option<&mut TimelineEntry> {
        let slot = self.entries.get_mut(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_mut()
    }

    fn free_entry(&mut self, id: EntryId) {
        let Some(slot) = self.entries.get_mut(id.index) else {
            return;
        };
        if slot.generation != id.generation {
            return;
        }
        slot.entry = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(id.index);
    }
}

fn push_event(out: &mut VecDeque<QueuedEvent>, entry: EntryId, event: PlaybackEvent) {
    out.push_back(QueuedEvent { entry, event });
}
