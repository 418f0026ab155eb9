use crate::{
    AnimationItem, AnimationLibrary, Error, SequenceEntry, SequenceEntryId, SequenceId,
    TimelineSequence, WeightBlendMode,
};

impl AnimationLibrary {
    pub fn create_sequence(&mut self, name: impl Into<String>) -> SequenceId {
        self.sequences.insert(TimelineSequence {
            name: name.into(),
            entries: Vec::new(),
        })
    }

    /// Appends `item` to the sequence. Members are not re-sorted; call
    /// [`Self::sort_animations`] once a batch of edits is done.
    pub fn add_entry(
        &mut self,
        sequence: SequenceId,
        item: AnimationItem,
        start_time: f32,
    ) -> Result<SequenceEntryId, Error> {
        if !self.sequences.contains_key(sequence) {
            return Err(Error::not_found("sequence"));
        }
        if !start_time.is_finite() {
            return Err(Error::invalid_value("sequence entry start time must be finite"));
        }
        match item {
            AnimationItem::Animation(id) => {
                if !self.animations.contains_key(id) {
                    return Err(Error::not_found("animation"));
                }
            }
            AnimationItem::Clip(id) => {
                let clip = self.clip(id).ok_or_else(|| Error::not_found("clip"))?;
                if !clip.is_root() {
                    return Err(Error::IncompatibleItem {
                        message: format!("child clip '{}' cannot join a sequence", clip.name),
                    });
                }
            }
            AnimationItem::Sequence(id) => {
                if !self.sequences.contains_key(id) {
                    return Err(Error::not_found("nested sequence"));
                }
                if id == sequence || self.sequence_contains(id, sequence) {
                    return Err(Error::invalid_value(
                        "adding this sequence would make it contain itself",
                    ));
                }
            }
        }

        let id = self.memberships.insert(sequence);
        if let Some(seq) = self.sequences.get_mut(sequence) {
            seq.entries.push(SequenceEntry {
                id,
                item,
                start_time,
                stop_time: None,
                weight: 1.0,
                blend_mode: WeightBlendMode::Override,
                target_path: None,
            });
        }
        Ok(id)
    }

    pub fn remove_entry(
        &mut self,
        sequence: SequenceId,
        entry: SequenceEntryId,
    ) -> Result<SequenceEntry, Error> {
        let seq = self
            .sequences
            .get_mut(sequence)
            .ok_or_else(|| Error::not_found("sequence"))?;
        let Some(index) = seq.entries.iter().position(|e| e.id == entry) else {
            return Err(Error::not_found(format!(
                "entry is not a member of sequence '{}'",
                seq.name
            )));
        };
        let removed = seq.entries.remove(index);
        self.memberships.remove(entry);
        Ok(removed)
    }

    /// Stable sort by start time.
    pub fn sort_animations(&mut self, sequence: SequenceId) -> Result<(), Error> {
        let seq = self
            .sequences
            .get_mut(sequence)
            .ok_or_else(|| Error::not_found("sequence"))?;
        seq.entries.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        Ok(())
    }

    pub fn set_entry_start_time(
        &mut self,
        entry: SequenceEntryId,
        start_time: f32,
    ) -> Result<(), Error> {
        if !start_time.is_finite() {
            return Err(Error::invalid_value("sequence entry start time must be finite"));
        }
        self.entry_mut(entry)?.start_time = start_time;
        Ok(())
    }

    pub fn set_entry_stop_time(
        &mut self,
        entry: SequenceEntryId,
        stop_time: Option<f32>,
    ) -> Result<(), Error> {
        if stop_time.is_some_and(|t| t.is_nan() || t < 0.0) {
            return Err(Error::invalid_value("sequence entry stop time must be >= 0"));
        }
        self.entry_mut(entry)?.stop_time = stop_time;
        Ok(())
    }

    pub fn set_entry_weight(&mut self, entry: SequenceEntryId, weight: f32) -> Result<(), Error> {
        if !weight.is_finite() {
            return Err(Error::invalid_value("sequence entry weight must be finite"));
        }
        self.entry_mut(entry)?.weight = weight;
        Ok(())
    }

    pub fn set_entry_blend_mode(
        &mut self,
        entry: SequenceEntryId,
        blend_mode: WeightBlendMode,
    ) -> Result<(), Error> {
        self.entry_mut(entry)?.blend_mode = blend_mode;
        Ok(())
    }

    pub fn set_entry_target_path(
        &mut self,
        entry: SequenceEntryId,
        path: Option<String>,
    ) -> Result<(), Error> {
        self.entry_mut(entry)?.target_path = path;
        Ok(())
    }

    pub fn sequence_entry(&self, entry: SequenceEntryId) -> Option<&SequenceEntry> {
        let sequence = *self.memberships.get(entry)?;
        self.sequence(sequence)?.entry(entry)
    }

    /// Members whose `[start, start + local_end)` span contains `time`. Meant for scrubbing and
    /// preview, not playback.
    pub fn active_entry_count(&self, sequence: SequenceId, time: f32) -> usize {
        let Some(seq) = self.sequence(sequence) else {
            return 0;
        };
        seq.entries
            .iter()
            .filter(|e| time >= e.start_time && time < e.start_time + e.local_end(self))
            .count()
    }

    pub fn sequence_duration(&self, sequence: SequenceId) -> f32 {
        let Some(seq) = self.sequence(sequence) else {
            return 0.0;
        };
        seq.entries
            .iter()
            .map(|e| e.start_time + e.local_end(self))
            .fold(0.0, f32::max)
    }

    /// Whether `outer` reaches `inner` through nested members.
    pub fn sequence_contains(&self, outer: SequenceId, inner: SequenceId) -> bool {
        let Some(seq) = self.sequence(outer) else {
            return false;
        };
        seq.entries.iter().any(|e| match e.item {
            AnimationItem::Sequence(nested) => {
                nested == inner || self.sequence_contains(nested, inner)
            }
            _ => false,
        })
    }

    fn entry_mut(&mut self, entry: SequenceEntryId) -> Result<&mut SequenceEntry, Error> {
        let sequence = *self
            .memberships
            .get(entry)
            .ok_or_else(|| Error::not_found("sequence entry"))?;
        self.sequences
            .get_mut(sequence)
            .and_then(|s| s.entries.iter_mut().find(|e| e.id == entry))
            .ok_or_else(|| Error::not_found("sequence entry"))
    }
}
