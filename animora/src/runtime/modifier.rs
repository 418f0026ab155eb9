use std::collections::HashMap;

use crate::runtime::entry::EntryId;
use crate::runtime::property::PropertyAccess;
use crate::{Error, ModifierKey};

/// Book-keeping for one animated property attribute.
#[derive(Clone, Debug, PartialEq)]
pub struct ModifierRecord {
    pub key: ModifierKey,
    /// Value read from the scene before any entry touched the attribute.
    pub start_value: f32,
    /// Last value the player wrote.
    pub value: f32,
    pub is_relative: bool,
    claimants: Vec<EntryId>,
}

impl ModifierRecord {
    pub fn claimant_count(&self) -> usize {
        self.claimants.len()
    }

    pub(crate) fn claimants(&self) -> &[EntryId] {
        &self.claimants
    }
}

#[derive(Debug, Default)]
pub(crate) struct ModifierStack {
    records: HashMap<ModifierKey, ModifierRecord>,
    capacity: Option<usize>,
}

impl ModifierStack {
    pub(crate) fn with_capacity_limit(capacity: Option<usize>) -> Self {
        Self {
            records: HashMap::new(),
            capacity,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn record(&self, key: &ModifierKey) -> Option<&ModifierRecord> {
        self.records.get(key)
    }

    /// Registers `entry` as a user of `key`, reading the original value on first use.
    pub(crate) fn claim(
        &mut self,
        key: &ModifierKey,
        entry: EntryId,
        is_relative: bool,
        props: &dyn PropertyAccess,
    ) -> Result<(), Error> {
        if let Some(record) = self.records.get_mut(key) {
            if !record.claimants.contains(&entry) {
                record.claimants.push(entry);
            }
            return Ok(());
        }

        if let Some(capacity) = self.capacity {
            if self.records.len() >= capacity {
                return Err(Error::ModifierStackExhausted { capacity });
            }
        }
        let start_value = props.read(key.object, &key.property, key.attribute)?;
        self.records
            .try_reserve(1)
            .map_err(|_| Error::ModifierStackExhausted {
                capacity: self.records.len(),
            })?;
        log::trace!(
            "claimed {}.{:?} on {:?} (start value {start_value})",
            key.property,
            key.attribute,
            key.object
        );
        self.records.insert(
            key.clone(),
            ModifierRecord {
                key: key.clone(),
                start_value,
                value: start_value,
                is_relative,
                claimants: vec![entry],
            },
        );
        Ok(())
    }

    /// Drops `entry`'s claim. The last claimant out writes the original value back.
    pub(crate) fn release(
        &mut self,
        key: &ModifierKey,
        entry: EntryId,
        props: &mut dyn PropertyAccess,
    ) -> bool {
        let Some(record) = self.records.get_mut(key) else {
            return false;
        };
        record.claimants.retain(|c| *c != entry);
        if !record.claimants.is_empty() {
            return false;
        }
        let Some(record) = self.records.remove(key) else {
            return false;
        };
        if let Err(err) = props.write(key.object, &key.property, key.attribute, record.start_value)
        {
            log::warn!(
                "failed to restore {}.{:?} on {:?}: {err}",
                key.property,
                key.attribute,
                key.object
            );
        }
        true
    }

    pub(crate) fn set_value(&mut self, key: &ModifierKey, value: f32) {
        if let Some(record) = self.records.get_mut(key) {
            record.value = value;
        }
    }
}
