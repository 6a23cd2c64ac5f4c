//! Device record store - in-memory map of per-space state
//!
//! Single source of truth for partial aggregation state. Owned by the
//! bridge event loop; constructed explicitly so tests can build isolated
//! instances. Records are created lazily on the first fragment for an
//! unseen id and live for the process lifetime.

use crate::domain::record::SpaceRecord;
use crate::domain::types::SpaceId;
use rustc_hash::FxHashMap;

#[derive(Debug, Default)]
pub struct RecordStore {
    records: FxHashMap<SpaceId, SpaceRecord>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self { records: FxHashMap::default() }
    }

    /// Get the record for `id`, creating it on first sight
    pub fn entry(&mut self, id: &SpaceId) -> &mut SpaceRecord {
        self.records
            .entry(id.clone())
            .or_insert_with(|| SpaceRecord::new(id.clone()))
    }

    pub fn get(&self, id: &SpaceId) -> Option<&SpaceRecord> {
        self.records.get(id)
    }

    pub fn get_mut(&mut self, id: &SpaceId) -> Option<&mut SpaceRecord> {
        self.records.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
