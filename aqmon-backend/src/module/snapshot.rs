//! In-memory accumulator for the current dataset.
//!
//! Deliberately holds no filtering logic: ingestion appends here and the
//! projector reads from here, nothing else.

use aqmon_common::StationRecord;
use std::collections::BTreeSet;

#[derive(Debug, Default)]
pub struct SnapshotStore {
    records: Vec<StationRecord>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Append one page worth of records, preserving feed order.
    pub fn append(&mut self, records: Vec<StationRecord>) {
        self.records.extend(records);
    }

    /// Read-only view of the snapshot.
    pub fn all(&self) -> &[StationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn find(&self, id: &str) -> Option<&StationRecord> {
        self.records.iter().find(|r| r.id == id)
    }
}

/// Distinct, sorted region labels for the region selector, without the
/// unknown sentinel.
pub fn region_options(snapshot: &[StationRecord]) -> Vec<String> {
    snapshot
        .iter()
        .filter(|r| r.has_known_region())
        .map(|r| r.region.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
