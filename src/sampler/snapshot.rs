//! Point-in-time copies of the allocation-profile table.

use crate::runtime::{AllocRecord, MemRuntime};
use crate::utils::config::SNAPSHOT_HEADROOM;
use log::debug;
use std::ops::Deref;

/// Immutable copy of the profile table taken at one instant
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    records: Vec<AllocRecord>,
}

impl Snapshot {
    pub fn from_records(records: Vec<AllocRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[AllocRecord] {
        &self.records
    }
}

impl Deref for Snapshot {
    type Target = [AllocRecord];

    fn deref(&self) -> &[AllocRecord] {
        &self.records
    }
}

/// Copy the runtime's profile table.
///
/// **Public** - the only way the sampler reads the table
///
/// The table can grow between asking for its size and copying it, so room
/// for `SNAPSHOT_HEADROOM` extra records is allocated and the copy is retried
/// until it fits. The loop normally runs once.
pub fn read_snapshot<R: MemRuntime>(runtime: &R) -> Snapshot {
    let (mut n, _) = runtime.mem_profile(&mut []);
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        let mut records = vec![AllocRecord::default(); n + SNAPSHOT_HEADROOM];
        let (count, ok) = runtime.mem_profile(&mut records);
        if ok {
            records.truncate(count);
            if attempts > 1 {
                debug!("Profile table grew during copy, took {} attempts", attempts);
            }
            return Snapshot::from_records(records);
        }
        // Table grew past the headroom; ask again.
        n = count;
    }
}
