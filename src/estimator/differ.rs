//! Garbage estimate between two consecutive snapshots.
//!
//! For a call site present in both snapshots, the free counter now bounds
//! what can have been freed, and the alloc counter at the previous snapshot
//! bounds what existed to be freed. The smaller of the two is a conservative
//! estimate of the site's transient allocation.

use super::table::GarbageTable;
use crate::runtime::{AllocRecord, StackSignature};
use std::collections::HashMap;

/// `min(freed now, allocated before)`
pub fn estimate_garbage(prev: &AllocRecord, curr: &AllocRecord) -> (i64, i64) {
    let objects = curr.free_objects.min(prev.alloc_objects);
    let bytes = curr.free_bytes.min(prev.alloc_bytes);
    (objects, bytes)
}

/// Merge the estimate for every call site of `curr` that also appears in
/// `prev` into `table`.
///
/// **Public** - called once per sampled cycle
///
/// Sites new in `curr` are skipped for this interval; sites only in `prev`
/// are never visited.
///
/// # Returns
/// Number of call sites that matched
pub fn accumulate(table: &mut GarbageTable, prev: &[AllocRecord], curr: &[AllocRecord]) -> usize {
    let by_stack: HashMap<&StackSignature, &AllocRecord> =
        prev.iter().map(|r| (&r.stack, r)).collect();

    let mut matched = 0;
    for c in curr {
        let Some(p) = by_stack.get(&c.stack) else {
            continue;
        };
        let (objects, bytes) = estimate_garbage(p, c);
        table.add(c.stack, objects, bytes);
        matched += 1;
    }
    matched
}
