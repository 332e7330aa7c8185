//! Accumulated garbage per call site.

use crate::runtime::StackSignature;
use std::collections::HashMap;

/// Estimated garbage attributed to one call site over a whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GarbageEntry {
    pub stack: StackSignature,
    pub alloc_objects: i64,
    pub alloc_bytes: i64,
}

impl GarbageEntry {
    pub fn new(stack: StackSignature) -> Self {
        Self {
            stack,
            alloc_objects: 0,
            alloc_bytes: 0,
        }
    }

    // Garbage is never freed from the profile's point of view, so every
    // accumulated byte is reported as both allocated and in use.
    pub fn in_use_objects(&self) -> i64 {
        self.alloc_objects
    }

    pub fn in_use_bytes(&self) -> i64 {
        self.alloc_bytes
    }
}

/// Sum over every entry of a table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GarbageTotals {
    pub alloc_objects: i64,
    pub alloc_bytes: i64,
}

/// One entry per distinct stack signature, in first-seen order.
///
/// Entries only grow for the lifetime of the table.
#[derive(Debug, Clone, Default)]
pub struct GarbageTable {
    entries: Vec<GarbageEntry>,
    index: HashMap<StackSignature, usize>,
}

impl GarbageTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an estimate to the entry for `stack`, creating it on first sight.
    /// Negative estimates are ignored so entries never shrink.
    pub fn add(&mut self, stack: StackSignature, objects: i64, bytes: i64) {
        let i = match self.index.get(&stack) {
            Some(&i) => i,
            None => {
                self.entries.push(GarbageEntry::new(stack));
                self.index.insert(stack, self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        let entry = &mut self.entries[i];
        entry.alloc_objects += objects.max(0);
        entry.alloc_bytes += bytes.max(0);
    }

    pub fn get(&self, stack: &StackSignature) -> Option<&GarbageEntry> {
        self.index.get(stack).map(|&i| &self.entries[i])
    }

    pub fn entries(&self) -> &[GarbageEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &GarbageEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn totals(&self) -> GarbageTotals {
        self.entries
            .iter()
            .fold(GarbageTotals::default(), |mut total, entry| {
                total.alloc_objects += entry.alloc_objects;
                total.alloc_bytes += entry.alloc_bytes;
                total
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(pc: usize) -> StackSignature {
        StackSignature::from_frames(&[pc])
    }

    #[test]
    fn test_add_keeps_one_entry_per_stack() {
        let mut table = GarbageTable::new();
        table.add(sig(1), 1, 100);
        table.add(sig(2), 2, 200);
        table.add(sig(1), 3, 300);

        assert_eq!(table.len(), 2);
        assert_eq!(table.get(&sig(1)).unwrap().alloc_bytes, 400);
        assert_eq!(table.get(&sig(1)).unwrap().alloc_objects, 4);
        assert_eq!(table.entries()[0].stack, sig(1));
        assert_eq!(table.entries()[1].stack, sig(2));
    }

    #[test]
    fn test_entries_never_shrink() {
        let mut table = GarbageTable::new();
        table.add(sig(1), 5, 500);
        table.add(sig(1), -3, -300);

        let entry = table.get(&sig(1)).unwrap();
        assert_eq!(entry.alloc_objects, 5);
        assert_eq!(entry.alloc_bytes, 500);
    }

    #[test]
    fn test_totals() {
        let mut table = GarbageTable::new();
        table.add(sig(1), 1, 10);
        table.add(sig(2), 2, 20);
        table.add(sig(3), 0, 0);

        assert_eq!(
            table.totals(),
            GarbageTotals {
                alloc_objects: 3,
                alloc_bytes: 30
            }
        );
    }
}
