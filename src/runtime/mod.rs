//! Collaborators consumed by the profiling core.
//!
//! The core never talks to the allocator directly. It reads:
//! - the number of completed collection cycles
//! - a way to force a cycle right now
//! - a copy of the allocation-profile table, with a "did it fit" signal
//! - a symbolizer for rendering verbose stacks
//!
//! `tracking` provides the process-wide implementation backed by a
//! sampling global allocator; tests substitute fakes.

pub mod record;
pub mod symbolize;
pub mod tracking;

pub use record::{AllocRecord, StackSignature};
pub use symbolize::{BacktraceSymbolizer, Frame};
pub use tracking::{TrackerConfig, TrackingAllocator, TrackingRuntime};

/// Source of collection cycles and allocation-profile data
pub trait MemRuntime {
    /// Number of collection cycles completed so far
    fn num_gc(&self) -> u32;

    /// Run a full collection cycle before returning
    fn force_gc(&self);

    /// Copy the profile table into `records`.
    ///
    /// Returns the number of records in the table and whether they fit. When
    /// they did not fit, `records` holds nothing meaningful and the caller
    /// retries with room for at least the returned count.
    fn mem_profile(&self, records: &mut [AllocRecord]) -> (usize, bool);

    /// Average bytes between sampled allocations
    fn sample_rate(&self) -> u64;
}

/// Maps a raw return address to function, entry offset, file and line
pub trait Symbolizer {
    fn symbolize(&self, pc: usize) -> Frame;
}

impl<T: MemRuntime + ?Sized> MemRuntime for &T {
    fn num_gc(&self) -> u32 {
        (**self).num_gc()
    }

    fn force_gc(&self) {
        (**self).force_gc()
    }

    fn mem_profile(&self, records: &mut [AllocRecord]) -> (usize, bool) {
        (**self).mem_profile(records)
    }

    fn sample_rate(&self) -> u64 {
        (**self).sample_rate()
    }
}

impl<T: Symbolizer + ?Sized> Symbolizer for &T {
    fn symbolize(&self, pc: usize) -> Frame {
        (**self).symbolize(pc)
    }
}
