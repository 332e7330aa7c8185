//! Garbage estimation from pairs of allocation snapshots.
//!
//! This module provides:
//! - The per-call-site estimate between two snapshots
//! - The garbage table accumulating estimates over a run

pub mod differ;
pub mod table;

// Re-export main types and functions
pub use differ::{accumulate, estimate_garbage};
pub use table::{GarbageEntry, GarbageTable, GarbageTotals};
