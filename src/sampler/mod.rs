//! Sampling of the allocation profile on collection-cycle boundaries.
//!
//! This module handles:
//! - Copying the profile table despite concurrent growth
//! - Measuring the cycle period
//! - The cycle-synchronized sampling loop

pub mod calibrate;
pub mod cycle;
pub mod snapshot;

// Re-export main types and functions
pub use calibrate::{calc_period, GcPeriod};
pub use cycle::{sample_garbage, wait_gc, RunStats, SampledGarbage, Wake};
pub use snapshot::{read_snapshot, Snapshot};
