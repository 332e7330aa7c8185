//! Measure the live collection-cycle period.
//!
//! The sampler polls for new cycles a few times per period. Measuring the
//! period instead of assuming one keeps the polling cadence in step with
//! whatever rhythm the collector actually has.

use crate::runtime::MemRuntime;
use crate::utils::config::MIN_GC_PERIOD;
use log::debug;
use std::thread;
use std::time::Duration;

/// Result of a calibration window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GcPeriod {
    /// Average time between two completed cycles
    pub period: Duration,

    /// Cycle counter at the end of the window
    pub num_gc: u32,
}

/// Block for `duration` and measure how long a collection cycle takes.
///
/// **Public** - first phase of every profile run
///
/// # Returns
/// `duration / cycles` and the cycle counter observed at the end.
/// Without any completed cycle the whole window counts as one period, and
/// the period never drops below `MIN_GC_PERIOD`.
pub fn calc_period<R: MemRuntime>(runtime: &R, duration: Duration) -> GcPeriod {
    let start_gc = runtime.num_gc();

    thread::sleep(duration);

    let num_gc = runtime.num_gc();
    let cycles = num_gc.wrapping_sub(start_gc);
    let period = period_for(duration, cycles);

    debug!(
        "Calibrated over {:?}: {} cycles, period {:?}",
        duration, cycles, period
    );

    GcPeriod { period, num_gc }
}

/// `duration / cycles`, treating zero cycles as one and clamped below
pub fn period_for(duration: Duration, cycles: u32) -> Duration {
    (duration / cycles.max(1)).max(MIN_GC_PERIOD)
}
