//! Cycle-synchronized sampling loop.
//!
//! A run goes through these phases:
//! 1. Force a full cycle so the window starts clean
//! 2. Calibrate the cycle period over the requested duration
//! 3. Poll the cycle counter at a tenth of the period until the deadline,
//!    taking a snapshot each time the counter moved
//! 4. Difference each snapshot against the previous one into the garbage table
//!
//! A run therefore takes about twice the requested duration.

use super::calibrate::calc_period;
use super::snapshot::{read_snapshot, Snapshot};
use crate::estimator::{accumulate, GarbageTable};
use crate::runtime::MemRuntime;
use crate::utils::config::TICKS_PER_PERIOD;
use crossbeam_channel::{after, select, tick, Receiver};
use log::{debug, info};
use std::time::{Duration, Instant};

/// What ended a wait for the next cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// The cycle counter moved to this value
    Cycle(u32),
    /// The sampling deadline fired
    Deadline,
}

/// Counters describing one finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub period: Duration,
    pub snapshots: usize,
    pub ticks: usize,
}

/// Output of a sampling run
#[derive(Debug, Clone, Default)]
pub struct SampledGarbage {
    pub table: GarbageTable,
    pub stats: RunStats,
}

/// Block on `ticks` until the cycle counter differs from `num_gc`, or until
/// `deadline` fires. Ticks on which no cycle completed are ignored.
pub fn wait_gc<R: MemRuntime>(
    runtime: &R,
    num_gc: u32,
    ticks: &Receiver<Instant>,
    deadline: &Receiver<Instant>,
    tick_count: &mut usize,
) -> Wake {
    loop {
        select! {
            recv(deadline) -> _ => return Wake::Deadline,
            recv(ticks) -> _ => {
                *tick_count += 1;
                let current = runtime.num_gc();
                if current != num_gc {
                    return Wake::Cycle(current);
                }
            }
        }
    }
}

/// Run the full profile window and return the accumulated garbage table.
///
/// **Public** - core of the profiler
///
/// # Arguments
/// * `runtime` - Source of cycles and profile snapshots
/// * `duration` - Calibration length and sampling length (each)
pub fn sample_garbage<R: MemRuntime>(runtime: &R, duration: Duration) -> SampledGarbage {
    info!("Sampling garbage for {:?} (plus {:?} calibration)", duration, duration);

    runtime.force_gc();

    let calibration = calc_period(runtime, duration);
    let mut num_gc = calibration.num_gc;
    let mut stats = RunStats {
        period: calibration.period,
        ..Default::default()
    };

    let mut table = GarbageTable::new();
    let mut prev: Option<Snapshot> = None;

    {
        // Both timers are dropped at the end of this scope, whichever way
        // the loop exits.
        let ticks = tick(calibration.period / TICKS_PER_PERIOD);
        let deadline = after(duration);

        while let Wake::Cycle(current) =
            wait_gc(runtime, num_gc, &ticks, &deadline, &mut stats.ticks)
        {
            num_gc = current;

            let curr = read_snapshot(runtime);
            stats.snapshots += 1;
            if let Some(prev) = prev.as_ref() {
                let matched = accumulate(&mut table, prev, &curr);
                debug!(
                    "Cycle {}: {} records, {} matched previous snapshot",
                    num_gc,
                    curr.len(),
                    matched
                );
            }
            prev = Some(curr);
        }
    }

    info!(
        "Sampling finished: {} snapshots over {} ticks, {} call sites",
        stats.snapshots,
        stats.ticks,
        table.len()
    );

    SampledGarbage { table, stats }
}
