//! Entry point: sample garbage for a window and write the text profile.

use crate::render::write_text_profile;
use crate::runtime::{BacktraceSymbolizer, MemRuntime, Symbolizer, TrackingRuntime};
use crate::sampler::{sample_garbage, SampledGarbage};
use log::warn;
use std::io::{self, Write};
use std::time::Duration;

/// Profile the current process and write a legacy text heap profile of its
/// garbage to `w`.
///
/// **Public** - main entry point of the library
///
/// Blocks for about twice `duration`: once to measure the cycle period and
/// once to sample. Profiles are empty unless `TrackingAllocator` is the
/// global allocator.
///
/// # Arguments
/// * `w` - Output sink; write errors are returned unmodified
/// * `duration` - Sampling window
/// * `debug` - Append symbolized frames to every call site
pub fn write_garbage_profile<W: Write + ?Sized>(
    w: &mut W,
    duration: Duration,
    debug: bool,
) -> io::Result<()> {
    let runtime = TrackingRuntime::global();
    if !runtime.is_hooked() {
        warn!("TrackingAllocator is not the global allocator; the profile will be empty");
    }
    write_garbage_profile_with(w, &runtime, &BacktraceSymbolizer::new(), duration, debug)?;
    Ok(())
}

/// Same as [`write_garbage_profile`] with explicit collaborators.
///
/// Returns the sampled run so callers can export it in other formats.
pub fn write_garbage_profile_with<W, R, S>(
    w: &mut W,
    runtime: &R,
    symbolizer: &S,
    duration: Duration,
    debug: bool,
) -> io::Result<SampledGarbage>
where
    W: Write + ?Sized,
    R: MemRuntime,
    S: Symbolizer + ?Sized,
{
    let sampled = sample_garbage(runtime, duration);
    write_text_profile(w, &sampled.table, runtime.sample_rate(), debug, symbolizer)?;
    w.flush()?;
    Ok(sampled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{AllocRecord, Frame, StackSignature};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Every force_gc and every num_gc read completes a cycle; the single
    /// site frees 100 bytes more per cycle than the last snapshot allocated.
    struct Churning {
        cycles: AtomicU32,
    }

    impl MemRuntime for Churning {
        fn num_gc(&self) -> u32 {
            self.cycles.fetch_add(1, Ordering::SeqCst) + 1
        }

        fn force_gc(&self) {
            self.cycles.fetch_add(1, Ordering::SeqCst);
        }

        fn mem_profile(&self, records: &mut [AllocRecord]) -> (usize, bool) {
            if records.is_empty() {
                return (1, false);
            }
            let n = i64::from(self.cycles.load(Ordering::SeqCst));
            let mut record = AllocRecord::new(StackSignature::from_frames(&[0x42]));
            record.alloc_objects = n + 1;
            record.alloc_bytes = (n + 1) * 100;
            record.free_objects = n;
            record.free_bytes = n * 100;
            records[0] = record;
            (1, true)
        }

        fn sample_rate(&self) -> u64 {
            8
        }
    }

    struct NoSymbols;

    impl Symbolizer for NoSymbols {
        fn symbolize(&self, pc: usize) -> Frame {
            Frame::unresolved(pc)
        }
    }

    #[test]
    fn test_write_with_fake_runtime() {
        let runtime = Churning {
            cycles: AtomicU32::new(0),
        };
        let mut out = Vec::new();
        let sampled = write_garbage_profile_with(
            &mut out,
            &runtime,
            &NoSymbols,
            Duration::from_millis(50),
            false,
        )
        .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("heap profile: "));
        assert!(text.lines().next().unwrap().ends_with("@ heap/16"));
        if sampled.stats.snapshots >= 2 {
            assert!(text.contains("@ 0x42"));
            assert!(sampled.table.totals().alloc_bytes > 0);
        }
    }
}
