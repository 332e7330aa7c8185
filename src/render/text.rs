//! Legacy text heap-profile writer.
//!
//! Format:
//! ```text
//! heap profile: 3: 3072 [3: 3072] @ heap/1048576
//! 2: 2048 [2: 2048] @ 0x55d0c1 0x55d0f3
//! 1: 1024 [1: 1024] @ 0x55d2a0 0x55d0f3
//! ```
//! In debug mode every sample line is followed by its symbolized frames and a
//! blank line.

use super::frames::write_stack_record;
use crate::estimator::{GarbageEntry, GarbageTable};
use crate::runtime::Symbolizer;
use std::io::{self, Write};

/// Rate reported in the header. Covers both halves of the run
/// (calibration and sampling), hence twice the sampling rate.
pub fn reported_rate(sample_rate: u64) -> u64 {
    2 * sample_rate
}

/// Write the garbage table as a legacy text heap profile.
///
/// **Public** - main entry point for text output
///
/// # Arguments
/// * `w` - Output sink; write errors are returned as-is
/// * `table` - Accumulated garbage
/// * `sample_rate` - Sampling rate of the allocation profile
/// * `debug` - Also print symbolized frames
/// * `symbolizer` - Used only when `debug` is set
pub fn write_text_profile<W, S>(
    w: &mut W,
    table: &GarbageTable,
    sample_rate: u64,
    debug: bool,
    symbolizer: &S,
) -> io::Result<()>
where
    W: Write + ?Sized,
    S: Symbolizer + ?Sized,
{
    let total = table.totals();
    writeln!(
        w,
        "heap profile: {}: {} [{}: {}] @ heap/{}",
        total.alloc_objects,
        total.alloc_bytes,
        total.alloc_objects,
        total.alloc_bytes,
        reported_rate(sample_rate)
    )?;

    for entry in table.iter() {
        write_sample_line(w, entry)?;
        if debug {
            write_stack_record(w, entry.stack.frames(), symbolizer)?;
        }
    }
    Ok(())
}

fn write_sample_line<W: Write + ?Sized>(w: &mut W, entry: &GarbageEntry) -> io::Result<()> {
    write!(
        w,
        "{}: {} [{}: {}] @",
        entry.in_use_objects(),
        entry.in_use_bytes(),
        entry.alloc_objects,
        entry.alloc_bytes
    )?;
    for pc in entry.stack.frames() {
        write!(w, " {:#x}", pc)?;
    }
    writeln!(w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{Frame, StackSignature};
    use pretty_assertions::assert_eq;

    struct NoSymbols;

    impl Symbolizer for NoSymbols {
        fn symbolize(&self, pc: usize) -> Frame {
            Frame::unresolved(pc)
        }
    }

    fn table() -> GarbageTable {
        let mut table = GarbageTable::new();
        table.add(StackSignature::from_frames(&[0x4a10, 0x4b20]), 2, 2048);
        table.add(StackSignature::from_frames(&[0x4c30]), 1, 1024);
        table
    }

    fn render(table: &GarbageTable, debug: bool) -> String {
        let mut out = Vec::new();
        write_text_profile(&mut out, table, 512 * 1024, debug, &NoSymbols).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_header_and_samples() {
        assert_eq!(
            render(&table(), false),
            "heap profile: 3: 3072 [3: 3072] @ heap/1048576\n\
             2: 2048 [2: 2048] @ 0x4a10 0x4b20\n\
             1: 1024 [1: 1024] @ 0x4c30\n"
        );
    }

    #[test]
    fn test_empty_table_renders_header_only() {
        assert_eq!(
            render(&GarbageTable::new(), false),
            "heap profile: 0: 0 [0: 0] @ heap/1048576\n"
        );
    }

    #[test]
    fn test_debug_appends_frames() {
        assert_eq!(
            render(&table(), true),
            "heap profile: 3: 3072 [3: 3072] @ heap/1048576\n\
             2: 2048 [2: 2048] @ 0x4a10 0x4b20\n\
             #\t0x4a10\n\
             #\t0x4b20\n\
             \n\
             1: 1024 [1: 1024] @ 0x4c30\n\
             #\t0x4c30\n\
             \n"
        );
    }

    struct FailingSink;

    impl Write for FailingSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "client went away"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_sink_errors_are_propagated() {
        let err = write_text_profile(&mut FailingSink, &table(), 1, false, &NoSymbols).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
