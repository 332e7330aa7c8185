//! Symbolized stack rendering for verbose profiles.
//!
//! Leading frames that belong to the allocator, the profiler or the standard
//! library are hidden so a trace starts at the code that asked for memory.
//! Thread bootstrap frames are hidden everywhere. If that leaves nothing
//! visible, the trace is rendered again with everything included.

use crate::runtime::{Frame, Symbolizer};
use crate::utils::config::{
    ALIGN_MIN_WIDTH, ALIGN_PADDING, ALIGN_TAB_WIDTH, BOOTSTRAP_FRAMES, RUNTIME_FRAME_PREFIXES,
};
use std::io::{self, Write};

/// Allocator, profiler or standard-library machinery
pub fn is_runtime_frame(function: &str) -> bool {
    if has_runtime_prefix(function) {
        return true;
    }
    // `<T as alloc::..::Trait>::method` belongs to the trait's crate
    function
        .strip_prefix('<')
        .and_then(|rest| rest.split_once(" as "))
        .map_or(false, |(_, tr)| has_runtime_prefix(tr))
}

fn has_runtime_prefix(name: &str) -> bool {
    RUNTIME_FRAME_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

/// Thread and process entry trampolines
pub fn is_bootstrap_frame(function: &str) -> bool {
    BOOTSTRAP_FRAMES.contains(&function)
}

/// Pick the frames to show.
///
/// The first pass skips leading runtime frames; an unresolved frame is always
/// kept and, like any application frame, turns on everything after it. A
/// second pass including runtime frames runs only when the first kept nothing.
pub fn visible_frames(frames: &[Frame]) -> Vec<&Frame> {
    for all_frames in [false, true] {
        let (kept, shown) = filter_pass(frames, all_frames);
        if shown {
            return kept;
        }
    }
    Vec::new()
}

fn filter_pass(frames: &[Frame], all_frames: bool) -> (Vec<&Frame>, bool) {
    let mut show = all_frames;
    let mut kept = Vec::new();
    for frame in frames {
        match frame.function.as_deref() {
            None => {
                show = true;
                kept.push(frame);
            }
            Some(name) if is_bootstrap_frame(name) => {}
            Some(name) if show || !is_runtime_frame(name) => {
                show = true;
                kept.push(frame);
            }
            Some(_) => {}
        }
    }
    (kept, show)
}

/// One frame line: `#\t<addr>\t<function>+<offset>\t<file>:<line>`,
/// or `#\t<addr>` when the address did not resolve.
pub fn frame_line(frame: &Frame) -> String {
    match frame.function.as_deref() {
        None => format!("#\t{:#x}", frame.pc),
        Some(name) => format!(
            "#\t{:#x}\t{}+{:#x}\t{}:{}",
            frame.pc,
            name,
            frame.offset(),
            frame.file.as_deref().unwrap_or("?"),
            frame.line.unwrap_or(0)
        ),
    }
}

/// Print the function and source line of every visible frame of `stack`,
/// columns aligned, then a blank line.
///
/// **Public** - used by the text renderer in debug mode
pub fn write_stack_record<W, S>(w: &mut W, stack: &[usize], symbolizer: &S) -> io::Result<()>
where
    W: Write + ?Sized,
    S: Symbolizer + ?Sized,
{
    let frames: Vec<Frame> = stack.iter().map(|&pc| symbolizer.symbolize(pc)).collect();
    let lines: Vec<String> = visible_frames(&frames).into_iter().map(frame_line).collect();
    write_aligned(w, &lines)?;
    writeln!(w)
}

/// Write tab-separated lines with their columns padded by tabs to
/// `ALIGN_TAB_WIDTH` stops.
///
/// A column lines up over adjacent lines that all have a cell in it. A cell
/// is tab-terminated, so the text after a line's last tab is never padded.
pub fn write_aligned<W: Write + ?Sized>(w: &mut W, lines: &[String]) -> io::Result<()> {
    let rows: Vec<Vec<&str>> = lines.iter().map(|line| line.split('\t').collect()).collect();
    let mut widths = Vec::new();
    align_rows(w, &rows, &mut widths)
}

fn align_rows<W: Write + ?Sized>(
    w: &mut W,
    rows: &[Vec<&str>],
    widths: &mut Vec<usize>,
) -> io::Result<()> {
    let column = widths.len();
    let mut start = 0;
    let mut i = 0;
    while i < rows.len() {
        if !has_cell(&rows[i], column) {
            i += 1;
            continue;
        }
        write_rows(w, &rows[start..i], widths)?;

        let end = i + rows[i..].iter().take_while(|row| has_cell(row, column)).count();
        let width = rows[i..end]
            .iter()
            .map(|row| cell_width(row[column]) + ALIGN_PADDING)
            .fold(ALIGN_MIN_WIDTH, usize::max);

        widths.push(width);
        align_rows(w, &rows[i..end], widths)?;
        widths.pop();

        start = end;
        i = end;
    }
    write_rows(w, &rows[start..], widths)
}

fn has_cell(row: &[&str], column: usize) -> bool {
    column + 1 < row.len()
}

fn cell_width(cell: &str) -> usize {
    cell.chars().count()
}

fn write_rows<W: Write + ?Sized>(w: &mut W, rows: &[Vec<&str>], widths: &[usize]) -> io::Result<()> {
    for row in rows {
        for (j, cell) in row.iter().enumerate() {
            w.write_all(cell.as_bytes())?;
            if let Some(&width) = widths.get(j) {
                write_tab_padding(w, cell_width(cell), width)?;
            }
        }
        writeln!(w)?;
    }
    Ok(())
}

// Round the column up to a tab stop, then cover the gap with whole tabs.
fn write_tab_padding<W: Write + ?Sized>(w: &mut W, text: usize, width: usize) -> io::Result<()> {
    let stop = width.div_ceil(ALIGN_TAB_WIDTH) * ALIGN_TAB_WIDTH;
    let tabs = stop.saturating_sub(text).div_ceil(ALIGN_TAB_WIDTH);
    for _ in 0..tabs {
        w.write_all(b"\t")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn named(pc: usize, name: &str) -> Frame {
        Frame {
            pc,
            function: Some(name.to_string()),
            entry: Some(pc - 0x10),
            file: Some("src/app.rs".to_string()),
            line: Some(pc as u32 % 100),
        }
    }

    struct MapSymbolizer(HashMap<usize, Frame>);

    impl Symbolizer for MapSymbolizer {
        fn symbolize(&self, pc: usize) -> Frame {
            self.0.get(&pc).cloned().unwrap_or_else(|| Frame::unresolved(pc))
        }
    }

    fn names(frames: &[&Frame]) -> Vec<String> {
        frames
            .iter()
            .map(|f| f.function.clone().unwrap_or_else(|| format!("{:#x}", f.pc)))
            .collect()
    }

    #[test]
    fn test_leading_runtime_frames_hidden() {
        let frames = vec![
            named(0x110, "alloc::raw_vec::RawVec<T>::allocate_in"),
            named(0x120, "pprof_garbage::runtime::tracking::Tracker::on_alloc"),
            named(0x130, "app::handler::build_body"),
            named(0x140, "std::thread::local::LocalKey<T>::with"),
            named(0x150, "app::main"),
        ];
        let visible = visible_frames(&frames);
        assert_eq!(
            names(&visible),
            vec![
                "app::handler::build_body",
                "std::thread::local::LocalKey<T>::with",
                "app::main"
            ]
        );
    }

    #[test]
    fn test_runtime_trait_impls_are_runtime_frames() {
        assert!(is_runtime_frame(
            "<u8 as alloc::vec::spec_from_elem::SpecFromElem>::from_elem"
        ));
        assert!(is_runtime_frame("alloc::raw_vec::finish_grow"));
        assert!(!is_runtime_frame("<app::Buffer as app::Fill>::fill"));
        assert!(!is_runtime_frame("app::churn"));
    }

    #[test]
    fn test_allocator_shims_hidden() {
        assert!(is_runtime_frame("__rustc::__rust_alloc"));
        assert!(is_runtime_frame("__rustc::__rdl_alloc"));

        let frames = vec![
            named(0x110, "__rustc::__rust_alloc"),
            named(0x120, "alloc::alloc::alloc"),
            named(0x130, "app::churn"),
        ];
        assert_eq!(names(&visible_frames(&frames)), vec!["app::churn"]);
    }

    #[test]
    fn test_bootstrap_frames_always_hidden() {
        let frames = vec![
            named(0x130, "app::worker"),
            named(0x140, "start_thread"),
            named(0x150, "clone3"),
        ];
        assert_eq!(names(&visible_frames(&frames)), vec!["app::worker"]);
    }

    #[test]
    fn test_unresolved_frame_forces_visibility() {
        let frames = vec![
            named(0x110, "alloc::alloc::alloc"),
            Frame::unresolved(0x999),
            named(0x120, "core::ops::function::FnOnce::call_once"),
        ];
        assert_eq!(
            names(&visible_frames(&frames)),
            vec!["0x999", "core::ops::function::FnOnce::call_once"]
        );
    }

    #[test]
    fn test_all_runtime_stack_falls_back_to_full_trace() {
        let frames = vec![
            named(0x110, "alloc::alloc::alloc"),
            named(0x120, "std::rt::lang_start_internal"),
            named(0x130, "__libc_start_main"),
        ];
        assert_eq!(
            names(&visible_frames(&frames)),
            vec!["alloc::alloc::alloc", "std::rt::lang_start_internal"]
        );
    }

    #[test]
    fn test_write_stack_record_format() {
        let symbolizer = MapSymbolizer(
            [(0x1234, named(0x1234, "app::churn"))].into_iter().collect(),
        );
        let mut out = Vec::new();
        write_stack_record(&mut out, &[0x1234, 0xbeef], &symbolizer).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "#\t0x1234\tapp::churn+0x10\tsrc/app.rs:60\n#\t0xbeef\n\n"
        );
    }

    fn aligned(stack: &[usize]) -> String {
        let symbolizer = MapSymbolizer(
            [
                (0x1234, named(0x1234, "app::a")),
                (0x2345, named(0x2345, "app::long_function_name")),
            ]
            .into_iter()
            .collect(),
        );
        let mut out = Vec::new();
        write_stack_record(&mut out, stack, &symbolizer).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_frame_columns_aligned_to_tab_stops() {
        assert_eq!(
            aligned(&[0x1234, 0x2345]),
            "#\t0x1234\tapp::a+0x10\t\t\tsrc/app.rs:60\n\
             #\t0x2345\tapp::long_function_name+0x10\tsrc/app.rs:29\n\
             \n"
        );
    }

    #[test]
    fn test_unresolved_frame_splits_column_block() {
        assert_eq!(
            aligned(&[0x2345, 0xbeef, 0x1234]),
            "#\t0x2345\tapp::long_function_name+0x10\tsrc/app.rs:29\n\
             #\t0xbeef\n\
             #\t0x1234\tapp::a+0x10\tsrc/app.rs:60\n\
             \n"
        );
    }
}
