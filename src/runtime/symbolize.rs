//! Address symbolization for verbose profiles.
//!
//! Symbolization is display-only: call sites are identified by raw
//! addresses, names are looked up when a profile is rendered.

use super::Symbolizer;
use backtrace::SymbolName;
use dashmap::DashMap;
use log::debug;
use std::ffi::c_void;

/// A resolved (or unresolved) stack frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    /// Return address as recorded in the stack signature
    pub pc: usize,

    /// Demangled function name, without the trailing symbol hash
    pub function: Option<String>,

    /// Address of the function's first instruction
    pub entry: Option<usize>,

    pub file: Option<String>,
    pub line: Option<u32>,
}

impl Frame {
    /// A frame nothing is known about
    pub fn unresolved(pc: usize) -> Self {
        Self {
            pc,
            ..Default::default()
        }
    }

    /// Distance from the function entry, zero when the entry is unknown
    pub fn offset(&self) -> usize {
        self.entry.map(|e| self.pc.saturating_sub(e)).unwrap_or(0)
    }
}

/// Symbolizer backed by the `backtrace` crate's debug-info reader.
///
/// Lookups are cached per address; a profile typically repeats the same
/// frames across many call sites.
#[derive(Default)]
pub struct BacktraceSymbolizer {
    cache: DashMap<usize, Frame>,
}

impl BacktraceSymbolizer {
    pub fn new() -> Self {
        Self::default()
    }

    fn resolve(pc: usize) -> Frame {
        let mut frame = Frame::unresolved(pc);
        let mut found = false;

        // Return addresses point past the call instruction; look up the
        // call itself so the line number is the caller's.
        let lookup = pc.saturating_sub(1);
        backtrace::resolve(lookup as *mut c_void, |symbol| {
            if found {
                return;
            }
            found = true;
            frame.function = symbol.name().map(|name| display_name(&name));
            frame.file = symbol.filename().map(|p| p.display().to_string());
            frame.line = symbol.lineno();
        });

        if frame.function.is_none() {
            debug!("No symbol for address {:#x}", pc);
        }
        // `Symbol::addr` is the lookup address in the object file's own
        // address space, so the entry comes from the unwinder instead.
        frame.entry = enclosing_function(lookup).filter(|&entry| entry <= lookup);
        frame
    }
}

/// Runtime address of the first instruction of the function containing `pc`,
/// taken from its unwind-table entry.
#[cfg(all(unix, not(target_os = "emscripten")))]
fn enclosing_function(pc: usize) -> Option<usize> {
    extern "C" {
        fn _Unwind_FindEnclosingFunction(pc: *mut c_void) -> *mut c_void;
    }

    // SAFETY: a read-only lookup in the loaded modules' unwind tables; an
    // address outside every table yields null.
    let entry = unsafe { _Unwind_FindEnclosingFunction(pc as *mut c_void) };
    (!entry.is_null()).then_some(entry as usize)
}

#[cfg(not(all(unix, not(target_os = "emscripten"))))]
fn enclosing_function(_pc: usize) -> Option<usize> {
    None
}

impl Symbolizer for BacktraceSymbolizer {
    fn symbolize(&self, pc: usize) -> Frame {
        if let Some(hit) = self.cache.get(&pc) {
            return hit.clone();
        }
        let frame = Self::resolve(pc);
        self.cache.insert(pc, frame.clone());
        frame
    }
}

// `{:#}` drops the `::h0123...` hash suffix of legacy-mangled names
fn display_name(name: &SymbolName<'_>) -> String {
    format!("{:#}", name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_offset() {
        let frame = Frame {
            pc: 0x1040,
            entry: Some(0x1000),
            ..Frame::unresolved(0x1040)
        };
        assert_eq!(frame.offset(), 0x40);
        assert_eq!(Frame::unresolved(0x1040).offset(), 0);
    }

    #[inline(never)]
    fn capture_here() -> usize {
        let mut pc = 0;
        backtrace::trace(|frame| {
            pc = frame.ip() as usize;
            false
        });
        pc
    }

    #[test]
    fn test_symbolize_caches_lookups() {
        let symbolizer = BacktraceSymbolizer::new();
        let pc = capture_here();
        let first = symbolizer.symbolize(pc);
        let second = symbolizer.symbolize(pc);
        assert_eq!(first, second);
        assert_eq!(first.pc, pc);
        assert_eq!(symbolizer.cache.len(), 1);
    }

    #[cfg(all(unix, not(target_os = "emscripten")))]
    #[test]
    fn test_entry_is_a_runtime_address() {
        let symbolizer = BacktraceSymbolizer::new();
        let pc = capture_here();
        let frame = symbolizer.symbolize(pc);

        let entry = frame.entry.unwrap();
        assert!(entry <= pc, "entry {:#x} past pc {:#x}", entry, pc);
        // Within one function, not the module's load address.
        assert!(frame.offset() < 0x10000, "offset {:#x}", frame.offset());
    }
}
