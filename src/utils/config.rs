//! Configuration and constants for the profiler.

use std::time::Duration;

/// Profile window used when the caller gives none (or zero)
pub const DEFAULT_PROFILE_SECONDS: u64 = 30;

/// Current JSON export schema version
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Route the garbage profile is served on
pub const GARBAGE_ROUTE: &str = "/debug/pprof/garbage";

/// Content type of the rendered text profile
pub const PROFILE_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Default listen address for `serve`
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:6000";

/// Default endpoint for `fetch`
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:6000";

/// Added to the expected `2 * seconds` run when fetching a remote profile
pub const FETCH_TIMEOUT_SLACK: Duration = Duration::from_secs(10);

/// Upper bound on a fetch timeout; the HTTP client turns it into a deadline
pub const MAX_FETCH_TIMEOUT: Duration = Duration::from_secs(30 * 24 * 60 * 60);

// Verbose frame columns: tab stops every 8, at least one tab of padding.
pub const ALIGN_TAB_WIDTH: usize = 8;
pub const ALIGN_PADDING: usize = 1;
pub const ALIGN_MIN_WIDTH: usize = 1;

// Snapshot reading: extra records allocated on top of the probed size,
// in case the table grows between the probe and the copy.
pub const SNAPSHOT_HEADROOM: usize = 50;

// The sampler polls the cycle counter this many times per measured period
pub const TICKS_PER_PERIOD: u32 = 10;

/// Lower bound on the calibrated cycle period
pub const MIN_GC_PERIOD: Duration = Duration::from_millis(10);

/// Maximum number of return addresses kept per stack signature
pub const MAX_STACK_DEPTH: usize = 32;

/// Average number of allocated bytes between two sampled allocations
pub const DEFAULT_SAMPLE_RATE: u64 = 512 * 1024;

/// Bytes allocated since the last cycle that trigger a new collection cycle
pub const DEFAULT_CYCLE_TRIGGER_BYTES: u64 = 4 * 1024 * 1024;

/// A collection cycle is forced at least this often
pub const DEFAULT_MAX_CYCLE_INTERVAL: Duration = Duration::from_millis(100);

/// How often the cycle driver checks its trigger
pub const CYCLE_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Frames skipped at the top of every captured stack (the capture itself)
pub const DEFAULT_STACK_SKIP: usize = 1;

// Environment overrides for the tracker configuration
pub const ENV_SAMPLE_RATE: &str = "PPROF_GARBAGE_SAMPLE_RATE";
pub const ENV_CYCLE_BYTES: &str = "PPROF_GARBAGE_CYCLE_BYTES";
pub const ENV_CYCLE_MS: &str = "PPROF_GARBAGE_CYCLE_MS";

/// Symbol prefixes of allocator, profiler and standard-library machinery.
/// Hidden from the leading edge of a rendered stack.
pub const RUNTIME_FRAME_PREFIXES: &[&str] = &[
    "pprof_garbage::runtime::",
    "<pprof_garbage::runtime::",
    "backtrace::",
    "__rust_",
    "__rustc::",
    "__rg_",
    "__rdl_",
    "alloc::",
    "<alloc::",
    "core::",
    "<core::",
    "std::",
    "<std::",
    "hashbrown::",
    "dashmap::",
];

/// Thread and process bootstrap frames, never shown unless nothing else is
pub const BOOTSTRAP_FRAMES: &[&str] = &[
    "start_thread",
    "clone",
    "clone3",
    "__clone",
    "__clone3",
    "_start",
    "__libc_start_main",
    "__libc_start_call_main",
    "main",
];
