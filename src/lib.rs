//! pprof-garbage
//!
//! Estimates how much memory each call site allocates and throws away
//! ("garbage") over a time window, and writes the result as a legacy text
//! heap profile that `pprof` can read.
//!
//! ## Getting Started
//!
//! Install the tracking allocator, then ask for a profile:
//!
//! ```ignore
//! use pprof_garbage::TrackingAllocator;
//!
//! #[global_allocator]
//! static ALLOC: TrackingAllocator = TrackingAllocator::system();
//!
//! let mut out = std::io::stdout();
//! pprof_garbage::write_garbage_profile(&mut out, std::time::Duration::from_secs(10), true)?;
//! ```
//!
//! Or serve `/debug/pprof/garbage` with [`http::router`].

pub mod client;
pub mod commands;
pub mod estimator;
pub mod http;
pub mod output;
pub mod parser;
pub mod profile;
pub mod render;
pub mod runtime;
pub mod sampler;
pub mod utils;
pub mod workload;

pub use profile::{write_garbage_profile, write_garbage_profile_with};
pub use runtime::{MemRuntime, Symbolizer, TrackerConfig, TrackingAllocator, TrackingRuntime};
