//! Renderers for a finished garbage table.
//!
//! - Legacy text heap profile (what pprof reads)
//! - Symbolized frames for verbose output
//! - JSON report
//! - SVG flamegraph

pub mod flamegraph;
pub mod frames;
pub mod json;
pub mod text;

// Re-export main types and functions
pub use flamegraph::{collapsed_stacks, generate_flamegraph, FlamegraphConfig};
pub use frames::{visible_frames, write_stack_record};
pub use json::{build_report, GarbageReport, GarbageSite, SiteFrame};
pub use text::{reported_rate, write_text_profile};
