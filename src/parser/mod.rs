//! Parsing of rendered garbage profiles.
//!
//! This module handles:
//! - The legacy text heap-profile header and sample lines
//! - Symbolized frame lines of verbose profiles
//! - Checking header totals against the samples

pub mod heap_profile;

// Re-export main types
pub use heap_profile::{
    parse_heap_profile, HeapProfile, ParsedFrame, ProfileHeader, ProfileSample, SampleCounts,
};
