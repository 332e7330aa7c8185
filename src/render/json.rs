//! JSON export of a garbage table.
//!
//! The schema is versioned so saved reports can be read back later.

use super::frames::visible_frames;
use super::text::reported_rate;
use crate::estimator::GarbageTable;
use crate::runtime::{Frame, Symbolizer};
use crate::utils::config::SCHEMA_VERSION;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level report written to JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GarbageReport {
    /// Schema version for compatibility checking
    pub version: String,

    /// When the report was generated (RFC 3339)
    pub generated_at: String,

    /// Length of the sampling window in seconds (the run took twice this)
    pub duration_secs: f64,

    /// Rate reported in the text header
    pub sample_rate: u64,

    pub total_objects: i64,
    pub total_bytes: i64,

    /// Call sites in table order
    pub sites: Vec<GarbageSite>,
}

/// Garbage attributed to one call site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GarbageSite {
    pub alloc_objects: i64,
    pub alloc_bytes: i64,

    /// Raw return addresses, hex formatted
    pub stack: Vec<String>,

    /// Symbolized frames (verbose reports only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frames: Option<Vec<SiteFrame>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteFrame {
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl From<&Frame> for SiteFrame {
    fn from(frame: &Frame) -> Self {
        Self {
            address: format!("{:#x}", frame.pc),
            function: frame.function.clone(),
            file: frame.file.clone(),
            line: frame.line,
        }
    }
}

/// Build a report from a finished run.
///
/// Frames are included when a symbolizer is given, filtered the same way
/// as in the verbose text profile.
pub fn build_report(
    table: &GarbageTable,
    sample_rate: u64,
    duration: Duration,
    symbolizer: Option<&dyn Symbolizer>,
) -> GarbageReport {
    let total = table.totals();
    let sites = table
        .iter()
        .map(|entry| {
            let frames = symbolizer.map(|s| {
                let resolved: Vec<Frame> =
                    entry.stack.frames().iter().map(|&pc| s.symbolize(pc)).collect();
                visible_frames(&resolved)
                    .into_iter()
                    .map(SiteFrame::from)
                    .collect()
            });
            GarbageSite {
                alloc_objects: entry.alloc_objects,
                alloc_bytes: entry.alloc_bytes,
                stack: entry
                    .stack
                    .frames()
                    .iter()
                    .map(|pc| format!("{:#x}", pc))
                    .collect(),
                frames,
            }
        })
        .collect();

    GarbageReport {
        version: SCHEMA_VERSION.to_string(),
        generated_at: Utc::now().to_rfc3339(),
        duration_secs: duration.as_secs_f64(),
        sample_rate: reported_rate(sample_rate),
        total_objects: total.alloc_objects,
        total_bytes: total.alloc_bytes,
        sites,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::StackSignature;

    struct Named;

    impl Symbolizer for Named {
        fn symbolize(&self, pc: usize) -> Frame {
            Frame {
                pc,
                function: Some(format!("app::site_{:x}", pc)),
                entry: Some(pc),
                file: Some("src/lib.rs".to_string()),
                line: Some(7),
            }
        }
    }

    fn table() -> GarbageTable {
        let mut table = GarbageTable::new();
        table.add(StackSignature::from_frames(&[0xa0, 0xb0]), 3, 3000);
        table
    }

    #[test]
    fn test_build_report_without_frames() {
        let report = build_report(&table(), 1024, Duration::from_secs(5), None);

        assert_eq!(report.version, SCHEMA_VERSION);
        assert_eq!(report.sample_rate, 2048);
        assert_eq!(report.total_bytes, 3000);
        assert_eq!(report.sites[0].stack, vec!["0xa0", "0xb0"]);
        assert!(report.sites[0].frames.is_none());

        let json = serde_json::to_string(&report).unwrap();
        assert!(!json.contains("frames"));
    }

    #[test]
    fn test_build_report_with_frames() {
        let report = build_report(&table(), 1024, Duration::from_secs(5), Some(&Named as &dyn Symbolizer));
        let frames = report.sites[0].frames.as_ref().unwrap();

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].function.as_deref(), Some("app::site_a0"));
        assert_eq!(frames[0].address, "0xa0");
    }
}
