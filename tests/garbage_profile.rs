//! End-to-end: profile the synthetic workload with the real tracking allocator.

use pprof_garbage::estimator::GarbageEntry;
use pprof_garbage::parser::parse_heap_profile;
use pprof_garbage::runtime::{BacktraceSymbolizer, Symbolizer};
use pprof_garbage::workload::{Workload, WorkloadConfig};
use pprof_garbage::{write_garbage_profile_with, TrackerConfig, TrackingAllocator, TrackingRuntime};
use std::time::Duration;

#[global_allocator]
static ALLOC: TrackingAllocator = TrackingAllocator::system();

fn site_names(entry: &GarbageEntry, symbolizer: &BacktraceSymbolizer) -> Vec<String> {
    entry
        .stack
        .frames()
        .iter()
        .filter_map(|&pc| symbolizer.symbolize(pc).function)
        .collect()
}

fn garbage_at(entries: &[(Vec<String>, i64)], function: &str) -> Option<i64> {
    let matching: Vec<i64> = entries
        .iter()
        .filter(|(names, _)| names.iter().any(|n| n.ends_with(function)))
        .map(|(_, bytes)| *bytes)
        .collect();
    if matching.is_empty() {
        None
    } else {
        Some(matching.iter().sum())
    }
}

#[test]
fn test_churning_sites_report_garbage_and_retaining_site_does_not() {
    let runtime = TrackingRuntime::install(
        TrackerConfig::default()
            .with_sample_rate(64 * 1024)
            .with_cycle_trigger_bytes(4 << 20)
            .with_max_cycle_interval(Duration::from_millis(20)),
    );

    let workload = Workload::spawn(WorkloadConfig {
        large_bytes: 1 << 20,
        large_pause: Duration::from_micros(10),
        small_bytes: 256 << 10,
        small_pause: Duration::from_millis(10),
        retained_bytes: 64 << 10,
        retain_pause: Duration::from_millis(1),
        retain_limit: 32 << 20,
    })
    .unwrap();

    let symbolizer = BacktraceSymbolizer::new();
    let mut out = Vec::new();
    let sampled = write_garbage_profile_with(
        &mut out,
        &runtime,
        &symbolizer,
        Duration::from_secs(1),
        true,
    )
    .unwrap();
    workload.stop();

    assert!(runtime.is_hooked());
    assert!(sampled.stats.snapshots >= 2, "stats: {:?}", sampled.stats);

    let entries: Vec<(Vec<String>, i64)> = sampled
        .table
        .iter()
        .map(|entry| (site_names(entry, &symbolizer), entry.alloc_bytes))
        .collect();

    let large = garbage_at(&entries, "churn_large").unwrap_or(0);
    let small = garbage_at(&entries, "churn_small").unwrap_or(0);
    let retained = garbage_at(&entries, "workload::retain").unwrap_or(0);

    assert!(large > 0, "no garbage for churn_large");
    assert!(small > 0, "no garbage for churn_small");
    assert_eq!(retained, 0);

    let text = String::from_utf8(out).unwrap();
    let profile = parse_heap_profile(&text).unwrap();
    assert_eq!(profile.header.rate, 2 * 64 * 1024);
    assert_eq!(profile.samples.len(), sampled.table.len());
    assert!(profile.is_consistent());
    assert!(text.contains("churn_large"));
}
