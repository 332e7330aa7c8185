//! Capture command implementation.
//!
//! The capture command:
//! 1. Starts the synthetic workload
//! 2. Samples garbage for the requested window
//! 3. Writes the text profile
//! 4. Writes the optional JSON report and flamegraph

use super::models::CaptureArgs;
use super::utils::print_summary;
use crate::output::{write_report, write_svg, write_text};
use crate::profile::write_garbage_profile_with;
use crate::render::{build_report, generate_flamegraph};
use crate::runtime::{BacktraceSymbolizer, MemRuntime, Symbolizer, TrackingRuntime};
use crate::workload::Workload;
use anyhow::{bail, Context, Result};
use log::{info, warn};
use std::io::Write;
use std::time::{Duration, Instant};

/// Check capture arguments before spending time sampling
pub fn validate_args(args: &CaptureArgs) -> Result<()> {
    if args.seconds == 0 {
        bail!("--seconds must be greater than zero");
    }

    let outputs = [&args.output, &args.output_json, &args.output_svg];
    for (i, a) in outputs.iter().enumerate() {
        for b in outputs.iter().skip(i + 1) {
            if let (Some(a), Some(b)) = (a, b) {
                if a == b {
                    bail!("Output paths must differ: {}", a.display());
                }
            }
        }
    }
    Ok(())
}

/// Execute the capture command
///
/// **Public** - main entry point called from main.rs
///
/// # Errors
/// * Workload threads cannot be spawned
/// * Any output cannot be written
pub fn execute_capture(args: CaptureArgs) -> Result<()> {
    let start_time = Instant::now();
    let duration = Duration::from_secs(args.seconds);

    let runtime = TrackingRuntime::global();
    let symbolizer = BacktraceSymbolizer::new();

    info!("Step 1/4: Starting workload...");
    let workload = Workload::spawn(args.workload.clone()).context("Failed to start workload")?;

    if !runtime.is_hooked() {
        warn!("TrackingAllocator is not the global allocator; the profile will be empty");
    }

    info!(
        "Step 2/4: Sampling garbage for {}s (plus {}s calibration)...",
        args.seconds, args.seconds
    );
    let mut text = Vec::new();
    let sampled = write_garbage_profile_with(&mut text, &runtime, &symbolizer, duration, args.debug)
        .context("Failed to render garbage profile")?;
    workload.stop();

    info!("Step 3/4: Writing text profile...");
    match &args.output {
        Some(path) => {
            write_text(&text, path).context("Failed to write text profile")?;
            info!("✓ Profile written to: {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&text).context("Failed to write profile to stdout")?;
            stdout.flush()?;
        }
    }

    info!("Step 4/4: Writing exports...");
    if let Some(json_path) = &args.output_json {
        let frames: Option<&dyn Symbolizer> = if args.debug {
            Some(&symbolizer)
        } else {
            None
        };
        let report = build_report(&sampled.table, runtime.sample_rate(), duration, frames);
        write_report(&report, json_path).context("Failed to write JSON report")?;
        info!("✓ Report written to: {}", json_path.display());
    }

    if let Some(svg_path) = &args.output_svg {
        match generate_flamegraph(&sampled.table, &symbolizer, args.flamegraph_config.as_ref()) {
            Ok(svg) => {
                write_svg(&svg, svg_path).context("Failed to write flamegraph SVG")?;
                info!("✓ Flamegraph written to: {}", svg_path.display());
            }
            Err(e) => warn!("Flamegraph skipped: {}", e),
        }
    }

    if args.print_summary {
        print_summary(&sampled.table, &symbolizer, 10);
    }

    info!(
        "Capture completed in {:.2}s ({} snapshots, cycle period {:?})",
        start_time.elapsed().as_secs_f64(),
        sampled.stats.snapshots,
        sampled.stats.period
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_validate_args_zero_seconds() {
        let args = CaptureArgs {
            seconds: 0,
            ..Default::default()
        };
        assert!(validate_args(&args).is_err());
    }

    #[test]
    fn test_validate_args_same_output_twice() {
        let args = CaptureArgs {
            output: Some(PathBuf::from("out.txt")),
            output_json: Some(PathBuf::from("out.txt")),
            ..Default::default()
        };
        assert!(validate_args(&args).is_err());
    }

    #[test]
    fn test_validate_args_ok() {
        let args = CaptureArgs {
            output: Some(PathBuf::from("garbage.txt")),
            output_svg: Some(PathBuf::from("garbage.svg")),
            ..Default::default()
        };
        assert!(validate_args(&args).is_ok());
    }
}
