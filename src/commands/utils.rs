use crate::estimator::GarbageTable;
use crate::output::read_report;
use crate::parser::parse_heap_profile;
use crate::render::visible_frames;
use crate::runtime::Symbolizer;
use crate::utils::config::SCHEMA_VERSION;
use anyhow::{Context, Result};
use std::path::Path;

/// Validate a saved garbage profile (text, or a JSON report by extension)
pub fn validate_profile_file(file_path: &Path) -> Result<()> {
    println!("Validating profile: {}", file_path.display());

    if file_path.extension().map_or(false, |ext| ext == "json") {
        let report = read_report(file_path)
            .with_context(|| format!("Failed to read report {}", file_path.display()))?;
        println!("✓ Valid garbage report JSON");
        println!("  Version: {}", report.version);
        println!("  Generated: {}", report.generated_at);
        println!("  Garbage: {} objects, {} bytes", report.total_objects, report.total_bytes);
        println!("  Call sites: {}", report.sites.len());
        return Ok(());
    }

    let text = std::fs::read_to_string(file_path)
        .with_context(|| format!("Failed to read {}", file_path.display()))?;
    let profile = parse_heap_profile(&text).context("Not a valid heap profile")?;

    println!("✓ Valid heap profile");
    println!(
        "  Garbage: {} objects, {} bytes",
        profile.header.totals.alloc_objects, profile.header.totals.alloc_bytes
    );
    println!("  Rate: heap/{}", profile.header.rate);
    println!("  Call sites: {}", profile.samples.len());
    println!("  Symbolized: {}", if profile.is_verbose() { "yes" } else { "no" });
    if !profile.is_consistent() {
        println!("  ⚠ Header totals do not match the samples");
    }
    Ok(())
}

/// Print the heaviest call sites to stderr, keeping stdout for the profile
pub fn print_summary<S: Symbolizer + ?Sized>(table: &GarbageTable, symbolizer: &S, top: usize) {
    let total = table.totals();
    let mut entries: Vec<_> = table.iter().filter(|e| e.alloc_bytes > 0).collect();
    entries.sort_by(|a, b| b.alloc_bytes.cmp(&a.alloc_bytes));

    eprintln!("\n{}", "=".repeat(80));
    eprintln!("GARBAGE SUMMARY");
    eprintln!("{}", "=".repeat(80));
    eprintln!("Total: {} objects, {} bytes", total.alloc_objects, total.alloc_bytes);
    eprintln!("Call sites: {} ({} with garbage)", table.len(), entries.len());
    eprintln!();

    for (i, entry) in entries.iter().take(top).enumerate() {
        let frames: Vec<_> = entry
            .stack
            .frames()
            .iter()
            .map(|&pc| symbolizer.symbolize(pc))
            .collect();
        let site = visible_frames(&frames)
            .first()
            .map(|f| {
                f.function
                    .clone()
                    .unwrap_or_else(|| format!("{:#x}", f.pc))
            })
            .unwrap_or_else(|| "?".to_string());

        let share = if total.alloc_bytes > 0 {
            entry.alloc_bytes as f64 * 100.0 / total.alloc_bytes as f64
        } else {
            0.0
        };
        eprintln!(
            "{:>3}. {:>14} bytes {:>6.1}%  {}",
            i + 1,
            entry.alloc_bytes,
            share,
            site
        );
    }
    eprintln!("{}", "=".repeat(80));
}

/// Display version information
pub fn display_version() {
    println!("pprof-garbage v{}", env!("CARGO_PKG_VERSION"));
    println!("Report Schema: v{}", SCHEMA_VERSION);
    println!();
    println!("Garbage (short-lived allocation) profiles in the legacy pprof heap format.");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_validate_text_profile() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            "heap profile: 1: 64 [1: 64] @ heap/1024\n1: 64 [1: 64] @ 0x10\n",
        )
        .unwrap();
        assert!(validate_profile_file(file.path()).is_ok());
    }

    #[test]
    fn test_validate_rejects_other_text() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "hello\n").unwrap();
        assert!(validate_profile_file(file.path()).is_err());
    }
}
