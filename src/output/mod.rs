//! Output writers for garbage reports and flamegraphs.
//!
//! This module handles writing data to disk:
//! - JSON reports (and reading them back)
//! - SVG flamegraphs
//! - Raw text profiles

pub mod json;
pub mod svg;

use crate::utils::error::OutputError;
use log::debug;
use std::path::Path;

// Re-export main functions
pub use json::{read_report, report_to_string, write_report};
pub use svg::write_svg;

/// Write a rendered text profile to a file
///
/// **Public** - used by `capture --output`
pub fn write_text(content: &[u8], output_path: impl AsRef<Path>) -> Result<(), OutputError> {
    let output_path = output_path.as_ref();
    prepare_output_path(output_path)?;
    std::fs::write(output_path, content)?;
    debug!("Text profile written to {}", output_path.display());
    Ok(())
}

/// Reject empty and directory paths, then create missing parent directories.
///
/// **Private** - shared by every writer in this module
fn prepare_output_path(path: &Path) -> Result<(), OutputError> {
    if path.as_os_str().is_empty() {
        return Err(OutputError::InvalidPath("Path is empty".to_string()));
    }

    if path.is_dir() {
        return Err(OutputError::InvalidPath(format!(
            "Path is a directory: {}",
            path.display()
        )));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            debug!("Creating parent directories: {}", parent.display());
            std::fs::create_dir_all(parent).map_err(|e| {
                OutputError::InvalidPath(format!(
                    "Cannot create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }
    Ok(())
}
