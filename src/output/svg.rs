//! SVG flamegraph file writer.

use super::prepare_output_path;
use crate::utils::error::OutputError;
use log::{info, warn};
use std::path::Path;

/// Write SVG content to a file
///
/// **Public** - main entry point for SVG output
///
/// # Arguments
/// * `svg_content` - SVG string from the flamegraph renderer
/// * `output_path` - Path to output SVG file
pub fn write_svg(svg_content: &str, output_path: impl AsRef<Path>) -> Result<(), OutputError> {
    let output_path = output_path.as_ref();
    info!("Writing flamegraph to: {}", output_path.display());

    prepare_output_path(output_path)?;
    if output_path.extension().map_or(true, |ext| ext != "svg") {
        warn!("Flamegraph path has no .svg extension: {}", output_path.display());
    }

    std::fs::write(output_path, svg_content)?;

    info!(
        "Flamegraph written ({:.2} KB)",
        svg_content.len() as f64 / 1024.0
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"/>"#;

    #[test]
    fn test_write_svg() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested/garbage.svg");

        write_svg(SVG, &path).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), SVG);
    }

    #[test]
    fn test_write_svg_to_directory_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            write_svg(SVG, temp_dir.path()),
            Err(OutputError::InvalidPath(_))
        ));
    }
}
