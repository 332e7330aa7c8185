//! SVG flamegraph of a garbage table, rendered with inferno.
//!
//! Each call site becomes one collapsed stack (`root;caller;callee bytes`)
//! built from its visible symbolized frames, outermost first.

use super::frames::visible_frames;
use crate::estimator::GarbageTable;
use crate::runtime::{Frame, Symbolizer};
use crate::utils::error::FlamegraphError;
use inferno::flamegraph::{self, Options};
use log::{debug, info};

/// Flamegraph configuration
#[derive(Debug, Clone)]
pub struct FlamegraphConfig {
    pub title: String,
    pub width: usize,
}

impl Default for FlamegraphConfig {
    fn default() -> Self {
        Self {
            title: "Garbage Profile".to_string(),
            width: 1200,
        }
    }
}

impl FlamegraphConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

/// Collapsed-stack lines weighted by garbage bytes.
/// Sites without garbage are left out.
pub fn collapsed_stacks<S: Symbolizer + ?Sized>(table: &GarbageTable, symbolizer: &S) -> Vec<String> {
    let mut lines = Vec::new();
    for entry in table.iter().filter(|e| e.alloc_bytes > 0) {
        let frames: Vec<Frame> = entry
            .stack
            .frames()
            .iter()
            .map(|&pc| symbolizer.symbolize(pc))
            .collect();

        let names: Vec<String> = visible_frames(&frames)
            .into_iter()
            .rev()
            .map(frame_label)
            .collect();
        if names.is_empty() {
            continue;
        }
        lines.push(format!("{} {}", names.join(";"), entry.alloc_bytes));
    }
    debug!("Built {} collapsed stacks", lines.len());
    lines
}

// Collapsed format reserves ';' and trailing spaces.
fn frame_label(frame: &Frame) -> String {
    match frame.function.as_deref() {
        Some(name) => name.replace(';', ":").replace(' ', "_"),
        None => format!("{:#x}", frame.pc),
    }
}

/// Generate an SVG flamegraph
///
/// **Public** - main entry point for flamegraph generation
///
/// # Errors
/// * `FlamegraphError::EmptyStacks` - No call site has garbage
/// * `FlamegraphError::RenderFailed` - inferno failed to render
pub fn generate_flamegraph<S: Symbolizer + ?Sized>(
    table: &GarbageTable,
    symbolizer: &S,
    config: Option<&FlamegraphConfig>,
) -> Result<String, FlamegraphError> {
    let lines = collapsed_stacks(table, symbolizer);
    if lines.is_empty() {
        return Err(FlamegraphError::EmptyStacks);
    }

    let config = config.cloned().unwrap_or_default();
    let mut options = Options::default();
    options.title = config.title.clone();
    options.count_name = "bytes".to_string();
    options.image_width = Some(config.width);

    let mut svg = Vec::new();
    flamegraph::from_lines(&mut options, lines.iter().map(String::as_str), &mut svg)
        .map_err(|e| FlamegraphError::RenderFailed(e.to_string()))?;

    info!("Flamegraph generated successfully ({} bytes)", svg.len());
    Ok(String::from_utf8_lossy(&svg).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::StackSignature;

    struct Names;

    impl Symbolizer for Names {
        fn symbolize(&self, pc: usize) -> Frame {
            let function = match pc {
                0x1 => "alloc::alloc::alloc",
                0x2 => "app::churn",
                0x3 => "app::worker",
                _ => return Frame::unresolved(pc),
            };
            Frame {
                pc,
                function: Some(function.to_string()),
                ..Frame::unresolved(pc)
            }
        }
    }

    #[test]
    fn test_collapsed_stacks_are_root_first() {
        let mut table = GarbageTable::new();
        table.add(StackSignature::from_frames(&[0x1, 0x2, 0x3]), 4, 4096);
        table.add(StackSignature::from_frames(&[0x2, 0x3]), 0, 0);

        assert_eq!(
            collapsed_stacks(&table, &Names),
            vec!["app::worker;app::churn 4096".to_string()]
        );
    }

    #[test]
    fn test_generate_flamegraph_empty_table() {
        let result = generate_flamegraph(&GarbageTable::new(), &Names, None);
        assert!(matches!(result, Err(FlamegraphError::EmptyStacks)));
    }

    #[test]
    fn test_render_error_message() {
        let err = FlamegraphError::RenderFailed("unexpected end of document".to_string());
        assert_eq!(
            err.to_string(),
            "Failed to render flamegraph: unexpected end of document"
        );
    }

    #[test]
    fn test_generate_flamegraph_svg() {
        let mut table = GarbageTable::new();
        table.add(StackSignature::from_frames(&[0x2, 0x3]), 1, 1 << 20);

        let config = FlamegraphConfig::new().with_title("garbage");
        let svg = generate_flamegraph(&table, &Names, Some(&config)).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("app::churn"));
    }
}
