use crate::render::FlamegraphConfig;
use crate::utils::config::{DEFAULT_ENDPOINT, DEFAULT_LISTEN_ADDR, DEFAULT_PROFILE_SECONDS};
use crate::workload::WorkloadConfig;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Arguments for the capture command
///
/// **Public** - used by main.rs to construct from CLI args
#[derive(Debug, Clone)]
pub struct CaptureArgs {
    /// Sampling window in seconds (the run takes twice as long)
    pub seconds: u64,

    /// Include symbolized frames in the text profile
    pub debug: bool,

    /// Text profile destination (stdout when absent)
    pub output: Option<PathBuf>,

    /// Output path for the JSON report (optional)
    pub output_json: Option<PathBuf>,

    /// Output path for SVG flamegraph (optional)
    pub output_svg: Option<PathBuf>,

    pub flamegraph_config: Option<FlamegraphConfig>,

    /// Print a summary of the heaviest call sites to stderr
    pub print_summary: bool,

    pub workload: WorkloadConfig,
}

impl Default for CaptureArgs {
    fn default() -> Self {
        Self {
            seconds: 10,
            debug: false,
            output: None,
            output_json: None,
            output_svg: None,
            flamegraph_config: None,
            print_summary: false,
            workload: WorkloadConfig::default(),
        }
    }
}

/// Arguments for the serve command
#[derive(Debug, Clone)]
pub struct ServeArgs {
    pub addr: SocketAddr,

    /// Run the synthetic workload alongside the endpoint
    pub workload: Option<WorkloadConfig>,
}

impl Default for ServeArgs {
    fn default() -> Self {
        Self {
            addr: DEFAULT_LISTEN_ADDR
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 6000))),
            workload: None,
        }
    }
}

/// Arguments for the fetch command
#[derive(Debug, Clone)]
pub struct FetchArgs {
    pub url: String,
    pub seconds: u64,
    pub debug: bool,

    /// Destination file (stdout when absent)
    pub output: Option<PathBuf>,
}

impl Default for FetchArgs {
    fn default() -> Self {
        Self {
            url: DEFAULT_ENDPOINT.to_string(),
            seconds: DEFAULT_PROFILE_SECONDS,
            debug: false,
            output: None,
        }
    }
}
