//! pprof-garbage CLI
//!
//! Captures, serves and fetches garbage heap profiles.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use std::net::SocketAddr;
use std::path::PathBuf;

use pprof_garbage::commands::{
    display_version, execute_capture, execute_fetch, execute_serve, validate_args,
    validate_profile_file, CaptureArgs, FetchArgs, ServeArgs,
};
use pprof_garbage::render::FlamegraphConfig;
use pprof_garbage::utils::config::{DEFAULT_ENDPOINT, DEFAULT_LISTEN_ADDR, DEFAULT_PROFILE_SECONDS};
use pprof_garbage::workload::WorkloadConfig;
use pprof_garbage::TrackingAllocator;

#[global_allocator]
static ALLOC: TrackingAllocator = TrackingAllocator::system();

/// pprof-garbage - garbage allocation profiles for pprof
#[derive(Parser, Debug)]
#[command(name = "pprof-garbage")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Sizes of the synthetic workload
#[derive(Args, Debug)]
struct WorkloadOpts {
    /// Bytes allocated and dropped by the fast churning thread
    #[arg(long, default_value_t = 10 << 20)]
    large_bytes: usize,

    /// Bytes allocated and dropped by the slow churning thread
    #[arg(long, default_value_t = 1 << 20)]
    small_bytes: usize,

    /// Bytes retained per iteration by the retaining thread
    #[arg(long, default_value_t = 1 << 20)]
    retained_bytes: usize,

    /// Stop retaining after this many bytes
    #[arg(long, default_value_t = 256 << 20)]
    retain_limit: usize,
}

impl From<WorkloadOpts> for WorkloadConfig {
    fn from(opts: WorkloadOpts) -> Self {
        Self {
            large_bytes: opts.large_bytes,
            small_bytes: opts.small_bytes,
            retained_bytes: opts.retained_bytes,
            retain_limit: opts.retain_limit,
            ..Default::default()
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the synthetic workload and profile its garbage
    Capture {
        /// Sampling window in seconds (the run takes twice as long)
        #[arg(short, long, default_value = "10", env = "PPROF_GARBAGE_SECONDS")]
        seconds: u64,

        /// Include symbolized frames
        #[arg(short, long)]
        debug: bool,

        /// Text profile output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output path for JSON report (optional)
        #[arg(long)]
        json: Option<PathBuf>,

        /// Output path for SVG flamegraph (optional)
        #[arg(short, long)]
        flamegraph: Option<PathBuf>,

        /// Flamegraph title
        #[arg(long)]
        title: Option<String>,

        /// Flamegraph width in pixels
        #[arg(long, default_value = "1200")]
        width: usize,

        /// Print a summary of the heaviest call sites
        #[arg(long)]
        summary: bool,

        #[command(flatten)]
        workload: WorkloadOpts,
    },

    /// Serve /debug/pprof/garbage over HTTP
    Serve {
        /// Listen address
        #[arg(short, long, default_value = DEFAULT_LISTEN_ADDR, env = "PPROF_GARBAGE_ADDR")]
        addr: String,

        /// Also run the synthetic workload
        #[arg(long)]
        workload: bool,

        #[command(flatten)]
        workload_opts: WorkloadOpts,
    },

    /// Download a garbage profile from a running server
    Fetch {
        /// Server URL or host:port
        #[arg(short, long, default_value = DEFAULT_ENDPOINT, env = "PPROF_GARBAGE_URL")]
        url: String,

        /// Sampling window in seconds
        #[arg(short, long, default_value_t = DEFAULT_PROFILE_SECONDS)]
        seconds: u64,

        /// Ask for symbolized frames
        #[arg(short, long)]
        debug: bool,

        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a saved text profile or JSON report
    Validate {
        /// Path to profile file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Display version information
    Version,
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    // Execute command
    match cli.command {
        Commands::Capture {
            seconds,
            debug,
            output,
            json,
            flamegraph,
            title,
            width,
            summary,
            workload,
        } => {
            let fg_config = flamegraph.as_ref().map(|_| {
                let mut config = FlamegraphConfig::new();
                if let Some(title) = title {
                    config = config.with_title(title);
                }
                config.width = width;
                config
            });

            let args = CaptureArgs {
                seconds,
                debug,
                output,
                output_json: json,
                output_svg: flamegraph,
                flamegraph_config: fg_config,
                print_summary: summary,
                workload: workload.into(),
            };

            // Validate args first
            validate_args(&args)?;
            execute_capture(args)?;
        }

        Commands::Serve {
            addr,
            workload,
            workload_opts,
        } => {
            let addr: SocketAddr = addr
                .parse()
                .with_context(|| format!("Invalid listen address: {}", addr))?;
            execute_serve(ServeArgs {
                addr,
                workload: workload.then(|| workload_opts.into()),
            })?;
        }

        Commands::Fetch {
            url,
            seconds,
            debug,
            output,
        } => {
            execute_fetch(FetchArgs {
                url,
                seconds,
                debug,
                output,
            })?;
        }

        Commands::Validate { file } => {
            validate_profile_file(&file)?;
        }

        Commands::Version => {
            display_version();
        }
    }

    Ok(())
}
