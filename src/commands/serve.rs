//! Serve command: expose the garbage route over HTTP.

use super::models::ServeArgs;
use crate::http::serve;
use crate::runtime::TrackingRuntime;
use crate::utils::config::GARBAGE_ROUTE;
use crate::workload::Workload;
use anyhow::{Context, Result};
use log::{info, warn};

/// Execute the serve command. Runs until the process is killed.
pub fn execute_serve(args: ServeArgs) -> Result<()> {
    let runtime = TrackingRuntime::global();

    let workload = match args.workload {
        Some(config) => Some(Workload::spawn(config).context("Failed to start workload")?),
        None => None,
    };

    if !runtime.is_hooked() {
        warn!("TrackingAllocator is not the global allocator; profiles will be empty");
    }

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    info!("Try: pprof http://{}{}?seconds=10", args.addr, GARBAGE_ROUTE);
    rt.block_on(serve(args.addr))
        .with_context(|| format!("Server on {} failed", args.addr))?;

    if let Some(workload) = workload {
        workload.stop();
    }
    Ok(())
}
