//! Fetch command: download a garbage profile from a running process.

use super::models::FetchArgs;
use crate::client::ProfileClient;
use crate::output::write_text;
use crate::parser::parse_heap_profile;
use anyhow::{Context, Result};
use log::{info, warn};
use std::io::Write;

/// Execute the fetch command
///
/// **Public** - main entry point called from main.rs
pub fn execute_fetch(args: FetchArgs) -> Result<()> {
    let client = ProfileClient::new(&args.url).context("Failed to create profile client")?;

    let body = client
        .fetch_garbage(args.seconds, args.debug)
        .with_context(|| format!("Failed to fetch garbage profile from {}", client.endpoint()))?;

    match parse_heap_profile(&body) {
        Ok(profile) => info!(
            "Fetched profile: {} call sites, {} bytes of garbage",
            profile.samples.len(),
            profile.header.totals.alloc_bytes
        ),
        Err(e) => warn!("Response does not look like a heap profile: {}", e),
    }

    match &args.output {
        Some(path) => {
            write_text(body.as_bytes(), path).context("Failed to write profile")?;
            info!("✓ Profile written to: {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(body.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}
