//! HTTP client for downloading garbage profiles from a running process.

use crate::utils::config::{FETCH_TIMEOUT_SLACK, GARBAGE_ROUTE, MAX_FETCH_TIMEOUT};
use crate::utils::error::FetchError;
use log::{debug, info};
use reqwest::blocking::Client;
use reqwest::Url;
use std::time::Duration;

/// Client for a remote `/debug/pprof/garbage` endpoint
pub struct ProfileClient {
    client: Client,
    endpoint: Url,
}

impl ProfileClient {
    /// Create a client for `base_url`.
    ///
    /// Accepts a bare `host:port`, a base URL, or the full route URL.
    pub fn new(base_url: &str) -> Result<Self, FetchError> {
        let endpoint = normalize_endpoint(base_url)?;
        // No client-wide timeout; each request sets one from its window.
        let client = Client::builder().build()?;
        debug!("Profile endpoint: {}", endpoint);
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Fetch a text garbage profile
    ///
    /// **Public** - blocks for about `2 * seconds` while the remote side samples
    ///
    /// # Errors
    /// * `FetchError::RequestFailed` - Connection error or timeout
    /// * `FetchError::InvalidResponse` - Non-2xx status
    pub fn fetch_garbage(&self, seconds: u64, debug: bool) -> Result<String, FetchError> {
        let timeout = fetch_timeout(seconds);
        info!(
            "Fetching {}s garbage profile from {} (timeout {:?})",
            seconds, self.endpoint, timeout
        );

        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[
                ("seconds", seconds.to_string()),
                ("debug", u8::from(debug).to_string()),
            ])
            .timeout(timeout)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::InvalidResponse(format!(
                "HTTP {}: {}",
                status,
                response.text().unwrap_or_default()
            )));
        }

        let body = response.text()?;
        debug!("Received {} bytes", body.len());
        Ok(body)
    }
}

/// Whole-request timeout: calibration plus sampling plus slack, capped
fn fetch_timeout(seconds: u64) -> Duration {
    Duration::from_secs(seconds.saturating_mul(2))
        .saturating_add(FETCH_TIMEOUT_SLACK)
        .min(MAX_FETCH_TIMEOUT)
}

/// Add a scheme if missing and the garbage route if no path was given
fn normalize_endpoint(base_url: &str) -> Result<Url, FetchError> {
    let trimmed = base_url.trim();
    if trimmed.is_empty() {
        return Err(FetchError::InvalidUrl("URL is empty".to_string()));
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    let mut url =
        Url::parse(&with_scheme).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", trimmed, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(FetchError::InvalidUrl(format!(
            "unsupported scheme '{}'",
            url.scheme()
        )));
    }

    if url.path() == "/" || url.path().is_empty() {
        url.set_path(GARBAGE_ROUTE);
    }
    url.set_query(None);
    Ok(url)
}
