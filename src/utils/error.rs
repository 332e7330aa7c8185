//! Error types for the entire application.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs and commands.
//! The profiling core itself never fails; only the sink can, and sink
//! failures are plain `std::io::Error`s passed through untouched.

use thiserror::Error;

/// Errors that can occur while fetching a profile from a remote endpoint
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),
}

/// Errors that can occur while parsing a text heap profile
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("Profile is empty")]
    Empty,

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Invalid sample on line {line}: {reason}")]
    InvalidSample { line: usize, reason: String },
}

/// Errors that can occur during flamegraph generation
#[derive(Error, Debug)]
pub enum FlamegraphError {
    #[error("Empty stack data")]
    EmptyStacks,

    /// inferno reports XML writer errors, not `io::Error`
    #[error("Failed to render flamegraph: {0}")]
    RenderFailed(String),
}

/// Errors that can occur during file output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write file: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("Failed to serialize JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),
}
