//! CLI command implementations.
//!
//! Each command is implemented in its own module.
//! Commands orchestrate the various library components to perform user tasks.

pub mod capture;
pub mod fetch;
pub mod models;
pub mod serve;
pub mod utils;

// Re-export main command functions
pub use capture::{execute_capture, validate_args};
pub use fetch::execute_fetch;
pub use models::{CaptureArgs, FetchArgs, ServeArgs};
pub use serve::execute_serve;
pub use utils::{display_version, print_summary, validate_profile_file};
