//! Playrun Common Library
//!
//! Shared types, configuration and errors for the Playrun harness.

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{ConfigRegistry, ConfigSource, EnvSource, HarnessConfig, PropertyStore};
pub use error::{Error, Result};
pub use types::*;

/// Playrun version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable carrying the worker identifier
pub const WORKER_ENV: &str = "PLAYRUN_WORKER";

/// Worker identifier used when tests run serially
pub const SERIAL_WORKER: &str = "master";

/// Default reports root
pub fn default_reports_dir() -> std::path::PathBuf {
    std::path::PathBuf::from("reports")
}

/// Current time as epoch milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
