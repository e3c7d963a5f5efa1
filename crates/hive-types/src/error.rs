//! Error types shared across the Hive model worker.

use thiserror::Error;

/// Errors raised while loading settings.
#[derive(Debug, Error)]
pub enum HiveError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
