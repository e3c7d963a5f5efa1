//! Hive model worker library.
//!
//! Exposes the CLI definition and command implementations so they can be
//! exercised from tests.

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands};
pub use commands::{fetch_model, init_logging, list_models, load_settings, serve};
