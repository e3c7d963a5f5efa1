//! Hive Model Worker
//!
//! Long-running worker spawned by a parent process. Speaks line-delimited
//! JSON on stdin/stdout: one request per line, one response per line.
//!
//! # Usage
//!
//! ```bash
//! hive-model-worker [serve] [--mode auto|full|minimal] [--model-cache-dir DIR]
//! hive-model-worker models
//! hive-model-worker fetch <NAME>
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/hive/model-worker.toml)
//! 3. `--config` file
//! 4. Environment variables (HIVE_*)
//! 5. CLI flags

use anyhow::Result;
use clap::Parser;

use hive_worker::{fetch_model, init_logging, list_models, load_settings, serve, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    init_logging(&settings)?;

    match cli.command() {
        Commands::Serve => serve(settings).await?,
        Commands::Models => list_models(&settings)?,
        Commands::Fetch { name } => fetch_model(&settings, &name)?,
    }

    Ok(())
}
