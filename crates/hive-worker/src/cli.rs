//! CLI argument parsing for the model worker.
//!
//! CLI flags override every other configuration source.

use clap::{Parser, Subcommand};
use hive_types::{FailurePolicy, ServiceMode};

/// Hive Model Worker
///
/// Computes embeddings and code metrics for a parent process over
/// line-delimited JSON on stdin/stdout.
#[derive(Parser, Debug)]
#[command(name = "hive-model-worker")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/hive/model-worker.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Override the model file cache directory
    #[arg(long, global = true)]
    pub model_cache_dir: Option<String>,

    /// Operating mode (auto, full, minimal)
    #[arg(short, long, global = true)]
    pub mode: Option<ServiceMode>,

    /// What to do with providers that failed to load (cache, retry)
    #[arg(long, global = true)]
    pub failure_policy: Option<FailurePolicy>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Worker commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Serve requests on stdin/stdout (the default)
    Serve,

    /// List known embedding providers and whether their files are cached
    Models,

    /// Download a provider's model files into the cache
    Fetch {
        /// Provider name, e.g. sentence-transformers/all-MiniLM-L6-v2
        name: String,
    },
}

impl Cli {
    /// The subcommand to run; `serve` when none was given.
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Serve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_serves() {
        let cli = Cli::parse_from(["hive-model-worker"]);
        assert_eq!(cli.command(), Commands::Serve);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "hive-model-worker",
            "serve",
            "--mode",
            "minimal",
            "--failure-policy",
            "retry",
            "--model-cache-dir",
            "/tmp/models",
        ]);
        assert_eq!(cli.command(), Commands::Serve);
        assert_eq!(cli.mode, Some(ServiceMode::Minimal));
        assert_eq!(cli.failure_policy, Some(FailurePolicy::Retry));
        assert_eq!(cli.model_cache_dir.as_deref(), Some("/tmp/models"));
    }

    #[test]
    fn test_cli_with_config() {
        let cli = Cli::parse_from(["hive-model-worker", "--config", "/path/to/worker.toml"]);
        assert_eq!(cli.config, Some("/path/to/worker.toml".to_string()));
    }

    #[test]
    fn test_fetch_takes_a_name() {
        let cli = Cli::parse_from(["hive-model-worker", "fetch", "microsoft/codebert-base"]);
        assert_eq!(
            cli.command(),
            Commands::Fetch {
                name: "microsoft/codebert-base".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_mode_is_rejected() {
        assert!(Cli::try_parse_from(["hive-model-worker", "--mode", "turbo"]).is_err());
    }
}
