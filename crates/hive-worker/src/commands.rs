//! Command implementations for the model worker.
//!
//! `serve` owns stdout for the protocol, so logging always goes to stderr
//! or to the configured log file.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use hive_embeddings::{catalog, get_or_download_model, lookup, ModelCache, Pooling, ProviderKind};
use hive_service::{run_service, ModeController, RequestHandler};
use hive_types::Settings;
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

/// Load settings and apply CLI overrides (highest precedence).
pub fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings =
        Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;

    if let Some(log_level) = &cli.log_level {
        settings.log_level = log_level.clone();
    }
    if let Some(dir) = &cli.model_cache_dir {
        settings.model_cache_dir = dir.clone();
    }
    if let Some(mode) = cli.mode {
        settings.mode = mode;
    }
    if let Some(policy) = cli.failure_policy {
        settings.failure_policy = policy;
    }

    settings.validate().context("Invalid configuration")?;
    Ok(settings)
}

/// Install the global tracing subscriber. `RUST_LOG` wins over `log_level`.
pub fn init_logging(settings: &Settings) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));

    match &settings.log_file {
        Some(path) => {
            let path = Path::new(path);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).context("Failed to create log directory")?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;

            let subscriber = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("Failed to set tracing subscriber")?;
        }
        None => {
            let subscriber = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("Failed to set tracing subscriber")?;
        }
    }

    Ok(())
}

/// Run the service loop on stdin/stdout until the parent closes stdin.
pub async fn serve(settings: Settings) -> Result<()> {
    info!("Model worker starting...");
    info!("  Model cache: {}", settings.expanded_cache_dir().display());
    info!("  Failure policy: {:?}", settings.failure_policy);

    let mode = ModeController::decide(&settings);
    let handler = Arc::new(RequestHandler::from_settings(&settings, mode));

    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();

    match run_service(handler, stdin, stdout).await {
        Ok(summary) => {
            info!(
                requests = summary.requests,
                errors = summary.errors,
                "Input closed, shutting down"
            );
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            warn!("Parent closed the output channel");
            Ok(())
        }
        Err(e) => Err(e).context("Service channel failed"),
    }
}

/// Print the provider catalog.
pub fn list_models(settings: &Settings) -> Result<()> {
    let cache_dir = settings.expanded_cache_dir();

    println!(
        "{:<42} {:<8} {:<7} {:>6} {:<8} FALLBACK",
        "NAME", "KIND", "POOLING", "TOKENS", "CACHED"
    );
    for spec in catalog() {
        let (kind, pooling, tokens, cached) = match &spec.kind {
            ProviderKind::Minimal => ("minimal", "-", "-".to_string(), "-"),
            ProviderKind::Bert(bert) => {
                let pooling = match bert.pooling {
                    Pooling::Pooler => "pooler",
                    Pooling::Mean => "mean",
                };
                let cached = if ModelCache::new(&cache_dir, bert.repo_id).is_cached() {
                    "yes"
                } else {
                    "no"
                };
                ("bert", pooling, bert.max_seq_length.to_string(), cached)
            }
        };
        println!(
            "{:<42} {:<8} {:<7} {:>6} {:<8} {}",
            spec.name,
            kind,
            pooling,
            tokens,
            cached,
            spec.fallback.unwrap_or("-")
        );
    }

    Ok(())
}

/// Download one provider's files into the cache.
pub fn fetch_model(settings: &Settings, name: &str) -> Result<()> {
    let Some(spec) = lookup(name) else {
        bail!("Unknown model: {name}");
    };

    let ProviderKind::Bert(bert) = &spec.kind else {
        println!("{name} needs no model files");
        return Ok(());
    };

    let cache = ModelCache::new(settings.expanded_cache_dir(), bert.repo_id);
    let paths = get_or_download_model(&cache, true)
        .with_context(|| format!("Failed to fetch {name}"))?;

    println!("{name} cached at {}", cache.model_dir().display());
    info!(weights = ?paths.weights, "Model files ready");
    Ok(())
}
