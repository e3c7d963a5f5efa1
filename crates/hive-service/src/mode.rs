//! Mode controller.
//!
//! Resolves the configured [`ServiceMode`] to a concrete [`Mode`] once, at
//! startup. The result never changes for the lifetime of the process.

use hive_embeddings::{full_providers_compiled, ModelCache, GENERAL_PROVIDER};
use hive_types::{Mode, ServiceMode, Settings};
use tracing::{info, warn};

/// What the running build and environment can offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Real providers are compiled in
    pub full_compiled: bool,
    pub allow_download: bool,
    /// Files for the default general-purpose model are already on disk
    pub general_cached: bool,
}

impl Capabilities {
    /// Probe the build and the model cache described by `settings`.
    pub fn probe(settings: &Settings) -> Self {
        let cache = ModelCache::new(settings.expanded_cache_dir(), GENERAL_PROVIDER);
        Self {
            full_compiled: full_providers_compiled(),
            allow_download: settings.allow_download,
            general_cached: cache.is_cached(),
        }
    }
}

pub struct ModeController;

impl ModeController {
    /// Decide the process mode from settings and the environment.
    pub fn decide(settings: &Settings) -> Mode {
        let caps = Capabilities::probe(settings);
        let mode = Self::resolve(settings.mode, caps);
        info!(
            requested = ?settings.mode,
            resolved = %mode,
            full_compiled = caps.full_compiled,
            general_cached = caps.general_cached,
            "Service mode decided"
        );
        mode
    }

    /// Pure resolution rule.
    pub fn resolve(requested: ServiceMode, caps: Capabilities) -> Mode {
        match requested {
            ServiceMode::Minimal => Mode::Minimal,
            ServiceMode::Full if caps.full_compiled => Mode::Full,
            ServiceMode::Full => {
                warn!("Full mode requested but real providers are not compiled in; using minimal");
                Mode::Minimal
            }
            ServiceMode::Auto => {
                if caps.full_compiled && (caps.allow_download || caps.general_cached) {
                    Mode::Full
                } else {
                    Mode::Minimal
                }
            }
        }
    }
}
