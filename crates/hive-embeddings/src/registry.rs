//! Provider registry.
//!
//! Providers are constructed on first reference and cached for the lifetime
//! of the registry. A construction failure is recorded and, under the default
//! [`FailurePolicy::Cache`], returned on every later reference without another
//! attempt. Names with a declared fallback are served by the fallback when
//! their own construction fails; that outcome is cached under the original name.
//!
//! In minimal mode every catalog name is constructed as the heuristic provider.

use std::collections::HashMap;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hive_types::{FailurePolicy, Mode};
use tracing::{debug, info, warn};

use crate::catalog::{self, ProviderKind};
use crate::error::EmbeddingError;
use crate::loader::ProviderLoader;
use crate::minimal::MINIMAL_PROVIDER;
use crate::model::EmbeddingModel;

/// Lifecycle state of a provider name, as seen from outside the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderStatus {
    Unloaded,
    Loaded,
    Failed,
}

/// A usable provider handle.
#[derive(Clone)]
pub struct LoadedProvider {
    pub handle: Arc<dyn EmbeddingModel>,
    /// Name of the provider that actually computes the vectors
    pub served_by: String,
}

impl fmt::Debug for LoadedProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedProvider")
            .field("model", &self.handle.info().name)
            .field("served_by", &self.served_by)
            .finish()
    }
}

enum ProviderState {
    Loaded(LoadedProvider),
    Failed(String),
}

#[derive(Default)]
struct Inner {
    states: HashMap<String, ProviderState>,
    constructions: HashMap<String, u32>,
}

/// Registry of named embedding providers, owned by one service instance.
pub struct ProviderRegistry {
    mode: Mode,
    policy: FailurePolicy,
    loader: Box<dyn ProviderLoader>,
    inner: Mutex<Inner>,
}

impl ProviderRegistry {
    pub fn new(mode: Mode, policy: FailurePolicy, loader: Box<dyn ProviderLoader>) -> Self {
        Self {
            mode,
            policy,
            loader,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the provider for `name`, constructing it on first reference.
    pub fn ensure_loaded(&self, name: &str) -> Result<LoadedProvider, EmbeddingError> {
        let mut inner = self.lock();
        self.ensure_locked(&mut inner, name)
    }

    fn ensure_locked(
        &self,
        inner: &mut Inner,
        name: &str,
    ) -> Result<LoadedProvider, EmbeddingError> {
        match inner.states.get(name) {
            Some(ProviderState::Loaded(provider)) => return Ok(provider.clone()),
            Some(ProviderState::Failed(reason)) if self.policy == FailurePolicy::Cache => {
                debug!(provider = name, "Provider previously failed, not retrying");
                return Err(EmbeddingError::ProviderLoad {
                    name: name.to_string(),
                    reason: reason.clone(),
                });
            }
            _ => {}
        }

        let spec =
            catalog::lookup(name).ok_or_else(|| EmbeddingError::UnknownModel(name.to_string()))?;

        let kind = match self.mode {
            Mode::Minimal => &ProviderKind::Minimal,
            Mode::Full => &spec.kind,
        };
        let served_by = match kind {
            ProviderKind::Minimal => MINIMAL_PROVIDER,
            ProviderKind::Bert(bert) => bert.repo_id,
        };

        *inner.constructions.entry(name.to_string()).or_default() += 1;
        info!(provider = name, mode = %self.mode, "Loading provider");

        // a panicking loader counts as a failed construction
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.loader.load(kind)))
            .unwrap_or_else(|payload| Err(EmbeddingError::Panicked(panic_message(&*payload))));

        let err = match outcome {
            Ok(handle) => {
                let provider = LoadedProvider {
                    handle,
                    served_by: served_by.to_string(),
                };
                inner
                    .states
                    .insert(name.to_string(), ProviderState::Loaded(provider.clone()));
                info!(provider = name, served_by, "Provider loaded");
                return Ok(provider);
            }
            Err(err) => err,
        };

        warn!(provider = name, error = %err, "Provider construction failed");
        let mut reason = err.to_string();

        if let Some(fallback) = spec.fallback {
            info!(provider = name, fallback, "Trying fallback provider");
            match self.ensure_locked(inner, fallback) {
                Ok(provider) => {
                    inner
                        .states
                        .insert(name.to_string(), ProviderState::Loaded(provider.clone()));
                    info!(provider = name, served_by = %provider.served_by, "Serving via fallback");
                    return Ok(provider);
                }
                Err(fallback_err) => {
                    reason = format!("{reason}; fallback {fallback} failed: {fallback_err}");
                }
            }
        }

        inner
            .states
            .insert(name.to_string(), ProviderState::Failed(reason.clone()));
        Err(EmbeddingError::ProviderLoad {
            name: name.to_string(),
            reason,
        })
    }

    /// Names of loaded providers, sorted.
    pub fn list_loaded(&self) -> Vec<String> {
        let inner = self.lock();
        let mut names: Vec<String> = inner
            .states
            .iter()
            .filter(|(_, state)| matches!(state, ProviderState::Loaded(_)))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn status(&self, name: &str) -> ProviderStatus {
        match self.lock().states.get(name) {
            None => ProviderStatus::Unloaded,
            Some(ProviderState::Loaded(_)) => ProviderStatus::Loaded,
            Some(ProviderState::Failed(_)) => ProviderStatus::Failed,
        }
    }

    /// Number of construction attempts made for `name`.
    pub fn construction_count(&self, name: &str) -> u32 {
        self.lock().constructions.get(name).copied().unwrap_or(0)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
