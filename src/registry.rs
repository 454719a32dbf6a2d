//! Judge registry: configuration and backend lookup
//!
//! Holds every configured judge together with its backend. Mutations go
//! through explicit operations; dispatch works off an atomic snapshot, so
//! enabling or disabling a judge mid-flight never affects an in-progress
//! request.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;
use tracing::debug;

use crate::judge::Judge;
use crate::types::JudgeConfig;

/// Errors from registry operations
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("judge not found: {0}")]
    NotFound(String),

    #[error("judge already registered: {0}")]
    DuplicateName(String),

    #[error("invalid config for {name}: {reason}")]
    InvalidConfig { name: String, reason: String },
}

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// An enabled judge as seen by one request: config copy plus backend handle
#[derive(Clone)]
pub struct JudgeHandle {
    pub config: JudgeConfig,
    pub backend: Arc<dyn Judge>,
}

struct Entry {
    config: JudgeConfig,
    backend: Arc<dyn Judge>,
    /// Registration order, the stable tie-break for cascading dispatch
    seq: u64,
}

struct Inner {
    entries: HashMap<String, Entry>,
    next_seq: u64,
}

/// Registry of all configured judges
pub struct JudgeRegistry {
    inner: RwLock<Inner>,
}

impl JudgeRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                entries: HashMap::new(),
                next_seq: 0,
            }),
        }
    }

    fn validate(config: &JudgeConfig) -> RegistryResult<()> {
        if !(config.weight >= 0.0) {
            return Err(RegistryError::InvalidConfig {
                name: config.name.clone(),
                reason: format!("weight must be >= 0, got {}", config.weight),
            });
        }
        if !(config.cost_per_unit >= 0.0) {
            return Err(RegistryError::InvalidConfig {
                name: config.name.clone(),
                reason: format!("cost_per_unit must be >= 0, got {}", config.cost_per_unit),
            });
        }
        Ok(())
    }

    /// Add or replace a judge by name
    ///
    /// Replacing keeps the original registration order.
    pub fn register(&self, config: JudgeConfig, backend: Arc<dyn Judge>) -> RegistryResult<()> {
        Self::validate(&config)?;
        let mut inner = self.inner.write().expect("registry lock poisoned");

        let seq = match inner.entries.get(&config.name) {
            Some(existing) => existing.seq,
            None => {
                let seq = inner.next_seq;
                inner.next_seq += 1;
                seq
            }
        };

        debug!(judge = %config.name, provider = %config.provider, "Judge registered");
        inner.entries.insert(
            config.name.clone(),
            Entry {
                config,
                backend,
                seq,
            },
        );
        Ok(())
    }

    /// Add a judge, failing if the name is already taken
    ///
    /// The duplicate check and the insert happen under one write guard, so
    /// two concurrent calls for the same name can never both succeed.
    pub fn register_new(&self, config: JudgeConfig, backend: Arc<dyn Judge>) -> RegistryResult<()> {
        Self::validate(&config)?;
        let mut inner = self.inner.write().expect("registry lock poisoned");
        if inner.entries.contains_key(&config.name) {
            return Err(RegistryError::DuplicateName(config.name));
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;

        debug!(judge = %config.name, provider = %config.provider, "Judge registered");
        inner.entries.insert(
            config.name.clone(),
            Entry {
                config,
                backend,
                seq,
            },
        );
        Ok(())
    }

    /// Replace the config of an existing judge, keeping its backend
    pub fn configure(&self, config: JudgeConfig) -> RegistryResult<()> {
        Self::validate(&config)?;
        let mut inner = self.inner.write().expect("registry lock poisoned");
        let entry = inner
            .entries
            .get_mut(&config.name)
            .ok_or_else(|| RegistryError::NotFound(config.name.clone()))?;
        entry.config = config;
        Ok(())
    }

    pub fn set_enabled(&self, name: &str, enabled: bool) -> RegistryResult<()> {
        self.mutate(name, |config| {
            config.enabled = enabled;
            Ok(())
        })
    }

    pub fn set_weight(&self, name: &str, weight: f64) -> RegistryResult<()> {
        self.mutate(name, |config| {
            if !(weight >= 0.0) {
                return Err(RegistryError::InvalidConfig {
                    name: config.name.clone(),
                    reason: format!("weight must be >= 0, got {}", weight),
                });
            }
            config.weight = weight;
            Ok(())
        })
    }

    pub fn set_cost(&self, name: &str, cost_per_unit: f64) -> RegistryResult<()> {
        self.mutate(name, |config| {
            if !(cost_per_unit >= 0.0) {
                return Err(RegistryError::InvalidConfig {
                    name: config.name.clone(),
                    reason: format!("cost_per_unit must be >= 0, got {}", cost_per_unit),
                });
            }
            config.cost_per_unit = cost_per_unit;
            Ok(())
        })
    }

    fn mutate(
        &self,
        name: &str,
        f: impl FnOnce(&mut JudgeConfig) -> RegistryResult<()>,
    ) -> RegistryResult<()> {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        let entry = inner
            .entries
            .get_mut(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        f(&mut entry.config)
    }

    /// Remove a judge, returning its config
    pub fn remove(&self, name: &str) -> RegistryResult<JudgeConfig> {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        inner
            .entries
            .remove(name)
            .map(|e| e.config)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Immutable copy of all enabled judges, in registration order
    ///
    /// Taken atomically: a request dispatches against exactly this set no
    /// matter what happens to the registry afterwards.
    pub fn snapshot_enabled(&self) -> Vec<JudgeHandle> {
        let inner = self.inner.read().expect("registry lock poisoned");
        let mut entries: Vec<&Entry> = inner
            .entries
            .values()
            .filter(|e| e.config.enabled)
            .collect();
        entries.sort_by_key(|e| e.seq);
        entries
            .into_iter()
            .map(|e| JudgeHandle {
                config: e.config.clone(),
                backend: e.backend.clone(),
            })
            .collect()
    }

    /// All configs, enabled or not, in registration order
    pub fn list(&self) -> Vec<JudgeConfig> {
        let inner = self.inner.read().expect("registry lock poisoned");
        let mut entries: Vec<&Entry> = inner.entries.values().collect();
        entries.sort_by_key(|e| e.seq);
        entries.into_iter().map(|e| e.config.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<JudgeConfig> {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner.entries.get(name).map(|e| e.config.clone())
    }

    /// (enabled, total) judge counts
    pub fn counts(&self) -> (usize, usize) {
        let inner = self.inner.read().expect("registry lock poisoned");
        let total = inner.entries.len();
        let enabled = inner.entries.values().filter(|e| e.config.enabled).count();
        (enabled, total)
    }
}

impl Default for JudgeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
