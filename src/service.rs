//! Ensemble service: the operation surface
//!
//! Owns the registry, tracker, and orchestrator and exposes the full
//! operation set: detect, judge management, performance snapshots, strategy
//! listing, and health. Transport layers (REST, gRPC, MCP) wrap this facade;
//! nothing here is global, callers pass the service around explicitly.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

use crate::config::{self, ConfigResult};
use crate::judge::Judge;
use crate::orchestrator::{DetectResult, Orchestrator};
use crate::registry::{JudgeRegistry, RegistryResult};
use crate::tracker::{PerformanceStat, PerformanceTracker};
use crate::types::{ConsensusRequest, ConsensusResult, JudgeConfig, VotingStrategy};

/// Shared reference to the service
pub type SharedEnsembleService = Arc<EnsembleService>;

/// Ensemble availability summary
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HealthStatus {
    pub judges_enabled: usize,
    pub judges_total: usize,
}

/// Facade over registry, tracker, and orchestrator
pub struct EnsembleService {
    registry: JudgeRegistry,
    tracker: Arc<PerformanceTracker>,
    orchestrator: Orchestrator,
}

impl EnsembleService {
    pub fn new() -> Self {
        let tracker = Arc::new(PerformanceTracker::new());
        let orchestrator = Orchestrator::new(tracker.clone());
        Self {
            registry: JudgeRegistry::new(),
            tracker,
            orchestrator,
        }
    }

    /// Create a shared reference to this service
    pub fn shared(self) -> SharedEnsembleService {
        Arc::new(self)
    }

    // =========================================================================
    // Judge management
    // =========================================================================

    /// Add or replace a judge and its backend
    pub fn register_judge(
        &self,
        config: JudgeConfig,
        backend: Arc<dyn Judge>,
    ) -> RegistryResult<()> {
        self.registry.register(config, backend)
    }

    /// Add a judge, failing on a duplicate name
    pub fn register_judge_new(
        &self,
        config: JudgeConfig,
        backend: Arc<dyn Judge>,
    ) -> RegistryResult<()> {
        self.registry.register_new(config, backend)
    }

    /// Replace the config of an existing judge
    pub fn configure_judge(&self, config: JudgeConfig) -> RegistryResult<()> {
        self.registry.configure(config)
    }

    pub fn enable_judge(&self, name: &str, enabled: bool) -> RegistryResult<()> {
        self.registry.set_enabled(name, enabled)
    }

    pub fn set_judge_weight(&self, name: &str, weight: f64) -> RegistryResult<()> {
        self.registry.set_weight(name, weight)
    }

    pub fn set_judge_cost(&self, name: &str, cost_per_unit: f64) -> RegistryResult<()> {
        self.registry.set_cost(name, cost_per_unit)
    }

    /// Remove a judge and its accumulated statistics
    pub fn remove_judge(&self, name: &str) -> RegistryResult<JudgeConfig> {
        let config = self.registry.remove(name)?;
        self.tracker.remove(name);
        Ok(config)
    }

    /// All configured judges, in registration order
    pub fn list_judges(&self) -> Vec<JudgeConfig> {
        self.registry.list()
    }

    // =========================================================================
    // Detection
    // =========================================================================

    /// Run one consensus evaluation against the current judge snapshot
    pub async fn detect(&self, request: &ConsensusRequest) -> DetectResult<ConsensusResult> {
        let snapshot = self.registry.snapshot_enabled();
        self.orchestrator.detect(&snapshot, request).await
    }

    /// Run one evaluation that can be aborted via the watch flag
    pub async fn detect_with_cancel(
        &self,
        request: &ConsensusRequest,
        cancel: watch::Receiver<bool>,
    ) -> DetectResult<ConsensusResult> {
        let snapshot = self.registry.snapshot_enabled();
        self.orchestrator
            .detect_with_cancel(&snapshot, request, cancel)
            .await
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Rolling call statistics for every judge seen so far
    pub fn performance(&self) -> Vec<PerformanceStat> {
        self.tracker.snapshot_all()
    }

    pub fn performance_for(&self, name: &str) -> Option<PerformanceStat> {
        self.tracker.snapshot(name)
    }

    /// The fixed set of supported voting strategies
    pub fn strategies(&self) -> &'static [VotingStrategy] {
        VotingStrategy::all()
    }

    pub fn health(&self) -> HealthStatus {
        let (judges_enabled, judges_total) = self.registry.counts();
        HealthStatus {
            judges_enabled,
            judges_total,
        }
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Persist the current judge configs to a JSON file
    pub fn save_judges(&self, path: &Path) -> ConfigResult<()> {
        config::save_judges(&self.registry.list(), path)
    }

    /// Load judge configs from a JSON file, attaching backends via `resolve`
    ///
    /// Returns the number of judges actually registered; zero when the file
    /// is missing. A config the registry rejects (a hand-edited file can
    /// carry anything) aborts the load with the registry's error; judges
    /// registered before the bad entry stay registered.
    pub fn load_judges(
        &self,
        path: &Path,
        resolve: impl Fn(&JudgeConfig) -> Arc<dyn Judge>,
    ) -> ConfigResult<usize> {
        let Some(configs) = config::load_judges(path)? else {
            return Ok(0);
        };
        let mut count = 0;
        for config in configs {
            let backend = resolve(&config);
            self.registry.register(config, backend)?;
            count += 1;
        }
        info!(count, path = %path.display(), "Judge configs loaded");
        Ok(count)
    }
}

impl Default for EnsembleService {
    fn default() -> Self {
        Self::new()
    }
}
