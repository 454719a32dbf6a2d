//! Ensemble decision orchestrator
//!
//! Given a piece of content to judge, `jury` queries several independent
//! scoring backends ("judges"), each returning an opinion with a confidence
//! value, and combines those opinions into one decision using a configurable
//! voting strategy. A cascading mode trades accuracy headroom for cost by
//! querying cheap judges first and stopping early once confidence is high
//! enough.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                    EnsembleService                         │
//! │  detect / judge management / performance / health          │
//! └─────────────────────────┬─────────────────────────────────┘
//!                           │ snapshot per request
//!           ┌───────────────┼───────────────┐
//!           ▼               ▼               ▼
//!     ┌───────────┐   ┌───────────┐   ┌───────────┐
//!     │ Registry  │   │Orchestrator│  │  Tracker  │
//!     │ (configs) │   │ (dispatch) │  │  (stats)  │
//!     └───────────┘   └─────┬─────┘   └───────────┘
//!                           │ opinions
//!                           ▼
//!                     ┌───────────┐
//!                     │  Voting   │
//!                     │  Engine   │
//!                     └───────────┘
//! ```
//!
//! # Components
//!
//! - **Registry**: configured judges and their backends; snapshot-on-read
//! - **Orchestrator**: concurrent fan-out or sequential cascade, per-call
//!   timeouts, cancellation, result aggregation
//! - **Voting engine**: pure strategy functions (majority, weighted,
//!   unanimous, threshold, cascading)
//! - **Tracker**: rolling per-judge call statistics
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use jury::{ConsensusRequest, EnsembleService, JudgeConfig, Provider, VotingStrategy};
//! use jury::judge::HttpJudge;
//!
//! let service = EnsembleService::new();
//! service.register_judge(
//!     JudgeConfig::new("fast-filter", Provider::Local).with_cost_per_unit(0.0001),
//!     Arc::new(HttpJudge::new("http://localhost:8080/evaluate")?),
//! )?;
//!
//! let request = ConsensusRequest::new(user_text, VotingStrategy::Cascading)
//!     .with_min_judges(1)
//!     .with_early_stop_confidence(0.95);
//! let result = service.detect(&request).await?;
//! println!("flagged={} confidence={:.2}", result.is_flagged, result.confidence);
//! ```

pub mod config;
pub mod judge;
pub mod orchestrator;
pub mod registry;
pub mod service;
pub mod tracker;
pub mod types;
pub mod voting;

// Re-export the core surface
pub use judge::{Judge, JudgeError, Verdict};
pub use orchestrator::{DetectError, DetectResult, Orchestrator};
pub use registry::{JudgeHandle, JudgeRegistry, RegistryError};
pub use service::{EnsembleService, HealthStatus, SharedEnsembleService};
pub use tracker::{PerformanceStat, PerformanceTracker};
pub use types::{
    CallError, ConsensusRequest, ConsensusResult, JudgeCallOutcome, JudgeConfig, Opinion,
    Provider, VotingStrategy,
};
pub use voting::{VoteOutcome, VoteParams, VotingError};
