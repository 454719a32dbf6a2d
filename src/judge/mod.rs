//! Judge capability interface
//!
//! A judge is an independent scorer: given content and optional context it
//! returns a verdict with a confidence value. How a judge computes its
//! verdict (remote LLM, statistical classifier, heuristic) is opaque to the
//! orchestrator, which depends only on the [`Judge`] trait.

pub mod http;
pub mod stub;

use async_trait::async_trait;
use thiserror::Error;

pub use http::HttpJudge;
pub use stub::{FailingJudge, SlowJudge, StaticJudge};

/// Errors from a single judge backend
#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("response parse error: {0}")]
    ParseError(String),

    #[error("judge unavailable: {0}")]
    Unavailable(String),
}

/// Raw verdict returned by a judge backend
///
/// The orchestrator turns this into an [`crate::types::Opinion`] by stamping
/// the judge name, cost, and measured latency.
#[derive(Debug, Clone)]
pub struct Verdict {
    /// Whether the judge considers the content a violation
    pub is_flagged: bool,
    /// Confidence in the verdict (0.0 - 1.0)
    pub confidence: f64,
    /// Advisory explanation
    pub reasoning: String,
    /// Units of work consumed
    pub units_used: u32,
}

impl Verdict {
    pub fn new(is_flagged: bool, confidence: f64) -> Self {
        Self {
            is_flagged,
            confidence: confidence.clamp(0.0, 1.0),
            reasoning: String::new(),
            units_used: 1,
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    pub fn with_units(mut self, units: u32) -> Self {
        self.units_used = units;
        self
    }
}

/// A scoring backend consumed by the orchestrator
///
/// Implementations must return promptly when the calling task is cancelled;
/// the orchestrator bounds every call with the judge's configured timeout.
#[async_trait]
pub trait Judge: Send + Sync {
    /// Evaluate a piece of content and return a verdict
    async fn evaluate(&self, content: &str, context: Option<&str>) -> Result<Verdict, JudgeError>;
}
