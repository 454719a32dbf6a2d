//! Core types for ensemble decisions
//!
//! These types flow through the whole pipeline: registry configuration,
//! per-judge call outcomes, and the final aggregated consensus result.
//! All of them serialize to JSON so a transport layer can mirror them
//! directly.

use serde::{Deserialize, Serialize};

/// Voting strategy used to combine judge opinions into one decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingStrategy {
    /// Strict vote count; ties resolve to flagged
    Majority,
    /// Confidence-weighted score against a 0.5 boundary
    Weighted,
    /// All judges must agree; any dissent resolves to flagged
    Unanimous,
    /// Weighted score against a caller-supplied boundary
    Threshold,
    /// Cost-ordered sequential dispatch with early stop, then weighted
    Cascading,
}

impl VotingStrategy {
    /// All supported strategies, in a stable order
    pub fn all() -> &'static [VotingStrategy] {
        &[
            VotingStrategy::Majority,
            VotingStrategy::Weighted,
            VotingStrategy::Unanimous,
            VotingStrategy::Threshold,
            VotingStrategy::Cascading,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VotingStrategy::Majority => "majority",
            VotingStrategy::Weighted => "weighted",
            VotingStrategy::Unanimous => "unanimous",
            VotingStrategy::Threshold => "threshold",
            VotingStrategy::Cascading => "cascading",
        }
    }
}

impl std::fmt::Display for VotingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider tag for a judge backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Anthropic,
    OpenAi,
    Gemini,
    /// Locally hosted model or statistical classifier
    Local,
    /// Anything speaking the generic judge wire contract
    Custom,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Anthropic => write!(f, "anthropic"),
            Provider::OpenAi => write!(f, "openai"),
            Provider::Gemini => write!(f, "gemini"),
            Provider::Local => write!(f, "local"),
            Provider::Custom => write!(f, "custom"),
        }
    }
}

/// Identity and tunables for one registered judge
///
/// Mutated only through explicit registry operations and snapshotted at
/// dispatch time; an in-flight request never observes a mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeConfig {
    /// Unique judge name
    pub name: String,
    /// Which kind of backend serves this judge
    pub provider: Provider,
    /// Whether the judge participates in dispatch
    pub enabled: bool,
    /// Voting weight, used by weighted/threshold strategies (>= 0)
    pub weight: f64,
    /// Monetary cost per standard unit of work, used for cascading order (>= 0)
    pub cost_per_unit: f64,
    /// Maximum units of work per call
    pub max_units: u32,
    /// Per-call timeout in milliseconds
    pub timeout_ms: u64,
}

impl JudgeConfig {
    /// Create a config with default tunables: enabled, weight 1.0, zero
    /// cost, 30s timeout
    pub fn new(name: impl Into<String>, provider: Provider) -> Self {
        Self {
            name: name.into(),
            provider,
            enabled: true,
            weight: 1.0,
            cost_per_unit: 0.0,
            max_units: 1_000,
            timeout_ms: 30_000,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_cost_per_unit(mut self, cost: f64) -> Self {
        self.cost_per_unit = cost;
        self
    }

    pub fn with_max_units(mut self, units: u32) -> Self {
        self.max_units = units;
        self
    }

    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }
}

/// One judge's verdict for one request, immutable once created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opinion {
    /// Name of the judge that produced this opinion
    pub judge_name: String,
    /// Whether the judge considers the content a violation
    pub is_flagged: bool,
    /// Confidence in the verdict, clamped to [0, 1]
    pub confidence: f64,
    /// Advisory explanation, never used for scoring
    pub reasoning: String,
    /// Units of work consumed by the call
    pub units_used: u32,
    /// Monetary cost of the call
    pub cost: f64,
    /// Call latency in milliseconds
    pub latency_ms: u64,
}

impl Opinion {
    pub fn new(judge_name: impl Into<String>, is_flagged: bool, confidence: f64) -> Self {
        Self {
            judge_name: judge_name.into(),
            is_flagged,
            confidence: confidence.clamp(0.0, 1.0),
            reasoning: String::new(),
            units_used: 0,
            cost: 0.0,
            latency_ms: 0,
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

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    pub fn with_latency_ms(mut self, ms: u64) -> Self {
        self.latency_ms = ms;
        self
    }
}

/// Why a single judge call failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum CallError {
    #[error("judge call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("judge invocation failed: {message}")]
    Invocation { message: String },
}

/// The accounting record for one judge call, produced even on failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeCallOutcome {
    /// Which judge was called
    pub judge_name: String,
    /// Wall-clock time spent on this call in milliseconds
    pub elapsed_ms: u64,
    /// The opinion, when the call succeeded
    pub opinion: Option<Opinion>,
    /// The failure, when it did not
    pub error: Option<CallError>,
}

impl JudgeCallOutcome {
    pub fn success(opinion: Opinion, elapsed_ms: u64) -> Self {
        Self {
            judge_name: opinion.judge_name.clone(),
            elapsed_ms,
            opinion: Some(opinion),
            error: None,
        }
    }

    pub fn failure(judge_name: impl Into<String>, error: CallError, elapsed_ms: u64) -> Self {
        Self {
            judge_name: judge_name.into(),
            elapsed_ms,
            opinion: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.opinion.is_some()
    }
}

/// Input to one ensemble evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusRequest {
    /// Content to judge
    pub content: String,
    /// Optional surrounding context passed through to each judge
    pub context: Option<String>,
    /// How to combine opinions
    pub strategy: VotingStrategy,
    /// Minimum number of successful opinions required (>= 1)
    pub min_judges: usize,
    /// Decision boundary for the threshold strategy
    pub confidence_threshold: Option<f64>,
    /// Early-stop confidence for the cascading strategy
    pub early_stop_confidence: Option<f64>,
}

impl ConsensusRequest {
    pub fn new(content: impl Into<String>, strategy: VotingStrategy) -> Self {
        Self {
            content: content.into(),
            context: None,
            strategy,
            min_judges: 1,
            confidence_threshold: None,
            early_stop_confidence: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_min_judges(mut self, min: usize) -> Self {
        self.min_judges = min;
        self
    }

    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = Some(threshold);
        self
    }

    pub fn with_early_stop_confidence(mut self, confidence: f64) -> Self {
        self.early_stop_confidence = Some(confidence);
        self
    }
}

/// Final aggregated decision for one request, built once and never mutated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusResult {
    /// The ensemble's decision
    pub is_flagged: bool,
    /// Confidence in the decision, in [0, 1]
    pub confidence: f64,
    /// Fraction of participating judges whose vote matches the decision
    pub agreement_score: f64,
    /// Every call made for this request, in dispatch order
    pub outcomes: Vec<JudgeCallOutcome>,
    /// Strategy that produced the decision
    pub strategy: VotingStrategy,
    /// Count of successful opinions
    pub judges_participated: usize,
    /// Count of opinions matching the final decision
    pub judges_agreed: usize,
    /// Human-readable summary of how the decision was reached
    pub final_reasoning: String,
    /// Sum of successful call costs
    pub total_cost: f64,
    /// Wall-clock time from dispatch start to completion in milliseconds
    pub total_latency_ms: u64,
}
