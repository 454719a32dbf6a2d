//! Invocation orchestrator: executes one consensus request
//!
//! Takes a registry snapshot and a request, dispatches judge calls
//! (concurrently for the parallel strategies, strictly sequentially for
//! cascading), bounds every call with the judge's configured timeout,
//! records each outcome into the performance tracker, runs the voting
//! engine, and assembles the final result.
//!
//! ```text
//! ConsensusRequest
//!       │ validate (fail fast, before any call)
//!       ▼
//! ┌─────────────────────────────────────────────┐
//! │ dispatch                                     │
//! │   parallel: JoinSet, one task per judge      │
//! │   cascading: cost-ascending, early stop      │
//! └──────────────┬──────────────────────────────┘
//!                ▼ JudgeCallOutcome per judge
//!        tracker.record ──► vote ──► aggregate
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::registry::JudgeHandle;
use crate::tracker::PerformanceTracker;
use crate::types::{
    CallError, ConsensusRequest, ConsensusResult, JudgeCallOutcome, Opinion, VotingStrategy,
};
use crate::voting::{self, VoteOutcome, VoteParams, VotingError};

/// Errors that fail a whole request
#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    #[error("insufficient judges: got {got}, need {need}")]
    InsufficientJudges { got: usize, need: usize },

    #[error("invalid strategy: {0}")]
    InvalidStrategy(String),

    #[error("request cancelled")]
    Cancelled,

    #[error(transparent)]
    Voting(#[from] VotingError),
}

/// Result type for orchestrator operations
pub type DetectResult<T> = Result<T, DetectError>;

/// Executes consensus requests against judge snapshots
pub struct Orchestrator {
    tracker: Arc<PerformanceTracker>,
}

impl Orchestrator {
    pub fn new(tracker: Arc<PerformanceTracker>) -> Self {
        Self { tracker }
    }

    /// Execute a request to completion
    pub async fn detect(
        &self,
        snapshot: &[JudgeHandle],
        request: &ConsensusRequest,
    ) -> DetectResult<ConsensusResult> {
        self.detect_inner(snapshot, request, None).await
    }

    /// Execute a request that can be aborted by flipping the watch flag
    ///
    /// On cancellation all in-flight judge calls are aborted and their
    /// partial results discarded; no partial result is returned.
    pub async fn detect_with_cancel(
        &self,
        snapshot: &[JudgeHandle],
        request: &ConsensusRequest,
        cancel: watch::Receiver<bool>,
    ) -> DetectResult<ConsensusResult> {
        self.detect_inner(snapshot, request, Some(cancel)).await
    }

    async fn detect_inner(
        &self,
        snapshot: &[JudgeHandle],
        request: &ConsensusRequest,
        cancel: Option<watch::Receiver<bool>>,
    ) -> DetectResult<ConsensusResult> {
        validate(snapshot, request)?;

        let request_id = Uuid::new_v4();
        let started = Instant::now();
        info!(
            %request_id,
            strategy = %request.strategy,
            judges = snapshot.len(),
            min_judges = request.min_judges,
            "Dispatch started"
        );

        let outcomes = match request.strategy {
            VotingStrategy::Cascading => {
                self.dispatch_cascading(snapshot, request, cancel).await?
            }
            _ => self.dispatch_parallel(snapshot, request, cancel).await?,
        };

        let opinions: Vec<Opinion> = outcomes
            .iter()
            .filter_map(|o| o.opinion.clone())
            .collect();

        if opinions.len() < request.min_judges {
            warn!(
                %request_id,
                got = opinions.len(),
                need = request.min_judges,
                "Too few successful judges"
            );
            return Err(DetectError::InsufficientJudges {
                got: opinions.len(),
                need: request.min_judges,
            });
        }

        let weights: HashMap<String, f64> = snapshot
            .iter()
            .map(|h| (h.config.name.clone(), h.config.weight))
            .collect();
        let params = VoteParams {
            confidence_threshold: request.confidence_threshold,
        };
        let vote = voting::vote(&opinions, &weights, request.strategy, &params)?;

        let result = aggregate(request.strategy, vote, outcomes, started);
        info!(
            %request_id,
            is_flagged = result.is_flagged,
            confidence = result.confidence,
            participated = result.judges_participated,
            total_latency_ms = result.total_latency_ms,
            "Detection complete"
        );
        Ok(result)
    }

    /// Fan out to every judge concurrently and wait for all of them
    async fn dispatch_parallel(
        &self,
        snapshot: &[JudgeHandle],
        request: &ConsensusRequest,
        mut cancel: Option<watch::Receiver<bool>>,
    ) -> DetectResult<Vec<JudgeCallOutcome>> {
        let mut set: JoinSet<(usize, JudgeCallOutcome)> = JoinSet::new();

        for (idx, handle) in snapshot.iter().enumerate() {
            let handle = handle.clone();
            let content = request.content.clone();
            let context = request.context.clone();
            set.spawn(async move {
                let outcome = call_judge(&handle, &content, context.as_deref()).await;
                (idx, outcome)
            });
        }

        let mut slots: Vec<Option<JudgeCallOutcome>> = vec![None; snapshot.len()];
        loop {
            let joined = tokio::select! {
                joined = set.join_next() => joined,
                // Returning drops the set, which aborts every in-flight call
                _ = wait_cancelled(&mut cancel) => return Err(DetectError::Cancelled),
            };

            match joined {
                None => break,
                Some(Ok((idx, outcome))) => {
                    self.tracker.record(&outcome);
                    slots[idx] = Some(outcome);
                }
                Some(Err(join_err)) => {
                    // A panicking judge loses its slot; the request carries on
                    warn!(error = %join_err, "Judge task failed to join");
                }
            }
        }

        Ok(slots.into_iter().flatten().collect())
    }

    /// Invoke judges one at a time, cheapest first, stopping early once a
    /// decisive high-confidence opinion arrives
    async fn dispatch_cascading(
        &self,
        snapshot: &[JudgeHandle],
        request: &ConsensusRequest,
        mut cancel: Option<watch::Receiver<bool>>,
    ) -> DetectResult<Vec<JudgeCallOutcome>> {
        // Validation guarantees the parameter is present for this strategy
        let early_stop = request
            .early_stop_confidence
            .ok_or_else(|| DetectError::InvalidStrategy("missing early_stop_confidence".into()))?;

        // Stable sort: equal costs keep registration order
        let mut ordered: Vec<&JudgeHandle> = snapshot.iter().collect();
        ordered.sort_by(|a, b| a.config.cost_per_unit.total_cmp(&b.config.cost_per_unit));

        let mut outcomes = Vec::with_capacity(ordered.len());
        for handle in ordered {
            if is_cancelled(&cancel) {
                return Err(DetectError::Cancelled);
            }

            let outcome = tokio::select! {
                outcome = call_judge(handle, &request.content, request.context.as_deref()) => outcome,
                _ = wait_cancelled(&mut cancel) => return Err(DetectError::Cancelled),
            };

            self.tracker.record(&outcome);
            let stop = outcome
                .opinion
                .as_ref()
                .map(|o| o.confidence >= early_stop)
                .unwrap_or(false);
            if stop {
                info!(
                    judge = %outcome.judge_name,
                    early_stop_confidence = early_stop,
                    calls = outcomes.len() + 1,
                    "Cascade stopped early"
                );
                outcomes.push(outcome);
                break;
            }
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }
}

/// Call one judge with its configured timeout and account for the result
async fn call_judge(handle: &JudgeHandle, content: &str, context: Option<&str>) -> JudgeCallOutcome {
    let config = &handle.config;
    let started = Instant::now();

    let result = tokio::time::timeout(config.timeout(), handle.backend.evaluate(content, context))
        .await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(Ok(verdict)) => {
            let units = verdict.units_used.min(config.max_units);
            let opinion = Opinion::new(&config.name, verdict.is_flagged, verdict.confidence)
                .with_reasoning(verdict.reasoning)
                .with_units(units)
                .with_cost(units as f64 * config.cost_per_unit)
                .with_latency_ms(elapsed_ms);
            debug!(
                judge = %config.name,
                is_flagged = opinion.is_flagged,
                confidence = opinion.confidence,
                latency_ms = elapsed_ms,
                "Judge call complete"
            );
            JudgeCallOutcome::success(opinion, elapsed_ms)
        }
        Ok(Err(e)) => {
            warn!(judge = %config.name, error = %e, "Judge call failed");
            JudgeCallOutcome::failure(
                &config.name,
                CallError::Invocation {
                    message: e.to_string(),
                },
                elapsed_ms,
            )
        }
        Err(_) => {
            warn!(judge = %config.name, timeout_ms = config.timeout_ms, "Judge call timed out");
            JudgeCallOutcome::failure(
                &config.name,
                CallError::Timeout {
                    timeout_ms: config.timeout_ms,
                },
                elapsed_ms,
            )
        }
    }
}

/// Resolve only once the cancel flag flips to true; pends forever without
/// one or when the sender goes away uncancelled
async fn wait_cancelled(cancel: &mut Option<watch::Receiver<bool>>) {
    match cancel {
        Some(rx) => {
            if *rx.borrow() {
                return;
            }
            while rx.changed().await.is_ok() {
                if *rx.borrow() {
                    return;
                }
            }
            std::future::pending().await
        }
        None => std::future::pending().await,
    }
}

fn is_cancelled(cancel: &Option<watch::Receiver<bool>>) -> bool {
    cancel.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
}

/// Fail fast on malformed requests before any judge is invoked
fn validate(snapshot: &[JudgeHandle], request: &ConsensusRequest) -> DetectResult<()> {
    if request.min_judges < 1 {
        return Err(DetectError::InvalidStrategy(
            "min_judges must be at least 1".to_string(),
        ));
    }

    match request.strategy {
        VotingStrategy::Threshold => match request.confidence_threshold {
            None => {
                return Err(DetectError::InvalidStrategy(
                    "threshold strategy requires confidence_threshold".to_string(),
                ))
            }
            Some(t) if !(0.0..=1.0).contains(&t) => {
                return Err(DetectError::InvalidStrategy(format!(
                    "confidence_threshold must be in [0, 1], got {}",
                    t
                )))
            }
            _ => {}
        },
        VotingStrategy::Cascading => match request.early_stop_confidence {
            None => {
                return Err(DetectError::InvalidStrategy(
                    "cascading strategy requires early_stop_confidence".to_string(),
                ))
            }
            Some(c) if !(0.0..=1.0).contains(&c) => {
                return Err(DetectError::InvalidStrategy(format!(
                    "early_stop_confidence must be in [0, 1], got {}",
                    c
                )))
            }
            _ => {}
        },
        _ => {}
    }

    // Cheaper than dispatching calls that cannot possibly satisfy the quorum
    if snapshot.len() < request.min_judges {
        return Err(DetectError::InsufficientJudges {
            got: snapshot.len(),
            need: request.min_judges,
        });
    }

    Ok(())
}

/// Result aggregator: voting output plus cost and time accounting
fn aggregate(
    strategy: VotingStrategy,
    vote: VoteOutcome,
    outcomes: Vec<JudgeCallOutcome>,
    started: Instant,
) -> ConsensusResult {
    let total_cost = outcomes
        .iter()
        .filter_map(|o| o.opinion.as_ref())
        .map(|o| o.cost)
        .sum();
    let judges_participated = outcomes.iter().filter(|o| o.is_success()).count();

    ConsensusResult {
        is_flagged: vote.is_flagged,
        confidence: vote.confidence,
        agreement_score: vote.agreement_score,
        outcomes,
        strategy,
        judges_participated,
        judges_agreed: vote.judges_agreed,
        final_reasoning: vote.reasoning,
        total_cost,
        // Wall-clock, not summed latencies: parallel calls overlap
        total_latency_ms: started.elapsed().as_millis() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::{Judge, StaticJudge};
    use crate::types::{JudgeConfig, Provider};

    fn handle(judge: impl Judge + 'static, config: JudgeConfig) -> JudgeHandle {
        JudgeHandle {
            config,
            backend: Arc::new(judge),
        }
    }

    fn static_handle(name: &str, flagged: bool, confidence: f64) -> JudgeHandle {
        handle(
            StaticJudge::new(flagged, confidence),
            JudgeConfig::new(name, Provider::Local),
        )
    }

    fn orchestrator() -> Orchestrator {
        Orchestrator::new(Arc::new(PerformanceTracker::new()))
    }

    #[test]
    fn test_validate_threshold_requires_parameter() {
        let snapshot = vec![static_handle("a", true, 0.9)];
        let request = ConsensusRequest::new("x", VotingStrategy::Threshold);
        assert!(matches!(
            validate(&snapshot, &request),
            Err(DetectError::InvalidStrategy(_))
        ));
    }

    #[test]
    fn test_validate_cascading_requires_parameter() {
        let snapshot = vec![static_handle("a", true, 0.9)];
        let request = ConsensusRequest::new("x", VotingStrategy::Cascading);
        assert!(matches!(
            validate(&snapshot, &request),
            Err(DetectError::InvalidStrategy(_))
        ));
    }

    #[test]
    fn test_validate_quorum_before_dispatch() {
        let snapshot = vec![static_handle("a", true, 0.9)];
        let request = ConsensusRequest::new("x", VotingStrategy::Majority).with_min_judges(3);
        assert!(matches!(
            validate(&snapshot, &request),
            Err(DetectError::InsufficientJudges { got: 1, need: 3 })
        ));
    }

    #[tokio::test]
    async fn test_parallel_dispatch_keeps_snapshot_order() {
        let snapshot = vec![
            static_handle("first", true, 0.9),
            static_handle("second", false, 0.8),
            static_handle("third", true, 0.7),
        ];
        let request = ConsensusRequest::new("x", VotingStrategy::Majority);
        let result = orchestrator().detect(&snapshot, &request).await.unwrap();

        let names: Vec<&str> = result
            .outcomes
            .iter()
            .map(|o| o.judge_name.as_str())
            .collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_call_costs_use_configured_rate() {
        let snapshot = vec![handle(
            StaticJudge::new(true, 0.9).with_units(4),
            JudgeConfig::new("paid", Provider::OpenAi).with_cost_per_unit(0.25),
        )];
        let request = ConsensusRequest::new("x", VotingStrategy::Majority);
        let result = orchestrator().detect(&snapshot, &request).await.unwrap();
        assert!((result.total_cost - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_units_capped_at_max() {
        let snapshot = vec![handle(
            StaticJudge::new(true, 0.9).with_units(500),
            JudgeConfig::new("capped", Provider::OpenAi)
                .with_max_units(10)
                .with_cost_per_unit(1.0),
        )];
        let request = ConsensusRequest::new("x", VotingStrategy::Majority);
        let result = orchestrator().detect(&snapshot, &request).await.unwrap();
        assert!((result.total_cost - 10.0).abs() < 1e-9);
        assert_eq!(result.outcomes[0].opinion.as_ref().unwrap().units_used, 10);
    }
}
