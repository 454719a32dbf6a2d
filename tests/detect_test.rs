//! Detection test suite: end-to-end consensus evaluation over stub judges.
//!
//! Covers the parallel strategies: weighted and unanimous scenarios, quorum
//! enforcement, per-call failure recovery, result bounds, idempotence, and
//! cancellation.

use std::sync::Arc;
use std::time::Duration;

use jury::judge::{FailingJudge, Judge, SlowJudge, StaticJudge};
use jury::{
    ConsensusRequest, DetectError, EnsembleService, JudgeConfig, Provider, VotingStrategy,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn service_with(judges: Vec<(JudgeConfig, Arc<dyn Judge>)>) -> EnsembleService {
    init_tracing();
    let service = EnsembleService::new();
    for (config, backend) in judges {
        service.register_judge(config, backend).unwrap();
    }
    service
}

fn static_judge(flagged: bool, confidence: f64) -> Arc<dyn Judge> {
    Arc::new(StaticJudge::new(flagged, confidence))
}

// ── Weighted and unanimous scenarios ──────────────────────────────────

#[tokio::test]
async fn weighted_two_flagged_judges() {
    let service = service_with(vec![
        (
            JudgeConfig::new("strict", Provider::Anthropic).with_weight(1.2),
            static_judge(true, 0.98),
        ),
        (
            JudgeConfig::new("lenient", Provider::OpenAi).with_weight(1.1),
            static_judge(true, 0.95),
        ),
    ]);

    let request = ConsensusRequest::new("offending text", VotingStrategy::Weighted);
    let result = service.detect(&request).await.unwrap();

    // score = (1.2*0.98 + 1.1*0.95) / 2.3 ~= 0.965
    assert!(result.is_flagged);
    assert!((result.confidence - 0.965).abs() < 0.005);
    assert_eq!(result.agreement_score, 1.0);
    assert_eq!(result.judges_participated, 2);
    assert_eq!(result.judges_agreed, 2);
}

#[tokio::test]
async fn unanimous_dissent_forces_flagged() {
    let service = service_with(vec![
        (
            JudgeConfig::new("a", Provider::Local),
            static_judge(true, 0.9),
        ),
        (
            JudgeConfig::new("b", Provider::Local),
            static_judge(true, 0.85),
        ),
        (
            JudgeConfig::new("c", Provider::Local),
            static_judge(false, 0.7),
        ),
    ]);

    let request = ConsensusRequest::new("contested text", VotingStrategy::Unanimous);
    let result = service.detect(&request).await.unwrap();

    assert!(result.is_flagged);
    assert!((result.agreement_score - 2.0 / 3.0).abs() < 1e-9);
    assert_eq!(result.judges_agreed, 2);
    assert!(result.final_reasoning.contains("dissent"));
}

#[tokio::test]
async fn unanimous_full_agreement_scores_one() {
    let service = service_with(vec![
        (
            JudgeConfig::new("a", Provider::Local),
            static_judge(false, 0.9),
        ),
        (
            JudgeConfig::new("b", Provider::Local),
            static_judge(false, 0.95),
        ),
    ]);

    let request = ConsensusRequest::new("benign text", VotingStrategy::Unanimous);
    let result = service.detect(&request).await.unwrap();

    assert!(!result.is_flagged);
    assert_eq!(result.agreement_score, 1.0);
}

// ── Quorum enforcement ────────────────────────────────────────────────

#[tokio::test]
async fn quorum_checked_before_dispatch() {
    let service = service_with(vec![
        (
            JudgeConfig::new("a", Provider::Local),
            static_judge(true, 0.9),
        ),
        (
            JudgeConfig::new("b", Provider::Local),
            static_judge(true, 0.9),
        ),
    ]);

    let request = ConsensusRequest::new("text", VotingStrategy::Majority).with_min_judges(3);
    let err = service.detect(&request).await.unwrap_err();
    assert!(matches!(
        err,
        DetectError::InsufficientJudges { got: 2, need: 3 }
    ));
    // No call was made: the tracker has never seen these judges
    assert!(service.performance().is_empty());
}

#[tokio::test]
async fn quorum_breached_by_failures() {
    let service = service_with(vec![
        (
            JudgeConfig::new("ok", Provider::Local),
            static_judge(true, 0.9),
        ),
        (
            JudgeConfig::new("down", Provider::Local),
            Arc::new(FailingJudge::new("backend down")),
        ),
    ]);

    let request = ConsensusRequest::new("text", VotingStrategy::Majority).with_min_judges(2);
    let err = service.detect(&request).await.unwrap_err();
    assert!(matches!(
        err,
        DetectError::InsufficientJudges { got: 1, need: 2 }
    ));
}

// ── Per-call failure recovery ─────────────────────────────────────────

#[tokio::test]
async fn timeout_recovered_and_recorded() {
    let service = service_with(vec![
        (
            JudgeConfig::new("a", Provider::Local),
            static_judge(true, 0.9),
        ),
        (
            JudgeConfig::new("b", Provider::Local),
            static_judge(true, 0.8),
        ),
        (
            JudgeConfig::new("slow", Provider::Local).with_timeout_ms(50),
            Arc::new(SlowJudge::new(Duration::from_secs(5), false, 0.9)),
        ),
    ]);

    let request = ConsensusRequest::new("text", VotingStrategy::Majority).with_min_judges(2);
    let result = service.detect(&request).await.unwrap();

    // The two healthy judges carry the request
    assert!(result.is_flagged);
    assert_eq!(result.judges_participated, 2);
    assert_eq!(result.outcomes.len(), 3);

    // The timed-out judge is accounted as a failure
    let stat = service.performance_for("slow").unwrap();
    assert_eq!(stat.total_calls, 1);
    assert_eq!(stat.failed_calls, 1);
    let timed_out = result
        .outcomes
        .iter()
        .find(|o| o.judge_name == "slow")
        .unwrap();
    assert!(!timed_out.is_success());
}

#[tokio::test]
async fn invocation_error_excluded_from_voting() {
    let service = service_with(vec![
        (
            JudgeConfig::new("ok", Provider::Local),
            static_judge(false, 0.9),
        ),
        (
            JudgeConfig::new("down", Provider::Local),
            Arc::new(FailingJudge::new("connection refused")),
        ),
    ]);

    let request = ConsensusRequest::new("text", VotingStrategy::Majority);
    let result = service.detect(&request).await.unwrap();

    // Only the healthy opinion voted
    assert!(!result.is_flagged);
    assert_eq!(result.judges_participated, 1);
    assert_eq!(result.agreement_score, 1.0);
    assert_eq!(service.performance_for("down").unwrap().failed_calls, 1);
}

// ── Result invariants ─────────────────────────────────────────────────

#[tokio::test]
async fn bounds_hold_across_strategies() {
    let service = service_with(vec![
        (
            JudgeConfig::new("a", Provider::Local).with_weight(0.3),
            static_judge(true, 1.0),
        ),
        (
            JudgeConfig::new("b", Provider::Local).with_weight(2.0),
            static_judge(false, 0.1),
        ),
        (
            JudgeConfig::new("c", Provider::Local),
            static_judge(true, 0.5),
        ),
    ]);

    for strategy in [
        VotingStrategy::Majority,
        VotingStrategy::Weighted,
        VotingStrategy::Unanimous,
        VotingStrategy::Threshold,
    ] {
        let request = ConsensusRequest::new("text", strategy).with_confidence_threshold(0.6);
        let result = service.detect(&request).await.unwrap();
        assert!(
            (0.0..=1.0).contains(&result.confidence),
            "confidence out of bounds for {}",
            strategy
        );
        assert!(
            (0.0..=1.0).contains(&result.agreement_score),
            "agreement out of bounds for {}",
            strategy
        );
    }
}

#[tokio::test]
async fn repeated_detection_is_deterministic() {
    let service = service_with(vec![
        (
            JudgeConfig::new("a", Provider::Local).with_cost_per_unit(0.01),
            static_judge(true, 0.8),
        ),
        (
            JudgeConfig::new("b", Provider::Local).with_cost_per_unit(0.02),
            static_judge(false, 0.6),
        ),
    ]);

    let request = ConsensusRequest::new("text", VotingStrategy::Weighted);
    let first = service.detect(&request).await.unwrap();
    for _ in 0..5 {
        let next = service.detect(&request).await.unwrap();
        assert_eq!(next.is_flagged, first.is_flagged);
        assert_eq!(next.confidence, first.confidence);
        assert_eq!(next.agreement_score, first.agreement_score);
        assert_eq!(next.judges_participated, first.judges_participated);
        assert_eq!(next.judges_agreed, first.judges_agreed);
        assert_eq!(next.total_cost, first.total_cost);
        assert_eq!(next.final_reasoning, first.final_reasoning);
    }
}

// ── Validation before dispatch ────────────────────────────────────────

#[tokio::test]
async fn threshold_without_parameter_fails_fast() {
    let service = service_with(vec![(
        JudgeConfig::new("a", Provider::Local),
        static_judge(true, 0.9),
    )]);

    let request = ConsensusRequest::new("text", VotingStrategy::Threshold);
    let err = service.detect(&request).await.unwrap_err();
    assert!(matches!(err, DetectError::InvalidStrategy(_)));
    assert!(service.performance().is_empty());
}

// ── Cancellation ──────────────────────────────────────────────────────

#[tokio::test]
async fn cancellation_aborts_in_flight_calls() {
    let service = service_with(vec![
        (
            JudgeConfig::new("slow-1", Provider::Local).with_timeout_ms(60_000),
            Arc::new(SlowJudge::new(Duration::from_secs(30), true, 0.9)),
        ),
        (
            JudgeConfig::new("slow-2", Provider::Local).with_timeout_ms(60_000),
            Arc::new(SlowJudge::new(Duration::from_secs(30), false, 0.9)),
        ),
    ])
    .shared();

    let (tx, rx) = tokio::sync::watch::channel(false);
    let request = ConsensusRequest::new("text", VotingStrategy::Majority);

    let task = {
        let service = service.clone();
        tokio::spawn(async move { service.detect_with_cancel(&request, rx).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    tx.send(true).unwrap();

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, DetectError::Cancelled));
}
