//! Voting engine: combines judge opinions into one decision
//!
//! Pure functions over collected opinions: no I/O, no shared state, and
//! order-independent for every strategy (cascading applies the weighted rule
//! to whatever the dispatcher collected). Ties always resolve to the flagged
//! side, the conservative outcome for content judgment.

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use crate::types::{Opinion, VotingStrategy};

/// Two scores within this distance count as an exact tie
const TIE_EPSILON: f64 = 1e-9;

/// Errors from voting
#[derive(Debug, Error)]
pub enum VotingError {
    #[error("no opinions available for voting")]
    NoOpinions,

    #[error("strategy {strategy} requires parameter {parameter}")]
    MissingParameter {
        strategy: VotingStrategy,
        parameter: &'static str,
    },
}

/// Result type for voting operations
pub type VotingResult<T> = Result<T, VotingError>;

/// Caller-supplied knobs consumed by individual strategies
#[derive(Debug, Clone, Copy, Default)]
pub struct VoteParams {
    /// Decision boundary for the threshold strategy
    pub confidence_threshold: Option<f64>,
}

/// Outcome of one voting round
#[derive(Debug, Clone)]
pub struct VoteOutcome {
    /// The combined decision
    pub is_flagged: bool,
    /// Confidence in the decision, in [0, 1]
    pub confidence: f64,
    /// Fraction of opinions matching the decision
    pub agreement_score: f64,
    /// Count of opinions matching the decision
    pub judges_agreed: usize,
    /// Human-readable account of how the decision fell
    pub reasoning: String,
}

/// Combine opinions using the requested strategy
///
/// `weights` maps judge names to their configured voting weight; judges
/// missing from the map count with weight 1.0. Weights only matter to the
/// weighted, threshold, and cascading strategies.
pub fn vote(
    opinions: &[Opinion],
    weights: &HashMap<String, f64>,
    strategy: VotingStrategy,
    params: &VoteParams,
) -> VotingResult<VoteOutcome> {
    if opinions.is_empty() {
        return Err(VotingError::NoOpinions);
    }

    debug!(
        opinions = opinions.len(),
        strategy = %strategy,
        "Voting started"
    );

    let outcome = match strategy {
        VotingStrategy::Majority => majority_vote(opinions),
        VotingStrategy::Weighted => weighted_vote(opinions, weights, 0.5, strategy),
        VotingStrategy::Unanimous => unanimous_vote(opinions),
        VotingStrategy::Threshold => {
            let boundary =
                params
                    .confidence_threshold
                    .ok_or(VotingError::MissingParameter {
                        strategy,
                        parameter: "confidence_threshold",
                    })?;
            weighted_vote(opinions, weights, boundary, strategy)
        }
        // Cascading changes dispatch, not scoring: whatever was collected
        // before the stop is combined with the weighted rule.
        VotingStrategy::Cascading => weighted_vote(opinions, weights, 0.5, strategy),
    };

    debug!(
        is_flagged = outcome.is_flagged,
        confidence = outcome.confidence,
        agreement = outcome.agreement_score,
        "Voting complete"
    );

    Ok(outcome)
}

/// Count opinions matching the decision
fn agreement(opinions: &[Opinion], decision: bool) -> (usize, f64) {
    let agreed = opinions.iter().filter(|o| o.is_flagged == decision).count();
    (agreed, agreed as f64 / opinions.len() as f64)
}

fn majority_vote(opinions: &[Opinion]) -> VoteOutcome {
    let total = opinions.len();
    let flagged = opinions.iter().filter(|o| o.is_flagged).count();
    let clear = total - flagged;

    // Exact tie resolves to flagged
    let is_flagged = flagged >= clear;
    let winning = if is_flagged { flagged } else { clear };
    let confidence = winning as f64 / total as f64;
    let (judges_agreed, agreement_score) = agreement(opinions, is_flagged);

    let reasoning = if flagged == clear {
        format!(
            "majority vote tied {} to {}; resolved to flagged as the conservative outcome",
            flagged, clear
        )
    } else {
        format!(
            "majority vote: {} of {} judges voted {}",
            winning,
            total,
            if is_flagged { "flagged" } else { "clear" }
        )
    };

    VoteOutcome {
        is_flagged,
        confidence,
        agreement_score,
        judges_agreed,
        reasoning,
    }
}

/// Confidence-weighted scoring shared by the weighted, threshold, and
/// cascading strategies
///
/// Each opinion contributes `weight * confidence` to the flagged side it
/// voted for, normalized by total weight, so the score lands in [0, 1] and
/// reflects both how many judges flagged and how sure they were. A score on
/// the boundary is a tie and resolves to flagged.
fn weighted_vote(
    opinions: &[Opinion],
    weights: &HashMap<String, f64>,
    boundary: f64,
    strategy: VotingStrategy,
) -> VoteOutcome {
    let mut flagged_mass = 0.0;
    let mut total_weight = 0.0;

    for opinion in opinions {
        let weight = weights.get(&opinion.judge_name).copied().unwrap_or(1.0);
        total_weight += weight;
        if opinion.is_flagged {
            flagged_mass += weight * opinion.confidence;
        }
    }

    if total_weight <= TIE_EPSILON {
        // All weights zero: no signal either way, treat as an exact tie
        let (judges_agreed, agreement_score) = agreement(opinions, true);
        return VoteOutcome {
            is_flagged: true,
            confidence: 0.5,
            agreement_score,
            judges_agreed,
            reasoning: format!(
                "{} vote over {} opinions carried no weight; resolved to flagged",
                strategy,
                opinions.len()
            ),
        };
    }

    let score = flagged_mass / total_weight;
    let tied = (score - boundary).abs() < TIE_EPSILON;
    let is_flagged = tied || score > boundary;
    // Confidence in the decision, not in flagged-ness: distance from the
    // boundary reflected onto whichever side won
    let confidence = if tied {
        0.5
    } else if is_flagged {
        score
    } else {
        1.0 - score
    };
    let (judges_agreed, agreement_score) = agreement(opinions, is_flagged);

    let reasoning = format!(
        "{} vote: score {:.3} against boundary {:.2} over {} opinions -> {}",
        strategy,
        score,
        boundary,
        opinions.len(),
        if is_flagged { "flagged" } else { "clear" }
    );

    VoteOutcome {
        is_flagged,
        confidence: confidence.clamp(0.0, 1.0),
        agreement_score,
        judges_agreed,
        reasoning,
    }
}

fn unanimous_vote(opinions: &[Opinion]) -> VoteOutcome {
    let total = opinions.len();
    let flagged = opinions.iter().filter(|o| o.is_flagged).count();
    let mean_confidence = opinions.iter().map(|o| o.confidence).sum::<f64>() / total as f64;

    if flagged == total || flagged == 0 {
        let is_flagged = flagged == total;
        return VoteOutcome {
            is_flagged,
            confidence: mean_confidence.clamp(0.0, 1.0),
            agreement_score: 1.0,
            judges_agreed: total,
            reasoning: format!(
                "unanimous vote: all {} judges voted {}",
                total,
                if is_flagged { "flagged" } else { "clear" }
            ),
        };
    }

    // Any dissent resolves to flagged; confidence is capped at the lowest
    // confidence among the dissenting (clear-voting) opinions
    let min_dissent = opinions
        .iter()
        .filter(|o| !o.is_flagged)
        .map(|o| o.confidence)
        .fold(f64::INFINITY, f64::min);
    let confidence = mean_confidence.min(min_dissent);
    let (judges_agreed, agreement_score) = agreement(opinions, true);

    VoteOutcome {
        is_flagged: true,
        confidence: confidence.clamp(0.0, 1.0),
        agreement_score,
        judges_agreed,
        reasoning: format!(
            "unanimous vote failed: {} of {} judges dissented; resolved to flagged",
            total - flagged,
            total
        ),
    }
}
