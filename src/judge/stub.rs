//! Deterministic in-process judges
//!
//! Used by the test suite and as fixtures when wiring the orchestrator
//! without any remote backend.

use std::time::Duration;

use async_trait::async_trait;

use super::{Judge, JudgeError, Verdict};

/// A judge that always returns the same verdict
pub struct StaticJudge {
    is_flagged: bool,
    confidence: f64,
    reasoning: String,
    units: u32,
}

impl StaticJudge {
    pub fn new(is_flagged: bool, confidence: f64) -> Self {
        Self {
            is_flagged,
            confidence,
            reasoning: String::new(),
            units: 1,
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    pub fn with_units(mut self, units: u32) -> Self {
        self.units = units;
        self
    }
}

#[async_trait]
impl Judge for StaticJudge {
    async fn evaluate(&self, _content: &str, _context: Option<&str>) -> Result<Verdict, JudgeError> {
        Ok(Verdict::new(self.is_flagged, self.confidence)
            .with_reasoning(self.reasoning.clone())
            .with_units(self.units))
    }
}

/// A judge whose every call fails with an invocation error
pub struct FailingJudge {
    message: String,
}

impl FailingJudge {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl Judge for FailingJudge {
    async fn evaluate(&self, _content: &str, _context: Option<&str>) -> Result<Verdict, JudgeError> {
        Err(JudgeError::RequestFailed(self.message.clone()))
    }
}

/// A judge that sleeps before answering, for exercising timeouts
pub struct SlowJudge {
    delay: Duration,
    verdict: Verdict,
}

impl SlowJudge {
    pub fn new(delay: Duration, is_flagged: bool, confidence: f64) -> Self {
        Self {
            delay,
            verdict: Verdict::new(is_flagged, confidence),
        }
    }
}

#[async_trait]
impl Judge for SlowJudge {
    async fn evaluate(&self, _content: &str, _context: Option<&str>) -> Result<Verdict, JudgeError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.verdict.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_judge() {
        let judge = StaticJudge::new(true, 0.95).with_reasoning("fixture");
        let verdict = judge.evaluate("anything", None).await.unwrap();
        assert!(verdict.is_flagged);
        assert_eq!(verdict.confidence, 0.95);
        assert_eq!(verdict.reasoning, "fixture");
    }

    #[tokio::test]
    async fn test_failing_judge() {
        let judge = FailingJudge::new("backend down");
        let err = judge.evaluate("anything", None).await.unwrap_err();
        assert!(matches!(err, JudgeError::RequestFailed(_)));
    }
}
