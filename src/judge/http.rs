//! Generic HTTP judge adapter
//!
//! Speaks a small JSON contract any remote scorer can implement: POST the
//! content, get back a flag and a confidence. Vendor-specific wrappers
//! (LLM APIs behind a proxy, hosted classifiers) all fit behind this one
//! adapter as long as they answer this shape.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Judge, JudgeError, Verdict};

/// Wire request sent to a remote judge endpoint
#[derive(Debug, Serialize)]
struct EvaluateRequest<'a> {
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a str>,
}

/// Wire response expected from a remote judge endpoint
#[derive(Debug, Deserialize)]
struct EvaluateResponse {
    is_flagged: bool,
    confidence: f64,
    #[serde(default)]
    reasoning: String,
    #[serde(default = "default_units")]
    units_used: u32,
}

fn default_units() -> u32 {
    1
}

/// A judge backed by a remote HTTP scoring endpoint
pub struct HttpJudge {
    url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpJudge {
    /// Create an adapter for the given endpoint
    ///
    /// The client timeout is a transport-level backstop; the orchestrator
    /// applies the judge's configured per-call timeout on top of it.
    pub fn new(url: impl Into<String>) -> Result<Self, JudgeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| JudgeError::Unavailable(e.to_string()))?;

        Ok(Self {
            url: url.into(),
            api_key: None,
            client,
        })
    }

    /// Attach a bearer token sent on every request
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

#[async_trait]
impl Judge for HttpJudge {
    async fn evaluate(&self, content: &str, context: Option<&str>) -> Result<Verdict, JudgeError> {
        let body = EvaluateRequest { content, context };

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| JudgeError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(JudgeError::RequestFailed(format!(
                "judge endpoint error ({}): {}",
                status, body
            )));
        }

        let parsed: EvaluateResponse = response
            .json()
            .await
            .map_err(|e| JudgeError::ParseError(e.to_string()))?;

        Ok(Verdict::new(parsed.is_flagged, parsed.confidence)
            .with_reasoning(parsed.reasoning)
            .with_units(parsed.units_used))
    }
}
