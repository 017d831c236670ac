//! KoboldCpp-compatible HTTP client.

use crate::config::InferenceConfig;
use crate::error::{GenerationError, Result};
use crate::llm::traits::InferenceBackend;
use crate::prompts::GenerationRequest;

use anyhow::Context as _;
use serde::Deserialize;
use std::time::Duration;

const MODEL_PATH: &str = "/api/v1/model";
const GENERATE_PATH: &str = "/api/v1/generate";

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    results: Vec<GenerateResult>,
}

#[derive(Debug, Deserialize)]
struct GenerateResult {
    text: String,
}

/// Client for the inference server's `/api/v1` surface.
#[derive(Debug, Clone)]
pub struct KoboldClient {
    endpoint: String,
    /// HTTP client for making requests. Carries the request timeout.
    http_client: reqwest::Client,
}

impl KoboldClient {
    pub fn new(config: &InferenceConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .with_context(|| "failed to build HTTP client")?;

        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }
}

impl InferenceBackend for KoboldClient {
    async fn health_check(&self) -> bool {
        match self.http_client.get(self.url(MODEL_PATH)).send().await {
            Ok(response) if response.status() == reqwest::StatusCode::OK => true,
            Ok(response) => {
                tracing::warn!(
                    endpoint = %self.endpoint,
                    status = %response.status(),
                    "inference server health check failed"
                );
                false
            }
            Err(error) => {
                tracing::warn!(endpoint = %self.endpoint, %error, "inference server unreachable");
                false
            }
        }
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        tracing::debug!(
            segments = request.segments().len(),
            prompt_len = request.prompt().len(),
            "sending generation request"
        );

        let response = self
            .http_client
            .post(self.url(GENERATE_PATH))
            .json(request)
            .send()
            .await
            .map_err(|error| GenerationError::UpstreamUnavailable(error.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| GenerationError::UpstreamUnavailable(error.to_string()))?;

        if !status.is_success() {
            return Err(GenerationError::UpstreamUnavailable(format!("HTTP {status}: {body}")).into());
        }

        Ok(extract_text(&body)?)
    }

    async fn model_info(&self) -> Result<String> {
        let response = self
            .http_client
            .get(self.url(MODEL_PATH))
            .send()
            .await
            .map_err(|error| GenerationError::UpstreamUnavailable(error.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| GenerationError::UpstreamUnavailable(error.to_string()))?;

        if !status.is_success() {
            return Err(GenerationError::UpstreamUnavailable(format!("HTTP {status}: {body}")).into());
        }

        Ok(body)
    }
}

/// Pull `results[0].text` out of a generate response body.
fn extract_text(body: &str) -> std::result::Result<String, GenerationError> {
    let parsed: GenerateResponse = serde_json::from_str(body)
        .map_err(|error| GenerationError::MalformedResponse(format!("{error}: {body}")))?;

    parsed
        .results
        .into_iter()
        .next()
        .map(|result| result.text)
        .ok_or_else(|| GenerationError::MalformedResponse(format!("no results: {body}")))
}
