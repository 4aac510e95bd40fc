//! Ollama generation backend.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::anthropic::{classify_request_error, classify_status};
use crate::domain::errors::{WorkflowError, WorkflowResult};
use crate::domain::models::OllamaConfig;
use crate::domain::ports::{GenerationError, GenerationOptions, GenerationService};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    options: ModelOptions,
}

#[derive(Debug, Serialize)]
struct ModelOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Calls `POST {base_url}/api/generate` with streaming disabled.
pub struct OllamaGenerationService {
    config: OllamaConfig,
    client: Client,
    default_model: String,
}

impl OllamaGenerationService {
    pub fn new(
        config: OllamaConfig,
        default_model: impl Into<String>,
        timeout: Duration,
    ) -> WorkflowResult<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            WorkflowError::InvalidInput(format!("Failed to create HTTP client: {e}"))
        })?;
        Ok(Self {
            config,
            client,
            default_model: default_model.into(),
        })
    }
}

#[async_trait]
impl GenerationService for OllamaGenerationService {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, GenerationError> {
        let model = options.model.as_deref().unwrap_or(&self.default_model);
        let request = GenerateRequest {
            model,
            prompt,
            system: options.system.as_deref(),
            stream: false,
            options: ModelOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
            },
        };
        debug!(label = %options.label, model, "Sending Ollama request");

        let response = self
            .client
            .post(format!(
                "{}/api/generate",
                self.config.base_url.trim_end_matches('/')
            ))
            .header(header::CONTENT_TYPE, "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_request_error(&e))?;

        if !response.status().is_success() {
            return Err(classify_status(response).await);
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Transient(format!("Failed to parse response: {e}")))?;
        Ok(body.response)
    }
}
