//! Anthropic Messages API generation backend.

use async_trait::async_trait;
use reqwest::{header, Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::domain::errors::{WorkflowError, WorkflowResult};
use crate::domain::models::AnthropicConfig;
use crate::domain::ports::{GenerationError, GenerationOptions, GenerationService};

/// Status Anthropic uses when the API is overloaded.
const STATUS_OVERLOADED: u16 = 529;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum MessageRole {
    User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Serialize)]
struct Message {
    role: MessageRole,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

/// Calls `POST {base_url}/v1/messages`.
pub struct AnthropicGenerationService {
    config: AnthropicConfig,
    client: Client,
    default_model: String,
    default_max_tokens: u32,
}

impl AnthropicGenerationService {
    pub fn new(
        config: AnthropicConfig,
        default_model: impl Into<String>,
        default_max_tokens: u32,
        timeout: Duration,
    ) -> WorkflowResult<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            WorkflowError::InvalidInput(format!("Failed to create HTTP client: {e}"))
        })?;

        Ok(Self {
            config,
            client,
            default_model: default_model.into(),
            default_max_tokens,
        })
    }

    /// API key from config or `ANTHROPIC_API_KEY`.
    pub fn api_key(&self) -> Option<String> {
        self.config
            .api_key
            .clone()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
    }

    fn build_request(&self, prompt: &str, options: &GenerationOptions) -> MessagesRequest {
        MessagesRequest {
            model: options
                .model
                .clone()
                .unwrap_or_else(|| self.default_model.clone()),
            max_tokens: options.max_tokens.unwrap_or(self.default_max_tokens),
            system: options.system.clone().filter(|s| !s.is_empty()),
            messages: vec![Message {
                role: MessageRole::User,
                content: vec![ContentBlock::Text {
                    text: prompt.to_string(),
                }],
            }],
            temperature: options.temperature,
        }
    }
}

/// Map a non-success response to a classified error.
pub(crate) async fn classify_status(response: Response) -> GenerationError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = response.text().await.unwrap_or_default();

    if status == StatusCode::TOO_MANY_REQUESTS {
        GenerationError::RateLimited { retry_after }
    } else if status.is_server_error() || status.as_u16() == STATUS_OVERLOADED {
        GenerationError::Transient(format!("API error {status}: {body}"))
    } else {
        GenerationError::Permanent(format!("API error {status}: {body}"))
    }
}

/// Network failures and timeouts are worth retrying; anything else is not.
pub(crate) fn classify_request_error(err: &reqwest::Error) -> GenerationError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        GenerationError::Transient(format!("Request failed: {err}"))
    } else {
        GenerationError::Permanent(format!("Request failed: {err}"))
    }
}

#[async_trait]
impl GenerationService for AnthropicGenerationService {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, GenerationError> {
        let api_key = self
            .api_key()
            .ok_or_else(|| GenerationError::Permanent("ANTHROPIC_API_KEY not set".to_string()))?;

        let request = self.build_request(prompt, options);
        debug!(label = %options.label, model = %request.model, "Sending Anthropic request");

        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.base_url))
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-api-key", &api_key)
            .header("anthropic-version", &self.config.api_version)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_request_error(&e))?;

        if !response.status().is_success() {
            return Err(classify_status(response).await);
        }

        let result: MessagesResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Transient(format!("Failed to parse response: {e}")))?;

        let text = result
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        debug!(
            label = %options.label,
            stop_reason = ?result.stop_reason,
            chars = text.len(),
            "Anthropic response received"
        );
        Ok(text)
    }
}
