//! Generation port - interface for text-generation backends.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Per-request generation settings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GenerationOptions {
    /// System prompt, if the backend supports one.
    pub system: Option<String>,
    /// Model override; the backend default is used when unset.
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Identifies the request in logs, e.g. `requirements` or `requirements:improve`.
    pub label: String,
}

impl GenerationOptions {
    pub fn labelled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }
}

/// Errors returned by a generation backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("Rate limited by provider")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Transient generation error: {0}")]
    Transient(String),

    #[error("Generation request rejected: {0}")]
    Permanent(String),

    #[error("Generation failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

impl GenerationError {
    /// Whether retrying the same request may succeed.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transient(_))
    }
}

/// Trait for text-generation implementations.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    /// Produce text for `prompt`.
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, GenerationError>;
}
