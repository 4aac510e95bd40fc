//! Generation backend factory.

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::anthropic::AnthropicGenerationService;
use super::mock::MockGenerationService;
use super::ollama::OllamaGenerationService;
use super::retrying::RetryingGenerationService;
use crate::domain::errors::{WorkflowError, WorkflowResult};
use crate::domain::models::{Config, ProviderKind};
use crate::domain::ports::GenerationService;

/// Build the configured backend, wrapped with rate limiting and retry.
///
/// The mock backend is returned bare; it never fails transiently.
pub fn build_generation_service(config: &Config) -> WorkflowResult<Arc<dyn GenerationService>> {
    let generation = &config.generation;
    let timeout = Duration::from_secs(generation.timeout_secs);

    let service: Arc<dyn GenerationService> = match generation.provider {
        ProviderKind::Anthropic => {
            let backend = AnthropicGenerationService::new(
                generation.anthropic.clone(),
                generation.model.clone(),
                generation.max_tokens,
                timeout,
            )?;
            if backend.api_key().is_none() {
                return Err(WorkflowError::InvalidInput(
                    "anthropic provider selected but no API key configured (set ANTHROPIC_API_KEY)"
                        .to_string(),
                ));
            }
            Arc::new(RetryingGenerationService::new(
                backend,
                &config.rate_limit,
                config.retry.clone(),
            ))
        }
        ProviderKind::Ollama => {
            let backend = OllamaGenerationService::new(
                generation.ollama.clone(),
                generation.model.clone(),
                timeout,
            )?;
            Arc::new(RetryingGenerationService::new(
                backend,
                &config.rate_limit,
                config.retry.clone(),
            ))
        }
        ProviderKind::Mock => Arc::new(MockGenerationService::new()),
    };

    info!(provider = service.name(), "Generation service ready");
    Ok(service)
}
