//! Text-generation backends.

pub mod anthropic;
pub mod mock;
pub mod ollama;
pub mod registry;
pub mod retrying;

pub use anthropic::AnthropicGenerationService;
pub use mock::{MockGenerationService, MockResponse, RecordedCall};
pub use ollama::OllamaGenerationService;
pub use registry::build_generation_service;
pub use retrying::RetryingGenerationService;
