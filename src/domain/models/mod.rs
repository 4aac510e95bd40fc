pub mod config;
pub mod document;
pub mod quality;
pub mod task;
pub mod workflow;

pub use config::{
    AnthropicConfig, Config, GenerationConfig, LogFormat, LoggingConfig, OllamaConfig,
    ProviderKind, RateLimitConfig, RetryConfig, RotationPolicy, StorageBackend, StorageConfig,
    WorkflowConfig,
};
pub use document::{Artifact, DocumentLevel, DocumentType};
pub use quality::{default_quality_threshold, QualityReport, QualityRequirements};
pub use task::{
    GenerationInput, InputBuilder, ResolvedDependencies, SharedInputs, TaskDescriptor,
    TaskExecution, TaskStatus,
};
pub use workflow::{
    PackagingOutcome, Phase, PhaseSummary, Profile, RunStatus, RunSummary, WorkflowRun,
};
