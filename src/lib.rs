//! docsuite - documentation suite generator
//!
//! Turns a one-paragraph project idea into a complete set of software
//! documents. Generation runs in three phases: gated foundational documents,
//! dependent secondary documents, and packaging. Tasks within a phase run
//! concurrently once their dependencies complete.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and port traits
//! - **Service Layer** (`services`): dependency resolution, parallel execution,
//!   quality gating and workflow coordination
//! - **Adapters** (`adapters`): generation backends, scorer, storage, packaging
//! - **Application Layer** (`application`): process-scoped service wiring
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface

pub mod adapters;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use application::Services;
pub use domain::errors::{WorkflowError, WorkflowResult};
pub use domain::models::{Artifact, Config, DocumentType, Profile, RunStatus, WorkflowRun};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{DependencyResolver, ParallelExecutor, WorkflowCoordinator};
