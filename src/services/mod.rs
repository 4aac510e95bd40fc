//! Service layer: scheduling, quality gating and workflow coordination.

pub mod coordinator;
pub mod dependency_resolver;
pub mod document_improver;
pub mod parallel_executor;
pub mod quality_gate;
pub mod task_catalog;

pub use coordinator::{new_project_id, CoordinatorSettings, WorkflowCoordinator, WorkflowEvent};
pub use dependency_resolver::DependencyResolver;
pub use document_improver::DocumentImprover;
pub use parallel_executor::{DependencyOutputs, ExecutionEvent, ParallelExecutor};
pub use quality_gate::{run_with_gate, QualityGate};
pub use task_catalog::{PromptSettings, TaskCatalog};
