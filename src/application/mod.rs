//! Application layer: wiring adapters and services into a runnable workflow.

pub mod bootstrap;

pub use bootstrap::Services;
