//! Domain layer for the docsuite workflow engine
//!
//! This module contains the core models, errors, and the port traits that
//! external collaborators (generation service, scorer, store) implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{WorkflowError, WorkflowResult};
