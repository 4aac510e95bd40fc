//! Artifact and run persistence.

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryArtifactStore;
pub use sqlite::SqliteArtifactStore;
