//! Adapters implementing the domain ports.

pub mod generation;
pub mod packaging;
pub mod quality;
pub mod storage;
