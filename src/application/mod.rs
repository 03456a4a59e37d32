//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic with ports to implement
//! the core use cases of the application.

mod inference;
mod loader;

pub use inference::{AssessmentSettings, InferenceService};
pub use loader::{load_artifact, load_artifact_with_timeout};
