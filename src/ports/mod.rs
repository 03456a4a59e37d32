//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the application and the decision engine and artifact storage.

mod artifact_source;
mod classifier;

pub use artifact_source::{ArtifactSource, InMemorySource};
pub use classifier::RiskClassifier;
