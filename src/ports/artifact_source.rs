//! Artifact source port: Trait for retrieving the trained pipeline.
//!
//! This trait abstracts where the artifact lives (filesystem, embedded bytes)
//! from the application logic.

use crate::domain::{ArtifactLoadError, TrainedPipelineArtifact};

/// Trait for loading a trained pipeline artifact.
///
/// Loading happens once per process; the result is validated against the
/// feature schema before it is returned.
pub trait ArtifactSource: Send + Sync {
    /// Human-readable location, for logs and error messages.
    fn location(&self) -> String;

    /// Read, verify and validate the artifact.
    ///
    /// # Errors
    /// Returns `ArtifactLoadError` if the artifact is missing, unreadable,
    /// fails integrity checks, or is incompatible with the feature schema.
    fn load(&self) -> Result<TrainedPipelineArtifact, ArtifactLoadError>;
}

/// An artifact held in memory, e.g. compiled in with `include_bytes!`.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    label: String,
    bytes: Vec<u8>,
}

impl InMemorySource {
    #[must_use]
    pub fn new(label: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            label: label.into(),
            bytes: bytes.into(),
        }
    }
}

impl ArtifactSource for InMemorySource {
    fn location(&self) -> String {
        self.label.clone()
    }

    fn load(&self) -> Result<TrainedPipelineArtifact, ArtifactLoadError> {
        TrainedPipelineArtifact::from_json_slice(&self.bytes)
    }
}
