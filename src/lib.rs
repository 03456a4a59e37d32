//! # CardioRisk
//!
//! Cardiovascular risk inference for a single patient record.
//!
//! This crate provides:
//! - The fixed ten-feature patient schema and its validation
//! - The fitted preprocessing transform (standardization + one-hot encoding)
//! - The nearest-neighbor decision contract over a trained pipeline artifact
//! - Risk tiering and per-factor presentation scores
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core types (PatientRecord, FeatureVector, artifact schema, RiskTier)
//! - `ports`: Trait definitions for the classifier and the artifact source
//! - `adapters`: Concrete implementations (KNN engine, filesystem loader, log sanitizer)
//! - `application`: The inference service and artifact bootstrap
//! - `config`: Runtime configuration (file + environment)

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use application::InferenceService;
pub use config::Config;
pub use domain::{
    ArtifactLoadError, EncodingError, FamilyHistory, FeatureVector, InvalidInputError,
    PatientForm, PatientRecord, PredictionResult, RiskAssessment, RiskTier,
    TrainedPipelineArtifact,
};

/// Result type for CardioRisk operations
pub type Result<T> = std::result::Result<T, CardioRiskError>;

/// Main error type for CardioRisk
#[derive(Debug, thiserror::Error)]
pub enum CardioRiskError {
    #[error("Invalid patient data: {0}")]
    InvalidInput(#[from] InvalidInputError),

    #[error("Artifact load failed: {0}")]
    ArtifactLoad(#[from] ArtifactLoadError),

    #[error("Encoding failed: {0}")]
    Encoding(#[from] EncodingError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
