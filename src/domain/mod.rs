//! Domain layer: Core business types and logic.
//!
//! Pure types with strict validation: the feature schema, patient records,
//! the fitted preprocessing transform, the artifact schema and risk tiering.

mod artifact;
pub mod encoding;
pub mod factors;
mod patient;
mod risk;
pub mod schema;

pub use artifact::{
    ArtifactLoadError, ArtifactMetadata, ArtifactSummary, NeighborModel, Projection,
    ScalerParams, TrainedPipelineArtifact, Weighting, ARTIFACT_SCHEMA_VERSION,
};
pub use encoding::{encode, EncodingError, FeatureVector, Preprocessor, UnknownCategoryPolicy};
pub use factors::{factor_scores, FactorCeilings, FactorScores, RiskFactor};
pub use patient::{FamilyHistory, FieldViolation, InvalidInputError, PatientForm, PatientRecord};
pub use risk::{tier, PredictionResult, RiskAssessment, RiskTier, TierThresholds};
pub use schema::{Feature, FeatureDomain};

#[cfg(test)]
pub(crate) use artifact::tests::tiny_artifact;
