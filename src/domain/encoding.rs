//! Preprocessing transform: patient record to feature vector.
//!
//! Continuous features are standardized with the mean/variance captured at
//! training time; `famhist` is one-hot encoded with the training-time
//! category list and appended.

use serde::{Deserialize, Serialize};

use super::artifact::{ArtifactLoadError, TrainedPipelineArtifact};
use super::patient::{FamilyHistory, PatientRecord};
use super::schema::Feature;
use crate::CardioRiskError;

/// What to do with a `famhist` value the artifact was not fitted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownCategoryPolicy {
    /// Reject the record.
    #[default]
    Strict,
    /// Encode as the all-zero "unknown" block.
    UnknownBucket,
}

impl std::str::FromStr for UnknownCategoryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "strict" => Ok(Self::Strict),
            "unknown_bucket" | "unknown-bucket" => Ok(Self::UnknownBucket),
            other => Err(format!(
                "unknown category policy {other:?} (expected strict or unknown_bucket)"
            )),
        }
    }
}

/// Errors raised while turning a record into model input.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncodingError {
    #[error("{feature}: category {value:?} was not seen at training time (known: {known:?})")]
    UnknownCategory {
        feature: Feature,
        value: String,
        known: Vec<String>,
    },

    #[error("Feature count mismatch: got {got}, expected {expected}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Numeric model input: standardized continuous values followed by the
/// one-hot `famhist` block.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    #[must_use]
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

impl AsRef<[f64]> for FeatureVector {
    fn as_ref(&self) -> &[f64] {
        &self.0
    }
}

/// Fitted preprocessing parameters extracted from an artifact.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    continuous: Vec<Feature>,
    mean: Vec<f64>,
    scale: Vec<f64>,
    categories: Vec<String>,
    policy: UnknownCategoryPolicy,
}

impl Preprocessor {
    /// Extract the scaler and encoder parameters from an artifact.
    ///
    /// # Errors
    /// Returns `ArtifactLoadError` if the artifact does not match the schema.
    pub fn from_artifact(
        artifact: &TrainedPipelineArtifact,
        policy: UnknownCategoryPolicy,
    ) -> Result<Self, ArtifactLoadError> {
        artifact.validate()?;
        Ok(Self {
            continuous: artifact.continuous_features()?,
            mean: artifact.scaler.mean.clone(),
            scale: artifact.scaler.scale(),
            categories: artifact.categories.clone(),
            policy,
        })
    }

    /// Continuous columns in scaler order.
    #[must_use]
    pub fn continuous_features(&self) -> &[Feature] {
        &self.continuous
    }

    #[must_use]
    pub fn policy(&self) -> UnknownCategoryPolicy {
        self.policy
    }

    /// Length of the vectors this preprocessor produces.
    #[must_use]
    pub fn output_dim(&self) -> usize {
        self.continuous.len() + self.categories.len()
    }

    /// Validate a record, then encode it.
    ///
    /// # Errors
    /// `InvalidInput` when a field is out of domain (checked before any
    /// encoding), `Encoding` when `famhist` was not seen at training time
    /// under the strict policy.
    pub fn encode(&self, record: &PatientRecord) -> Result<FeatureVector, CardioRiskError> {
        record.validate(self.policy)?;
        let values = record.continuous_values(&self.continuous);
        Ok(self.encode_values(&values, &record.famhist)?)
    }

    /// Encode raw continuous values that are already in scaler order.
    ///
    /// # Errors
    /// Returns `EncodingError` on a length mismatch or an unseen category
    /// under the strict policy.
    pub fn encode_values(
        &self,
        continuous: &[f64],
        famhist: &FamilyHistory,
    ) -> Result<FeatureVector, EncodingError> {
        if continuous.len() != self.continuous.len() {
            return Err(EncodingError::DimensionMismatch {
                expected: self.continuous.len(),
                got: continuous.len(),
            });
        }

        let mut out = Vec::with_capacity(self.output_dim());
        for ((x, mean), scale) in continuous.iter().zip(&self.mean).zip(&self.scale) {
            out.push((x - mean) / scale);
        }

        let label = famhist.label();
        let hit = self.categories.iter().position(|c| c == label);
        if hit.is_none() && self.policy == UnknownCategoryPolicy::Strict {
            return Err(EncodingError::UnknownCategory {
                feature: Feature::Famhist,
                value: label.to_string(),
                known: self.categories.clone(),
            });
        }
        out.extend((0..self.categories.len()).map(|i| if Some(i) == hit { 1.0 } else { 0.0 }));

        Ok(FeatureVector(out))
    }
}

/// Encode one record with the parameters fitted into `artifact`.
///
/// # Errors
/// See [`Preprocessor::encode`]; also `ArtifactLoad` if the artifact itself
/// is incompatible with the schema.
pub fn encode(
    record: &PatientRecord,
    artifact: &TrainedPipelineArtifact,
    policy: UnknownCategoryPolicy,
) -> Result<FeatureVector, CardioRiskError> {
    Preprocessor::from_artifact(artifact, policy)?.encode(record)
}
