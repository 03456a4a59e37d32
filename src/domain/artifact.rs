//! Trained pipeline artifact: explicit, versioned schema for the fitted
//! scaler, category list, PCA projection and nearest-neighbor reference set.
//!
//! This matches the JSON document exported by the training procedure
//! (`model.json`). The artifact is read-only once loaded and is shared
//! behind an `Arc`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::schema::{Feature, CONTINUOUS_ORDER, FAMHIST_CATEGORIES, MIN_CONTINUOUS_FEATURES};

/// Artifact schema version understood by this build.
pub const ARTIFACT_SCHEMA_VERSION: u32 = 1;

/// Errors raised while locating, reading, verifying or validating an artifact.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArtifactLoadError {
    #[error("Artifact not found at {0:?}")]
    NotFound(PathBuf),

    #[error("Artifact unreadable: {0}")]
    Unreadable(String),

    #[error("Malformed artifact: {0}")]
    Malformed(String),

    #[error("Unsupported artifact schema version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("Artifact incompatible with feature schema: {0}")]
    SchemaMismatch(String),

    #[error("Artifact integrity check failed: {0}")]
    Integrity(String),

    #[error("Artifact load timed out after {0:?}")]
    Timeout(Duration),
}

/// Standard scaler parameters, one entry per continuous column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScalerParams {
    pub mean: Vec<f64>,
    pub var: Vec<f64>,
}

impl ScalerParams {
    /// Per-column scale: `sqrt(var)`, with zero variance mapped to 1.
    #[must_use]
    pub fn scale(&self) -> Vec<f64> {
        self.var
            .iter()
            .map(|&v| if v == 0.0 { 1.0 } else { v.sqrt() })
            .collect()
    }
}

/// Fitted PCA: `y = (x - mean) · componentsᵀ`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Projection {
    pub mean: Vec<f64>,
    /// One row per retained component, each of length `input_dim`.
    pub components: Vec<Vec<f64>>,
}

impl Projection {
    #[must_use]
    pub fn input_dim(&self) -> usize {
        self.mean.len()
    }

    #[must_use]
    pub fn n_components(&self) -> usize {
        self.components.len()
    }

    /// Project one input vector. The caller checks the length.
    #[must_use]
    pub fn apply(&self, x: &[f64]) -> Vec<f64> {
        self.components
            .iter()
            .map(|row| {
                row.iter()
                    .zip(x.iter().zip(&self.mean))
                    .map(|(c, (xi, mi))| (xi - mi) * c)
                    .sum()
            })
            .collect()
    }
}

/// Neighbor vote weighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weighting {
    Uniform,
    Distance,
}

impl std::fmt::Display for Weighting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uniform => write!(f, "uniform"),
            Self::Distance => write!(f, "distance"),
        }
    }
}

/// Fitted nearest-neighbor model: the reference set in projected space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NeighborModel {
    pub n_neighbors: usize,
    pub weights: Weighting,
    pub points: Vec<Vec<f64>>,
    /// Outcome per reference point (0 = no CHD, 1 = CHD).
    pub labels: Vec<u8>,
}

/// Free-form provenance recorded by the training procedure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    #[serde(default)]
    pub trained_at: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// The fitted pipeline, as exported by training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrainedPipelineArtifact {
    pub schema_version: u32,
    /// Continuous columns the scaler was fitted on, in order.
    pub numeric_features: Vec<String>,
    pub scaler: ScalerParams,
    pub categorical_feature: String,
    /// Categories seen at training time, in one-hot column order.
    pub categories: Vec<String>,
    pub projection: Projection,
    pub neighbors: NeighborModel,
    #[serde(default)]
    pub metadata: ArtifactMetadata,
}

/// Short description of a loaded artifact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactSummary {
    pub schema_version: u32,
    pub numeric_features: Vec<String>,
    pub categories: Vec<String>,
    pub input_dim: usize,
    pub n_components: usize,
    pub n_reference_points: usize,
    pub positive_share: f64,
    pub n_neighbors: usize,
    pub weights: Weighting,
    pub metadata: ArtifactMetadata,
}

fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}

impl TrainedPipelineArtifact {
    /// Parse and validate an artifact from JSON bytes.
    ///
    /// # Errors
    /// `Malformed` if the JSON does not match the schema, otherwise any
    /// error from [`Self::validate`].
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ArtifactLoadError> {
        let artifact: Self = serde_json::from_slice(bytes)
            .map_err(|e| ArtifactLoadError::Malformed(e.to_string()))?;
        artifact.validate()?;
        Ok(artifact)
    }

    /// Width of the encoded feature vector (continuous + one-hot).
    #[must_use]
    pub fn input_dim(&self) -> usize {
        self.numeric_features.len() + self.categories.len()
    }

    /// Continuous columns as schema features, checked against the fixed order.
    ///
    /// # Errors
    /// Returns `SchemaMismatch` unless the declared columns are the first 8
    /// or all 9 entries of [`CONTINUOUS_ORDER`].
    pub fn continuous_features(&self) -> Result<Vec<Feature>, ArtifactLoadError> {
        let n = self.numeric_features.len();
        if !(MIN_CONTINUOUS_FEATURES..=CONTINUOUS_ORDER.len()).contains(&n) {
            return Err(ArtifactLoadError::SchemaMismatch(format!(
                "expected {} or {} continuous features, got {n}",
                MIN_CONTINUOUS_FEATURES,
                CONTINUOUS_ORDER.len()
            )));
        }

        let mut out = Vec::with_capacity(n);
        for (i, name) in self.numeric_features.iter().enumerate() {
            let feature: Feature = name
                .parse()
                .map_err(|e| ArtifactLoadError::SchemaMismatch(format!("{e}")))?;
            if feature != CONTINUOUS_ORDER[i] {
                return Err(ArtifactLoadError::SchemaMismatch(format!(
                    "continuous column {i} is `{feature}`, expected `{}`",
                    CONTINUOUS_ORDER[i]
                )));
            }
            out.push(feature);
        }
        Ok(out)
    }

    /// Check the artifact's internal consistency and its compatibility with
    /// the feature schema.
    ///
    /// # Errors
    /// `UnsupportedVersion` or `SchemaMismatch` describing the first problem.
    pub fn validate(&self) -> Result<(), ArtifactLoadError> {
        if self.schema_version != ARTIFACT_SCHEMA_VERSION {
            return Err(ArtifactLoadError::UnsupportedVersion {
                found: self.schema_version,
                expected: ARTIFACT_SCHEMA_VERSION,
            });
        }

        let n = self.continuous_features()?.len();
        let mismatch =
            |msg: String| -> Result<(), ArtifactLoadError> { Err(ArtifactLoadError::SchemaMismatch(msg)) };

        if self.scaler.mean.len() != n || self.scaler.var.len() != n {
            return mismatch(format!(
                "scaler has {} means and {} variances for {n} continuous features",
                self.scaler.mean.len(),
                self.scaler.var.len()
            ));
        }
        if !all_finite(&self.scaler.mean)
            || !all_finite(&self.scaler.var)
            || self.scaler.var.iter().any(|&v| v < 0.0)
        {
            return mismatch("scaler parameters must be finite with non-negative variance".into());
        }

        if self.categorical_feature != Feature::Famhist.name() {
            return mismatch(format!(
                "categorical feature is `{}`, expected `famhist`",
                self.categorical_feature
            ));
        }
        if self.categories.is_empty() {
            return mismatch("category list is empty".into());
        }
        for (i, category) in self.categories.iter().enumerate() {
            if !FAMHIST_CATEGORIES.contains(&category.as_str()) {
                return mismatch(format!("category {category:?} is not in the famhist domain"));
            }
            if self.categories[..i].contains(category) {
                return mismatch(format!("category {category:?} listed twice"));
            }
        }

        let input_dim = self.input_dim();
        if self.projection.input_dim() != input_dim {
            return mismatch(format!(
                "projection expects {} inputs, encoder produces {input_dim}",
                self.projection.input_dim()
            ));
        }
        if self.projection.components.is_empty() {
            return mismatch("projection has no components".into());
        }
        if self
            .projection
            .components
            .iter()
            .any(|row| row.len() != input_dim || !all_finite(row))
            || !all_finite(&self.projection.mean)
        {
            return mismatch(format!(
                "every projection component must have {input_dim} finite entries"
            ));
        }

        let k = self.projection.n_components();
        let nn = &self.neighbors;
        if nn.points.is_empty() {
            return mismatch("neighbor reference set is empty".into());
        }
        if nn.points.len() != nn.labels.len() {
            return mismatch(format!(
                "{} reference points but {} labels",
                nn.points.len(),
                nn.labels.len()
            ));
        }
        if nn.points.iter().any(|p| p.len() != k || !all_finite(p)) {
            return mismatch(format!(
                "every reference point must have {k} finite coordinates"
            ));
        }
        if nn.labels.iter().any(|&l| l > 1) {
            return mismatch("labels must be 0 or 1".into());
        }
        if nn.n_neighbors == 0 || nn.n_neighbors > nn.points.len() {
            return mismatch(format!(
                "n_neighbors must be in 1..={}, got {}",
                nn.points.len(),
                nn.n_neighbors
            ));
        }

        Ok(())
    }

    #[must_use]
    pub fn summary(&self) -> ArtifactSummary {
        let positives = self.neighbors.labels.iter().filter(|&&l| l == 1).count();
        let total = self.neighbors.labels.len().max(1);
        ArtifactSummary {
            schema_version: self.schema_version,
            numeric_features: self.numeric_features.clone(),
            categories: self.categories.clone(),
            input_dim: self.input_dim(),
            n_components: self.projection.n_components(),
            n_reference_points: self.neighbors.points.len(),
            positive_share: positives as f64 / total as f64,
            n_neighbors: self.neighbors.n_neighbors,
            weights: self.neighbors.weights,
            metadata: self.metadata.clone(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Eight-column artifact: component 0 reads standardized sbp,
    /// component 1 reads the `Present` column.
    pub(crate) fn tiny_artifact() -> TrainedPipelineArtifact {
        let mut sbp_row = vec![0.0; 10];
        sbp_row[0] = 1.0;
        let mut present_row = vec![0.0; 10];
        present_row[9] = 1.0;

        TrainedPipelineArtifact {
            schema_version: ARTIFACT_SCHEMA_VERSION,
            numeric_features: CONTINUOUS_ORDER[..8]
                .iter()
                .map(|f| f.name().to_string())
                .collect(),
            scaler: ScalerParams {
                mean: vec![100.0, 2.0, 130.0, 20.0, 50.0, 25.0, 0.0, 50.0],
                var: vec![400.0, 0.0, 100.0, 25.0, 100.0, 16.0, 1.0, 100.0],
            },
            categorical_feature: "famhist".into(),
            categories: vec!["Absent".into(), "Present".into()],
            projection: Projection {
                mean: vec![0.0; 10],
                components: vec![sbp_row, present_row],
            },
            neighbors: NeighborModel {
                n_neighbors: 3,
                weights: Weighting::Uniform,
                points: vec![
                    vec![-1.0, 0.0],
                    vec![0.0, 0.0],
                    vec![1.0, 0.0],
                    vec![2.0, 1.0],
                    vec![3.0, 1.0],
                    vec![4.0, 1.0],
                ],
                labels: vec![0, 0, 1, 1, 1, 1],
            },
            metadata: ArtifactMetadata::default(),
        }
    }

    #[test]
    fn test_tiny_artifact_is_valid() {
        let artifact = tiny_artifact();
        assert!(artifact.validate().is_ok());
        assert_eq!(artifact.input_dim(), 10);
    }

    #[test]
    fn test_reference_artifact_parses() {
        let bytes = include_bytes!("../../models/model.json");
        let artifact = TrainedPipelineArtifact::from_json_slice(bytes).expect("reference artifact");
        assert_eq!(artifact.numeric_features.len(), 8);
        assert_eq!(artifact.projection.n_components(), 3);
        assert_eq!(artifact.neighbors.n_neighbors, 5);
        assert_eq!(artifact.neighbors.weights, Weighting::Uniform);
    }

    #[test]
    fn test_nine_column_layout_is_accepted() {
        let mut artifact = tiny_artifact();
        artifact.numeric_features.push("chol".into());
        artifact.scaler.mean.push(200.0);
        artifact.scaler.var.push(1600.0);
        artifact.projection.mean.push(0.0);
        for row in &mut artifact.projection.components {
            row.insert(8, 0.0);
        }
        assert!(artifact.validate().is_ok());
        assert_eq!(artifact.continuous_features().expect("valid").len(), 9);
    }

    #[test]
    fn test_rejects_swapped_feature_order() {
        let mut artifact = tiny_artifact();
        artifact.numeric_features.swap(0, 7);
        let err = artifact.validate().expect_err("order matters");
        assert!(matches!(err, ArtifactLoadError::SchemaMismatch(msg) if msg.contains("column 0")));
    }

    #[test]
    fn test_rejects_wrong_feature_count() {
        let mut artifact = tiny_artifact();
        artifact.numeric_features.truncate(7);
        assert!(matches!(
            artifact.validate(),
            Err(ArtifactLoadError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_rejects_unsupported_version() {
        let mut artifact = tiny_artifact();
        artifact.schema_version = 2;
        assert_eq!(
            artifact.validate(),
            Err(ArtifactLoadError::UnsupportedVersion {
                found: 2,
                expected: ARTIFACT_SCHEMA_VERSION
            })
        );
    }

    #[test]
    fn test_rejects_structural_inconsistencies() {
        let mut a = tiny_artifact();
        a.scaler.var.pop();
        assert!(a.validate().is_err());

        let mut a = tiny_artifact();
        a.scaler.var[2] = -1.0;
        assert!(a.validate().is_err());

        let mut a = tiny_artifact();
        a.categories = vec!["Absent".into(), "Maybe".into()];
        assert!(a.validate().is_err());

        let mut a = tiny_artifact();
        a.categories = vec!["Absent".into(), "Absent".into()];
        assert!(a.validate().is_err());

        let mut a = tiny_artifact();
        a.projection.components[1].pop();
        assert!(a.validate().is_err());

        let mut a = tiny_artifact();
        a.neighbors.points[2] = vec![1.0];
        assert!(a.validate().is_err());

        let mut a = tiny_artifact();
        a.neighbors.labels[0] = 2;
        assert!(a.validate().is_err());

        let mut a = tiny_artifact();
        a.neighbors.n_neighbors = 7;
        assert!(a.validate().is_err());

        let mut a = tiny_artifact();
        a.categorical_feature = "smoker".into();
        assert!(a.validate().is_err());
    }

    #[test]
    fn test_malformed_json() {
        let err = TrainedPipelineArtifact::from_json_slice(b"{\"schema_version\": 1}")
            .expect_err("incomplete");
        assert!(matches!(err, ArtifactLoadError::Malformed(_)));
    }

    #[test]
    fn test_zero_variance_scales_by_one() {
        let scaler = ScalerParams {
            mean: vec![0.0, 0.0],
            var: vec![0.0, 4.0],
        };
        assert_eq!(scaler.scale(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_summary() {
        let summary = tiny_artifact().summary();
        assert_eq!(summary.n_reference_points, 6);
        assert!((summary.positive_share - 4.0 / 6.0).abs() < 1e-12);
    }
}
