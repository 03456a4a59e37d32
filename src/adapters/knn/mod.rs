//! KNN adapter: Implementation of RiskClassifier over a fitted artifact.
//!
//! Applies the artifact's PCA projection, then votes among the nearest
//! reference points.
//!
//! # Vote
//!
//! - Distance is Euclidean in projected space.
//! - The `n_neighbors` closest points vote; equal distances are ordered by
//!   reference-set index so results never depend on sort stability.
//! - `uniform`: every neighbor weighs 1.
//! - `distance`: a neighbor weighs `1/d`. If any selected neighbor sits at
//!   distance 0, only the zero-distance neighbors vote, each with weight 1.
//! - Probability is the weighted share of positive neighbors.

use std::sync::Arc;

use crate::domain::{
    ArtifactLoadError, EncodingError, FeatureVector, PredictionResult, TrainedPipelineArtifact,
    Weighting,
};
use crate::ports::RiskClassifier;
use crate::CardioRiskError;

/// Nearest-neighbor classifier backed by a shared, read-only artifact.
#[derive(Debug, Clone)]
pub struct KnnClassifier {
    artifact: Arc<TrainedPipelineArtifact>,
}

impl KnnClassifier {
    /// Validate `artifact` and wrap it.
    ///
    /// # Errors
    /// Returns `ArtifactLoadError` if the artifact is structurally
    /// incompatible with the feature schema.
    pub fn new(artifact: Arc<TrainedPipelineArtifact>) -> Result<Self, ArtifactLoadError> {
        artifact.validate()?;
        tracing::debug!(
            "KnnClassifier ready (k={}, weights={}, reference_points={})",
            artifact.neighbors.n_neighbors,
            artifact.neighbors.weights,
            artifact.neighbors.points.len()
        );
        Ok(Self { artifact })
    }

    #[must_use]
    pub fn artifact(&self) -> &Arc<TrainedPipelineArtifact> {
        &self.artifact
    }
}

impl RiskClassifier for KnnClassifier {
    fn input_dim(&self) -> usize {
        self.artifact.projection.input_dim()
    }

    fn predict(&self, vector: &FeatureVector) -> Result<PredictionResult, EncodingError> {
        vote(vector, &self.artifact)
    }
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Indices and distances of the `k` nearest reference points.
fn nearest(points: &[Vec<f64>], query: &[f64], k: usize) -> Vec<(usize, f64)> {
    let mut ranked: Vec<(usize, f64)> = points
        .iter()
        .enumerate()
        .map(|(i, p)| (i, euclidean(p, query)))
        .collect();
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    ranked.truncate(k);
    ranked
}

fn vote_weights(neighbors: &[(usize, f64)], weighting: Weighting) -> Vec<f64> {
    match weighting {
        Weighting::Uniform => vec![1.0; neighbors.len()],
        Weighting::Distance => {
            if neighbors.iter().any(|&(_, d)| d == 0.0) {
                neighbors
                    .iter()
                    .map(|&(_, d)| if d == 0.0 { 1.0 } else { 0.0 })
                    .collect()
            } else {
                neighbors.iter().map(|&(_, d)| 1.0 / d).collect()
            }
        }
    }
}

/// Validate `artifact`, then project `vector` and vote among the nearest
/// reference points.
///
/// Prefer [`KnnClassifier`] for repeated calls; it validates once.
///
/// # Errors
/// `ArtifactLoad` if the artifact fails validation, `Encoding` with
/// `DimensionMismatch` if `vector` does not match the projection's input width.
pub fn predict(
    vector: &FeatureVector,
    artifact: &TrainedPipelineArtifact,
) -> Result<PredictionResult, CardioRiskError> {
    artifact.validate()?;
    Ok(vote(vector, artifact)?)
}

/// Projection and vote over an artifact that has already passed validation.
fn vote(
    vector: &FeatureVector,
    artifact: &TrainedPipelineArtifact,
) -> Result<PredictionResult, EncodingError> {
    let expected = artifact.projection.input_dim();
    if vector.len() != expected {
        return Err(EncodingError::DimensionMismatch {
            expected,
            got: vector.len(),
        });
    }

    let projected = artifact.projection.apply(vector.as_slice());
    let model = &artifact.neighbors;
    let neighbors = nearest(&model.points, &projected, model.n_neighbors);
    let weights = vote_weights(&neighbors, model.weights);

    let total: f64 = weights.iter().sum();
    let positive: f64 = neighbors
        .iter()
        .zip(&weights)
        .filter(|((i, _), _)| model.labels[*i] == 1)
        .map(|(_, w)| w)
        .sum();

    let probability = if total > 0.0 {
        (positive / total).clamp(0.0, 1.0)
    } else {
        0.0
    };

    tracing::trace!(
        "projected={:?} neighbors={:?} probability={probability}",
        projected,
        neighbors
    );

    Ok(PredictionResult::from_probability(probability))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tiny_artifact;

    /// Encoded vector whose projection lands at `(x, present)`.
    fn vector_at(x: f64, present: bool) -> FeatureVector {
        let mut v = vec![0.0; 10];
        v[0] = x;
        if present {
            v[9] = 1.0;
        } else {
            v[8] = 1.0;
        }
        FeatureVector::new(v)
    }

    #[test]
    fn test_uniform_vote() {
        let artifact = tiny_artifact();
        // Nearest to (0, 0): points 1, 0, 2 -> labels 0, 0, 1
        let result = predict(&vector_at(0.0, false), &artifact).expect("predict");
        assert!((result.probability - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(result.label, 0);

        // Nearest to (3, 1): points 4, 3, 5 -> all positive
        let result = predict(&vector_at(3.0, true), &artifact).expect("predict");
        assert_eq!(result.probability, 1.0);
        assert_eq!(result.label, 1);
    }

    #[test]
    fn test_distance_weighting() {
        let mut artifact = tiny_artifact();
        artifact.neighbors.weights = Weighting::Distance;
        // Query (0.5, 0): d = 0.5 to points 1 and 2, 1.5 to point 0.
        let result = predict(&vector_at(0.5, false), &artifact).expect("predict");
        let expected = 2.0 / (2.0 + 2.0 + 1.0 / 1.5);
        assert!((result.probability - expected).abs() < 1e-12);
        assert_eq!(result.label, 0);
    }

    #[test]
    fn test_exact_match_outvotes_everything() {
        let mut artifact = tiny_artifact();
        artifact.neighbors.weights = Weighting::Distance;
        // Query sits exactly on point 2 (label 1).
        let result = predict(&vector_at(1.0, false), &artifact).expect("predict");
        assert_eq!(result.probability, 1.0);
        assert_eq!(result.label, 1);
    }

    #[test]
    fn test_even_split_resolves_to_negative() {
        let mut artifact = tiny_artifact();
        artifact.neighbors.n_neighbors = 2;
        // Query (0.5, 0): tie between points 1 and 2 at equal distance.
        let result = predict(&vector_at(0.5, false), &artifact).expect("predict");
        assert_eq!(result.probability, 0.5);
        assert_eq!(result.label, 0);
    }

    #[test]
    fn test_equal_distances_break_by_index() {
        let points = vec![vec![1.0], vec![-1.0], vec![1.0]];
        let ranked = nearest(&points, &[0.0], 2);
        assert_eq!(ranked.iter().map(|r| r.0).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_rejects_wrong_width() {
        let artifact = tiny_artifact();
        let err = predict(&FeatureVector::new(vec![0.0; 9]), &artifact).expect_err("width");
        assert!(matches!(
            err,
            CardioRiskError::Encoding(EncodingError::DimensionMismatch { expected: 10, got: 9 })
        ));
    }

    #[test]
    fn test_classifier_port() {
        let classifier = KnnClassifier::new(Arc::new(tiny_artifact())).expect("valid artifact");
        assert_eq!(classifier.input_dim(), 10);
        let a = classifier.predict(&vector_at(2.5, true)).expect("predict");
        let b = classifier.predict(&vector_at(2.5, true)).expect("predict");
        assert_eq!(a, b);
    }

    #[test]
    fn test_truncated_labels_are_rejected() {
        let mut artifact = tiny_artifact();
        artifact.neighbors.labels.truncate(1);

        let err = predict(&vector_at(0.0, false), &artifact).expect_err("short labels");
        assert!(matches!(err, CardioRiskError::ArtifactLoad(_)));
        assert!(KnnClassifier::new(Arc::new(artifact)).is_err());
    }

    #[test]
    fn test_ragged_components_are_rejected() {
        let mut artifact = tiny_artifact();
        artifact.projection.components[0].truncate(1);

        let err = predict(&vector_at(0.0, false), &artifact).expect_err("ragged row");
        assert!(matches!(err, CardioRiskError::ArtifactLoad(_)));
        assert!(KnnClassifier::new(Arc::new(artifact)).is_err());
    }
}
