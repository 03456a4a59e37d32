//! Classifier port: Trait for the decision engine behind the inference contract.
//!
//! This trait abstracts the fitted projection + neighbor vote from the
//! application logic.

use crate::domain::{EncodingError, FeatureVector, PredictionResult};

/// Trait for turning an encoded feature vector into a prediction.
///
/// Implementations hold only read-only fitted state, so one instance is
/// shared across threads without locking.
pub trait RiskClassifier: Send + Sync {
    /// Length of the feature vectors this classifier accepts.
    fn input_dim(&self) -> usize;

    /// Predict the binary label and positive-class probability.
    ///
    /// # Arguments
    /// * `vector` - Encoded record, see [`crate::domain::Preprocessor`]
    ///
    /// # Errors
    /// Returns `EncodingError::DimensionMismatch` if `vector` has the wrong length.
    fn predict(&self, vector: &FeatureVector) -> Result<PredictionResult, EncodingError>;
}
