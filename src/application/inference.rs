//! Inference service: The single entry point from patient record to risk assessment.
//!
//! This service coordinates:
//! - Record validation
//! - Preprocessing with the artifact's fitted transform
//! - The classifier's projection and vote
//! - Tiering and factor scores
//!
//! It holds only read-only state, so one instance is shared across threads.

use std::sync::Arc;

use crate::adapters::knn::KnnClassifier;
use crate::domain::{
    ArtifactLoadError, FactorCeilings, FeatureVector, PatientForm, PatientRecord,
    Preprocessor, PredictionResult, RiskAssessment, TierThresholds, TrainedPipelineArtifact,
    UnknownCategoryPolicy,
};
use crate::ports::RiskClassifier;
use crate::CardioRiskError;

/// Knobs that shape an assessment without touching the fitted model.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AssessmentSettings {
    pub policy: UnknownCategoryPolicy,
    pub thresholds: TierThresholds,
    pub ceilings: FactorCeilings,
}

/// Service for assessing one patient record at a time.
pub struct InferenceService<C = KnnClassifier>
where
    C: RiskClassifier,
{
    artifact: Arc<TrainedPipelineArtifact>,
    classifier: Arc<C>,
    preprocessor: Preprocessor,
    settings: AssessmentSettings,
}

impl InferenceService<KnnClassifier> {
    /// Service backed by the KNN classifier over `artifact`.
    ///
    /// # Errors
    /// Returns error if the artifact or settings are inconsistent.
    pub fn from_artifact(
        artifact: Arc<TrainedPipelineArtifact>,
        settings: AssessmentSettings,
    ) -> Result<Self, CardioRiskError> {
        let classifier = Arc::new(KnnClassifier::new(Arc::clone(&artifact))?);
        Self::new(artifact, classifier, settings)
    }
}

impl<C> InferenceService<C>
where
    C: RiskClassifier,
{
    /// Create a new inference service.
    ///
    /// # Errors
    /// `ArtifactLoad` if the artifact is incompatible with the schema or the
    /// classifier expects a different vector width; `Config` if thresholds
    /// or ceilings are invalid.
    pub fn new(
        artifact: Arc<TrainedPipelineArtifact>,
        classifier: Arc<C>,
        settings: AssessmentSettings,
    ) -> Result<Self, CardioRiskError> {
        settings.thresholds.validate().map_err(CardioRiskError::Config)?;
        settings.ceilings.validate().map_err(CardioRiskError::Config)?;

        let preprocessor = Preprocessor::from_artifact(&artifact, settings.policy)?;
        if classifier.input_dim() != preprocessor.output_dim() {
            return Err(ArtifactLoadError::SchemaMismatch(format!(
                "classifier expects {} inputs but preprocessing produces {}",
                classifier.input_dim(),
                preprocessor.output_dim()
            ))
            .into());
        }

        tracing::info!(
            "Inference service ready (features={}, policy={:?}, tiers={}/{})",
            preprocessor.output_dim(),
            settings.policy,
            settings.thresholds.moderate,
            settings.thresholds.high
        );

        Ok(Self {
            artifact,
            classifier,
            preprocessor,
            settings,
        })
    }

    #[must_use]
    pub fn artifact(&self) -> &Arc<TrainedPipelineArtifact> {
        &self.artifact
    }

    #[must_use]
    pub fn settings(&self) -> &AssessmentSettings {
        &self.settings
    }

    /// Validate and encode a record.
    ///
    /// # Errors
    /// `InvalidInput` or `Encoding`, see [`Preprocessor::encode`].
    pub fn encode(&self, record: &PatientRecord) -> Result<FeatureVector, CardioRiskError> {
        self.preprocessor.encode(record)
    }

    /// Label and probability for a record.
    ///
    /// # Errors
    /// Same as [`Self::encode`].
    pub fn predict(&self, record: &PatientRecord) -> Result<PredictionResult, CardioRiskError> {
        let vector = self.encode(record)?;
        Ok(self.classifier.predict(&vector)?)
    }

    /// Full assessment: prediction, tier and factor scores.
    ///
    /// # Errors
    /// Same as [`Self::encode`]. Nothing is computed for an invalid record.
    pub fn assess(&self, record: &PatientRecord) -> Result<RiskAssessment, CardioRiskError> {
        let prediction = self.predict(record).map_err(|e| {
            tracing::warn!("Assessment rejected: {}", e);
            e
        })?;
        let tier = self.settings.thresholds.tier(prediction.probability);

        tracing::info!(
            "Assessment complete: label={}, probability={:.4}, tier={}",
            prediction.label,
            prediction.probability,
            tier
        );

        Ok(RiskAssessment {
            prediction,
            tier,
            factor_scores: self.settings.ceilings.scores(record),
            assessed_at: chrono::Utc::now(),
        })
    }

    /// Assess a front-end form.
    ///
    /// # Errors
    /// `InvalidInput` for missing or non-integral fields, then as [`Self::assess`].
    pub fn assess_form(&self, form: PatientForm) -> Result<RiskAssessment, CardioRiskError> {
        let record = PatientRecord::try_from(form)?;
        self.assess(&record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Feature, FamilyHistory, RiskTier, Weighting};
    use crate::domain::factors::RiskFactor;

    const REFERENCE: &[u8] = include_bytes!("../../models/model.json");

    fn reference() -> Arc<TrainedPipelineArtifact> {
        Arc::new(TrainedPipelineArtifact::from_json_slice(REFERENCE).expect("reference"))
    }

    fn service() -> InferenceService {
        InferenceService::from_artifact(reference(), AssessmentSettings::default())
            .expect("service")
    }

    #[test]
    fn test_form_defaults_regression() {
        let assessment = service().assess(&PatientRecord::default()).expect("assess");
        assert!((assessment.prediction.probability - 0.2).abs() < 1e-12);
        assert_eq!(assessment.prediction.label, 0);
        assert_eq!(assessment.tier, RiskTier::Low);
        assert!((assessment.factor_scores[&RiskFactor::Sbp] - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_feature_order_matters() {
        let swapped = PatientRecord {
            age: 120,
            sbp: 30,
            ..PatientRecord::default()
        };
        // Out of domain once validated, so check the vote on the raw values.
        let preprocessor =
            Preprocessor::from_artifact(&reference(), UnknownCategoryPolicy::Strict)
                .expect("preprocessor");
        let vector = preprocessor
            .encode_values(
                &swapped.continuous_values(preprocessor.continuous_features()),
                &swapped.famhist,
            )
            .expect("encode");
        let result = KnnClassifier::new(reference())
            .expect("classifier")
            .predict(&vector)
            .expect("predict");
        assert!((result.probability - 0.6).abs() < 1e-12);
        assert_eq!(result.label, 1);
    }

    #[test]
    fn test_high_risk_record() {
        let record = PatientRecord {
            age: 62,
            sbp: 170,
            ldl: 200,
            tobacco: 12.0,
            adiposity: 35.0,
            typea: 70,
            obesity: 32.0,
            alcohol: 30.0,
            famhist: FamilyHistory::Present,
            ..PatientRecord::default()
        };
        let assessment = service().assess(&record).expect("assess");
        assert!((assessment.prediction.probability - 0.8).abs() < 1e-12);
        assert_eq!(assessment.tier, RiskTier::High);
    }

    #[test]
    fn test_invalid_record_is_rejected() {
        let record = PatientRecord {
            age: 19,
            ..PatientRecord::default()
        };
        match service().assess(&record) {
            Err(CardioRiskError::InvalidInput(e)) => assert!(e.has_field(Feature::Age)),
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_famhist_policies() {
        let record = PatientRecord {
            famhist: FamilyHistory::from("Unknown"),
            ..PatientRecord::default()
        };

        let strict = service().assess(&record);
        assert!(matches!(strict, Err(CardioRiskError::InvalidInput(_))));

        let lenient = InferenceService::from_artifact(
            reference(),
            AssessmentSettings {
                policy: UnknownCategoryPolicy::UnknownBucket,
                ..Default::default()
            },
        )
        .expect("service");
        let encoded = lenient.encode(&record).expect("encode");
        assert_eq!(&encoded.as_slice()[8..], &[0.0, 0.0]);
        let absent = lenient.encode(&PatientRecord::default()).expect("encode");
        assert_ne!(encoded, absent);
        assert!(lenient.assess(&record).is_ok());
    }

    #[test]
    fn test_form_missing_field() {
        let mut form = PatientForm::from(&PatientRecord::default());
        form.ldl = None;
        match service().assess_form(form) {
            Err(CardioRiskError::InvalidInput(e)) => assert_eq!(e.fields(), vec![Feature::Ldl]),
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn test_distance_weighted_reference() {
        let mut artifact = (*reference()).clone();
        artifact.neighbors.weights = Weighting::Distance;
        let service =
            InferenceService::from_artifact(Arc::new(artifact), AssessmentSettings::default())
                .expect("service");
        let result = service.predict(&PatientRecord::default()).expect("predict");
        assert!((result.probability - 0.155_650_447_106_797).abs() < 1e-9);
    }

    #[test]
    fn test_concurrent_assessments_agree() {
        let service = Arc::new(service());
        let record = PatientRecord::default();
        let expected = service.predict(&record).expect("predict");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&service);
                let record = record.clone();
                std::thread::spawn(move || service.predict(&record).expect("predict"))
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().expect("join"), expected);
        }
    }

    #[test]
    fn test_classifier_width_must_match() {
        struct Narrow;
        impl RiskClassifier for Narrow {
            fn input_dim(&self) -> usize {
                9
            }
            fn predict(
                &self,
                _: &FeatureVector,
            ) -> Result<PredictionResult, crate::domain::EncodingError> {
                Ok(PredictionResult::from_probability(0.0))
            }
        }
        let err = InferenceService::new(reference(), Arc::new(Narrow), AssessmentSettings::default());
        assert!(matches!(
            err,
            Err(CardioRiskError::ArtifactLoad(ArtifactLoadError::SchemaMismatch(_)))
        ));
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let settings = AssessmentSettings {
            thresholds: TierThresholds {
                moderate: 0.9,
                high: 0.1,
            },
            ..Default::default()
        };
        assert!(matches!(
            InferenceService::from_artifact(reference(), settings),
            Err(CardioRiskError::Config(_))
        ));
    }
}
