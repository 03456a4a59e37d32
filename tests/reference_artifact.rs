//! End-to-end checks against the shipped reference artifact in `models/`.

use std::path::PathBuf;

use cardiorisk::adapters::FsArtifactSource;
use cardiorisk::application::{load_artifact, AssessmentSettings};
use cardiorisk::domain::factors::RiskFactor;
use cardiorisk::domain::{Feature, Preprocessor, RiskTier, UnknownCategoryPolicy, Weighting};
use cardiorisk::ports::RiskClassifier;
use cardiorisk::{CardioRiskError, InferenceService, PatientForm, PatientRecord};

fn models_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("models")
}

fn service() -> InferenceService {
    let artifact = load_artifact(&FsArtifactSource::new(models_dir())).expect("reference artifact");
    InferenceService::from_artifact(artifact, AssessmentSettings::default()).expect("service")
}

#[test]
fn test_reference_artifact_shape() {
    let artifact = load_artifact(&FsArtifactSource::new(models_dir())).expect("load");
    let summary = artifact.summary();
    assert_eq!(summary.schema_version, 1);
    assert_eq!(summary.input_dim, 10);
    assert_eq!(summary.n_neighbors, 5);
    assert_eq!(summary.categories, vec!["Absent", "Present"]);
    assert_eq!(
        summary.numeric_features,
        vec!["sbp", "tobacco", "ldl", "adiposity", "typea", "obesity", "alcohol", "age"]
    );
}

#[test]
fn test_form_defaults_regression() {
    let form = PatientForm::from(&PatientRecord::default());
    let assessment = service().assess_form(form).expect("assess");

    assert!((assessment.prediction.probability - 0.2).abs() < 1e-12);
    assert_eq!(assessment.prediction.label, 0);
    assert_eq!(assessment.prediction.status_text(), "No risk detected");
    assert_eq!(assessment.prediction.probability_percent(), "20.00%");
    assert_eq!(assessment.tier, RiskTier::Low);
}

#[test]
fn test_form_default_factor_scores() {
    let assessment = service().assess(&PatientRecord::default()).expect("assess");
    let expect = [
        (RiskFactor::Sbp, 0.60),
        (RiskFactor::Chol, 0.5714),
        (RiskFactor::Ldl, 0.52),
        (RiskFactor::Bmi, 0.50),
        (RiskFactor::Adiposity, 0.444),
        (RiskFactor::Tobacco, 0.0),
        (RiskFactor::Alcohol, 0.0),
        (RiskFactor::TypeA, 0.50),
    ];
    for (factor, value) in expect {
        let got = assessment.factor_scores[&factor];
        assert!((got - value).abs() < 1e-3, "{factor}: got {got}, want {value}");
    }
}

#[test]
fn test_distance_weighting_regression() {
    let mut artifact = (*load_artifact(&FsArtifactSource::new(models_dir())).expect("load")).clone();
    artifact.neighbors.weights = Weighting::Distance;
    let service = InferenceService::from_artifact(artifact.into(), AssessmentSettings::default())
        .expect("service");
    let result = service.predict(&PatientRecord::default()).expect("predict");
    assert!((result.probability - 0.155_650_447_106_797).abs() < 1e-9);
    assert_eq!(result.label, 0);
}

#[test]
fn test_swapped_feature_order_changes_prediction() {
    let artifact = load_artifact(&FsArtifactSource::new(models_dir().join("model.json")))
        .expect("load");
    let preprocessor =
        Preprocessor::from_artifact(&artifact, UnknownCategoryPolicy::Strict).expect("fitted");
    let classifier =
        cardiorisk::adapters::KnnClassifier::new(artifact.clone()).expect("classifier");

    let record = PatientRecord::default();
    let mut values = record.continuous_values(preprocessor.continuous_features());
    let sbp = preprocessor
        .continuous_features()
        .iter()
        .position(|f| *f == Feature::Sbp)
        .expect("sbp");
    let age = preprocessor
        .continuous_features()
        .iter()
        .position(|f| *f == Feature::Age)
        .expect("age");
    values.swap(sbp, age);

    let vector = preprocessor.encode_values(&values, &record.famhist).expect("encode");
    let swapped = classifier.predict(&vector).expect("predict");
    assert!((swapped.probability - 0.6).abs() < 1e-12);
    assert_eq!(swapped.label, 1);
}

#[test]
fn test_out_of_domain_record_rejected() {
    let mut form = PatientForm::from(&PatientRecord::default());
    form.age = Some(19.0);
    form.sbp = Some(250.0);
    match service().assess_form(form) {
        Err(CardioRiskError::InvalidInput(e)) => {
            assert_eq!(e.fields(), vec![Feature::Age, Feature::Sbp]);
        }
        other => panic!("expected InvalidInput, got {other:?}"),
    }
}
