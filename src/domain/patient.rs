//! Patient record types for cardiovascular risk prediction.
//!
//! Ten clinical attributes matching the training dataset columns:
//! age, sbp, chol, ldl, adiposity, obesity, tobacco, alcohol, typea, famhist.

use serde::{Deserialize, Serialize};

use super::encoding::UnknownCategoryPolicy;
use super::schema::{Feature, FAMHIST_CATEGORIES};

/// Family history of heart disease.
///
/// Values outside the schema are kept as `Unrecognized` so that the
/// configured policy, not the parser, decides what happens to them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FamilyHistory {
    #[default]
    Absent,
    Present,
    Unrecognized(String),
}

impl FamilyHistory {
    /// Label as it appears in the training data.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Absent => FAMHIST_CATEGORIES[0],
            Self::Present => FAMHIST_CATEGORIES[1],
            Self::Unrecognized(raw) => raw,
        }
    }

    #[must_use]
    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }
}

impl From<&str> for FamilyHistory {
    fn from(value: &str) -> Self {
        match value {
            "Absent" => Self::Absent,
            "Present" => Self::Present,
            other => Self::Unrecognized(other.to_string()),
        }
    }
}

impl From<String> for FamilyHistory {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Absent" => Self::Absent,
            "Present" => Self::Present,
            _ => Self::Unrecognized(value),
        }
    }
}

impl From<FamilyHistory> for String {
    fn from(value: FamilyHistory) -> Self {
        match value {
            FamilyHistory::Unrecognized(raw) => raw,
            known => known.label().to_string(),
        }
    }
}

impl std::fmt::Display for FamilyHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One patient record, one per inference call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    /// Age in years (20-90)
    pub age: i32,
    /// Systolic blood pressure in mmHg (90-200)
    pub sbp: i32,
    /// Total cholesterol (120-350)
    pub chol: i32,
    /// LDL cholesterol (50-250)
    pub ldl: i32,
    /// Adiposity in % (10-45)
    pub adiposity: f64,
    /// Body mass index (15-50)
    pub obesity: f64,
    /// Cumulative tobacco (0-40)
    pub tobacco: f64,
    /// Alcohol consumption (0-50)
    pub alcohol: f64,
    /// Type-A behavior score (0-100)
    pub typea: i32,
    /// Family history of heart disease
    pub famhist: FamilyHistory,
}

impl Default for PatientRecord {
    /// The values the assessment form starts from.
    fn default() -> Self {
        Self {
            age: 30,
            sbp: 120,
            chol: 200,
            ldl: 130,
            adiposity: 20.0,
            obesity: 25.0,
            tobacco: 0.0,
            alcohol: 0.0,
            typea: 50,
            famhist: FamilyHistory::Absent,
        }
    }
}

/// A single field that failed validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldViolation {
    pub field: Feature,
    pub message: String,
}

impl std::fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// A patient record was missing fields, out of domain, or carried an
/// unrecognized category.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{}", format_violations(.violations))]
pub struct InvalidInputError {
    pub violations: Vec<FieldViolation>,
}

impl InvalidInputError {
    /// Names of the offending fields, in the order they were checked.
    #[must_use]
    pub fn fields(&self) -> Vec<Feature> {
        self.violations.iter().map(|v| v.field).collect()
    }

    #[must_use]
    pub fn has_field(&self, field: Feature) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}

fn format_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl PatientRecord {
    /// Raw numeric value of a continuous feature. `None` for `famhist`.
    #[must_use]
    pub fn value(&self, feature: Feature) -> Option<f64> {
        match feature {
            Feature::Age => Some(f64::from(self.age)),
            Feature::Sbp => Some(f64::from(self.sbp)),
            Feature::Chol => Some(f64::from(self.chol)),
            Feature::Ldl => Some(f64::from(self.ldl)),
            Feature::Adiposity => Some(self.adiposity),
            Feature::Obesity => Some(self.obesity),
            Feature::Tobacco => Some(self.tobacco),
            Feature::Alcohol => Some(self.alcohol),
            Feature::Typea => Some(f64::from(self.typea)),
            Feature::Famhist => None,
        }
    }

    /// Raw continuous values in the given column order.
    #[must_use]
    pub fn continuous_values(&self, order: &[Feature]) -> Vec<f64> {
        order.iter().filter_map(|&f| self.value(f)).collect()
    }

    /// Validate every field against the feature schema.
    ///
    /// Under [`UnknownCategoryPolicy::Strict`] an unrecognized `famhist`
    /// is a violation; under `UnknownBucket` it is left for the encoder.
    ///
    /// # Errors
    /// Returns every violation found, not just the first.
    pub fn validate(&self, policy: UnknownCategoryPolicy) -> Result<(), InvalidInputError> {
        let mut violations = Vec::new();

        for feature in Feature::ALL {
            let Some(value) = self.value(feature) else {
                continue;
            };
            let domain = feature.domain();
            if !domain.contains(value) {
                violations.push(FieldViolation {
                    field: feature,
                    message: format!("{value} out of range {domain}"),
                });
            }
        }

        if !self.famhist.is_recognized() && policy == UnknownCategoryPolicy::Strict {
            violations.push(FieldViolation {
                field: Feature::Famhist,
                message: format!(
                    "unrecognized value {:?}, expected one of {}",
                    self.famhist.label(),
                    Feature::Famhist.domain()
                ),
            });
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(InvalidInputError { violations })
        }
    }
}

/// A patient record as submitted by a front-end: every field optional,
/// unknown keys rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatientForm {
    pub age: Option<f64>,
    pub sbp: Option<f64>,
    pub chol: Option<f64>,
    pub ldl: Option<f64>,
    pub adiposity: Option<f64>,
    pub obesity: Option<f64>,
    pub tobacco: Option<f64>,
    pub alcohol: Option<f64>,
    pub typea: Option<f64>,
    pub famhist: Option<String>,
}

impl From<&PatientRecord> for PatientForm {
    fn from(record: &PatientRecord) -> Self {
        Self {
            age: Some(f64::from(record.age)),
            sbp: Some(f64::from(record.sbp)),
            chol: Some(f64::from(record.chol)),
            ldl: Some(f64::from(record.ldl)),
            adiposity: Some(record.adiposity),
            obesity: Some(record.obesity),
            tobacco: Some(record.tobacco),
            alcohol: Some(record.alcohol),
            typea: Some(f64::from(record.typea)),
            famhist: Some(record.famhist.label().to_string()),
        }
    }
}

fn require<T>(
    value: Option<T>,
    field: Feature,
    violations: &mut Vec<FieldViolation>,
) -> Option<T> {
    if value.is_none() {
        violations.push(FieldViolation {
            field,
            message: "missing".to_string(),
        });
    }
    value
}

fn whole_number(
    value: Option<f64>,
    field: Feature,
    violations: &mut Vec<FieldViolation>,
) -> Option<i32> {
    let value = require(value, field, violations)?;
    if !value.is_finite() || value.fract() != 0.0 {
        violations.push(FieldViolation {
            field,
            message: format!("{value} is not a whole number"),
        });
        return None;
    }
    if value < f64::from(i32::MIN) || value > f64::from(i32::MAX) {
        violations.push(FieldViolation {
            field,
            message: format!("{value} out of range {}", field.domain()),
        });
        return None;
    }
    Some(value as i32)
}

impl TryFrom<PatientForm> for PatientRecord {
    type Error = InvalidInputError;

    /// Structural conversion only: presence and integrality. Domain checks
    /// are done by [`PatientRecord::validate`].
    fn try_from(form: PatientForm) -> Result<Self, Self::Error> {
        let mut violations = Vec::new();

        let age = whole_number(form.age, Feature::Age, &mut violations);
        let sbp = whole_number(form.sbp, Feature::Sbp, &mut violations);
        let chol = whole_number(form.chol, Feature::Chol, &mut violations);
        let ldl = whole_number(form.ldl, Feature::Ldl, &mut violations);
        let adiposity = require(form.adiposity, Feature::Adiposity, &mut violations);
        let obesity = require(form.obesity, Feature::Obesity, &mut violations);
        let tobacco = require(form.tobacco, Feature::Tobacco, &mut violations);
        let alcohol = require(form.alcohol, Feature::Alcohol, &mut violations);
        let typea = whole_number(form.typea, Feature::Typea, &mut violations);
        let famhist = require(form.famhist, Feature::Famhist, &mut violations);

        match (
            age, sbp, chol, ldl, adiposity, obesity, tobacco, alcohol, typea, famhist,
        ) {
            (
                Some(age),
                Some(sbp),
                Some(chol),
                Some(ldl),
                Some(adiposity),
                Some(obesity),
                Some(tobacco),
                Some(alcohol),
                Some(typea),
                Some(famhist),
            ) if violations.is_empty() => Ok(Self {
                age,
                sbp,
                chol,
                ldl,
                adiposity,
                obesity,
                tobacco,
                alcohol,
                typea,
                famhist: FamilyHistory::from(famhist),
            }),
            _ => Err(InvalidInputError { violations }),
        }
    }
}
