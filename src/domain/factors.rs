//! Per-factor presentation scores.
//!
//! Each score is the raw measurement divided by a fixed ceiling. These are
//! display heuristics for the factor chart, not calibrated clinical
//! thresholds, and play no part in the prediction.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::patient::PatientRecord;
use super::schema::Feature;

/// A displayed risk factor, in chart order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskFactor {
    Sbp,
    Chol,
    Ldl,
    Bmi,
    Adiposity,
    Tobacco,
    Alcohol,
    TypeA,
}

impl RiskFactor {
    pub const ALL: [RiskFactor; 8] = [
        RiskFactor::Sbp,
        RiskFactor::Chol,
        RiskFactor::Ldl,
        RiskFactor::Bmi,
        RiskFactor::Adiposity,
        RiskFactor::Tobacco,
        RiskFactor::Alcohol,
        RiskFactor::TypeA,
    ];

    /// Chart label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Sbp => "SBP",
            Self::Chol => "Chol",
            Self::Ldl => "LDL",
            Self::Bmi => "BMI",
            Self::Adiposity => "Adiposity",
            Self::Tobacco => "Tobacco",
            Self::Alcohol => "Alcohol",
            Self::TypeA => "Type A",
        }
    }

    /// Record field the factor is read from.
    #[must_use]
    pub fn feature(self) -> Feature {
        match self {
            Self::Sbp => Feature::Sbp,
            Self::Chol => Feature::Chol,
            Self::Ldl => Feature::Ldl,
            Self::Bmi => Feature::Obesity,
            Self::Adiposity => Feature::Adiposity,
            Self::Tobacco => Feature::Tobacco,
            Self::Alcohol => Feature::Alcohol,
            Self::TypeA => Feature::Typea,
        }
    }
}

impl std::fmt::Display for RiskFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Normalized factor values, keyed in chart order.
pub type FactorScores = BTreeMap<RiskFactor, f64>;

/// Normalization ceiling per factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FactorCeilings {
    pub sbp: f64,
    pub chol: f64,
    pub ldl: f64,
    pub obesity: f64,
    pub adiposity: f64,
    pub tobacco: f64,
    pub alcohol: f64,
    pub typea: f64,
}

impl Default for FactorCeilings {
    fn default() -> Self {
        Self {
            sbp: 200.0,
            chol: 350.0,
            ldl: 250.0,
            obesity: 50.0,
            adiposity: 45.0,
            tobacco: 40.0,
            alcohol: 50.0,
            typea: 100.0,
        }
    }
}

impl FactorCeilings {
    #[must_use]
    pub fn ceiling(&self, factor: RiskFactor) -> f64 {
        match factor {
            RiskFactor::Sbp => self.sbp,
            RiskFactor::Chol => self.chol,
            RiskFactor::Ldl => self.ldl,
            RiskFactor::Bmi => self.obesity,
            RiskFactor::Adiposity => self.adiposity,
            RiskFactor::Tobacco => self.tobacco,
            RiskFactor::Alcohol => self.alcohol,
            RiskFactor::TypeA => self.typea,
        }
    }

    /// # Errors
    /// Returns a message naming the first non-positive or non-finite ceiling.
    pub fn validate(&self) -> Result<(), String> {
        for factor in RiskFactor::ALL {
            let c = self.ceiling(factor);
            if !(c.is_finite() && c > 0.0) {
                return Err(format!("ceiling for {factor} must be positive, got {c}"));
            }
        }
        Ok(())
    }

    /// Score every factor of a record, clamped into `[0, 1]`.
    #[must_use]
    pub fn scores(&self, record: &PatientRecord) -> FactorScores {
        RiskFactor::ALL
            .into_iter()
            .map(|factor| {
                let raw = record.value(factor.feature()).unwrap_or(0.0);
                (factor, (raw / self.ceiling(factor)).clamp(0.0, 1.0))
            })
            .collect()
    }
}

/// Factor scores under the default ceilings.
#[must_use]
pub fn factor_scores(record: &PatientRecord) -> FactorScores {
    FactorCeilings::default().scores(record)
}

/// Whole-percent label for a score, e.g. `57%`.
#[must_use]
pub fn percent_label(score: f64) -> String {
    format!("{:.0}%", score * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_default_scores() {
        let scores = factor_scores(&PatientRecord::default());
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
            let got = scores[&factor];
            assert!((got - value).abs() < 1e-3, "{factor}: got {got}, want {value}");
        }
    }

    #[test]
    fn test_scores_keep_chart_order() {
        let scores = factor_scores(&PatientRecord::default());
        let labels: Vec<&str> = scores.keys().map(|f| f.label()).collect();
        assert_eq!(
            labels,
            ["SBP", "Chol", "LDL", "BMI", "Adiposity", "Tobacco", "Alcohol", "Type A"]
        );
    }

    #[test]
    fn test_small_ceilings_are_clamped() {
        let ceilings = FactorCeilings {
            sbp: 100.0,
            ..Default::default()
        };
        let scores = ceilings.scores(&PatientRecord::default());
        assert_eq!(scores[&RiskFactor::Sbp], 1.0);
    }

    #[test]
    fn test_invalid_ceiling() {
        let ceilings = FactorCeilings {
            ldl: 0.0,
            ..Default::default()
        };
        assert!(ceilings.validate().is_err());
        assert!(FactorCeilings::default().validate().is_ok());
    }

    #[test]
    fn test_percent_label() {
        assert_eq!(percent_label(200.0 / 350.0), "57%");
        assert_eq!(percent_label(0.0), "0%");
    }
}
