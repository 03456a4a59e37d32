//! Prediction and risk tier types.
//!
//! Represents the output of the nearest-neighbor decision and the single
//! canonical tiering every front-end uses.

use serde::{Deserialize, Serialize};

use super::factors::FactorScores;

/// Risk tier for coronary heart disease, ordered Low < Moderate < High.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskTier {
    /// Low risk of heart disease
    Low,
    /// Moderate risk, monitoring recommended
    Moderate,
    /// High risk, intervention recommended
    High,
}

impl RiskTier {
    /// Tier for a probability under the default thresholds.
    #[must_use]
    pub fn from_probability(probability: f64) -> Self {
        TierThresholds::default().tier(probability)
    }

    /// Get a human-readable description.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Low => "Low risk - No significant indicators",
            Self::Moderate => "Moderate risk - Follow-up recommended",
            Self::High => "High risk - Immediate consultation advised",
        }
    }

    /// Advisory shown alongside the tier.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Low => "Maintain a healthy diet and regular physical activity.",
            Self::Moderate => {
                "Maintain a healthy diet and regular physical activity; schedule a follow-up check."
            }
            Self::High => "Consult a physician for a full cardiovascular assessment.",
        }
    }

    /// Get the associated display color (RGB).
    #[must_use]
    pub fn color(&self) -> (u8, u8, u8) {
        match self {
            Self::Low => (42, 157, 143),     // #2A9D8F
            Self::Moderate => (251, 191, 36), // #FBBF24
            Self::High => (230, 57, 70),     // #E63946
        }
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Moderate => write!(f, "MODERATE"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

/// Probability cut-offs between tiers: `p < moderate` is Low,
/// `moderate <= p < high` is Moderate, `p >= high` is High.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TierThresholds {
    pub moderate: f64,
    pub high: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            moderate: 0.30,
            high: 0.60,
        }
    }
}

impl TierThresholds {
    #[must_use]
    pub fn tier(&self, probability: f64) -> RiskTier {
        if probability < self.moderate {
            RiskTier::Low
        } else if probability < self.high {
            RiskTier::Moderate
        } else {
            RiskTier::High
        }
    }

    /// # Errors
    /// Returns a message unless `0 < moderate < high < 1`.
    pub fn validate(&self) -> Result<(), String> {
        let ordered = 0.0 < self.moderate && self.moderate < self.high && self.high < 1.0;
        if ordered {
            Ok(())
        } else {
            Err(format!(
                "tier thresholds must satisfy 0 < moderate < high < 1 (got moderate={}, high={})",
                self.moderate, self.high
            ))
        }
    }
}

/// Tier for a probability under the default thresholds.
#[must_use]
pub fn tier(probability: f64) -> RiskTier {
    RiskTier::from_probability(probability)
}

/// Output of the decision contract for one record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Binary prediction (0 = no CHD, 1 = CHD)
    pub label: u8,

    /// Weighted share of positive neighbors (0.0 to 1.0)
    pub probability: f64,
}

impl PredictionResult {
    /// Build a result from the positive-class share. Label is 1 only when the
    /// positive share strictly exceeds the negative share.
    #[must_use]
    pub fn from_probability(probability: f64) -> Self {
        let label = u8::from(probability > 1.0 - probability);
        Self { label, probability }
    }

    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.label == 1
    }

    /// Binary status line.
    #[must_use]
    pub fn status_text(&self) -> &'static str {
        if self.is_positive() {
            "Risk detected"
        } else {
            "No risk detected"
        }
    }

    /// Probability as a percentage with two decimals, e.g. `20.00%`.
    #[must_use]
    pub fn probability_percent(&self) -> String {
        format!("{:.2}%", self.probability * 100.0)
    }
}

/// Everything the inference entry point returns for one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    pub prediction: PredictionResult,
    pub tier: RiskTier,
    pub factor_scores: FactorScores,
    pub assessed_at: chrono::DateTime<chrono::Utc>,
}
