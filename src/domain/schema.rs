//! Feature schema for the cardiovascular risk pipeline.
//!
//! Ten named patient attributes with fixed types and domains. Everything else
//! in the crate (validation, encoding, artifact compatibility) keys off this.

use serde::{Deserialize, Serialize};

/// Categories accepted for the family-history feature, in training column order.
pub const FAMHIST_CATEGORIES: [&str; 2] = ["Absent", "Present"];

/// Order in which continuous features are fed to the fitted scaler.
///
/// The downstream model has no column names at inference time, so this order
/// is part of the artifact contract. Artifacts fitted by the reference
/// training script use the first eight entries (`chol` is dropped by its
/// column transformer); nine-column artifacts include `chol` last.
pub const CONTINUOUS_ORDER: [Feature; 9] = [
    Feature::Sbp,
    Feature::Tobacco,
    Feature::Ldl,
    Feature::Adiposity,
    Feature::Typea,
    Feature::Obesity,
    Feature::Alcohol,
    Feature::Age,
    Feature::Chol,
];

/// Minimum number of continuous columns an artifact may declare.
pub const MIN_CONTINUOUS_FEATURES: usize = 8;

/// A named patient attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    Age,
    Sbp,
    Chol,
    Ldl,
    Adiposity,
    Obesity,
    Tobacco,
    Alcohol,
    Typea,
    Famhist,
}

/// Valid values for a feature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureDomain {
    /// Whole numbers in `[min, max]`
    Integer { min: i64, max: i64 },
    /// Real numbers in `[min, max]`
    Float { min: f64, max: f64 },
    /// One of a fixed set of labels
    Categorical(&'static [&'static str]),
}

impl FeatureDomain {
    /// Check a numeric value against the domain. Categorical domains never
    /// contain a number; NaN is never contained.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        match *self {
            Self::Integer { min, max } => {
                value.fract() == 0.0 && (min as f64..=max as f64).contains(&value)
            }
            Self::Float { min, max } => (min..=max).contains(&value),
            Self::Categorical(_) => false,
        }
    }

    /// Check a categorical label against the domain.
    #[must_use]
    pub fn contains_label(&self, label: &str) -> bool {
        match self {
            Self::Categorical(labels) => labels.contains(&label),
            _ => false,
        }
    }
}

impl std::fmt::Display for FeatureDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer { min, max } => write!(f, "[{min}, {max}]"),
            Self::Float { min, max } => write!(f, "[{min:.1}, {max:.1}]"),
            Self::Categorical(labels) => write!(f, "{{{}}}", labels.join(", ")),
        }
    }
}

impl Feature {
    /// All features in schema table order.
    pub const ALL: [Feature; 10] = [
        Feature::Age,
        Feature::Sbp,
        Feature::Chol,
        Feature::Ldl,
        Feature::Adiposity,
        Feature::Obesity,
        Feature::Tobacco,
        Feature::Alcohol,
        Feature::Typea,
        Feature::Famhist,
    ];

    /// Column name used in records, forms and artifacts.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Age => "age",
            Self::Sbp => "sbp",
            Self::Chol => "chol",
            Self::Ldl => "ldl",
            Self::Adiposity => "adiposity",
            Self::Obesity => "obesity",
            Self::Tobacco => "tobacco",
            Self::Alcohol => "alcohol",
            Self::Typea => "typea",
            Self::Famhist => "famhist",
        }
    }

    /// Human-readable description.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Age => "Age in years",
            Self::Sbp => "Systolic blood pressure (mmHg)",
            Self::Chol => "Total cholesterol",
            Self::Ldl => "LDL cholesterol",
            Self::Adiposity => "Adiposity (%)",
            Self::Obesity => "Body mass index",
            Self::Tobacco => "Cumulative tobacco",
            Self::Alcohol => "Alcohol consumption",
            Self::Typea => "Type-A behavior (stress score)",
            Self::Famhist => "Family history of heart disease",
        }
    }

    /// Valid values for this feature.
    #[must_use]
    pub fn domain(self) -> FeatureDomain {
        match self {
            Self::Age => FeatureDomain::Integer { min: 20, max: 90 },
            Self::Sbp => FeatureDomain::Integer { min: 90, max: 200 },
            Self::Chol => FeatureDomain::Integer { min: 120, max: 350 },
            Self::Ldl => FeatureDomain::Integer { min: 50, max: 250 },
            Self::Adiposity => FeatureDomain::Float { min: 10.0, max: 45.0 },
            Self::Obesity => FeatureDomain::Float { min: 15.0, max: 50.0 },
            Self::Tobacco => FeatureDomain::Float { min: 0.0, max: 40.0 },
            Self::Alcohol => FeatureDomain::Float { min: 0.0, max: 50.0 },
            Self::Typea => FeatureDomain::Integer { min: 0, max: 100 },
            Self::Famhist => FeatureDomain::Categorical(&FAMHIST_CATEGORIES),
        }
    }

    /// Whether the feature is continuous (scaled) rather than categorical.
    #[must_use]
    pub fn is_continuous(self) -> bool {
        !matches!(self, Self::Famhist)
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a column name is not part of the schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown feature `{0}`")]
pub struct UnknownFeature(pub String);

impl std::str::FromStr for Feature {
    type Err = UnknownFeature;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| UnknownFeature(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_continuous_order_matches_training_columns() {
        let names: Vec<&str> = CONTINUOUS_ORDER.iter().map(|f| f.name()).collect();
        assert_eq!(
            names,
            ["sbp", "tobacco", "ldl", "adiposity", "typea", "obesity", "alcohol", "age", "chol"]
        );
        assert!(CONTINUOUS_ORDER.iter().all(|f| f.is_continuous()));
    }

    #[test]
    fn test_names_parse_back() {
        for feature in Feature::ALL {
            assert_eq!(feature.name().parse::<Feature>(), Ok(feature));
        }
        assert!("cholesterol".parse::<Feature>().is_err());
    }

    #[test]
    fn test_domain_bounds_are_inclusive() {
        let age = Feature::Age.domain();
        assert!(age.contains(20.0));
        assert!(age.contains(90.0));
        assert!(!age.contains(19.0));
        assert!(!age.contains(30.5));
        assert!(!age.contains(f64::NAN));

        let tobacco = Feature::Tobacco.domain();
        assert!(tobacco.contains(0.0));
        assert!(tobacco.contains(12.75));
        assert!(!tobacco.contains(-0.1));
    }

    #[test]
    fn test_famhist_domain() {
        let domain = Feature::Famhist.domain();
        assert!(domain.contains_label("Absent"));
        assert!(domain.contains_label("Present"));
        assert!(!domain.contains_label("absent"));
        assert!(!domain.contains(1.0));
        assert_eq!(domain.to_string(), "{Absent, Present}");
    }
}
