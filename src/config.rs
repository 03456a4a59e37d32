//! Runtime configuration.
//!
//! Resolution order, later wins:
//! 1. Built-in defaults
//! 2. JSON file (`--config` or `CARDIORISK_CONFIG`)
//! 3. Environment:
//!    - `CARDIORISK_ARTIFACT_PATH`
//!    - `CARDIORISK_UNKNOWN_CATEGORY` (`strict` | `unknown_bucket`)
//!    - `CARDIORISK_REQUIRE_SIGNED_ARTIFACT`
//!    - `CARDIORISK_VERIFYING_KEY_B64_FILE`
//!    - `CARDIORISK_LOAD_TIMEOUT_SECS`
//! 4. Command-line flags (applied by the binary)

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::application::AssessmentSettings;
use crate::domain::{FactorCeilings, TierThresholds, UnknownCategoryPolicy};
use crate::CardioRiskError;

pub const CONFIG_ENV: &str = "CARDIORISK_CONFIG";

const DEFAULT_LOAD_TIMEOUT_SECS: u64 = 30;

/// Parse the usual truthy/falsy spellings.
#[must_use]
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "1" | "true" | "TRUE" | "yes" | "YES" | "on" => Some(true),
        "0" | "false" | "FALSE" | "no" | "NO" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// `model.json` or a directory containing it.
    pub artifact_path: PathBuf,
    pub unknown_category: UnknownCategoryPolicy,
    /// Refuse artifacts without a verified signed manifest.
    pub require_signed_artifact: bool,
    /// File holding the base64 Ed25519 verifying key.
    pub verifying_key_b64_file: Option<PathBuf>,
    /// 0 disables the timeout.
    pub load_timeout_secs: u64,
    pub tiers: TierThresholds,
    pub factor_ceilings: FactorCeilings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            artifact_path: PathBuf::from("models"),
            unknown_category: UnknownCategoryPolicy::Strict,
            require_signed_artifact: false,
            verifying_key_b64_file: None,
            load_timeout_secs: DEFAULT_LOAD_TIMEOUT_SECS,
            tiers: TierThresholds::default(),
            factor_ceilings: FactorCeilings::default(),
        }
    }
}

impl Config {
    /// Read a JSON config file. Missing keys take their defaults.
    ///
    /// # Errors
    /// `Io` if the file cannot be read, `Serialization` if it is not valid.
    pub fn from_file(path: &Path) -> Result<Self, CardioRiskError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Defaults, then the config file (explicit path or `CARDIORISK_CONFIG`),
    /// then the process environment.
    ///
    /// # Errors
    /// Returns error if the file is unreadable or an override is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, CardioRiskError> {
        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let mut config = match path.map(Path::to_path_buf).or(from_env) {
            Some(file) => {
                tracing::debug!("Reading configuration from {:?}", file);
                Self::from_file(&file)?
            }
            None => Self::default(),
        };
        config.apply_env_from(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `CARDIORISK_*` overrides from `lookup`.
    ///
    /// # Errors
    /// `Config` naming the variable whose value could not be parsed.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), CardioRiskError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let invalid = |name: &str, value: &str| {
            CardioRiskError::Config(format!("invalid value {value:?} for {name}"))
        };

        if let Some(v) = lookup("CARDIORISK_ARTIFACT_PATH") {
            self.artifact_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("CARDIORISK_UNKNOWN_CATEGORY") {
            self.unknown_category = v.parse().map_err(CardioRiskError::Config)?;
        }
        if let Some(v) = lookup("CARDIORISK_REQUIRE_SIGNED_ARTIFACT") {
            self.require_signed_artifact =
                parse_bool(&v).ok_or_else(|| invalid("CARDIORISK_REQUIRE_SIGNED_ARTIFACT", &v))?;
        }
        if let Some(v) = lookup("CARDIORISK_VERIFYING_KEY_B64_FILE") {
            self.verifying_key_b64_file = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("CARDIORISK_LOAD_TIMEOUT_SECS") {
            self.load_timeout_secs = v
                .trim()
                .parse()
                .map_err(|_| invalid("CARDIORISK_LOAD_TIMEOUT_SECS", &v))?;
        }
        Ok(())
    }

    /// # Errors
    /// `Config` if tier thresholds or factor ceilings are unusable.
    pub fn validate(&self) -> Result<(), CardioRiskError> {
        self.tiers.validate().map_err(CardioRiskError::Config)?;
        self.factor_ceilings
            .validate()
            .map_err(CardioRiskError::Config)?;
        Ok(())
    }

    #[must_use]
    pub fn load_timeout(&self) -> Option<Duration> {
        (self.load_timeout_secs > 0).then(|| Duration::from_secs(self.load_timeout_secs))
    }

    #[must_use]
    pub fn settings(&self) -> AssessmentSettings {
        AssessmentSettings {
            policy: self.unknown_category,
            thresholds: self.tiers,
            ceilings: self.factor_ceilings,
        }
    }
}
