//! CLI argument definitions for the cardiorisk binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use cardiorisk::domain::{PatientForm, UnknownCategoryPolicy};

#[derive(Parser)]
#[command(
    name = "cardiorisk",
    version,
    about = "Coronary heart disease risk assessment for a single patient record"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// JSON configuration file (overrides CARDIORISK_CONFIG).
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Artifact file or directory (overrides config and environment).
    #[arg(long, value_name = "PATH", global = true)]
    pub artifact: Option<PathBuf>,

    /// Only log warnings and errors unless RUST_LOG is set.
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Assess one patient record.
    Assess(AssessArgs),

    /// Describe the loaded artifact.
    Inspect,

    /// List the input features and their valid ranges.
    Schema,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum PolicyArg {
    Strict,
    UnknownBucket,
}

impl From<PolicyArg> for UnknownCategoryPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Strict => Self::Strict,
            PolicyArg::UnknownBucket => Self::UnknownBucket,
        }
    }
}

#[derive(Args)]
pub struct AssessArgs {
    /// Read the record as JSON from a file, or `-` for stdin. Field flags are
    /// ignored when set.
    #[arg(long, value_name = "PATH")]
    pub input: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// How to treat a family-history value the model was not trained on.
    #[arg(long = "unknown-category", value_enum)]
    pub unknown_category: Option<PolicyArg>,

    /// Age in years (20-90).
    #[arg(long, default_value_t = 30)]
    pub age: i32,

    /// Systolic blood pressure, mmHg (90-200).
    #[arg(long, default_value_t = 120)]
    pub sbp: i32,

    /// Total cholesterol, mg/dL (120-350).
    #[arg(long, default_value_t = 200)]
    pub chol: i32,

    /// LDL cholesterol, mg/dL (50-250).
    #[arg(long, default_value_t = 130)]
    pub ldl: i32,

    /// Body fat percentage (10-45).
    #[arg(long, default_value_t = 20.0)]
    pub adiposity: f64,

    /// Body mass index (15-50).
    #[arg(long, default_value_t = 25.0)]
    pub obesity: f64,

    /// Cumulative tobacco, kg (0-40).
    #[arg(long, default_value_t = 0.0)]
    pub tobacco: f64,

    /// Alcohol consumption (0-50).
    #[arg(long, default_value_t = 0.0)]
    pub alcohol: f64,

    /// Type-A behavior score (0-100).
    #[arg(long, default_value_t = 50)]
    pub typea: i32,

    /// Family history of heart disease (Absent or Present).
    #[arg(long, default_value = "Absent")]
    pub famhist: String,
}

impl AssessArgs {
    /// The record described by the field flags.
    pub fn form(&self) -> PatientForm {
        PatientForm {
            age: Some(f64::from(self.age)),
            sbp: Some(f64::from(self.sbp)),
            chol: Some(f64::from(self.chol)),
            ldl: Some(f64::from(self.ldl)),
            adiposity: Some(self.adiposity),
            obesity: Some(self.obesity),
            tobacco: Some(self.tobacco),
            alcohol: Some(self.alcohol),
            typea: Some(f64::from(self.typea)),
            famhist: Some(self.famhist.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardiorisk::PatientRecord;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flag_defaults_match_form_defaults() {
        let cli = Cli::parse_from(["cardiorisk", "assess"]);
        let Command::Assess(args) = cli.command else {
            panic!("expected assess");
        };
        let record = PatientRecord::try_from(args.form()).expect("record");
        assert_eq!(record, PatientRecord::default());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "cardiorisk",
            "assess",
            "--artifact",
            "/tmp/model.json",
            "--unknown-category",
            "unknown-bucket",
            "--famhist",
            "Present",
            "-q",
        ]);
        assert!(cli.quiet);
        assert_eq!(cli.artifact, Some(PathBuf::from("/tmp/model.json")));
        let Command::Assess(args) = cli.command else {
            panic!("expected assess");
        };
        assert!(matches!(args.unknown_category, Some(PolicyArg::UnknownBucket)));
        assert_eq!(args.famhist, "Present");
    }
}
