//! CardioRisk: coronary heart disease risk assessment.
//!
//! Main entry point for the command-line front-end.

use std::io::{IsTerminal, Read};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cardiorisk::adapters::sanitize::{set_patient_data_logging, SanitizingMakeWriter};
use cardiorisk::adapters::FsArtifactSource;
use cardiorisk::application::{load_artifact, load_artifact_with_timeout};
use cardiorisk::config::parse_bool;
use cardiorisk::domain::factors::percent_label;
use cardiorisk::domain::{Feature, PatientForm, RiskAssessment, TrainedPipelineArtifact};
use cardiorisk::{Config, InferenceService};

mod cli;

use crate::cli::{AssessArgs, Cli, Command, OutputFormat};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(cli.quiet)?;

    match &cli.command {
        Command::Schema => {
            print_schema();
            Ok(())
        }
        Command::Inspect => {
            let config = resolve_config(&cli, None)?;
            let artifact = load(&config)?;
            println!("{}", serde_json::to_string_pretty(&artifact.summary())?);
            Ok(())
        }
        Command::Assess(args) => {
            let config = resolve_config(&cli, Some(args))?;
            let artifact = load(&config)?;
            let service = InferenceService::from_artifact(artifact, config.settings())?;
            let assessment = service.assess_form(read_form(args)?)?;
            match args.format {
                OutputFormat::Text => print_assessment(&assessment),
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&assessment)?);
                }
            }
            Ok(())
        }
    }
}

/// Install the global subscriber.
///
/// Logs go to stderr by default so stdout carries only command output.
/// `CARDIORISK_LOG_MODE=file` appends to `CARDIORISK_LOG_FILE` instead.
fn init_logging(quiet: bool) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_mode = std::env::var("CARDIORISK_LOG_MODE").unwrap_or_else(|_| "stderr".to_string());

    let (writer, guard) = if log_mode == "file" {
        let log_file = std::env::var("CARDIORISK_LOG_FILE")
            .unwrap_or_else(|_| "cardiorisk.log".to_string());
        if let Some(parent) = Path::new(&log_file).parent() {
            // Best-effort: a missing directory surfaces as the open error below.
            let _ = std::fs::create_dir_all(parent);
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .with_context(|| format!("failed to open log file {log_file}"))?;
        tracing_appender::non_blocking(file)
    } else {
        tracing_appender::non_blocking(std::io::stderr())
    };

    let log_patient_data = std::env::var("CARDIORISK_LOG_PATIENT_DATA")
        .ok()
        .and_then(|v| parse_bool(&v))
        .unwrap_or(false);
    set_patient_data_logging(log_patient_data);

    let default_level = if quiet { "warn" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(log_mode != "file" && std::io::stderr().is_terminal())
                .with_writer(SanitizingMakeWriter::new(writer)),
        )
        .init();

    if log_patient_data {
        tracing::warn!("Patient field values will appear in logs (CARDIORISK_LOG_PATIENT_DATA)");
    }
    Ok(guard)
}

fn resolve_config(cli: &Cli, assess: Option<&AssessArgs>) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(path) = &cli.artifact {
        config.artifact_path = path.clone();
    }
    if let Some(policy) = assess.and_then(|a| a.unknown_category) {
        config.unknown_category = policy.into();
    }
    Ok(config)
}

fn load(config: &Config) -> Result<Arc<TrainedPipelineArtifact>> {
    let source = FsArtifactSource::from_config(config)?;
    let artifact = match config.load_timeout() {
        Some(timeout) => load_artifact_with_timeout(Arc::new(source), timeout),
        None => load_artifact(&source),
    };
    artifact.with_context(|| format!("cannot load artifact from {:?}", config.artifact_path))
}

fn read_form(args: &AssessArgs) -> Result<PatientForm> {
    let Some(input) = &args.input else {
        return Ok(args.form());
    };
    let text = if input.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read record from stdin")?;
        buf
    } else {
        std::fs::read_to_string(input)
            .with_context(|| format!("failed to read record from {}", input.display()))?
    };
    serde_json::from_str(&text).context("record is not a valid JSON patient form")
}

fn print_assessment(assessment: &RiskAssessment) {
    let prediction = &assessment.prediction;
    println!("{}", prediction.status_text());
    println!("Probability: {}", prediction.probability_percent());
    println!("Risk tier:   {} ({})", assessment.tier, assessment.tier.description());
    println!("Advice:      {}", assessment.tier.advice());
    println!();
    println!("Risk factors:");
    for (factor, score) in &assessment.factor_scores {
        let bar = "#".repeat((score * 20.0).round() as usize);
        println!("  {:<10} {:<20} {:>4}", factor.label(), bar, percent_label(*score));
    }
}

fn print_schema() {
    for feature in Feature::ALL {
        println!(
            "{:<10} {:<24} {}",
            feature.name(),
            feature.domain().to_string(),
            feature.description()
        );
    }
}
