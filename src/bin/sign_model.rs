//! Sign a trained pipeline artifact.
//!
//! Writes `manifest.json` (SHA-256 of each bound file) and `model.sig`
//! (Ed25519 over the manifest bytes) next to the artifact.
//!
//! ```bash
//! sign_model models --key-file keys/signing.seed
//! ```
//!
//! The seed is read from `--key-file`, else `CARDIORISK_SIGNING_KEY_B64_FILE`.
//! Debug builds also accept the seed inline in `CARDIORISK_SIGNING_KEY_B64`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context, Result};
use base64::engine::general_purpose;
use base64::Engine;
use clap::Parser;
use ed25519_dalek::{Signature, Signer, SigningKey};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use cardiorisk::adapters::fs::{
    sha256_hex, unix_now, ArtifactManifest, ARTIFACT_FILE, MANIFEST_FILE, MANIFEST_VERSION,
    SIGNATURE_FILE,
};
use cardiorisk::domain::TrainedPipelineArtifact;

const KEY_FILE_ENV: &str = "CARDIORISK_SIGNING_KEY_B64_FILE";
const KEY_ENV_DEV: &str = "CARDIORISK_SIGNING_KEY_B64";

#[derive(Parser)]
#[command(name = "sign_model", about = "Write a signed manifest for an artifact")]
struct Args {
    /// Artifact file or directory containing model.json.
    #[arg(value_name = "PATH")]
    artifact: PathBuf,

    /// File holding the base64 Ed25519 seed.
    #[arg(long, value_name = "PATH")]
    key_file: Option<PathBuf>,

    /// Additional files in the artifact directory to bind into the manifest.
    #[arg(long = "also", value_name = "FILE")]
    also: Vec<String>,
}

#[derive(Zeroize, ZeroizeOnDrop)]
struct Seed([u8; 32]);

fn read_seed_b64(key_file: Option<&Path>) -> Result<Zeroizing<String>> {
    let from_env = std::env::var_os(KEY_FILE_ENV).map(PathBuf::from);
    let text = match key_file.map(Path::to_path_buf).or(from_env) {
        Some(path) => Zeroizing::new(
            fs::read_to_string(&path)
                .with_context(|| format!("failed reading signing key {}", path.display()))?,
        ),
        None if cfg!(debug_assertions) => match std::env::var(KEY_ENV_DEV) {
            Ok(v) => Zeroizing::new(v),
            Err(_) => bail!("missing signing key: pass --key-file or set {KEY_FILE_ENV}"),
        },
        None => bail!("missing signing key: pass --key-file or set {KEY_FILE_ENV}"),
    };
    let secret = Zeroizing::new(text.trim().to_string());
    ensure!(!secret.is_empty(), "empty signing key");
    Ok(secret)
}

fn read_seed(key_file: Option<&Path>) -> Result<Seed> {
    let b64 = read_seed_b64(key_file)?;
    let raw = Zeroizing::new(
        general_purpose::STANDARD
            .decode(b64.as_bytes())
            .context("signing key is not valid base64")?,
    );
    ensure!(
        raw.len() == 32,
        "signing key seed must be 32 bytes after base64 decode (got {})",
        raw.len()
    );
    let mut seed = [0u8; 32];
    seed.copy_from_slice(&raw);
    Ok(Seed(seed))
}

fn main() -> Result<()> {
    let args = Args::parse();

    let (dir, model_name) = if args.artifact.is_file() {
        let dir = args
            .artifact
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let name = args
            .artifact
            .file_name()
            .and_then(|n| n.to_str())
            .context("artifact file name is not valid UTF-8")?
            .to_string();
        (dir, name)
    } else {
        (args.artifact.clone(), ARTIFACT_FILE.to_string())
    };

    // Refuse to sign something the runtime would reject anyway.
    let model_bytes = fs::read(dir.join(&model_name))
        .with_context(|| format!("failed to read {}", dir.join(&model_name).display()))?;
    TrainedPipelineArtifact::from_json_slice(&model_bytes)
        .with_context(|| format!("{model_name} is not a valid artifact"))?;

    let mut files = BTreeMap::new();
    files.insert(model_name, sha256_hex(&model_bytes));
    for rel in &args.also {
        let bytes = fs::read(dir.join(rel)).with_context(|| format!("failed to read {rel}"))?;
        files.insert(rel.clone(), sha256_hex(&bytes));
    }

    let manifest = ArtifactManifest {
        version: MANIFEST_VERSION,
        created_at: unix_now(),
        files,
    };
    let manifest_bytes = serde_json::to_vec_pretty(&manifest)?;

    let seed = read_seed(args.key_file.as_deref())?;
    let signing_key = SigningKey::from_bytes(&seed.0);
    let sig: Signature = signing_key.sign(&manifest_bytes);

    let manifest_path = dir.join(MANIFEST_FILE);
    fs::write(&manifest_path, &manifest_bytes)
        .with_context(|| format!("failed to write {}", manifest_path.display()))?;
    let sig_path = dir.join(SIGNATURE_FILE);
    fs::write(&sig_path, sig.to_bytes())
        .with_context(|| format!("failed to write {}", sig_path.display()))?;

    println!("Signed manifest: {}", manifest_path.display());
    println!("Wrote signature: {}", sig_path.display());
    println!(
        "Verifying key (base64): {}",
        general_purpose::STANDARD.encode(signing_key.verifying_key().as_bytes())
    );
    Ok(())
}
