//! Filesystem adapter: Implementation of ArtifactSource for `model.json` on disk.
//!
//! # Integrity
//!
//! An artifact directory may carry an integrity envelope next to the model:
//!
//! - `manifest.json`: SHA-256 of every bound file (`{version, created_at, files}`)
//! - `model.sig`: Ed25519 signature over the exact manifest bytes
//!
//! When a manifest is present its hashes are always checked and it must bind
//! the model file being loaded. The signature is checked against the
//! configured verifying key. With `require_signature` set, an artifact
//! without a valid signed manifest is refused.
//!
//! Use `sign_model` to produce the envelope and `generate_keypair` to create
//! a signing key.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use base64::Engine;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::domain::{ArtifactLoadError, TrainedPipelineArtifact};
use crate::ports::ArtifactSource;

/// File name of the artifact inside an artifact directory.
pub const ARTIFACT_FILE: &str = "model.json";

/// File name of the integrity manifest.
pub const MANIFEST_FILE: &str = "manifest.json";

/// File name of the detached manifest signature.
pub const SIGNATURE_FILE: &str = "model.sig";

/// Manifest format version.
pub const MANIFEST_VERSION: u32 = 1;

/// Allowed clock skew for manifest timestamps, in seconds.
const MAX_CLOCK_SKEW_SECS: i64 = 300;

/// Integrity manifest binding artifact files to their SHA-256 digests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub version: u32,
    /// Unix timestamp (seconds) when the manifest was created.
    pub created_at: i64,
    /// Relative file name -> lowercase hex SHA-256.
    pub files: BTreeMap<String, String>,
}

/// Lowercase hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn constant_time_eq_str(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Seconds since the Unix epoch, or 0 if the clock is before it.
#[must_use]
pub fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Decode a base64 Ed25519 public key.
///
/// # Errors
/// Returns `Integrity` if the text is not a valid 32-byte key.
pub fn verifying_key_from_b64(b64: &str) -> Result<VerifyingKey, ArtifactLoadError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64.trim())
        .map_err(|_| ArtifactLoadError::Integrity("invalid public key base64".into()))?;
    let key: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
        ArtifactLoadError::Integrity("invalid public key length (expected 32 bytes)".into())
    })?;
    VerifyingKey::from_bytes(&key)
        .map_err(|_| ArtifactLoadError::Integrity("invalid verifying key".into()))
}

/// Loads `model.json` from a file path or an artifact directory.
#[derive(Debug, Clone)]
pub struct FsArtifactSource {
    path: PathBuf,
    verifying_key: Option<VerifyingKey>,
    require_signature: bool,
}

impl FsArtifactSource {
    /// Source for a file, or for a directory containing `model.json`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            verifying_key: None,
            require_signature: false,
        }
    }

    #[must_use]
    pub fn with_verifying_key(mut self, key: VerifyingKey) -> Self {
        self.verifying_key = Some(key);
        self
    }

    #[must_use]
    pub fn require_signature(mut self, required: bool) -> Self {
        self.require_signature = required;
        self
    }

    /// Build a source from runtime configuration.
    ///
    /// # Errors
    /// Returns `Integrity` if the configured verifying key cannot be read.
    pub fn from_config(config: &Config) -> Result<Self, ArtifactLoadError> {
        let mut source =
            Self::new(&config.artifact_path).require_signature(config.require_signed_artifact);
        if let Some(key_file) = &config.verifying_key_b64_file {
            let b64 = fs::read_to_string(key_file).map_err(|e| {
                ArtifactLoadError::Integrity(format!(
                    "failed reading verifying key {key_file:?}: {e}"
                ))
            })?;
            source = source.with_verifying_key(verifying_key_from_b64(&b64)?);
        }
        Ok(source)
    }

    /// Directory holding the artifact and its envelope, and the model file path.
    fn resolve(&self) -> Result<(PathBuf, PathBuf), ArtifactLoadError> {
        if self.path.is_dir() {
            let model = self.path.join(ARTIFACT_FILE);
            if !model.exists() {
                return Err(ArtifactLoadError::NotFound(model));
            }
            Ok((self.path.clone(), model))
        } else if self.path.is_file() {
            let dir = self
                .path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            Ok((dir, self.path.clone()))
        } else {
            Err(ArtifactLoadError::NotFound(self.path.clone()))
        }
    }

    /// Check the manifest and signature, if any.
    fn verify_envelope(&self, dir: &Path, model_path: &Path) -> Result<(), ArtifactLoadError> {
        let manifest_path = dir.join(MANIFEST_FILE);
        let sig_path = dir.join(SIGNATURE_FILE);

        if !manifest_path.exists() {
            if self.require_signature {
                return Err(ArtifactLoadError::Integrity(format!(
                    "signed manifest required but {manifest_path:?} is missing"
                )));
            }
            tracing::warn!("Loading UNSIGNED artifact from {:?} (no {MANIFEST_FILE})", model_path);
            return Ok(());
        }

        let manifest_bytes = fs::read(&manifest_path).map_err(|e| {
            ArtifactLoadError::Unreadable(format!("failed to read {manifest_path:?}: {e}"))
        })?;

        self.verify_signature(&sig_path, &manifest_bytes)?;

        let manifest: ArtifactManifest = serde_json::from_slice(&manifest_bytes)
            .map_err(|e| ArtifactLoadError::Integrity(format!("invalid {MANIFEST_FILE}: {e}")))?;
        if manifest.version != MANIFEST_VERSION {
            return Err(ArtifactLoadError::Integrity(format!(
                "unsupported manifest version {}",
                manifest.version
            )));
        }
        if manifest.created_at > unix_now() + MAX_CLOCK_SKEW_SECS {
            return Err(ArtifactLoadError::Integrity(
                "manifest created_at is in the future".into(),
            ));
        }

        let model_name = model_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(ARTIFACT_FILE);
        if !manifest.files.contains_key(model_name) {
            return Err(ArtifactLoadError::Integrity(format!(
                "{MANIFEST_FILE} does not bind {model_name}"
            )));
        }

        for (rel, expected_hex) in &manifest.files {
            let rel_path = Path::new(rel);
            if rel_path.is_absolute()
                || rel_path
                    .components()
                    .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
            {
                return Err(ArtifactLoadError::Integrity(format!(
                    "manifest entry {rel:?} escapes the artifact directory"
                )));
            }
            let path = dir.join(rel_path);
            let bytes = fs::read(&path).map_err(|e| {
                ArtifactLoadError::Integrity(format!(
                    "manifest references missing/unreadable file {path:?}: {e}"
                ))
            })?;
            if !constant_time_eq_str(&sha256_hex(&bytes), expected_hex) {
                return Err(ArtifactLoadError::Integrity(format!(
                    "file hash mismatch for {rel}"
                )));
            }
        }

        tracing::info!("Artifact manifest hashes verified ({} files)", manifest.files.len());
        Ok(())
    }

    fn verify_signature(
        &self,
        sig_path: &Path,
        manifest_bytes: &[u8],
    ) -> Result<(), ArtifactLoadError> {
        if !sig_path.exists() {
            if self.require_signature {
                return Err(ArtifactLoadError::Integrity(format!(
                    "signature required but {sig_path:?} is missing"
                )));
            }
            tracing::warn!("Artifact manifest is not signed; checking hashes only");
            return Ok(());
        }

        let Some(key) = &self.verifying_key else {
            if self.require_signature {
                return Err(ArtifactLoadError::Integrity(
                    "artifact is signed but no verifying key is configured".into(),
                ));
            }
            tracing::warn!("No verifying key configured; skipping signature check");
            return Ok(());
        };

        let sig_bytes = fs::read(sig_path).map_err(|e| {
            ArtifactLoadError::Unreadable(format!("failed to read {sig_path:?}: {e}"))
        })?;
        let sig: [u8; 64] = sig_bytes.as_slice().try_into().map_err(|_| {
            ArtifactLoadError::Integrity("invalid signature length (expected 64 bytes)".into())
        })?;

        key.verify(manifest_bytes, &Signature::from_bytes(&sig))
            .map_err(|_| ArtifactLoadError::Integrity("invalid artifact signature".into()))?;

        tracing::info!("Artifact signature verified");
        Ok(())
    }
}

impl ArtifactSource for FsArtifactSource {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<TrainedPipelineArtifact, ArtifactLoadError> {
        let (dir, model_path) = self.resolve()?;
        self.verify_envelope(&dir, &model_path)?;

        let bytes = fs::read(&model_path).map_err(|e| {
            ArtifactLoadError::Unreadable(format!("failed to read {model_path:?}: {e}"))
        })?;
        let artifact = TrainedPipelineArtifact::from_json_slice(&bytes)?;

        tracing::info!(
            "Loaded artifact from {:?} (schema_version={}, n_features={}, n_components={}, k={})",
            model_path,
            artifact.schema_version,
            artifact.input_dim(),
            artifact.projection.n_components(),
            artifact.neighbors.n_neighbors
        );
        Ok(artifact)
    }
}
