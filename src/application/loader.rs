//! Artifact bootstrap: load once, share read-only.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::domain::{ArtifactLoadError, TrainedPipelineArtifact};
use crate::ports::ArtifactSource;

/// Load and validate an artifact from `source`.
///
/// # Errors
/// Propagates the source's `ArtifactLoadError`.
pub fn load_artifact<S>(source: &S) -> Result<Arc<TrainedPipelineArtifact>, ArtifactLoadError>
where
    S: ArtifactSource + ?Sized,
{
    let started = Instant::now();
    tracing::info!("Loading artifact from {}", source.location());

    let artifact = source.load().map_err(|e| {
        tracing::error!("Artifact load from {} failed: {}", source.location(), e);
        e
    })?;

    tracing::info!(
        "Artifact ready in {:.1} ms",
        started.elapsed().as_secs_f64() * 1000.0
    );
    Ok(Arc::new(artifact))
}

/// Load on a background thread, giving up after `timeout`.
///
/// The loader thread is detached on timeout; its result is discarded.
///
/// # Errors
/// `Timeout` if the source does not finish in time, otherwise the
/// source's own error.
pub fn load_artifact_with_timeout<S>(
    source: Arc<S>,
    timeout: Duration,
) -> Result<Arc<TrainedPipelineArtifact>, ArtifactLoadError>
where
    S: ArtifactSource + 'static,
{
    let (tx, rx) = mpsc::channel();
    let location = source.location();

    let spawned = thread::Builder::new()
        .name("artifact-loader".into())
        .spawn(move || {
            // Receiver may be gone after a timeout.
            let _ = tx.send(load_artifact(source.as_ref()));
        });
    if let Err(e) = spawned {
        return Err(ArtifactLoadError::Unreadable(format!(
            "failed to spawn loader thread: {e}"
        )));
    }

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => {
            tracing::error!("Artifact load from {} timed out after {:?}", location, timeout);
            Err(ArtifactLoadError::Timeout(timeout))
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(ArtifactLoadError::Unreadable(
            format!("loader thread for {location} exited without a result"),
        )),
    }
}
