//! Flow orchestrators.
//!
//! Each submodule drives one user-facing task against the remote service.
//! All three share the same skeleton:
//!
//! ```text
//! inputs ready? ──no──▶ Err(Validation), state untouched, zero requests
//!      │yes
//!      ▼
//! Validating ──▶ Submitting(step k/n) … ──▶ save artifacts ──▶ Succeeded
//!                        │                         │
//!                        └──────── any error ──────┴──▶ Failed(ErrorDetail)
//! ```
//!
//! 1. [`embed`]: two-step binary chain, or a single combined call
//! 2. [`extract`]: one binary call, one saved file
//! 3. [`verify`]: one JSON call, never saves anything
//!
//! `submit` takes `&mut self`, so a flow instance can only have one
//! submission in flight. Dropping the returned future abandons the request;
//! the next `submit` (or `reset`) brings the flow back to `Idle`.

pub mod embed;
pub mod extract;
pub mod verify;

use crate::config::ClientConfig;
use crate::download::{DownloadTrigger, SavedArtifact};
use crate::error::{ErrorDetail, FlowError, ValidationError};
use crate::state::{can_submit, FlowKind, FlowOutcome, FlowState, FlowTracker};
use crate::transfer::{BinaryResult, TransferResult};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

pub use embed::EmbedFlow;
pub use extract::ExtractFlow;
pub use verify::VerifyFlow;

/// Common surface of the three orchestrators.
pub trait Flow {
    fn kind(&self) -> FlowKind;

    fn state(&self) -> &FlowState;

    /// Every required file and credential is present and non-empty.
    fn inputs_ready(&self) -> bool;

    /// The submit affordance is enabled.
    fn can_submit(&self) -> bool {
        can_submit(self.state(), self.inputs_ready())
    }

    /// Back to `Idle`, keeping the current inputs.
    fn reset(&mut self);

    /// Run one submission to a terminal state.
    ///
    /// Only [`FlowError::Validation`] is returned as an error; every other
    /// failure is reported through [`FlowState::Failed`].
    fn submit(&mut self) -> impl Future<Output = Result<&FlowState, FlowError>> + Send;
}

/// Collaborators shared by the three flows.
pub struct FlowContext<C, D> {
    pub client: Arc<C>,
    pub downloader: Arc<D>,
    pub config: Arc<ClientConfig>,
}

impl<C, D> Clone for FlowContext<C, D> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            downloader: Arc::clone(&self.downloader),
            config: Arc::clone(&self.config),
        }
    }
}

impl<C, D> FlowContext<C, D> {
    pub fn new(client: C, downloader: D, config: ClientConfig) -> Self {
        Self {
            client: Arc::new(client),
            downloader: Arc::new(downloader),
            config: Arc::new(config),
        }
    }
}

/// Gate a submission: recover an abandoned one, then require `Idle`/`Failed`.
///
/// Runs after the input check so a refused submission never changes state.
pub(crate) fn begin(tracker: &mut FlowTracker) -> Result<(), FlowError> {
    if tracker.state().is_busy() {
        tracker.reset();
    }
    if !can_submit(tracker.state(), true) {
        return Err(ValidationError::NotReady(tracker.state().label()).into());
    }
    tracker.advance(FlowState::Validating);
    Ok(())
}

/// Enter step `step` of `of` and tell the observer which endpoint is next.
pub(crate) fn step(tracker: &mut FlowTracker, step: usize, of: usize, endpoint: &str) {
    tracker.advance(FlowState::Submitting { step, of });
    info!("{}: step {}/{} → {}", tracker.kind(), step, of, endpoint);
    tracker
        .observer()
        .on_step_start(tracker.kind(), step, of, endpoint);
}

/// Move to the terminal state for `result`.
pub(crate) fn finish(
    tracker: &mut FlowTracker,
    result: Result<FlowOutcome, FlowError>,
    describe: impl FnOnce(&FlowError) -> ErrorDetail,
) {
    let next = match result {
        Ok(outcome) => {
            info!("{}: succeeded", tracker.kind());
            FlowState::Succeeded(outcome)
        }
        Err(e) => {
            warn!("{}: failed: {}", tracker.kind(), e);
            FlowState::Failed(describe(&e))
        }
    };
    tracker.advance(next);
}

/// Unwrap a binary result or report a shape mismatch.
pub(crate) fn expect_binary(endpoint: &str, result: TransferResult) -> Result<BinaryResult, FlowError> {
    match result {
        TransferResult::Binary(b) => Ok(b),
        TransferResult::Structured(_) => Err(FlowError::Decode {
            endpoint: endpoint.to_string(),
            detail: "expected a file, got JSON".into(),
        }),
    }
}

/// Reject an empty file where the step can only produce content.
pub(crate) fn expect_content(endpoint: &str, blob: BinaryResult) -> Result<BinaryResult, FlowError> {
    if blob.bytes.is_empty() {
        return Err(FlowError::Decode {
            endpoint: endpoint.to_string(),
            detail: "empty response body".into(),
        });
    }
    Ok(blob)
}

/// Save through the downloader and notify the observer.
pub(crate) async fn save<C, D>(
    ctx: &FlowContext<C, D>,
    tracker: &FlowTracker,
    bytes: Vec<u8>,
    filename: &str,
) -> Result<SavedArtifact, FlowError>
where
    D: DownloadTrigger,
{
    let saved = ctx.downloader.save(bytes, filename).await?;
    tracker.observer().on_artifact_saved(tracker.kind(), &saved);
    Ok(saved)
}

/// Files saved so far by a submission that writes more than one.
///
/// Unless [`PendingSaves::keep`] is called, every tracked file is removed on
/// drop. That covers an error between two saves as well as a caller dropping
/// the `submit` future halfway through.
#[derive(Debug, Default)]
pub(crate) struct PendingSaves {
    paths: Vec<PathBuf>,
}

impl PendingSaves {
    pub(crate) fn track(&mut self, artifact: &SavedArtifact) {
        self.paths.push(artifact.path.clone());
    }

    /// Every save went through; leave the files in place.
    pub(crate) fn keep(mut self) {
        self.paths.clear();
    }
}

impl Drop for PendingSaves {
    fn drop(&mut self) {
        for path in &self.paths {
            if let Err(e) = std::fs::remove_file(path) {
                warn!("could not remove partial artifact {}: {}", path.display(), e);
            }
        }
    }
}
