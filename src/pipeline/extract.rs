//! Extract flow: recover the hidden file from an embedded WAV.
//!
//! One call with `{key, audio}`; the binary answer is saved under the
//! service-supplied name, or `extracted_file` when there is none.

use super::{begin, expect_binary, finish, save, step, Flow, FlowContext};
use crate::download::DownloadTrigger;
use crate::error::{ErrorDetail, FlowError, ValidationError};
use crate::naming;
use crate::progress::ObserverRef;
use crate::request::{fields, Credential, RequestBuilder};
use crate::selection::{FileSelection, FileSelectionSink, FileSlot, UploadSlotConfig};
use crate::state::{FlowKind, FlowOutcome, FlowState, FlowTracker};
use crate::transfer::{ResponseKind, TransferClient};

/// Shown when the service rejects an extraction without saying why.
pub const EXTRACT_FAILED_MESSAGE: &str = "Extraction failed: Invalid key or corrupted file.";

pub struct ExtractFlow<C, D> {
    ctx: FlowContext<C, D>,
    tracker: FlowTracker,
    audio: FileSlot,
    credential: Option<Credential>,
}

impl<C, D> ExtractFlow<C, D> {
    pub fn new(ctx: FlowContext<C, D>) -> Self {
        Self {
            ctx,
            tracker: FlowTracker::new(FlowKind::Extract),
            audio: FileSlot::new(UploadSlotConfig::CARRIER_AUDIO),
            credential: None,
        }
    }

    pub fn with_observer(mut self, observer: ObserverRef) -> Self {
        self.tracker = self.tracker.with_observer(observer);
        self
    }

    /// Embedded WAV. `None` clears the slot.
    pub fn set_audio(&mut self, file: Option<FileSelection>) {
        self.audio.on_file_selected(file);
        self.inputs_changed();
    }

    /// Password. An empty string clears it.
    pub fn set_credential(&mut self, secret: &str) {
        self.credential = Credential::new(secret).ok();
        self.inputs_changed();
    }

    pub fn audio(&self) -> &FileSlot {
        &self.audio
    }

    pub fn clear(&mut self) {
        self.audio.clear();
        self.credential = None;
        self.tracker.reset();
    }

    fn inputs_changed(&mut self) {
        if self.tracker.state().is_terminal() {
            self.tracker.reset();
        }
    }
}

impl<C, D> Flow for ExtractFlow<C, D>
where
    C: TransferClient,
    D: DownloadTrigger,
{
    fn kind(&self) -> FlowKind {
        FlowKind::Extract
    }

    fn state(&self) -> &FlowState {
        self.tracker.state()
    }

    fn inputs_ready(&self) -> bool {
        self.audio.is_ready() && self.credential.is_some()
    }

    fn reset(&mut self) {
        self.tracker.reset();
    }

    async fn submit(&mut self) -> Result<&FlowState, FlowError> {
        let audio = self
            .audio
            .get()
            .filter(|f| !f.is_empty())
            .cloned()
            .ok_or(ValidationError::MissingInput("audio"))?;
        let key = self
            .credential
            .clone()
            .ok_or(ValidationError::MissingInput("key"))?;
        begin(&mut self.tracker)?;

        let result = run(&self.ctx, &mut self.tracker, &audio, &key).await;
        finish(&mut self.tracker, result, describe_failure);
        Ok(self.tracker.state())
    }
}

async fn run<C, D>(
    ctx: &FlowContext<C, D>,
    tracker: &mut FlowTracker,
    audio: &FileSelection,
    key: &Credential,
) -> Result<FlowOutcome, FlowError>
where
    C: TransferClient,
    D: DownloadTrigger,
{
    let endpoint = &ctx.config.endpoints.extract;
    step(tracker, 1, 1, endpoint);
    let payload = RequestBuilder::new()
        .credential(fields::KEY, key)
        .file(fields::AUDIO, audio)
        .build();
    let blob = expect_binary(
        endpoint,
        ctx.client
            .send(endpoint, payload, ResponseKind::Binary)
            .await?,
    )?;
    let name = naming::resolve(
        blob.suggested_filename.as_deref(),
        naming::EXTRACT_FALLBACK_NAME,
    );
    let saved = save(ctx, tracker, blob.bytes, &name).await?;
    Ok(FlowOutcome::Extracted(saved))
}

/// The service's own message wins; any other request failure reads as a bad key.
fn describe_failure(err: &FlowError) -> ErrorDetail {
    match err {
        FlowError::Service { .. } => ErrorDetail::from(err),
        FlowError::Network { .. } | FlowError::Decode { .. } => {
            ErrorDetail::new(EXTRACT_FAILED_MESSAGE).with_cause(err.to_string())
        }
        _ => ErrorDetail::from(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn service_message_is_kept() {
        let d = describe_failure(&FlowError::Service {
            endpoint: "/extract-file".into(),
            status: Some(400),
            message: "Invalid password".into(),
        });
        assert_eq!(d.message, "Invalid password");
    }

    #[test]
    fn http_failure_reads_as_invalid_key() {
        let d = describe_failure(&FlowError::Network {
            endpoint: "/extract-file".into(),
            reason: "HTTP 500 Internal Server Error".into(),
        });
        assert_eq!(d.message, EXTRACT_FAILED_MESSAGE);
        assert!(d.cause.unwrap().contains("500"));
    }

    #[test]
    fn write_failure_is_not_blamed_on_the_key() {
        let d = describe_failure(&FlowError::OutputWriteFailed {
            path: PathBuf::from("/ro/secret.txt"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        });
        assert!(d.message.starts_with("Failed to save"));
    }
}
