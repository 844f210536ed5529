//! Verify flow: check that a QR image belongs to an embedded WAV.
//!
//! One call with `{audio, qr}` answered by `{"valid": bool}`. Nothing is
//! ever saved. A transport or service failure is shown as "not valid" with
//! the reason attached, while a malformed answer fails the flow.

use super::{begin, finish, step, Flow, FlowContext};
use crate::download::DownloadTrigger;
use crate::error::{ErrorDetail, FlowError, ValidationError};
use crate::progress::ObserverRef;
use crate::request::{fields, RequestBuilder};
use crate::selection::{FileSelection, FileSelectionSink, FileSlot, UploadSlotConfig};
use crate::state::{FlowKind, FlowOutcome, FlowState, FlowTracker};
use crate::transfer::{ResponseKind, TransferClient, TransferResult};
use tracing::warn;

pub struct VerifyFlow<C, D> {
    ctx: FlowContext<C, D>,
    tracker: FlowTracker,
    audio: FileSlot,
    qr: FileSlot,
}

impl<C, D> VerifyFlow<C, D> {
    pub fn new(ctx: FlowContext<C, D>) -> Self {
        Self {
            ctx,
            tracker: FlowTracker::new(FlowKind::Verify),
            audio: FileSlot::new(UploadSlotConfig::CARRIER_AUDIO),
            qr: FileSlot::new(UploadSlotConfig::QR_IMAGE),
        }
    }

    pub fn with_observer(mut self, observer: ObserverRef) -> Self {
        self.tracker = self.tracker.with_observer(observer);
        self
    }

    pub fn set_audio(&mut self, file: Option<FileSelection>) {
        self.audio.on_file_selected(file);
        self.inputs_changed();
    }

    pub fn set_qr(&mut self, file: Option<FileSelection>) {
        self.qr.on_file_selected(file);
        self.inputs_changed();
    }

    pub fn audio(&self) -> &FileSlot {
        &self.audio
    }

    pub fn qr(&self) -> &FileSlot {
        &self.qr
    }

    pub fn clear(&mut self) {
        self.audio.clear();
        self.qr.clear();
        self.tracker.reset();
    }

    fn inputs_changed(&mut self) {
        if self.tracker.state().is_terminal() {
            self.tracker.reset();
        }
    }
}

impl<C, D> Flow for VerifyFlow<C, D>
where
    C: TransferClient,
    D: DownloadTrigger,
{
    fn kind(&self) -> FlowKind {
        FlowKind::Verify
    }

    fn state(&self) -> &FlowState {
        self.tracker.state()
    }

    fn inputs_ready(&self) -> bool {
        self.audio.is_ready() && self.qr.is_ready()
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
        let qr = self
            .qr
            .get()
            .filter(|f| !f.is_empty())
            .cloned()
            .ok_or(ValidationError::MissingInput("qr"))?;
        begin(&mut self.tracker)?;

        let endpoint = self.ctx.config.endpoints.verify.as_str();
        step(&mut self.tracker, 1, 1, endpoint);
        let payload = RequestBuilder::new()
            .file(fields::AUDIO, &audio)
            .file(fields::QR, &qr)
            .build();
        let result = self
            .ctx
            .client
            .send(endpoint, payload, ResponseKind::Structured)
            .await;

        let outcome = match result {
            Ok(TransferResult::Structured(s)) => match s.valid {
                Some(valid) => Ok(FlowOutcome::Verified { valid, note: None }),
                None => Err(FlowError::Decode {
                    endpoint: endpoint.to_string(),
                    detail: "response has no 'valid' field".into(),
                }),
            },
            Ok(TransferResult::Binary(_)) => Err(FlowError::Decode {
                endpoint: endpoint.to_string(),
                detail: "expected JSON, got a file".into(),
            }),
            Err(e) if e.is_transport() => {
                warn!("verify: request failed, reporting not valid: {}", e);
                Ok(FlowOutcome::Verified {
                    valid: false,
                    note: Some(e.to_string()),
                })
            }
            Err(e) => Err(e),
        };
        finish(&mut self.tracker, outcome, |e| ErrorDetail::from(e));
        Ok(self.tracker.state())
    }
}
