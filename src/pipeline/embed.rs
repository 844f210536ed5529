//! Embed flow: hide a data file inside a carrier WAV under a password.
//!
//! ## Two-step contract
//!
//! ```text
//! {file, audio, key} ──▶ embed-audio ──▶ embedded WAV (in memory)
//!                                              │
//!                        {audio} ──▶ embed-qr ─┴──▶ QR PNG
//!
//! both calls succeeded ──▶ save embedded WAV, then save QR PNG
//! ```
//!
//! The QR call is never made when embed-audio fails, and nothing is saved
//! unless both calls succeed. The saved WAV is removed again if the QR save
//! fails or the submission is dropped before it completes.
//!
//! ## Combined contract
//!
//! One call with `{audio, file, key}`. A JSON answer carries capacity
//! figures and service-relative links, reported as an [`EmbedReport`]; with
//! `fetch_links` the links are downloaded and saved as well. A binary answer
//! is saved directly as the embedded audio.

use super::{
    begin, expect_binary, expect_content, finish, save, step, Flow, FlowContext, PendingSaves,
};
use crate::config::EmbedMode;
use crate::download::{DownloadTrigger, SavedArtifact};
use crate::error::{ErrorDetail, FlowError, ValidationError};
use crate::naming;
use crate::progress::ObserverRef;
use crate::request::{fields, Credential, RequestBuilder};
use crate::selection::{FileSelection, FileSelectionSink, FileSlot, UploadSlotConfig};
use crate::state::{EmbedReport, FlowKind, FlowOutcome, FlowState, FlowTracker};
use crate::transfer::{ResponseKind, StructuredResult, TransferClient, TransferResult};
use tracing::debug;

/// Media kind given to the intermediate WAV when it is re-uploaded.
const EMBEDDED_AUDIO_MIME: &str = "audio/wav";

/// Orchestrates one embed submission at a time.
pub struct EmbedFlow<C, D> {
    ctx: FlowContext<C, D>,
    tracker: FlowTracker,
    audio: FileSlot,
    data: FileSlot,
    credential: Option<Credential>,
}

/// Snapshot of the inputs taken when a submission starts.
struct EmbedInputs {
    audio: FileSelection,
    data: FileSelection,
    key: Credential,
}

impl<C, D> EmbedFlow<C, D> {
    pub fn new(ctx: FlowContext<C, D>) -> Self {
        Self {
            ctx,
            tracker: FlowTracker::new(FlowKind::Embed),
            audio: FileSlot::new(UploadSlotConfig::CARRIER_AUDIO),
            data: FileSlot::new(UploadSlotConfig::DATA_FILE),
            credential: None,
        }
    }

    pub fn with_observer(mut self, observer: ObserverRef) -> Self {
        self.tracker = self.tracker.with_observer(observer);
        self
    }

    /// Carrier WAV. `None` clears the slot.
    pub fn set_audio(&mut self, file: Option<FileSelection>) {
        self.audio.on_file_selected(file);
        self.inputs_changed();
    }

    /// File to hide. `None` clears the slot.
    pub fn set_data(&mut self, file: Option<FileSelection>) {
        self.data.on_file_selected(file);
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

    pub fn data(&self) -> &FileSlot {
        &self.data
    }

    /// Drop every input and return to `Idle`.
    pub fn clear(&mut self) {
        self.audio.clear();
        self.data.clear();
        self.credential = None;
        self.tracker.reset();
    }

    fn inputs_changed(&mut self) {
        if self.tracker.state().is_terminal() {
            self.tracker.reset();
        }
    }

    fn snapshot(&self) -> Result<EmbedInputs, FlowError> {
        let audio = ready(&self.audio).ok_or(ValidationError::MissingInput("audio"))?;
        let data = ready(&self.data).ok_or(ValidationError::MissingInput("file"))?;
        let key = self
            .credential
            .clone()
            .ok_or(ValidationError::MissingInput("key"))?;
        Ok(EmbedInputs { audio, data, key })
    }
}

fn ready(slot: &FileSlot) -> Option<FileSelection> {
    slot.get().filter(|f| !f.is_empty()).cloned()
}

impl<C, D> Flow for EmbedFlow<C, D>
where
    C: TransferClient,
    D: DownloadTrigger,
{
    fn kind(&self) -> FlowKind {
        FlowKind::Embed
    }

    fn state(&self) -> &FlowState {
        self.tracker.state()
    }

    fn inputs_ready(&self) -> bool {
        self.audio.is_ready() && self.data.is_ready() && self.credential.is_some()
    }

    fn reset(&mut self) {
        self.tracker.reset();
    }

    async fn submit(&mut self) -> Result<&FlowState, FlowError> {
        let inputs = self.snapshot()?;
        begin(&mut self.tracker)?;
        debug!(
            "embed: '{}' ({} bytes) into '{}' ({} bytes), mode {}",
            inputs.data.original_name(),
            inputs.data.size_bytes(),
            inputs.audio.original_name(),
            inputs.audio.size_bytes(),
            self.ctx.config.embed_mode
        );

        let result = match self.ctx.config.embed_mode {
            EmbedMode::TwoStep => run_two_step(&self.ctx, &mut self.tracker, &inputs).await,
            EmbedMode::Combined => run_combined(&self.ctx, &mut self.tracker, &inputs).await,
        };
        finish(&mut self.tracker, result, |e| ErrorDetail::from(e));
        Ok(self.tracker.state())
    }
}

async fn run_two_step<C, D>(
    ctx: &FlowContext<C, D>,
    tracker: &mut FlowTracker,
    inputs: &EmbedInputs,
) -> Result<FlowOutcome, FlowError>
where
    C: TransferClient,
    D: DownloadTrigger,
{
    let endpoints = &ctx.config.endpoints;
    let original = inputs.audio.original_name();

    step(tracker, 1, 2, &endpoints.embed_audio);
    let payload = RequestBuilder::new()
        .file(fields::FILE, &inputs.data)
        .file(fields::AUDIO, &inputs.audio)
        .credential(fields::KEY, &inputs.key)
        .build();
    let first = ctx
        .client
        .send(&endpoints.embed_audio, payload, ResponseKind::Binary)
        .await?;
    let first = expect_binary(&endpoints.embed_audio, first)?;
    let first = expect_content(&endpoints.embed_audio, first)?;
    let audio_name = naming::resolve(
        first.suggested_filename.as_deref(),
        &naming::embedded_name(original),
    );
    let embedded = FileSelection::from_bytes(audio_name.clone(), EMBEDDED_AUDIO_MIME, first.bytes);

    step(tracker, 2, 2, &endpoints.embed_qr);
    let payload = RequestBuilder::new()
        .file(fields::AUDIO, &embedded)
        .build();
    let second = ctx
        .client
        .send(&endpoints.embed_qr, payload, ResponseKind::Binary)
        .await?;
    let second = expect_binary(&endpoints.embed_qr, second)?;
    let second = expect_content(&endpoints.embed_qr, second)?;
    let qr_name = naming::resolve(second.suggested_filename.as_deref(), &naming::qr_name(original));

    let mut pending = PendingSaves::default();
    let audio = save(ctx, tracker, embedded.to_vec(), &audio_name).await?;
    pending.track(&audio);
    let qr = save(ctx, tracker, second.bytes, &qr_name).await?;
    pending.keep();
    Ok(FlowOutcome::Embedded {
        audio,
        qr: Some(qr),
    })
}

async fn run_combined<C, D>(
    ctx: &FlowContext<C, D>,
    tracker: &mut FlowTracker,
    inputs: &EmbedInputs,
) -> Result<FlowOutcome, FlowError>
where
    C: TransferClient,
    D: DownloadTrigger,
{
    let endpoint = &ctx.config.endpoints.embed_combined;
    let original = inputs.audio.original_name();

    step(tracker, 1, 1, endpoint);
    let payload = RequestBuilder::new()
        .file(fields::AUDIO, &inputs.audio)
        .file(fields::FILE, &inputs.data)
        .credential(fields::KEY, &inputs.key)
        .build();

    match ctx.client.send(endpoint, payload, ResponseKind::Auto).await? {
        TransferResult::Binary(blob) => {
            let blob = expect_content(endpoint, blob)?;
            let name = naming::resolve(
                blob.suggested_filename.as_deref(),
                &naming::embedded_name(original),
            );
            let audio = save(ctx, tracker, blob.bytes, &name).await?;
            Ok(FlowOutcome::Embedded { audio, qr: None })
        }
        TransferResult::Structured(result) => {
            let report = report_from(ctx, endpoint, result)?;
            if !ctx.config.fetch_links {
                return Ok(FlowOutcome::EmbedReport(report));
            }
            let fetched = fetch_links(ctx, tracker, &report, original).await?;
            Ok(FlowOutcome::EmbedReport(EmbedReport { fetched, ..report }))
        }
    }
}

fn report_from<C, D>(
    ctx: &FlowContext<C, D>,
    endpoint: &str,
    result: StructuredResult,
) -> Result<EmbedReport, FlowError> {
    if result.audio_path.is_none() && result.qr_path.is_none() && result.used_bytes.is_none() {
        return Err(FlowError::Decode {
            endpoint: endpoint.to_string(),
            detail: "response has neither capacity figures nor output links".into(),
        });
    }
    let audio_url = result.audio_path.as_deref().map(|p| ctx.config.endpoint_url(p));
    let qr_url = result.qr_path.as_deref().map(|p| ctx.config.endpoint_url(p));
    Ok(EmbedReport {
        used_bytes: result.used_bytes,
        max_bytes: result.max_bytes,
        remaining_bytes: result.remaining_bytes,
        audio_url,
        qr_url,
        fetched: Vec::new(),
    })
}

/// Download every reported link, then save them all or none.
async fn fetch_links<C, D>(
    ctx: &FlowContext<C, D>,
    tracker: &FlowTracker,
    report: &EmbedReport,
    original: &str,
) -> Result<Vec<SavedArtifact>, FlowError>
where
    C: TransferClient,
    D: DownloadTrigger,
{
    let links = [
        (report.audio_url.as_deref(), naming::embedded_name(original)),
        (report.qr_url.as_deref(), naming::qr_name(original)),
    ];

    let mut blobs = Vec::with_capacity(links.len());
    for (url, fallback) in links {
        let Some(url) = url else { continue };
        let blob = ctx.client.fetch(url).await?;
        let fallback = naming::sanitize(url).unwrap_or(fallback);
        let name = naming::resolve(blob.suggested_filename.as_deref(), &fallback);
        blobs.push((blob.bytes, name));
    }

    let mut pending = PendingSaves::default();
    let mut saved = Vec::with_capacity(blobs.len());
    for (bytes, name) in blobs {
        let artifact = save(ctx, tracker, bytes, &name).await?;
        pending.track(&artifact);
        saved.push(artifact);
    }
    pending.keep();
    Ok(saved)
}
