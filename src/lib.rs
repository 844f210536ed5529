//! # stegaudio-client
//!
//! Client for an audio steganography service: hide a file inside a WAV
//! under a password, get it back out, and check that a QR image belongs to
//! a given WAV.
//!
//! ## Why this crate?
//!
//! The service does all the signal work; what is left on the client side is
//! easy to get subtly wrong. Multipart field names must match exactly, the
//! two-step embed must not call the QR endpoint when the first step fails,
//! downloaded names come from an untrusted header, and a user must never
//! end up with half of a result on disk. This crate encodes those rules once
//! behind three small orchestrators.
//!
//! ## Flow Overview
//!
//! ```text
//! FileSelection(s) + password
//!  │
//!  ├─ 1. Select    pick files into per-flow slots (first file of a drop wins)
//!  ├─ 2. Validate  refuse early if anything is missing (zero requests)
//!  ├─ 3. Build     RequestBuilder → multipart fields file/audio/key/qr
//!  ├─ 4. Transfer  HttpTransferClient → JSON or bytes + Content-Disposition
//!  ├─ 5. Save      DirectoryDownloader → atomic write, no clobbering
//!  └─ 6. Report    FlowState::Succeeded / Failed, FlowObserver events
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stegaudio_client::{
//!     ClientConfig, DirectoryDownloader, ExtractFlow, FileSelection, Flow, FlowContext,
//!     HttpTransferClient,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder()
//!         .base_url("http://localhost:8000")
//!         .output_dir("out")
//!         .build()?;
//!     let client = HttpTransferClient::new(&config)?;
//!     let downloader = DirectoryDownloader::new(&config.output_dir, config.overwrite);
//!
//!     let mut flow = ExtractFlow::new(FlowContext::new(client, downloader, config));
//!     flow.set_audio(Some(FileSelection::from_path("embedded_sample.wav").await?));
//!     flow.set_credential("qwerty");
//!     let state = flow.submit().await?;
//!     println!("{}", state.label());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `stegaudio` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! stegaudio-client = { version = "0.1", default-features = false }
//! ```
//!
//! ## Embed Modes
//!
//! | Mode | Calls | Result |
//! |------|-------|--------|
//! | `combined` (default) | `/embed-file` | capacity figures + links, optionally fetched |
//! | `two-step` | `/embed/audio` then `/embed/qr` | `embedded_<name>.wav` + `qr_<name>.png` |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod download;
pub mod error;
pub mod naming;
pub mod pipeline;
pub mod progress;
pub mod request;
pub mod selection;
pub mod state;
pub mod transfer;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ClientConfig, ClientConfigBuilder, EmbedMode, Endpoints, DEFAULT_BASE_URL};
pub use download::{DirectoryDownloader, DownloadTrigger, SavedArtifact};
pub use error::{ErrorDetail, FlowError, ValidationError};
pub use pipeline::extract::EXTRACT_FAILED_MESSAGE;
pub use pipeline::{EmbedFlow, ExtractFlow, Flow, FlowContext, VerifyFlow};
pub use progress::{FlowObserver, NoopObserver, ObserverRef};
pub use request::{fields, Credential, FieldValue, RequestBuilder, RequestPayload};
pub use selection::{FileSelection, FileSelectionSink, FileSlot, UploadSlotConfig};
pub use state::{can_submit, EmbedReport, FlowKind, FlowOutcome, FlowState, FlowTracker};
pub use transfer::{
    BinaryResult, HttpTransferClient, ResponseKind, StructuredResult, TransferClient,
    TransferResult,
};

#[cfg(test)]
mod tests {
    #[test]
    fn documented_dependency_line_matches_package_version() {
        let version = env!("CARGO_PKG_VERSION");
        let minor = version.rsplit_once('.').map_or(version, |(head, _)| head);
        let line = format!("stegaudio-client = {{ version = \"{minor}\"");
        assert!(include_str!("../README.md").contains(&line));
        assert!(include_str!("lib.rs").contains(&line));
    }
}
