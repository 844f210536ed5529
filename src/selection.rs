//! File selections: the blobs a user picks for a flow.
//!
//! A [`FileSelection`] is captured once and never mutated; picking another
//! file replaces it wholesale. Each flow owns its [`FileSlot`]s, and the
//! bytes are released when a slot is cleared or the flow is dropped.
//!
//! The accepted-kinds filter on a slot mirrors a picker's `accept`
//! attribute: it is a hint for the host UI only. The service decides what
//! content it accepts.

use crate::error::FlowError;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// A user-picked binary blob with its declared name and media kind.
#[derive(Clone, PartialEq, Eq)]
pub struct FileSelection {
    bytes: Arc<Vec<u8>>,
    original_name: String,
    mime_hint: String,
}

impl FileSelection {
    /// Capture an in-memory blob.
    pub fn from_bytes(
        original_name: impl Into<String>,
        mime_hint: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            bytes: Arc::new(bytes.into()),
            original_name: original_name.into(),
            mime_hint: mime_hint.into(),
        }
    }

    /// Read a local file into a selection, guessing the media kind from its extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, FlowError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| FlowError::InputReadFailed {
                path: path.to_path_buf(),
                source,
            })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let mime = guess_mime(&name);
        debug!("Captured {} ({} bytes, {})", name, bytes.len(), mime);
        Ok(Self::from_bytes(name, mime, bytes))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn mime_hint(&self) -> &str {
        &self.mime_hint
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Copy the bytes out for a request body.
    pub(crate) fn to_vec(&self) -> Vec<u8> {
        self.bytes.as_ref().clone()
    }
}

impl fmt::Debug for FileSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSelection")
            .field("original_name", &self.original_name)
            .field("mime_hint", &self.mime_hint)
            .field("size_bytes", &self.size_bytes())
            .finish()
    }
}

/// Guess a MIME type from a filename extension.
pub fn guess_mime(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "wav" | "wave" => "audio/wav",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "txt" => "text/plain",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

// ── Slots ────────────────────────────────────────────────────────────────

/// Anything that can receive a picked file: a drop zone, a picker, a CLI argument.
pub trait FileSelectionSink {
    /// `None` clears the current selection.
    fn on_file_selected(&mut self, file: Option<FileSelection>);
}

/// Static description of one upload slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadSlotConfig {
    pub label: &'static str,
    /// Picker-style filter, e.g. `[".wav", "audio/wav"]`. Empty or `*/*` accepts anything.
    pub accepted_kinds: &'static [&'static str],
    pub theme: &'static str,
}

impl UploadSlotConfig {
    pub const CARRIER_AUDIO: Self = Self {
        label: "WAV Audio File",
        accepted_kinds: &[".wav", "audio/wav"],
        theme: "emerald-teal",
    };

    pub const DATA_FILE: Self = Self {
        label: "Data File",
        accepted_kinds: &["*/*"],
        theme: "blue-cyan",
    };

    pub const QR_IMAGE: Self = Self {
        label: "QR Code Image",
        accepted_kinds: &[".png", "image/png"],
        theme: "purple-pink",
    };

    /// Whether the filter suggests this file. Advisory only: a `false` here must
    /// never block a submission.
    pub fn suggests(&self, file: &FileSelection) -> bool {
        if self.accepted_kinds.is_empty() {
            return true;
        }
        let name = file.original_name().to_ascii_lowercase();
        self.accepted_kinds.iter().any(|kind| {
            if *kind == "*/*" {
                true
            } else if kind.starts_with('.') {
                name.ends_with(&kind.to_ascii_lowercase())
            } else if let Some(prefix) = kind.strip_suffix("/*") {
                file.mime_hint()
                    .split('/')
                    .next()
                    .is_some_and(|top| top.eq_ignore_ascii_case(prefix))
            } else {
                file.mime_hint().eq_ignore_ascii_case(kind)
            }
        })
    }
}

/// Holds at most one selection for one upload slot.
#[derive(Debug, Clone)]
pub struct FileSlot {
    config: UploadSlotConfig,
    current: Option<FileSelection>,
}

impl FileSlot {
    pub fn new(config: UploadSlotConfig) -> Self {
        Self {
            config,
            current: None,
        }
    }

    pub fn config(&self) -> &UploadSlotConfig {
        &self.config
    }

    /// Keep the first candidate of a drop or picker event; the rest are discarded.
    ///
    /// Returns `None` and leaves the slot untouched when there are no candidates.
    pub fn select<I>(&mut self, candidates: I) -> Option<&FileSelection>
    where
        I: IntoIterator<Item = FileSelection>,
    {
        let first = candidates.into_iter().next()?;
        if !self.config.suggests(&first) {
            debug!(
                "{}: '{}' does not match {:?}, keeping it anyway",
                self.config.label,
                first.original_name(),
                self.config.accepted_kinds
            );
        }
        self.current = Some(first);
        self.current.as_ref()
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn get(&self) -> Option<&FileSelection> {
        self.current.as_ref()
    }

    /// Present and non-empty.
    pub fn is_ready(&self) -> bool {
        self.current.as_ref().is_some_and(|f| !f.is_empty())
    }
}

impl FileSelectionSink for FileSlot {
    fn on_file_selected(&mut self, file: Option<FileSelection>) {
        match file {
            Some(f) => {
                self.select([f]);
            }
            None => self.clear(),
        }
    }
}
