//! Saving received artifacts.
//!
//! [`DirectoryDownloader`] writes each blob through a
//! [`tempfile::NamedTempFile`] created next to the destination and then
//! persisted under its final name, so a crash never leaves a half-written
//! artifact behind. The temp handle is the only transient reference to the
//! bytes on disk and is consumed before `save` returns.

use crate::error::FlowError;
use crate::naming;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// An artifact written by a [`DownloadTrigger`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedArtifact {
    /// Name the flow asked for.
    pub requested_name: String,
    /// Where it actually landed (may carry a ` (n)` suffix).
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Persists a blob under a filename. Safe to call repeatedly.
pub trait DownloadTrigger: Send + Sync {
    fn save(
        &self,
        bytes: Vec<u8>,
        filename: &str,
    ) -> impl Future<Output = Result<SavedArtifact, FlowError>> + Send;
}

/// Saves into one output directory.
#[derive(Debug, Clone)]
pub struct DirectoryDownloader {
    dir: PathBuf,
    overwrite: bool,
}

impl DirectoryDownloader {
    pub fn new(dir: impl Into<PathBuf>, overwrite: bool) -> Self {
        Self {
            dir: dir.into(),
            overwrite,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DownloadTrigger for DirectoryDownloader {
    async fn save(&self, bytes: Vec<u8>, filename: &str) -> Result<SavedArtifact, FlowError> {
        let name = naming::resolve(Some(filename), naming::EXTRACT_FALLBACK_NAME);
        let dir = self.dir.clone();
        let overwrite = self.overwrite;
        let size_bytes = bytes.len() as u64;

        let path = tokio::task::spawn_blocking(move || write_atomic(&dir, &name, &bytes, overwrite))
            .await
            .map_err(|e| FlowError::Internal(format!("save task panicked: {e}")))??;

        info!("Saved {} ({} bytes)", path.display(), size_bytes);
        Ok(SavedArtifact {
            requested_name: filename.to_string(),
            path,
            size_bytes,
        })
    }
}

fn write_atomic(dir: &Path, name: &str, bytes: &[u8], overwrite: bool) -> Result<PathBuf, FlowError> {
    std::fs::create_dir_all(dir).map_err(|source| FlowError::OutputWriteFailed {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".stegaudio-")
        .suffix(".part")
        .tempfile_in(dir)
        .map_err(|source| FlowError::OutputWriteFailed {
            path: dir.join(name),
            source,
        })?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|source| FlowError::OutputWriteFailed {
            path: dir.join(name),
            source,
        })?;

    if overwrite {
        let target = dir.join(name);
        tmp.persist(&target)
            .map_err(|e| FlowError::OutputWriteFailed {
                path: target.clone(),
                source: e.error,
            })?;
        return Ok(target);
    }

    // `persist_noclobber` fails if the name appeared meanwhile; try the next suffix.
    let mut attempt = 0u32;
    loop {
        let target = dir.join(numbered_name(name, attempt));
        match tmp.persist_noclobber(&target) {
            Ok(_) => {
                if attempt > 0 {
                    debug!("'{}' existed, saved as '{}'", name, target.display());
                }
                return Ok(target);
            }
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists && attempt < 10_000 => {
                tmp = e.file;
                attempt += 1;
            }
            Err(e) => {
                return Err(FlowError::OutputWriteFailed {
                    path: target,
                    source: e.error,
                })
            }
        }
    }
}

/// `report.pdf` → `report (n).pdf`; `n = 0` keeps the name.
fn numbered_name(name: &str, n: u32) -> String {
    if n == 0 {
        return name.to_string();
    }
    match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{} ({}){}", &name[..dot], n, &name[dot..]),
        _ => format!("{name} ({n})"),
    }
}
