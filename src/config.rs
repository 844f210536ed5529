//! Configuration types for talking to the steganography service.
//!
//! Every knob lives in [`ClientConfig`], built via its
//! [`ClientConfigBuilder`]. The only environment-driven value in a normal
//! deployment is the service base URL; everything else has a default that
//! matches the reference backend.

use crate::error::FlowError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Default service address used when no base URL is supplied.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Configuration shared by the three flows.
///
/// # Example
/// ```rust
/// use stegaudio_client::{ClientConfig, EmbedMode};
///
/// let config = ClientConfig::builder()
///     .base_url("https://stego.example.com/api")
///     .embed_mode(EmbedMode::TwoStep)
///     .output_dir("out")
///     .build()
///     .unwrap();
/// assert_eq!(config.endpoint_url("/verify"), "https://stego.example.com/api/verify");
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Service base URL without a trailing slash. Default: [`DEFAULT_BASE_URL`].
    pub base_url: String,

    /// Endpoint paths, relative to `base_url`.
    pub endpoints: Endpoints,

    /// Which embed contract the deployment speaks. Default: [`EmbedMode::Combined`].
    pub embed_mode: EmbedMode,

    /// Whole-request timeout in seconds. Default: 300.
    ///
    /// Uploads carry the full carrier in one body and the service does the
    /// encryption and LSB pass before answering, so this is generous.
    pub request_timeout_secs: u64,

    /// Directory received artifacts are saved into. Default: current directory.
    pub output_dir: PathBuf,

    /// Replace an existing file instead of picking a `name (n).ext` variant.
    pub overwrite: bool,

    /// After a combined embed, also GET the returned audio/QR links and save them.
    pub fetch_links: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            endpoints: Endpoints::default(),
            embed_mode: EmbedMode::default(),
            request_timeout_secs: 300,
            output_dir: PathBuf::from("."),
            overwrite: false,
            fetch_links: false,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("embed_mode", &self.embed_mode)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("output_dir", &self.output_dir)
            .field("overwrite", &self.overwrite)
            .field("fetch_links", &self.fetch_links)
            .finish()
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }

    /// Join an endpoint path or a service-relative resource path onto the base URL.
    pub fn endpoint_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn endpoints(mut self, endpoints: Endpoints) -> Self {
        self.config.endpoints = endpoints;
        self
    }

    pub fn embed_mode(mut self, mode: EmbedMode) -> Self {
        self.config.embed_mode = mode;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn overwrite(mut self, v: bool) -> Self {
        self.config.overwrite = v;
        self
    }

    pub fn fetch_links(mut self, v: bool) -> Self {
        self.config.fetch_links = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, FlowError> {
        let c = &self.config;
        if !(c.base_url.starts_with("http://") || c.base_url.starts_with("https://")) {
            return Err(FlowError::InvalidConfig(format!(
                "base URL must start with http:// or https://, got '{}'",
                c.base_url
            )));
        }
        if c.request_timeout_secs == 0 {
            return Err(FlowError::InvalidConfig(
                "request timeout must be ≥ 1 second".into(),
            ));
        }
        c.endpoints.validate()?;
        Ok(self.config)
    }
}

// ── Endpoints ────────────────────────────────────────────────────────────

/// Endpoint paths of the remote service.
///
/// Defaults follow the reference backend (`/embed-file`, `/extract-file`,
/// `/verify`) plus the two-step revision (`/embed/audio`, `/embed/qr`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    pub embed_audio: String,
    pub embed_qr: String,
    pub embed_combined: String,
    pub extract: String,
    pub verify: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            embed_audio: "/embed/audio".into(),
            embed_qr: "/embed/qr".into(),
            embed_combined: "/embed-file".into(),
            extract: "/extract-file".into(),
            verify: "/verify".into(),
        }
    }
}

impl Endpoints {
    fn validate(&self) -> Result<(), FlowError> {
        let all = [
            ("embed-audio", &self.embed_audio),
            ("embed-qr", &self.embed_qr),
            ("combined embed", &self.embed_combined),
            ("extract", &self.extract),
            ("verify", &self.verify),
        ];
        for (name, path) in all {
            if path.trim().is_empty() {
                return Err(FlowError::InvalidConfig(format!(
                    "{name} endpoint path is empty"
                )));
            }
        }
        Ok(())
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// The two embed contracts a deployment may expose.
///
/// A deployment is expected to speak exactly one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmbedMode {
    /// One call returning JSON capacity figures and links to the audio and QR. (default)
    #[default]
    Combined,
    /// embed-audio returns the WAV, then embed-qr turns that WAV into a PNG.
    TwoStep,
}

impl fmt::Display for EmbedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmbedMode::Combined => f.write_str("combined"),
            EmbedMode::TwoStep => f.write_str("two-step"),
        }
    }
}
