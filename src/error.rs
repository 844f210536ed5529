//! Error types for the stegaudio-client library.
//!
//! Two layers reflect where a failure is observed:
//!
//! * [`FlowError`]: what went wrong inside a single submission (missing
//!   input, transport failure, unexpected response shape, service refusal).
//!   Returned by [`crate::transfer::TransferClient`] and
//!   [`crate::download::DownloadTrigger`].
//!
//! * [`ErrorDetail`]: the user-facing rendering of a `FlowError`, stored in
//!   [`crate::state::FlowState::Failed`]. Orchestrators catch every
//!   `FlowError` at their boundary and convert it. Only
//!   [`FlowError::Validation`] is handed back to the caller, and a refused
//!   submission never changes state.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All errors produced while driving a flow.
#[derive(Debug, Error)]
pub enum FlowError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Required input missing, or a submission is already in flight.
    /// Raised before any network call.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Could not read a local file into a selection.
    #[error("Cannot read '{path}': {source}")]
    InputReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Transfer errors ───────────────────────────────────────────────────
    /// No connectivity, timeout, or a non-2xx status without a service message.
    #[error("Request to '{endpoint}' failed: {reason}")]
    Network { endpoint: String, reason: String },

    /// Response body did not have the expected shape.
    #[error("Unexpected response from '{endpoint}': {detail}")]
    Decode { endpoint: String, detail: String },

    /// The service answered with an explicit failure message.
    #[error("{message}")]
    Service {
        endpoint: String,
        status: Option<u16>,
        message: String,
    },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not write a received artifact to disk.
    #[error("Failed to save '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FlowError {
    /// True for transport-level failures (including service-reported ones).
    ///
    /// The verify flow displays these as "not valid" rather than as a failure.
    pub fn is_transport(&self) -> bool {
        matches!(self, FlowError::Network { .. } | FlowError::Service { .. })
    }
}

/// Refusal reasons raised before a submission starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required file or the credential is absent or empty.
    #[error("Missing required input: {0}")]
    MissingInput(&'static str),

    /// The flow is `Submitting`, or `Succeeded` without new input.
    #[error("Flow is not ready for a new submission (state: {0})")]
    NotReady(&'static str),
}

/// User-facing error shown by a failed flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl ErrorDetail {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }
}

impl From<&FlowError> for ErrorDetail {
    fn from(err: &FlowError) -> Self {
        let detail = ErrorDetail::new(err.to_string());
        match err {
            FlowError::InputReadFailed { source, .. }
            | FlowError::OutputWriteFailed { source, .. } => detail.with_cause(source.to_string()),
            FlowError::Service {
                status: Some(code), ..
            } => detail.with_cause(format!("HTTP {code}")),
            _ => detail,
        }
    }
}

impl std::fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{} ({})", self.message, cause),
            None => f.write_str(&self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_error_displays_message_verbatim() {
        let e = FlowError::Service {
            endpoint: "/extract-file".into(),
            status: Some(400),
            message: "Padding is incorrect.".into(),
        };
        assert_eq!(e.to_string(), "Padding is incorrect.");
    }

    #[test]
    fn validation_display_names_missing_input() {
        let e = FlowError::from(ValidationError::MissingInput("key"));
        assert!(e.to_string().contains("key"), "got: {e}");
    }

    #[test]
    fn network_and_service_are_transport() {
        let net = FlowError::Network {
            endpoint: "/verify".into(),
            reason: "connection refused".into(),
        };
        let decode = FlowError::Decode {
            endpoint: "/verify".into(),
            detail: "not JSON".into(),
        };
        assert!(net.is_transport());
        assert!(!decode.is_transport());
    }

    #[test]
    fn detail_carries_http_status_as_cause() {
        let e = FlowError::Service {
            endpoint: "/embed-file".into(),
            status: Some(413),
            message: "too large".into(),
        };
        let d = ErrorDetail::from(&e);
        assert_eq!(d.message, "too large");
        assert_eq!(d.cause.as_deref(), Some("HTTP 413"));
        assert_eq!(d.to_string(), "too large (HTTP 413)");
    }
}
