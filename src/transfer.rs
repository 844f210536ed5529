//! HTTP transfer: one multipart POST per call, decoded as JSON or kept as bytes.
//!
//! ## Response kinds
//!
//! The caller declares up front what it expects. `Structured` bodies are
//! decoded into [`StructuredResult`]; `Binary` bodies are returned untouched
//! together with the filename found in `Content-Disposition`, if any. `Auto`
//! accepts whichever of the two the service sends.
//!
//! ## Error mapping
//!
//! | Situation | Error |
//! |-----------|-------|
//! | connect/timeout/IO failure | [`FlowError::Network`] |
//! | any status with `{"error"|"detail": ...}` JSON body | [`FlowError::Service`] |
//! | non-2xx without such a body | [`FlowError::Network`] |
//! | 2xx but wrong body shape | [`FlowError::Decode`] |
//!
//! The reference backend reports an oversized upload as
//! `200 {"error": "..."}`, so a JSON error object is a service failure even
//! on a success status.

use crate::config::ClientConfig;
use crate::error::FlowError;
use crate::naming;
use crate::request::RequestPayload;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// What the caller expects back from an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Structured,
    Binary,
    /// Either shape; JSON bodies decode as structured, anything else stays binary.
    Auto,
}

/// Decoded JSON response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_bytes: Option<u64>,
    /// Service-relative path of the embedded WAV.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_path: Option<String>,
    /// Service-relative path of the QR image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_path: Option<String>,
}

/// Raw binary response.
#[derive(Clone, PartialEq, Eq)]
pub struct BinaryResult {
    pub bytes: Vec<u8>,
    /// Filename from `Content-Disposition`, unsanitised.
    pub suggested_filename: Option<String>,
    pub content_type: Option<String>,
}

impl std::fmt::Debug for BinaryResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinaryResult")
            .field("len", &self.bytes.len())
            .field("suggested_filename", &self.suggested_filename)
            .field("content_type", &self.content_type)
            .finish()
    }
}

/// Exactly one variant is produced per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferResult {
    Structured(StructuredResult),
    Binary(BinaryResult),
}

/// Wire shape of every JSON body the service sends.
#[derive(Debug, Default, Deserialize)]
struct WireBody {
    valid: Option<bool>,
    used_bytes: Option<u64>,
    max_bytes: Option<u64>,
    #[serde(alias = "remaining_bytes")]
    remaining: Option<u64>,
    audio_file: Option<String>,
    qr_code: Option<String>,
    error: Option<serde_json::Value>,
    detail: Option<serde_json::Value>,
}

impl WireBody {
    fn service_message(&self) -> Option<String> {
        self.error
            .as_ref()
            .or(self.detail.as_ref())
            .and_then(|v| match v {
                serde_json::Value::Null => None,
                serde_json::Value::String(s) if s.trim().is_empty() => None,
                serde_json::Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            })
    }

    fn into_result(self) -> StructuredResult {
        StructuredResult {
            valid: self.valid,
            used_bytes: self.used_bytes,
            max_bytes: self.max_bytes,
            remaining_bytes: self.remaining,
            audio_path: self.audio_file,
            qr_path: self.qr_code,
        }
    }
}

/// Performs requests against the remote service.
///
/// Orchestrators are generic over this trait so the whole flow logic can be
/// exercised against an in-memory double.
pub trait TransferClient: Send + Sync {
    /// POST `payload` as one multipart body to `endpoint` (a path relative to the base URL).
    fn send(
        &self,
        endpoint: &str,
        payload: RequestPayload,
        kind: ResponseKind,
    ) -> impl Future<Output = Result<TransferResult, FlowError>> + Send;

    /// GET a service-relative resource (e.g. a link returned by the combined embed call).
    fn fetch(&self, path: &str) -> impl Future<Output = Result<BinaryResult, FlowError>> + Send;
}

/// [`TransferClient`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransferClient {
    client: Client,
    config: ClientConfig,
}

impl HttpTransferClient {
    pub fn new(config: &ClientConfig) -> Result<Self, FlowError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| FlowError::InvalidConfig(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    fn network_error(&self, endpoint: &str, e: reqwest::Error) -> FlowError {
        let reason = if e.is_timeout() {
            format!("timed out after {}s", self.config.request_timeout_secs)
        } else if e.is_connect() {
            format!("cannot connect to {}", self.config.base_url)
        } else {
            e.to_string()
        };
        FlowError::Network {
            endpoint: endpoint.to_string(),
            reason,
        }
    }
}

impl TransferClient for HttpTransferClient {
    async fn send(
        &self,
        endpoint: &str,
        payload: RequestPayload,
        kind: ResponseKind,
    ) -> Result<TransferResult, FlowError> {
        let url = self.config.endpoint_url(endpoint);
        let start = Instant::now();
        info!(
            "POST {} ({} fields, {} bytes)",
            url,
            payload.fields().len(),
            payload.upload_size()
        );

        let form = payload.into_form()?;
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.network_error(endpoint, e))?;

        let status = response.status();
        debug!("{} answered {} in {:?}", endpoint, status, start.elapsed());
        decode_response(endpoint, response, kind)
            .await
            .map_err(|e| {
                warn!("{} failed: {}", endpoint, e);
                e
            })
    }

    async fn fetch(&self, path: &str) -> Result<BinaryResult, FlowError> {
        let url = self.config.endpoint_url(path);
        info!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.network_error(path, e))?;
        match decode_response(path, response, ResponseKind::Binary).await? {
            TransferResult::Binary(b) => Ok(b),
            TransferResult::Structured(_) => Err(FlowError::Decode {
                endpoint: path.to_string(),
                detail: "expected a file, got JSON".into(),
            }),
        }
    }
}

fn is_json(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| {
        let ct = ct.to_ascii_lowercase();
        ct.starts_with("application/json") || ct.contains("+json")
    })
}

/// Map a response to a [`TransferResult`] according to the expected kind.
async fn decode_response(
    endpoint: &str,
    response: Response,
    kind: ResponseKind,
) -> Result<TransferResult, FlowError> {
    let status = response.status();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let suggested_filename = response
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|v| naming::parse_content_disposition(&naming::header_text(v.as_bytes())));

    let body = response.bytes().await.map_err(|e| FlowError::Network {
        endpoint: endpoint.to_string(),
        reason: format!("reading body: {e}"),
    })?;

    // JSON error objects are honoured regardless of status or expected kind.
    let wire: Option<WireBody> = if is_json(content_type.as_deref()) || kind != ResponseKind::Binary {
        serde_json::from_slice(&body).ok()
    } else {
        None
    };
    if let Some(message) = wire.as_ref().and_then(WireBody::service_message) {
        return Err(FlowError::Service {
            endpoint: endpoint.to_string(),
            status: Some(status.as_u16()),
            message,
        });
    }

    if !status.is_success() {
        return Err(FlowError::Network {
            endpoint: endpoint.to_string(),
            reason: status_reason(status),
        });
    }

    match kind {
        ResponseKind::Auto => match wire {
            Some(w) => Ok(TransferResult::Structured(w.into_result())),
            None => Ok(binary_result(body.to_vec(), suggested_filename, content_type)),
        },
        ResponseKind::Structured => match wire {
            Some(w) => Ok(TransferResult::Structured(w.into_result())),
            None => Err(FlowError::Decode {
                endpoint: endpoint.to_string(),
                detail: format!(
                    "expected JSON, got {} bytes of {}",
                    body.len(),
                    content_type.as_deref().unwrap_or("unknown content")
                ),
            }),
        },
        ResponseKind::Binary => {
            if is_json(content_type.as_deref()) {
                return Err(FlowError::Decode {
                    endpoint: endpoint.to_string(),
                    detail: "expected a file, got JSON".into(),
                });
            }
            Ok(binary_result(body.to_vec(), suggested_filename, content_type))
        }
    }
}

/// An empty body is a valid file here; steps that need content check for it.
fn binary_result(
    bytes: Vec<u8>,
    suggested_filename: Option<String>,
    content_type: Option<String>,
) -> TransferResult {
    TransferResult::Binary(BinaryResult {
        bytes,
        suggested_filename,
        content_type,
    })
}

fn status_reason(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("HTTP {} {}", status.as_u16(), reason),
        None => format!("HTTP {}", status.as_u16()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_body_maps_combined_response() {
        let w: WireBody = serde_json::from_str(
            r#"{"used_bytes": 120, "max_bytes": 5000, "remaining": 4880,
                "audio_file": "output/encoded_a.wav", "qr_code": "output/qr_a.wav.png"}"#,
        )
        .unwrap();
        assert!(w.service_message().is_none());
        let r = w.into_result();
        assert_eq!(r.used_bytes, Some(120));
        assert_eq!(r.remaining_bytes, Some(4880));
        assert_eq!(r.audio_path.as_deref(), Some("output/encoded_a.wav"));
        assert_eq!(r.qr_path.as_deref(), Some("output/qr_a.wav.png"));
    }

    #[test]
    fn wire_body_keeps_qr_link_without_audio() {
        let w: WireBody =
            serde_json::from_str(r#"{"used_bytes": 1, "qr_code": "output/qr_a.wav.png"}"#).unwrap();
        let r = w.into_result();
        assert_eq!(r.audio_path, None);
        assert_eq!(r.qr_path.as_deref(), Some("output/qr_a.wav.png"));
    }

    #[test]
    fn wire_body_error_and_detail() {
        let w: WireBody = serde_json::from_str(r#"{"error": "Ukuran file melebihi 1MB"}"#).unwrap();
        assert_eq!(w.service_message().as_deref(), Some("Ukuran file melebihi 1MB"));

        let w: WireBody =
            serde_json::from_str(r#"{"detail": [{"loc": ["body", "key"], "msg": "field required"}]}"#)
                .unwrap();
        assert!(w.service_message().unwrap().contains("field required"));

        let w: WireBody = serde_json::from_str(r#"{"valid": true, "error": null}"#).unwrap();
        assert!(w.service_message().is_none());
    }

    #[test]
    fn json_content_type_detection() {
        assert!(is_json(Some("application/json")));
        assert!(is_json(Some("application/problem+json; charset=utf-8")));
        assert!(!is_json(Some("audio/wav")));
        assert!(!is_json(None));
    }

    #[test]
    fn status_reason_formats() {
        assert_eq!(status_reason(StatusCode::NOT_FOUND), "HTTP 404 Not Found");
    }
}
