//! End-to-end tests against a mock HTTP service.
//!
//! `wiremock` stands in for the steganography backend so the real
//! `HttpTransferClient` and `DirectoryDownloader` are exercised: multipart
//! field names, `Content-Disposition` handling, error mapping and what ends
//! up on disk.

use serde_json::json;
use stegaudio_client::{
    fields, ClientConfig, DirectoryDownloader, EmbedFlow, EmbedMode, ExtractFlow, FileSelection,
    Flow, FlowContext, FlowError, FlowOutcome, FlowState, HttpTransferClient, RequestBuilder,
    ResponseKind, TransferClient, TransferResult, VerifyFlow, EXTRACT_FAILED_MESSAGE,
};
use reqwest::header::HeaderValue;
use std::path::Path;
use tracing_subscriber::EnvFilter;
use wiremock::{
    matchers::{body_string_contains, method, path},
    Mock, MockServer, ResponseTemplate,
};

// ── Helpers ──────────────────────────────────────────────────────────────

/// Route client logs to the test harness; `RUST_LOG=debug` shows every request.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

type HttpContext = FlowContext<HttpTransferClient, DirectoryDownloader>;

fn context(server: &MockServer, out: &Path, mode: EmbedMode, fetch_links: bool) -> HttpContext {
    init_tracing();
    let config = ClientConfig::builder()
        .base_url(server.uri())
        .embed_mode(mode)
        .fetch_links(fetch_links)
        .request_timeout_secs(5)
        .output_dir(out)
        .build()
        .unwrap();
    let client = HttpTransferClient::new(&config).unwrap();
    let downloader = DirectoryDownloader::new(out, false);
    FlowContext::new(client, downloader, config)
}

fn client_for(server: &MockServer) -> HttpTransferClient {
    init_tracing();
    let config = ClientConfig::builder()
        .base_url(server.uri())
        .request_timeout_secs(5)
        .build()
        .unwrap();
    HttpTransferClient::new(&config).unwrap()
}

fn sample_wav() -> FileSelection {
    FileSelection::from_bytes("sample.wav", "audio/wav", b"RIFF-sample-carrier".to_vec())
}

fn secret_txt() -> FileSelection {
    FileSelection::from_bytes("secret.txt", "text/plain", b"meet at the old mill".to_vec())
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// ── Flows over HTTP ──────────────────────────────────────────────────────

#[tokio::test]
async fn two_step_embed_over_http_saves_audio_and_qr() {
    let server = MockServer::start().await;
    let out = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/embed/audio"))
        .and(body_string_contains("name=\"file\"; filename=\"secret.txt\""))
        .and(body_string_contains("name=\"audio\"; filename=\"sample.wav\""))
        .and(body_string_contains("name=\"key\""))
        .and(body_string_contains("qwerty"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(b"RIFF-embedded".to_vec(), "audio/wav"),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/embed/qr"))
        .and(body_string_contains("name=\"audio\"; filename=\"embedded_sample.wav\""))
        .and(body_string_contains("RIFF-embedded"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"PNG-qr".to_vec(), "image/png"))
        .expect(1)
        .mount(&server)
        .await;

    let mut flow = EmbedFlow::new(context(&server, out.path(), EmbedMode::TwoStep, false));
    flow.set_audio(Some(sample_wav()));
    flow.set_data(Some(secret_txt()));
    flow.set_credential("qwerty");
    let state = flow.submit().await.unwrap();

    assert!(
        matches!(state, FlowState::Succeeded(FlowOutcome::Embedded { .. })),
        "got {state:?}"
    );
    assert_eq!(files_in(out.path()), vec!["embedded_sample.wav", "qr_sample.png"]);
    assert_eq!(
        std::fs::read(out.path().join("embedded_sample.wav")).unwrap(),
        b"RIFF-embedded"
    );
    assert_eq!(std::fs::read(out.path().join("qr_sample.png")).unwrap(), b"PNG-qr");
}

#[tokio::test]
async fn oversized_upload_error_stops_before_qr() {
    let server = MockServer::start().await;
    let out = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/embed/audio"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"error": "Ukuran file melebihi 1MB"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/embed/qr"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"PNG".to_vec(), "image/png"))
        .expect(0)
        .mount(&server)
        .await;

    let mut flow = EmbedFlow::new(context(&server, out.path(), EmbedMode::TwoStep, false));
    flow.set_audio(Some(sample_wav()));
    flow.set_data(Some(secret_txt()));
    flow.set_credential("qwerty");
    let state = flow.submit().await.unwrap();

    match state {
        FlowState::Failed(detail) => assert_eq!(detail.message, "Ukuran file melebihi 1MB"),
        other => panic!("expected Failed, got {other:?}"),
    }
    assert!(files_in(out.path()).is_empty());
}

#[tokio::test]
async fn combined_embed_reports_and_fetches_links() {
    let server = MockServer::start().await;
    let out = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/embed-file"))
        .and(body_string_contains("name=\"audio\""))
        .and(body_string_contains("name=\"file\""))
        .and(body_string_contains("name=\"key\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "used_bytes": 20,
            "max_bytes": 2375,
            "remaining": 2355,
            "audio_file": "output/encoded_sample.wav",
            "qr_code": "output/qr_sample.wav.png"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/output/encoded_sample.wav"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"RIFF-out".to_vec(), "audio/wav"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/output/qr_sample.wav.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"PNG-out".to_vec(), "image/png"))
        .expect(1)
        .mount(&server)
        .await;

    let mut flow = EmbedFlow::new(context(&server, out.path(), EmbedMode::Combined, true));
    flow.set_audio(Some(sample_wav()));
    flow.set_data(Some(secret_txt()));
    flow.set_credential("qwerty");
    let state = flow.submit().await.unwrap();

    match state {
        FlowState::Succeeded(FlowOutcome::EmbedReport(r)) => {
            assert_eq!(r.used_bytes, Some(20));
            assert_eq!(r.max_bytes, Some(2375));
            assert_eq!(r.remaining_bytes, Some(2355));
            assert_eq!(
                r.audio_url,
                Some(format!("{}/output/encoded_sample.wav", server.uri()))
            );
            assert_eq!(r.fetched.len(), 2);
        }
        other => panic!("unexpected state {other:?}"),
    }
    assert_eq!(
        files_in(out.path()),
        vec!["encoded_sample.wav", "qr_sample.wav.png"]
    );
}

#[tokio::test]
async fn extract_over_http_uses_content_disposition() {
    let server = MockServer::start().await;
    let out = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/extract-file"))
        .and(body_string_contains("name=\"key\""))
        .and(body_string_contains("name=\"audio\"; filename=\"embedded_sample.wav\""))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(b"meet at the old mill".to_vec(), "application/octet-stream")
                .insert_header("content-disposition", "attachment; filename=\"secret.txt\""),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut flow = ExtractFlow::new(context(&server, out.path(), EmbedMode::default(), false));
    flow.set_audio(Some(FileSelection::from_bytes(
        "embedded_sample.wav",
        "audio/wav",
        b"RIFF-embedded".to_vec(),
    )));
    flow.set_credential("qwerty");
    let state = flow.submit().await.unwrap();

    assert!(matches!(state, FlowState::Succeeded(FlowOutcome::Extracted(_))));
    assert_eq!(files_in(out.path()), vec!["secret.txt"]);
    assert_eq!(
        std::fs::read(out.path().join("secret.txt")).unwrap(),
        b"meet at the old mill"
    );
}

#[tokio::test]
async fn extract_server_error_is_reported_generically() {
    let server = MockServer::start().await;
    let out = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/extract-file"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;

    let mut flow = ExtractFlow::new(context(&server, out.path(), EmbedMode::default(), false));
    flow.set_audio(Some(sample_wav()));
    flow.set_credential("wrong");
    let state = flow.submit().await.unwrap();

    match state {
        FlowState::Failed(detail) => {
            assert_eq!(detail.message, EXTRACT_FAILED_MESSAGE);
            assert!(detail.cause.as_deref().unwrap_or_default().contains("500"));
        }
        other => panic!("expected Failed, got {other:?}"),
    }
    assert!(files_in(out.path()).is_empty());
}

#[tokio::test]
async fn extract_keeps_latin1_filename_from_header() {
    let server = MockServer::start().await;
    let out = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/extract-file"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(b"cv".to_vec(), "application/octet-stream")
                .insert_header(
                    "content-disposition",
                    HeaderValue::from_bytes(b"attachment; filename=r\xe9sum\xe9.pdf").unwrap(),
                ),
        )
        .mount(&server)
        .await;

    let mut flow = ExtractFlow::new(context(&server, out.path(), EmbedMode::default(), false));
    flow.set_audio(Some(sample_wav()));
    flow.set_credential("qwerty");
    let state = flow.submit().await.unwrap();

    assert!(matches!(state, FlowState::Succeeded(FlowOutcome::Extracted(_))));
    assert_eq!(files_in(out.path()), vec!["résumé.pdf"]);
}

#[tokio::test]
async fn extract_saves_an_empty_hidden_file() {
    let server = MockServer::start().await;
    let out = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/extract-file"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(Vec::<u8>::new(), "application/octet-stream")
                .insert_header("content-disposition", "attachment; filename=empty.txt"),
        )
        .mount(&server)
        .await;

    let mut flow = ExtractFlow::new(context(&server, out.path(), EmbedMode::default(), false));
    flow.set_audio(Some(sample_wav()));
    flow.set_credential("qwerty");
    let state = flow.submit().await.unwrap();

    match state {
        FlowState::Succeeded(FlowOutcome::Extracted(saved)) => assert_eq!(saved.size_bytes, 0),
        other => panic!("expected Extracted, got {other:?}"),
    }
    assert_eq!(files_in(out.path()), vec!["empty.txt"]);
    assert!(std::fs::read(out.path().join("empty.txt")).unwrap().is_empty());
}

#[tokio::test]
async fn verify_over_http() {
    let server = MockServer::start().await;
    let out = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/verify"))
        .and(body_string_contains("name=\"audio\""))
        .and(body_string_contains("name=\"qr\"; filename=\"qr_sample.png\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"valid": true})))
        .expect(1)
        .mount(&server)
        .await;

    let mut flow = VerifyFlow::new(context(&server, out.path(), EmbedMode::default(), false));
    flow.set_audio(Some(sample_wav()));
    flow.set_qr(Some(FileSelection::from_bytes(
        "qr_sample.png",
        "image/png",
        b"PNG-qr".to_vec(),
    )));
    let state = flow.submit().await.unwrap();

    assert_eq!(
        state,
        &FlowState::Succeeded(FlowOutcome::Verified {
            valid: true,
            note: None
        })
    );
    assert!(files_in(out.path()).is_empty());
}

#[tokio::test]
async fn verify_against_unreachable_service_is_not_valid() {
    let out = tempfile::tempdir().unwrap();
    // Bind then drop a listener to get a port nothing listens on.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let config = ClientConfig::builder()
        .base_url(format!("http://127.0.0.1:{port}"))
        .request_timeout_secs(5)
        .output_dir(out.path())
        .build()
        .unwrap();
    let client = HttpTransferClient::new(&config).unwrap();
    let ctx = FlowContext::new(client, DirectoryDownloader::new(out.path(), false), config);

    let mut flow = VerifyFlow::new(ctx);
    flow.set_audio(Some(sample_wav()));
    flow.set_qr(Some(FileSelection::from_bytes("qr.png", "image/png", b"PNG".to_vec())));
    let state = flow.submit().await.unwrap();

    match state {
        FlowState::Succeeded(FlowOutcome::Verified { valid, note }) => {
            assert!(!valid);
            assert!(note.is_some());
        }
        other => panic!("unexpected state {other:?}"),
    }
}

// ── Transfer client error mapping ────────────────────────────────────────

fn audio_only() -> stegaudio_client::RequestPayload {
    RequestBuilder::new().file(fields::AUDIO, &sample_wav()).build()
}

#[tokio::test]
async fn non_2xx_without_message_is_a_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embed/qr"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .send("/embed/qr", audio_only(), ResponseKind::Binary)
        .await
        .unwrap_err();
    match err {
        FlowError::Network { endpoint, reason } => {
            assert_eq!(endpoint, "/embed/qr");
            assert!(reason.contains("502"), "reason: {reason}");
        }
        other => panic!("expected Network, got {other:?}"),
    }
}

#[tokio::test]
async fn detail_body_on_error_status_is_a_service_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/verify"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({"detail": "QR tidak valid"})))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .send("/verify", audio_only(), ResponseKind::Structured)
        .await
        .unwrap_err();
    match err {
        FlowError::Service {
            status, message, ..
        } => {
            assert_eq!(status, Some(422));
            assert_eq!(message, "QR tidak valid");
        }
        other => panic!("expected Service, got {other:?}"),
    }
}

#[tokio::test]
async fn shape_mismatches_are_decode_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"<html>".to_vec(), "text/html"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/extract-file"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"valid": true})))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .send("/verify", audio_only(), ResponseKind::Structured)
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::Decode { .. }), "got {err:?}");

    let err = client
        .send("/extract-file", audio_only(), ResponseKind::Binary)
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::Decode { .. }), "got {err:?}");
}

#[tokio::test]
async fn rfc5987_filename_is_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/extract-file"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(b"cv".to_vec(), "application/pdf")
                .insert_header(
                    "content-disposition",
                    "attachment; filename=\"resume.pdf\"; filename*=UTF-8''r%C3%A9sum%C3%A9.pdf",
                ),
        )
        .mount(&server)
        .await;

    let result = client_for(&server)
        .send("/extract-file", audio_only(), ResponseKind::Binary)
        .await
        .unwrap();
    match result {
        TransferResult::Binary(b) => {
            assert_eq!(b.suggested_filename.as_deref(), Some("résumé.pdf"));
            assert_eq!(b.content_type.as_deref(), Some("application/pdf"));
            assert_eq!(b.bytes, b"cv");
        }
        other => panic!("expected Binary, got {other:?}"),
    }
}
