//! Multipart request assembly.
//!
//! Field names are part of the service contract; a misspelt name is not
//! rejected by anything on the client, the service just fails the call. The
//! names therefore live in [`fields`] and nowhere else.

use crate::error::{FlowError, ValidationError};
use crate::selection::FileSelection;
use reqwest::multipart::{Form, Part};
use std::fmt;

/// Multipart field names expected by the service.
pub mod fields {
    /// Data file to hide.
    pub const FILE: &str = "file";
    /// Carrier WAV (or the embedded WAV for embed-qr).
    pub const AUDIO: &str = "audio";
    /// Password.
    pub const KEY: &str = "key";
    /// QR image for verification.
    pub const QR: &str = "qr";
}

/// A user-entered password.
///
/// Lives only as long as the flow that holds it. Never serialised, and
/// redacted in `Debug` output so it cannot end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Reject an empty password.
    pub fn new(secret: impl Into<String>) -> Result<Self, FlowError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(ValidationError::MissingInput("key").into());
        }
        Ok(Self(secret))
    }

    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// One multipart field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    File(FileSelection),
    Text(String),
    /// Sent as text, redacted in `Debug`.
    Secret(Credential),
}

/// A built request body. Single use: consumed by [`RequestPayload::into_form`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPayload {
    fields: Vec<(&'static str, FieldValue)>,
}

impl RequestPayload {
    pub fn fields(&self) -> &[(&'static str, FieldValue)] {
        &self.fields
    }

    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|(n, _)| *n).collect()
    }

    /// The text value of a field, if present.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.iter().find_map(|(n, v)| match v {
            FieldValue::Text(t) if *n == name => Some(t.as_str()),
            FieldValue::Secret(c) if *n == name => Some(c.expose()),
            _ => None,
        })
    }

    /// The file value of a field, if present.
    pub fn file(&self, name: &str) -> Option<&FileSelection> {
        self.fields.iter().find_map(|(n, v)| match v {
            FieldValue::File(f) if *n == name => Some(f),
            _ => None,
        })
    }

    /// Total bytes of file parts.
    pub fn upload_size(&self) -> u64 {
        self.fields
            .iter()
            .map(|(_, v)| match v {
                FieldValue::File(f) => f.size_bytes(),
                FieldValue::Text(_) | FieldValue::Secret(_) => 0,
            })
            .sum()
    }

    /// Convert into a reqwest multipart form, preserving field order.
    pub fn into_form(self) -> Result<Form, FlowError> {
        let mut form = Form::new();
        for (name, value) in self.fields {
            form = match value {
                FieldValue::Text(text) => form.text(name, text),
                FieldValue::Secret(credential) => form.text(name, credential.0),
                FieldValue::File(file) => {
                    let part = Part::bytes(file.to_vec())
                        .file_name(file.original_name().to_string())
                        .mime_str(file.mime_hint())
                        .map_err(|e| {
                            FlowError::Internal(format!(
                                "invalid MIME '{}' for field '{name}': {e}",
                                file.mime_hint()
                            ))
                        })?;
                    form.part(name, part)
                }
            };
        }
        Ok(form)
    }
}

/// Collects fields in submission order.
#[derive(Debug, Default)]
pub struct RequestBuilder {
    fields: Vec<(&'static str, FieldValue)>,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, name: &'static str, file: &FileSelection) -> Self {
        self.fields.push((name, FieldValue::File(file.clone())));
        self
    }

    pub fn text(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.fields.push((name, FieldValue::Text(value.into())));
        self
    }

    pub fn credential(mut self, name: &'static str, credential: &Credential) -> Self {
        self.fields
            .push((name, FieldValue::Secret(credential.clone())));
        self
    }

    pub fn build(self) -> RequestPayload {
        RequestPayload {
            fields: self.fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (FileSelection, FileSelection, Credential) {
        (
            FileSelection::from_bytes("secret.txt", "text/plain", b"top secret".to_vec()),
            FileSelection::from_bytes("sample.wav", "audio/wav", b"RIFF".to_vec()),
            Credential::new("qwerty").unwrap(),
        )
    }

    #[test]
    fn builder_preserves_order() {
        let (data, audio, key) = sample();
        let payload = RequestBuilder::new()
            .file(fields::FILE, &data)
            .file(fields::AUDIO, &audio)
            .credential(fields::KEY, &key)
            .build();
        assert_eq!(payload.field_names(), vec!["file", "audio", "key"]);
        assert_eq!(payload.text("key"), Some("qwerty"));
        assert_eq!(payload.file("audio").unwrap().original_name(), "sample.wav");
        assert_eq!(payload.upload_size(), 14);
    }

    #[test]
    fn same_fields_give_equal_payloads() {
        let (data, audio, key) = sample();
        let build = || {
            RequestBuilder::new()
                .file(fields::FILE, &data)
                .file(fields::AUDIO, &audio)
                .credential(fields::KEY, &key)
                .build()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn empty_credential_rejected() {
        let err = Credential::new("").unwrap_err();
        assert!(matches!(
            err,
            FlowError::Validation(ValidationError::MissingInput("key"))
        ));
    }

    #[test]
    fn credential_debug_is_redacted() {
        let key = Credential::new("hunter2").unwrap();
        assert_eq!(format!("{key:?}"), "Credential(***)");
    }

    #[test]
    fn payload_debug_hides_credential() {
        let (_, audio, key) = sample();
        let payload = RequestBuilder::new()
            .credential(fields::KEY, &key)
            .file(fields::AUDIO, &audio)
            .build();
        let rendered = format!("{payload:?}");
        assert!(!rendered.contains("qwerty"), "got: {rendered}");
    }

    #[test]
    fn into_form_accepts_guessed_mime() {
        let (data, audio, key) = sample();
        let form = RequestBuilder::new()
            .file(fields::FILE, &data)
            .file(fields::AUDIO, &audio)
            .credential(fields::KEY, &key)
            .build()
            .into_form();
        assert!(form.is_ok());
    }
}
