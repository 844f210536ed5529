//! Output filename derivation.
//!
//! The service may name a returned blob through `Content-Disposition`; when
//! it does not, the client synthesises a name from the input filename and a
//! flow-specific prefix. Every name that reaches the file system passes
//! through [`sanitize`], because a header value is untrusted input.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

/// Name used for an extracted payload when the service does not supply one.
pub const EXTRACT_FALLBACK_NAME: &str = "extracted_file";

static FILENAME_STAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)filename\*\s*=\s*(?:UTF-8|ISO-8859-1)?'[^']*'([^;]+)"#)
        .expect("valid regex")
});

static FILENAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)filename\s*=\s*(?:"([^"]*)"|([^;]+))"#).expect("valid regex")
});

/// `embedded_<original>`.
pub fn embedded_name(original: &str) -> String {
    format!("embedded_{original}")
}

/// `qr_<original without a trailing .wav>.png`, extension match is case-insensitive.
pub fn qr_name(original: &str) -> String {
    let stem = match original.len().checked_sub(4) {
        Some(cut)
            if original.is_char_boundary(cut) && original[cut..].eq_ignore_ascii_case(".wav") =>
        {
            &original[..cut]
        }
        _ => original,
    };
    format!("qr_{stem}.png")
}

/// Pick the metadata-provided name when it survives sanitising, else the fallback.
pub fn resolve(suggested: Option<&str>, fallback: &str) -> String {
    suggested
        .and_then(sanitize)
        .or_else(|| sanitize(fallback))
        .unwrap_or_else(|| EXTRACT_FALLBACK_NAME.to_string())
}

/// Reduce a name to a single safe path component.
///
/// Keeps only the last `/`- or `\`-separated segment, drops NUL and control
/// characters, and rejects `.`/`..`. Returns `None` when nothing usable is left.
pub fn sanitize(name: &str) -> Option<String> {
    let last = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let cleaned: String = last.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        return None;
    }
    Some(cleaned.to_string())
}

/// Pull a filename out of a `Content-Disposition` header value.
///
/// `filename*=` (RFC 5987) wins over `filename=`; surrounding quotes are
/// stripped and percent-escapes in the extended form are decoded.
pub fn parse_content_disposition(header: &str) -> Option<String> {
    if let Some(caps) = FILENAME_STAR_RE.captures(header) {
        let raw = caps.get(1)?.as_str().trim();
        if let Some(decoded) = percent_decode(raw) {
            if !decoded.is_empty() {
                return Some(decoded);
            }
        }
    }
    let caps = FILENAME_RE.captures(header)?;
    let value = caps
        .get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().trim().trim_matches('"'))?;
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Text of a raw header value: UTF-8 when it is valid, ISO-8859-1 otherwise.
///
/// Some servers put an unencoded `filename=` straight into the header, so
/// the bytes are not guaranteed to be ASCII.
pub fn header_text(raw: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(raw) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => Cow::Owned(raw.iter().map(|&b| char::from(b)).collect()),
    }
}

fn percent_decode(raw: &str) -> Option<String> {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let (hi, lo) = (bytes[i + 1], bytes[i + 2]);
            if !hi.is_ascii_hexdigit() || !lo.is_ascii_hexdigit() {
                return None;
            }
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok()?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_and_qr_names() {
        assert_eq!(embedded_name("sample.wav"), "embedded_sample.wav");
        assert_eq!(qr_name("sample.wav"), "qr_sample.png");
        assert_eq!(qr_name("LOUD.WAV"), "qr_LOUD.png");
        assert_eq!(qr_name("track.flac"), "qr_track.flac.png");
        assert_eq!(qr_name("wav"), "qr_wav.png");
    }

    #[test]
    fn content_disposition_variants() {
        assert_eq!(
            parse_content_disposition("attachment; filename=secret.txt").as_deref(),
            Some("secret.txt")
        );
        assert_eq!(
            parse_content_disposition(r#"attachment; filename="my notes.txt""#).as_deref(),
            Some("my notes.txt")
        );
        assert_eq!(
            parse_content_disposition("attachment; filename*=UTF-8''r%C3%A9sum%C3%A9.pdf")
                .as_deref(),
            Some("résumé.pdf")
        );
        assert_eq!(parse_content_disposition("inline"), None);
        assert_eq!(parse_content_disposition(r#"attachment; filename="""#), None);
    }

    #[test]
    fn malformed_percent_escape_falls_back_to_plain_filename() {
        assert_eq!(
            parse_content_disposition(
                "attachment; filename=\"plain.txt\"; filename*=UTF-8''a%+4b.txt"
            )
            .as_deref(),
            Some("plain.txt")
        );
        assert_eq!(parse_content_disposition("attachment; filename*=UTF-8''%zz"), None);
    }

    #[test]
    fn header_text_falls_back_to_latin1() {
        assert_eq!(header_text(b"filename=secret.txt"), "filename=secret.txt");
        assert_eq!(header_text("filename=résumé.pdf".as_bytes()), "filename=résumé.pdf");
        assert_eq!(header_text(b"filename=r\xe9sum\xe9.pdf"), "filename=résumé.pdf");
    }

    #[test]
    fn sanitize_strips_directories() {
        assert_eq!(sanitize("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(sanitize(r"C:\temp\evil.exe").as_deref(), Some("evil.exe"));
        assert_eq!(sanitize(".."), None);
        assert_eq!(sanitize("dir/"), None);
        assert_eq!(sanitize("a\0b.txt").as_deref(), Some("ab.txt"));
    }

    #[test]
    fn resolve_prefers_metadata() {
        assert_eq!(resolve(Some("secret.txt"), EXTRACT_FALLBACK_NAME), "secret.txt");
        assert_eq!(resolve(None, EXTRACT_FALLBACK_NAME), "extracted_file");
        assert_eq!(resolve(Some("../"), EXTRACT_FALLBACK_NAME), "extracted_file");
    }
}
