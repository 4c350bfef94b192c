//! Character decoding for uploaded text documents.

use encoding_rs::Encoding;
use once_cell::sync::Lazy;
use regex::bytes::Regex;

static META_CHARSET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?\s*([A-Za-z0-9_\-:.]+)"#)
        .expect("valid charset regex")
});

/// Decode document bytes to UTF-8, returning the text and the encoding used.
///
/// Order: byte-order mark, valid UTF-8, a `<meta charset>` declaration in the
/// first kilobyte, then Windows-1252.
pub fn decode_to_utf8(bytes: &[u8]) -> (String, &'static str) {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return (text.into_owned(), encoding.name());
    }

    if let Ok(s) = std::str::from_utf8(bytes) {
        return (s.to_string(), "UTF-8");
    }

    if let Some(encoding) = detect_meta_charset(bytes) {
        let (text, _, had_errors) = encoding.decode(bytes);
        if had_errors {
            log::warn!("Lossy decode using declared charset {}", encoding.name());
        }
        return (text.into_owned(), encoding.name());
    }

    let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    (text.into_owned(), "windows-1252")
}

/// Find a charset declared by an HTML `<meta>` tag near the top of the document.
pub fn detect_meta_charset(bytes: &[u8]) -> Option<&'static Encoding> {
    let head = &bytes[..bytes.len().min(1024)];
    let caps = META_CHARSET.captures(head)?;
    Encoding::for_label(caps.get(1)?.as_bytes())
}
