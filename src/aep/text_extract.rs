//! Best-effort text extraction from `ADBE Text Document` raw payloads (`tdbs` chunks).
//!
//! Tries a cascade of decoders in order — structured record, UTF-16 scan, UTF-8 scan —
//! and returns the first that yields printable text. Absence is not a parser error: a
//! total cascade failure returns `None` plus a `ParseWarning`, per the open question on
//! `tdbs`'s undocumented, version-dependent binary layout.

use super::model::{ParseWarning, ParseWarningKind, TextDocument};

/// Minimum run length (in characters) accepted as "printable text" by the scan decoders,
/// to avoid treating a handful of coincidentally-printable bytes as real text.
const MIN_SCAN_RUN_LEN: usize = 2;

/// Run the decoder cascade over a `tdbs` property's raw payload.
pub fn extract_text_document(raw: &[u8]) -> (Option<TextDocument>, Option<ParseWarning>) {
    if let Some(doc) = decode_structured(raw) {
        return (Some(doc), None);
    }
    if let Some(text) = decode_utf16_scan(raw) {
        return (Some(simple_document(text)), None);
    }
    if let Some(text) = decode_utf8_scan(raw) {
        return (Some(simple_document(text)), None);
    }
    (
        None,
        Some(ParseWarning {
            kind: ParseWarningKind::EmptyTextExtraction,
            message: "tdbs payload yielded no text from any decoder in the cascade".to_string(),
            byte_offset: None,
        }),
    )
}

fn simple_document(text: String) -> TextDocument {
    TextDocument {
        text,
        font_name: None,
        font_size: None,
        fill_color: None,
        is_animated: false,
    }
}

/// The most common AE `tdbs` record layout: a fixed 28-byte fixed-field header (not
/// further interpreted here beyond skipping it) followed by a big-endian `u16` character
/// count and then that many UTF-16BE code units.
const STRUCTURED_HEADER_LEN: usize = 28;

fn decode_structured(raw: &[u8]) -> Option<TextDocument> {
    if raw.len() < STRUCTURED_HEADER_LEN + 2 {
        return None;
    }
    let count_bytes = &raw[STRUCTURED_HEADER_LEN..STRUCTURED_HEADER_LEN + 2];
    let char_count = u16::from_be_bytes([count_bytes[0], count_bytes[1]]) as usize;
    if char_count == 0 || char_count > 10_000 {
        return None;
    }
    let text_start = STRUCTURED_HEADER_LEN + 2;
    let text_end = text_start + char_count * 2;
    if text_end > raw.len() {
        return None;
    }
    let units: Vec<u16> = raw[text_start..text_end]
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect();
    let text = String::from_utf16(&units).ok()?;
    if text.trim().is_empty() || !is_mostly_printable(&text) {
        return None;
    }
    Some(simple_document(text))
}

/// Scan the payload for the longest run of printable UTF-16BE characters.
fn decode_utf16_scan(raw: &[u8]) -> Option<String> {
    if raw.len() < 4 {
        return None;
    }
    let mut best: Option<String> = None;
    let mut current = String::new();

    let mut i = 0;
    while i + 1 < raw.len() {
        let unit = u16::from_be_bytes([raw[i], raw[i + 1]]);
        match char::from_u32(unit as u32) {
            Some(c) if is_printable(c) => current.push(c),
            _ => {
                replace_if_longer(&mut best, &current);
                current.clear();
            }
        }
        i += 2;
    }
    replace_if_longer(&mut best, &current);
    best.filter(|s| s.chars().count() >= MIN_SCAN_RUN_LEN)
}

/// Scan the payload for the longest run of printable UTF-8 text.
fn decode_utf8_scan(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let mut best: Option<String> = None;
    let mut current = String::new();

    for c in text.chars() {
        if c != '\u{FFFD}' && is_printable(c) {
            current.push(c);
        } else {
            replace_if_longer(&mut best, &current);
            current.clear();
        }
    }
    replace_if_longer(&mut best, &current);
    best.filter(|s| s.chars().count() >= MIN_SCAN_RUN_LEN)
}

fn replace_if_longer(best: &mut Option<String>, candidate: &str) {
    if candidate.is_empty() {
        return;
    }
    let better = match best {
        Some(existing) => candidate.chars().count() > existing.chars().count(),
        None => true,
    };
    if better {
        *best = Some(candidate.to_string());
    }
}

fn is_printable(c: char) -> bool {
    c.is_alphanumeric() || c.is_whitespace() || c.is_ascii_punctuation()
}

fn is_mostly_printable(s: &str) -> bool {
    let total = s.chars().count().max(1);
    let printable = s.chars().filter(|c| is_printable(*c)).count();
    printable * 10 >= total * 9
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_decode_finds_utf16_text() {
        let mut raw = vec![0u8; STRUCTURED_HEADER_LEN];
        let text = "Hello";
        raw.extend_from_slice(&(text.chars().count() as u16).to_be_bytes());
        for c in text.encode_utf16() {
            raw.extend_from_slice(&c.to_be_bytes());
        }
        let (doc, warning) = extract_text_document(&raw);
        assert!(warning.is_none());
        assert_eq!(doc.unwrap().text, "Hello");
    }

    #[test]
    fn utf8_scan_fallback_finds_text() {
        let mut raw = vec![0xff, 0x00, 0x01];
        raw.extend_from_slice(b"Caption Text");
        raw.extend_from_slice(&[0x00, 0xff]);
        let (doc, warning) = extract_text_document(&raw);
        assert!(warning.is_none());
        assert!(doc.unwrap().text.contains("Caption Text"));
    }

    #[test]
    fn total_failure_is_not_an_error() {
        let raw = vec![0u8; 4];
        let (doc, warning) = extract_text_document(&raw);
        assert!(doc.is_none());
        assert!(warning.is_some());
    }
}
