use std::borrow::Cow;

use encoding_rs::{UTF_16BE, UTF_16LE, UTF_8};
use log::debug;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const UTF16LE_BOM: &[u8] = b"\xFF\xFE";
const UTF16BE_BOM: &[u8] = b"\xFE\xFF";

/// Control characters XML 1.0 allows in content.
pub const ALLOWED_CONTROL_CHARS: [char; 3] = ['\t', '\n', '\r'];

static DECIMAL_REFERENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"&#([0-9]+);").unwrap());
static HEX_REFERENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"&#x([0-9A-Fa-f]+);").unwrap());

/// Decode raw bytes by sniffing the byte-order mark, falling back to UTF-8.
///
/// Undecodable sequences become U+FFFD instead of an error.
pub fn detect_decode_bytes(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(UTF8_BOM) {
        debug!("decoding input as UTF-8 with BOM");
        return lossy(UTF_8.decode_without_bom_handling(rest));
    }

    if let Some(rest) = bytes.strip_prefix(UTF16LE_BOM) {
        debug!("decoding input as UTF-16LE");
        return lossy(UTF_16LE.decode_without_bom_handling(rest));
    }

    if let Some(rest) = bytes.strip_prefix(UTF16BE_BOM) {
        debug!("decoding input as UTF-16BE");
        return lossy(UTF_16BE.decode_without_bom_handling(rest));
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_owned(),
        Err(err) => {
            debug!("input is not valid UTF-8, replacing bad sequences, err={}", err);
            String::from_utf8_lossy(bytes).into_owned()
        },
    }
}

fn lossy((text, had_errors): (Cow<'_, str>, bool)) -> String {
    if had_errors {
        debug!("replaced malformed sequences while decoding");
    }
    text.into_owned()
}

/// Drop anything in front of the first `<`.
pub fn remove_leading_before_angle(text: &str) -> &str {
    match text.find('<') {
        Some(idx) if idx > 0 => &text[idx..],
        _ => text,
    }
}

/// Remove characters, literal or referenced, that would make the document
/// ill-formed. Tab, newline and carriage return survive in both forms.
pub fn clean_xml_text(text: &str) -> String {
    let mut text: String = text
        .chars()
        .filter(|c| *c >= ' ' || ALLOWED_CONTROL_CHARS.contains(c))
        .collect();

    // Dropping a reference can splice its neighbours into a new one, e.g. `&#&#4;4;`.
    loop {
        let cleaned = {
            let decimal = DECIMAL_REFERENCE.replace_all(&text, |caps: &Captures| {
                keep_reference(&caps[0], caps[1].parse::<u32>().ok())
            });
            HEX_REFERENCE
                .replace_all(&decimal, |caps: &Captures| {
                    keep_reference(&caps[0], u32::from_str_radix(&caps[1], 16).ok())
                })
                .into_owned()
        };

        // References are only ever removed, so equal length means nothing changed.
        if cleaned.len() == text.len() {
            return text;
        }
        text = cleaned;
    }
}

fn keep_reference(reference: &str, code: Option<u32>) -> String {
    if code.and_then(char::from_u32).is_some_and(is_xml_char) {
        reference.to_owned()
    } else {
        String::new()
    }
}

/// The `Char` production of XML 1.0.
fn is_xml_char(c: char) -> bool {
    matches!(c,
        '\t' | '\n' | '\r'
        | '\u{20}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}')
}
