//! RFC 5322 header handling: folding, encoded-words (RFC 2047), singleton
//! header normalization and date parsing.

use std::fmt::Write as _;

use chrono::{DateTime, FixedOffset};
use tracing::{debug, warn};

use crate::model::mail::Mail;

/// Maximum length of a single RFC 2047 encoded-word.
const MAX_ENCODED_WORD_LEN: usize = 75;

/// Headers that must appear at most once per mail, together with the value
/// spellings that are considered equivalent to each other.
pub struct SingletonHeaderSpec {
    /// Canonical header name.
    pub name: &'static str,
    /// Values that may legitimately differ between duplicates.
    pub accepted: &'static [&'static str],
}

/// The singleton header table.
pub const SINGLETON_HEADERS: &[SingletonHeaderSpec] = &[
    SingletonHeaderSpec {
        name: "Content-Description",
        accepted: &[],
    },
    SingletonHeaderSpec {
        name: "Content-ID",
        accepted: &[],
    },
    SingletonHeaderSpec {
        name: "Content-Type",
        accepted: &[
            "text/plain; charset=UTF-8",
            "text/plain; charset=utf-8",
            "text/plain; charset=\"UTF-8\"",
            "text/plain; charset=\"utf-8\"",
        ],
    },
    SingletonHeaderSpec {
        name: "Content-Transfer-Encoding",
        accepted: &["7bit", "8bit", "7BIT", "8BIT"],
    },
    SingletonHeaderSpec {
        name: "MIME-Version",
        accepted: &["1.0"],
    },
];

/// Header names whose casing is canonicalized.
const CANONICAL_NAMES: &[&str] = &["Message-Id", "Date"];

/// Normalize the headers of every mail in a series.
pub fn normalize_series(mails: &mut [Mail]) {
    for mail in mails.iter_mut() {
        normalize_headers(mail);
    }
}

/// Canonicalize header casing and drop later copies of singleton headers.
///
/// Differing duplicates are logged; the first occurrence always wins.
/// Running this twice yields the same result as running it once.
pub fn normalize_headers(mail: &mut Mail) {
    for header in mail.headers.iter_mut() {
        if let Some(canonical) = CANONICAL_NAMES
            .iter()
            .find(|c| header.name.eq_ignore_ascii_case(c))
        {
            if header.name != *canonical {
                header.name = (*canonical).to_string();
            }
        }
    }

    for rule in SINGLETON_HEADERS {
        let mut first: Option<String> = None;
        let mut removed = 0usize;
        mail.headers.retain(|header| {
            if !header.name.eq_ignore_ascii_case(rule.name) {
                return true;
            }
            let value = unfold(&header.value);
            if first.is_none() {
                first = Some(value);
                return true;
            }
            let kept = first.as_deref().unwrap_or_default();
            let equivalent = kept == value
                || (rule.accepted.contains(&kept) && rule.accepted.contains(&value.as_str()));
            if !equivalent {
                warn!(
                    header = rule.name,
                    kept = %kept,
                    dropped = %value,
                    "Conflicting duplicate header; keeping the first value"
                );
            }
            removed += 1;
            false
        });
        if removed > 0 {
            debug!(header = rule.name, removed, "Removed duplicate singleton headers");
        }
    }
}

/// Unfold a header value: continuation line breaks collapse into one space.
pub fn unfold(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for (i, line) in value.split('\n').enumerate() {
        if i == 0 {
            result.push_str(line.trim_end());
        } else {
            let piece = line.trim();
            if !piece.is_empty() {
                result.push(' ');
                result.push_str(piece);
            }
        }
    }
    result
}

/// Fold free text into a header value: every embedded newline becomes a
/// continuation line.
pub fn fold(text: &str) -> String {
    text.trim_end_matches('\n').replace('\n', "\n ")
}

/// Encode a display name as a sequence of RFC 2047 Q encoded-words.
///
/// Each encoded-word stays within 75 characters; multi-byte characters are
/// never split across words.
pub fn encode_phrase(text: &str) -> String {
    const PREFIX: &str = "=?UTF-8?q?";
    const SUFFIX: &str = "?=";
    let budget = MAX_ENCODED_WORD_LEN - PREFIX.len() - SUFFIX.len();

    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut buf = [0u8; 4];

    for ch in text.chars() {
        let mut piece = String::new();
        if ch == ' ' {
            piece.push('_');
        } else if ch.is_ascii_alphanumeric() || matches!(ch, '!' | '*' | '+' | '-' | '/') {
            piece.push(ch);
        } else {
            for byte in ch.encode_utf8(&mut buf).bytes() {
                let _ = write!(piece, "={byte:02X}");
            }
        }
        if current.len() + piece.len() > budget && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        current.push_str(&piece);
    }
    if !current.is_empty() || words.is_empty() {
        words.push(current);
    }

    words
        .iter()
        .map(|w| format!("{PREFIX}{w}{SUFFIX}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
///
/// If decoding fails for any token, the original text is preserved.
pub fn decode_encoded_words(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut remaining = input;
    let mut last_was_encoded = false;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        // Whitespace between two encoded words is dropped (RFC 2047 §6.2)
        if !last_was_encoded || !before.trim().is_empty() {
            result.push_str(before);
        }

        let after_start = &remaining[start + 2..];

        if let Some((text, consumed)) = try_decode_one_word(after_start) {
            result.push_str(&text);
            remaining = &after_start[consumed..];
            last_was_encoded = true;
        } else {
            result.push_str("=?");
            remaining = after_start;
            last_was_encoded = false;
        }
    }

    result.push_str(remaining);
    result
}

/// Decode `charset?encoding?text?=`; returns the text and the bytes consumed.
fn try_decode_one_word(s: &str) -> Option<(String, usize)> {
    let first_q = s.find('?')?;
    let charset = &s[..first_q];

    let rest = &s[first_q + 1..];
    let second_q = rest.find('?')?;
    let encoding = &rest[..second_q];

    let rest2 = &rest[second_q + 1..];
    let end = rest2.find("?=")?;
    let encoded_text = &rest2[..end];

    let consumed = first_q + 1 + second_q + 1 + end + 2;

    let bytes = match encoding {
        "B" | "b" => decode_base64(encoded_text)?,
        "Q" | "q" => decode_q_encoding(encoded_text),
        _ => return None,
    };

    Some((decode_charset(charset, &bytes), consumed))
}

/// Decode standard base64, ignoring whitespace. Returns `None` on bad input.
fn decode_base64(input: &str) -> Option<Vec<u8>> {
    fn value(c: u8) -> Option<u32> {
        match c {
            b'A'..=b'Z' => Some(u32::from(c - b'A')),
            b'a'..=b'z' => Some(u32::from(c - b'a') + 26),
            b'0'..=b'9' => Some(u32::from(c - b'0') + 52),
            b'+' => Some(62),
            b'/' => Some(63),
            _ => None,
        }
    }

    let mut out = Vec::with_capacity(input.len() * 3 / 4);
    let mut acc: u32 = 0;
    let mut bits = 0u32;
    for &c in input.as_bytes() {
        if c == b'=' {
            break;
        }
        if c.is_ascii_whitespace() {
            continue;
        }
        acc = (acc << 6) | value(c)?;
        bits += 6;
        if bits >= 8 {
            bits -= 8;
            out.push(((acc >> bits) & 0xFF) as u8);
        }
    }
    Some(out)
}

/// Decode Q-encoding (RFC 2047): underscores → spaces, `=XX` → byte.
fn decode_q_encoding(input: &str) -> Vec<u8> {
    let mut result = Vec::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap_or("");
                if let Ok(byte) = u8::from_str_radix(hex, 16) {
                    result.push(byte);
                    i += 3;
                } else {
                    result.push(b'=');
                    i += 1;
                }
            }
            b => {
                result.push(b);
                i += 1;
            }
        }
    }
    result
}

/// Decode bytes using a named charset.
fn decode_charset(charset: &str, bytes: &[u8]) -> String {
    match charset.to_lowercase().as_str() {
        "utf-8" | "utf8" => String::from_utf8_lossy(bytes).into_owned(),
        _ => {
            if let Some(encoding) = encoding_rs::Encoding::for_label(charset.as_bytes()) {
                let (decoded, _, _) = encoding.decode(bytes);
                decoded.into_owned()
            } else {
                warn!(
                    charset = charset,
                    "Unknown charset, falling back to UTF-8 lossy"
                );
                String::from_utf8_lossy(bytes).into_owned()
            }
        }
    }
}

/// Parse a date given on the command line or found in a `Date:` header.
///
/// Accepts RFC 2822, RFC 3339 and whatever `mail-parser` understands.
pub fn parse_date(date_str: &str) -> Option<DateTime<FixedOffset>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt);
    }

    if let Some(dt) = mail_parser_date(trimmed) {
        return Some(dt);
    }

    warn!(date = trimmed, "Could not parse date");
    None
}

/// Attempt to parse a date using `mail-parser`'s built-in parser.
fn mail_parser_date(input: &str) -> Option<DateTime<FixedOffset>> {
    use mail_parser::MessageParser;

    // Wrap input in a minimal RFC 5322 message so mail-parser can parse it
    let fake_msg = format!("Date: {input}\n\n");
    let parsed = MessageParser::default().parse(fake_msg.as_bytes())?;
    let dt = parsed.date()?.to_rfc3339();
    DateTime::parse_from_rfc3339(&dt).ok()
}

/// Format a date the way `git format-patch` writes it.
pub fn format_date(date: &DateTime<FixedOffset>) -> String {
    date.format("%a, %-d %b %Y %H:%M:%S %z").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail(raw: &str) -> Mail {
        Mail::parse(raw).expect("valid mail")
    }

    #[test]
    fn test_decode_base64_encoded_word() {
        assert_eq!(decode_encoded_words("=?UTF-8?B?SG9sYSBtdW5kbw==?="), "Hola mundo");
    }

    #[test]
    fn test_decode_q_encoded_word() {
        assert_eq!(decode_encoded_words("=?ISO-8859-1?Q?caf=E9?="), "café");
    }

    #[test]
    fn test_decode_multiple_encoded_words() {
        let input = "=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?=";
        assert_eq!(decode_encoded_words(input), "Hola mundo");
    }

    #[test]
    fn test_decode_plain_passthrough() {
        assert_eq!(decode_encoded_words("A U Thor"), "A U Thor");
    }

    #[test]
    fn test_encode_phrase_round_trip() {
        let encoded = encode_phrase("Jöhannes Schindelin");
        assert_eq!(encoded, "=?UTF-8?q?J=C3=B6hannes_Schindelin?=");
        assert_eq!(decode_encoded_words(&encoded), "Jöhannes Schindelin");
    }

    #[test]
    fn test_encode_phrase_splits_long_names() {
        let name = "山田太郎 ".repeat(6);
        let encoded = encode_phrase(name.trim());
        for word in encoded.split(' ') {
            assert!(word.len() <= MAX_ENCODED_WORD_LEN, "too long: {word}");
        }
        assert_eq!(decode_encoded_words(&encoded), name.trim());
    }

    #[test]
    fn test_unfold_and_fold() {
        assert_eq!(unfold("[PATCH 0/3] This is\n the subject"), "[PATCH 0/3] This is the subject");
        assert_eq!(fold("first\nsecond"), "first\n second");
        assert_eq!(unfold(&fold("first\nsecond")), "first second");
    }

    #[test]
    fn test_normalize_removes_duplicates() {
        let mut m = mail(
            "From: A <a@example.com>\n\
             MIME-Version: 1.0\n\
             Content-Type: text/plain; charset=UTF-8\n\
             Content-Type: text/plain; charset=\"utf-8\"\n\
             MIME-Version: 1.0\n\
             Subject: test\n\nbody\n",
        );
        normalize_headers(&mut m);
        let names: Vec<&str> = m.headers.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, ["From", "MIME-Version", "Content-Type", "Subject"]);
        assert_eq!(m.header("content-type"), Some("text/plain; charset=UTF-8"));
    }

    #[test]
    fn test_normalize_conflict_keeps_first() {
        let mut m = mail(
            "Content-Transfer-Encoding: 8bit\n\
             Content-Transfer-Encoding: base64\n\nbody\n",
        );
        normalize_headers(&mut m);
        assert_eq!(m.headers.len(), 1);
        assert_eq!(m.header("Content-Transfer-Encoding"), Some("8bit"));
    }

    #[test]
    fn test_normalize_canonical_casing() {
        let mut m = mail("message-id: <x@y>\nDATE: Mon, 1 Jan 2024 00:00:00 +0000\n\nbody\n");
        normalize_headers(&mut m);
        assert_eq!(m.headers[0].name, "Message-Id");
        assert_eq!(m.headers[1].name, "Date");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let raw = "From: A <a@example.com>\n\
                   Content-Type: text/plain; charset=UTF-8\n\
                   content-type: text/html\n\
                   Message-ID: <1@x>\n\nbody\n";
        let mut once = mail(raw);
        normalize_headers(&mut once);
        let mut twice = once.clone();
        normalize_headers(&mut twice);
        assert_eq!(once.render(), twice.render());
    }

    #[test]
    fn test_parse_and_format_date() {
        let dt = parse_date("Mon, 17 Sep 2018 00:00:00 +0200").expect("rfc2822");
        assert_eq!(format_date(&dt), "Mon, 17 Sep 2018 00:00:00 +0200");
        assert!(parse_date("2024-01-04T10:00:00Z").is_some());
        assert!(parse_date("").is_none());
    }
}
