//! Splitting `git format-patch --stdout` output into individual mails.
//!
//! Every mail in such an export starts with an envelope line of the form
//! `From <40-hex-sha> Mon Sep 17 00:00:00 2001`. Unlike a general MBOX, the
//! date is fixed, which makes the separator unambiguous: a `From ` line in a
//! commit message never carries it.

use std::path::Path;

use tracing::debug;

use crate::error::{PatchError, Result};
use crate::model::mail::Mail;

/// Fixed date git writes on every envelope line.
const ENVELOPE_DATE: &str = " Mon Sep 17 00:00:00 2001";

/// Length of a full hexadecimal object name.
const SHA_LEN: usize = 40;

/// Separator removed between two mails by [`split_mbox`].
pub const MAIL_SEPARATOR: &str = "\n";

/// Check whether a line (without its newline) is a format-patch envelope line.
pub fn is_envelope_line(line: &str) -> bool {
    let Some(rest) = line.strip_prefix("From ") else {
        return false;
    };
    let bytes = rest.as_bytes();
    bytes.len() == SHA_LEN + ENVELOPE_DATE.len()
        && bytes[..SHA_LEN].iter().all(u8::is_ascii_hexdigit)
        && &bytes[SHA_LEN..] == ENVELOPE_DATE.as_bytes()
}

/// Split an export into mail texts.
///
/// The split happens at each newline that directly precedes an envelope line;
/// that newline is dropped and the envelope line stays with the following
/// mail. Input without any envelope line comes back as a single element.
/// `split_mbox(s).join(MAIL_SEPARATOR) == s` always holds.
pub fn split_mbox(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut start = 0usize;
    let mut line_start = 0usize;

    while line_start < text.len() {
        let line_end = text[line_start..]
            .find('\n')
            .map_or(text.len(), |i| line_start + i);
        if line_start > 0 && is_envelope_line(&text[line_start..line_end]) {
            parts.push(text[start..line_start - 1].to_string());
            start = line_start;
        }
        line_start = line_end + 1;
    }
    parts.push(text[start..].to_string());

    debug!(count = parts.len(), "Split mbox");
    parts
}

/// Split and parse an export into [`Mail`]s.
pub fn parse_series(text: &str) -> Result<Vec<Mail>> {
    split_mbox(text).iter().map(|raw| Mail::parse(raw)).collect()
}

/// Read an export from disk and split it.
pub fn read_mbox_file(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| PatchError::io(path, e))?;
    Ok(split_mbox(&text))
}
