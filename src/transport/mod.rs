//! Delivering generated mails.

pub mod mbox;
pub mod sendmail;

use crate::error::{PatchError, Result};
use crate::model::mail::Mail;

/// Something that accepts one rendered mail at a time.
pub trait MailTransport {
    /// Deliver `raw` and return the Message-ID it went out with.
    fn send(&mut self, raw: &str) -> Result<String>;
}

/// Message-ID of a rendered mail, without angle brackets.
pub(crate) fn message_id_of(raw: &str) -> Result<String> {
    Mail::parse(raw)?
        .message_id()
        .ok_or(PatchError::MissingMessageId)
}

/// `raw` without its mbox envelope line.
pub(crate) fn strip_envelope(raw: &str) -> &str {
    match raw.split_once('\n') {
        Some((first, rest)) if crate::parser::mbox::is_envelope_line(first) => rest,
        _ => raw,
    }
}
