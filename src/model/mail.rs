//! A single RFC 2822 mail as produced by `git format-patch`.

use crate::error::{PatchError, Result};
use crate::parser::header::unfold;
use crate::parser::mbox::is_envelope_line;

/// One header field. Continuation lines stay inside `value` (separated by
/// `\n` followed by the original leading whitespace).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Field name with its original casing.
    pub name: String,
    /// Raw field value, without the `": "` separator.
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A mail split into envelope line, headers and body.
///
/// [`Mail::render`] reproduces the parsed text byte for byte as long as every
/// header was written as `Name: value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    /// The mbox `From <sha> Mon Sep 17 00:00:00 2001` line, without newline.
    pub envelope: Option<String>,

    /// Headers in their original order.
    pub headers: Vec<Header>,

    /// Everything after the blank line that ends the header block.
    pub body: String,
}

impl Mail {
    /// Parse one mail. The header block must be terminated by a blank line.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut rest = raw;
        let mut envelope = None;

        if let Some(newline) = rest.find('\n') {
            let first = &rest[..newline];
            if is_envelope_line(first) {
                envelope = Some(first.to_string());
                rest = &rest[newline + 1..];
            }
        }

        let (header_block, body) = if let Some(body) = rest.strip_prefix('\n') {
            ("", body)
        } else {
            match rest.find("\n\n") {
                Some(end) => (&rest[..end + 1], &rest[end + 2..]),
                None => {
                    return Err(PatchError::MissingHeaderBlock {
                        excerpt: raw.chars().take(200).collect(),
                    })
                }
            }
        };

        let mut headers: Vec<Header> = Vec::new();
        for line in header_block.lines() {
            let is_continuation = line.starts_with(' ') || line.starts_with('\t');
            match line.find(':') {
                Some(colon) if !is_continuation => {
                    let value = &line[colon + 1..];
                    headers.push(Header::new(
                        &line[..colon],
                        value.strip_prefix(' ').unwrap_or(value),
                    ));
                }
                // Continuation, or a stray line we keep attached to its header
                _ => match headers.last_mut() {
                    Some(last) => {
                        last.value.push('\n');
                        last.value.push_str(line);
                    }
                    None => {
                        return Err(PatchError::MissingHeaderBlock {
                            excerpt: line.to_string(),
                        })
                    }
                },
            }
        }

        Ok(Self {
            envelope,
            headers,
            body: body.to_string(),
        })
    }

    /// Serialize back to mail text.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.body.len() + 1024);
        if let Some(envelope) = &self.envelope {
            out.push_str(envelope);
            out.push('\n');
        }
        for header in &self.headers {
            out.push_str(&header.name);
            out.push(':');
            if !header.value.is_empty() {
                out.push(' ');
                out.push_str(&header.value);
            }
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out
    }

    /// Raw value of the first header with this name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// Mutable access to the first header with this name.
    pub fn header_mut(&mut self, name: &str) -> Option<&mut Header> {
        self.headers
            .iter_mut()
            .find(|h| h.name.eq_ignore_ascii_case(name))
    }

    /// Replace the value of the first header with this name, or append it.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.header_mut(name) {
            Some(header) => header.value = value,
            None => self.headers.push(Header::new(name, value)),
        }
    }

    /// Unfolded `Subject:` value.
    pub fn subject(&self) -> Option<String> {
        self.header("Subject").map(unfold)
    }

    /// The Message-Id without angle brackets.
    pub fn message_id(&self) -> Option<String> {
        let raw = unfold(self.header("Message-Id")?);
        let trimmed = raw.trim();
        let inner = match (trimmed.find('<'), trimmed.rfind('>')) {
            (Some(start), Some(end)) if end > start => &trimmed[start + 1..end],
            _ => trimmed,
        };
        if inner.is_empty() {
            None
        } else {
            Some(inner.to_string())
        }
    }

    /// The commit this mail was generated from, taken from the envelope line.
    ///
    /// The all-zero id of a cover letter yields `None`.
    pub fn commit(&self) -> Option<&str> {
        let sha = self.envelope.as_deref()?.strip_prefix("From ")?.get(..40)?;
        if sha.bytes().all(|b| b == b'0') {
            None
        } else {
            Some(sha)
        }
    }

    /// Replace every occurrence of `from` in header values and body.
    pub fn replace_all(&mut self, from: &str, to: &str) -> usize {
        let mut count = 0;
        for header in self.headers.iter_mut() {
            if header.value.contains(from) {
                count += header.value.matches(from).count();
                header.value = header.value.replace(from, to);
            }
        }
        if self.body.contains(from) {
            count += self.body.matches(from).count();
            self.body = self.body.replace(from, to);
        }
        count
    }
}

impl std::fmt::Display for Mail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATCH: &str = "From 1234567890123456789012345678901234567890 Mon Sep 17 00:00:00 2001\n\
Message-Id: <1234.1537000000.git.author@example.com>\n\
From: A U Thor <author@example.com>\n\
Date: Mon, 17 Sep 2018 12:00:00 +0000\n\
Subject: [PATCH 1/2] a commit with a subject\n that is folded\n\
MIME-Version: 1.0\n\
\n\
Commit message body.\n\
---\n\
 file.c | 1 +\n\
";

    #[test]
    fn test_parse_and_render_round_trip() {
        let mail = Mail::parse(PATCH).unwrap();
        assert_eq!(mail.headers.len(), 5);
        assert_eq!(mail.render(), PATCH);
    }

    #[test]
    fn test_accessors() {
        let mail = Mail::parse(PATCH).unwrap();
        assert_eq!(
            mail.subject().as_deref(),
            Some("[PATCH 1/2] a commit with a subject that is folded")
        );
        assert_eq!(
            mail.message_id().as_deref(),
            Some("1234.1537000000.git.author@example.com")
        );
        assert_eq!(mail.commit(), Some("1234567890123456789012345678901234567890"));
        assert_eq!(mail.header("mime-version"), Some("1.0"));
        assert!(mail.body.starts_with("Commit message body."));
    }

    #[test]
    fn test_cover_letter_has_no_commit() {
        let raw = "From 0000000000000000000000000000000000000000 Mon Sep 17 00:00:00 2001\nSubject: x\n\nbody\n";
        let mail = Mail::parse(raw).unwrap();
        assert_eq!(mail.commit(), None);
    }

    #[test]
    fn test_missing_header_block() {
        let err = Mail::parse("Subject: no body separator\n").unwrap_err();
        assert!(matches!(err, PatchError::MissingHeaderBlock { .. }));
    }

    #[test]
    fn test_set_header_replaces_or_appends() {
        let mut mail = Mail::parse(PATCH).unwrap();
        mail.set_header("date", "Tue, 18 Sep 2018 00:00:00 +0000");
        assert_eq!(mail.headers[2].name, "Date");
        assert_eq!(mail.header("Date"), Some("Tue, 18 Sep 2018 00:00:00 +0000"));
        mail.set_header("Cc", "x@example.com");
        assert_eq!(mail.headers.last().map(|h| h.name.as_str()), Some("Cc"));
    }

    #[test]
    fn test_replace_all() {
        let mut mail = Mail::parse(PATCH).unwrap();
        let n = mail.replace_all("author@example.com", "other@example.com");
        assert_eq!(n, 2);
        assert!(!mail.render().contains("author@example.com"));
    }
}
