//! Appending mails to an mbox file.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{PatchError, Result};
use crate::parser::mbox::is_envelope_line;
use crate::transport::{message_id_of, MailTransport};

/// Envelope written in front of mails that arrive without one.
const DEFAULT_ENVELOPE: &str = "From 0000000000000000000000000000000000000000 Mon Sep 17 00:00:00 2001";

/// Counters for what an [`MboxFile`] has written so far.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MboxStats {
    pub messages: usize,
    pub bytes: u64,
}

/// [`MailTransport`] that appends to an mbox file, creating it if needed.
///
/// The result can be read back with `git am` or any mail client.
#[derive(Debug)]
pub struct MboxFile {
    path: PathBuf,
    stats: MboxStats,
}

impl MboxFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            stats: MboxStats::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stats(&self) -> MboxStats {
        self.stats
    }
}

impl MailTransport for MboxFile {
    fn send(&mut self, raw: &str) -> Result<String> {
        let message_id = message_id_of(raw)?;

        let mut text = String::with_capacity(raw.len() + DEFAULT_ENVELOPE.len() + 2);
        if !raw.lines().next().is_some_and(is_envelope_line) {
            text.push_str(DEFAULT_ENVELOPE);
            text.push('\n');
        }
        text.push_str(raw);
        // Ensure there's a newline separator between messages
        if !text.ends_with('\n') {
            text.push('\n');
        }
        text.push('\n');

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| PatchError::io(parent, e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| PatchError::io(&self.path, e))?;
        file.write_all(text.as_bytes())
            .map_err(|e| PatchError::io(&self.path, e))?;

        self.stats.messages += 1;
        self.stats.bytes += text.len() as u64;
        debug!(path = %self.path.display(), %message_id, "Appended mail");
        Ok(message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::mbox::parse_series;

    #[test]
    fn test_appends_readable_mbox() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("series.mbox");
        let mut mbox = MboxFile::new(&path);

        let one = "From 1111111111111111111111111111111111111111 Mon Sep 17 00:00:00 2001\n\
Message-Id: <one@example.com>\nSubject: one\n\nfirst\n";
        let two = "Message-Id: <two@example.com>\nSubject: two\n\nsecond";
        assert_eq!(mbox.send(one).unwrap(), "one@example.com");
        assert_eq!(mbox.send(two).unwrap(), "two@example.com");
        assert_eq!(mbox.stats().messages, 2);

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(mbox.stats().bytes, text.len() as u64);
        let mails = parse_series(&text).unwrap();
        assert_eq!(mails.len(), 2);
        assert_eq!(mails[1].message_id().as_deref(), Some("two@example.com"));
        assert!(mails[1].body.starts_with("second\n"));
    }

    #[test]
    fn test_rejects_mail_without_message_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut mbox = MboxFile::new(dir.path().join("x.mbox"));
        assert!(mbox.send("Subject: x\n\nbody\n").is_err());
        assert!(!mbox.path().exists());
    }
}
