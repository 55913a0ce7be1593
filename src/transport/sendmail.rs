//! Handing mails to a sendmail-compatible program.

use std::io::Write;
use std::process::{Command, Stdio};

use tracing::info;

use crate::error::{PatchError, Result};
use crate::transport::{message_id_of, strip_envelope, MailTransport};

/// Pipes each mail into `<program> -i -t`.
#[derive(Debug, Clone)]
pub struct Sendmail {
    program: String,
    args: Vec<String>,
}

impl Sendmail {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: vec!["-i".to_string(), "-t".to_string()],
        }
    }

    /// Replace the default `-i -t` arguments.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }
}

impl MailTransport for Sendmail {
    fn send(&mut self, raw: &str) -> Result<String> {
        let message_id = message_id_of(raw)?;
        let failed = |e: std::io::Error| PatchError::Transport(format!("{}: {e}", self.program));

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(failed)?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(strip_envelope(raw).as_bytes())
                .map_err(failed)?;
        }
        let output = child.wait_with_output().map_err(failed)?;
        if !output.status.success() {
            return Err(PatchError::Transport(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        info!(%message_id, "Mail sent");
        Ok(message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = "Message-Id: <m@example.com>\nSubject: x\n\nbody\n";

    #[cfg(unix)]
    #[test]
    fn test_successful_program() {
        let mut sendmail = Sendmail::new("cat").with_args(Vec::new());
        assert_eq!(sendmail.send(RAW).unwrap(), "m@example.com");
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_program() {
        let mut sendmail = Sendmail::new("false").with_args(Vec::new());
        assert!(matches!(sendmail.send(RAW), Err(PatchError::Transport(_))));
    }

    #[test]
    fn test_missing_program() {
        let mut sendmail = Sendmail::new("no-such-sendmail-binary");
        assert!(matches!(sendmail.send(RAW), Err(PatchError::Transport(_))));
    }
}
