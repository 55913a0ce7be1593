//! Centralized error types for patchmail.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the patchmail library.
#[derive(Error, Debug)]
pub enum PatchError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A mail has no blank line separating headers from body.
    #[error("Could not find the end of the header block in mail:\n{excerpt}")]
    MissingHeaderBlock { excerpt: String },

    /// A required header is absent.
    #[error("No {name}: header found in mail")]
    MissingHeader { name: &'static str },

    /// The exported cover letter lacks the `*** SUBJECT HERE ***` /
    /// `*** BLURB HERE ***` placeholders.
    #[error("Cover letter placeholder not found: {0}")]
    MissingPlaceholder(&'static str),

    /// No place to put footers (no `-- ` signature or `---` separator).
    #[error("Could not find footer insertion point ({marker:?}) in mail '{subject}'")]
    MissingInsertionPoint {
        marker: &'static str,
        subject: String,
    },

    /// The mail's Message-Id header is absent or empty.
    #[error("Mail has no usable Message-Id")]
    MissingMessageId,

    /// The commit range to submit contains no commits.
    #[error("No commits in range {range}")]
    EmptyRange { range: String },

    /// The export produced a different number of mails than expected.
    #[error("Expected {expected} mail(s) from the export, found {found}")]
    UnexpectedMailCount { expected: usize, found: usize },

    /// The head commit holds nothing that was not already sent.
    #[error("{head} was already submitted")]
    AlreadySubmitted { head: String },

    /// Someone else updated the series metadata while this run was in flight.
    #[error("Metadata for '{key}' changed since it was read; re-run to pick up the new state")]
    StaleMetadata { key: String },

    /// A sender or author identity could not be parsed.
    #[error("Invalid identity '{0}': expected 'Name <email>'")]
    InvalidIdentity(String),

    /// A date string could not be parsed.
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// A pull-request URL could not be parsed.
    #[error("Invalid pull request URL: {0}")]
    InvalidPullRequestUrl(String),

    /// A git invocation failed.
    #[error("git {command} failed: {stderr}")]
    Git { command: String, stderr: String },

    /// The mail transport rejected a message.
    #[error("Mail transport error: {0}")]
    Transport(String),

    /// The annotation store could not be read or written.
    #[error("Annotation store error: {0}")]
    Store(String),

    /// Stored metadata is not valid JSON for the expected type.
    #[error("Malformed metadata: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias for `Result<T, PatchError>`.
pub type Result<T> = std::result::Result<T, PatchError>;

/// Helper to convert a bare `std::io::Error` together with a path.
impl PatchError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error is the "nothing new to send" versioning conflict.
    pub fn is_already_submitted(&self) -> bool {
        matches!(self, Self::AlreadySubmitted { .. })
    }
}

/// Allow `?` on `std::io::Error` inside functions returning `PatchError`
/// when no path context is available (rare; prefer `PatchError::io`).
impl From<std::io::Error> for PatchError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
