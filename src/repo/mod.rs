//! Queries against the repository holding the commits to submit.

pub mod git;

use crate::error::Result;

/// Options passed through to the patch export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportOptions {
    /// Text inside the `[...]` of each subject, e.g. `PATCH v2`.
    pub subject_prefix: String,
    /// Whether to generate a cover letter.
    pub cover_letter: bool,
    /// Message-ID the first mail replies to.
    pub in_reply_to: Option<String>,
    /// `To:` recipients.
    pub to: Vec<String>,
    /// `Cc:` recipients.
    pub cc: Vec<String>,
    /// Extra raw `Name: value` headers.
    pub add_headers: Vec<String>,
}

/// Everything the series engine needs from version control.
///
/// Implementations are expected to behave as pure functions of their
/// arguments and the repository contents.
pub trait Repository {
    /// Export `base..head` as `git format-patch --stdout` would, with
    /// threading enabled so every mail carries a Message-Id.
    fn format_patch(&self, base: &str, head: &str, options: &ExportOptions) -> Result<String>;

    /// Compare two commit ranges (`a..b` notation).
    fn range_diff(&self, old_range: &str, new_range: &str) -> Result<String>;

    /// Commits in `range`, newest first.
    fn rev_list(&self, range: &str) -> Result<Vec<String>>;

    /// Create an annotated tag pointing at `commit`, replacing a tag of the
    /// same name left behind by an unrecorded attempt.
    fn create_tag(&self, name: &str, message: &str, commit: &str) -> Result<()>;

    /// Publish the tag `name` to `remote`.
    fn push_tag(&self, remote: &str, name: &str) -> Result<()>;
}
