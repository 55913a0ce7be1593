//! Persisted state: per-series metadata and per-mail metadata.
//!
//! Both are stored as JSON in the annotation store; field names are
//! camelCase so existing notes written by other tooling stay readable.

use serde::{Deserialize, Serialize};

/// State of one logical patch series across its iterations.
///
/// Keyed by pull-request URL, or by branch name for branch-backed series.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeriesMetadata {
    /// Commit the series is based on.
    pub base_commit: String,
    /// Human-readable name of the base (e.g. `git:master`).
    pub base_label: String,
    /// Tip commit of the series.
    pub head_commit: String,
    /// Human-readable name of the head (e.g. `author:my-topic`).
    pub head_label: String,
    /// Submission counter; 1 for the first submission.
    pub iteration: u32,
    /// Message-Id of the most recently sent cover letter (or sole patch).
    pub cover_letter_message_id: Option<String>,
    /// Earlier cover-letter Message-Ids, most recent first.
    pub references_message_ids: Vec<String>,
    /// Name of the tag created for the latest iteration.
    pub latest_tag: Option<String>,
    /// The pull request this series belongs to, if any.
    pub pull_request_url: Option<String>,
}

/// What a sent mail corresponds to, keyed by its Message-Id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MailMetadata {
    /// Commit the patch mail was generated from (`None` for cover letters).
    pub original_commit: Option<String>,
    /// Pull request the mail was sent for.
    pub pull_request_url: Option<String>,
    /// Iteration the mail belongs to.
    pub iteration: u32,
    /// Commit that eventually landed upstream; filled in by a separate job.
    pub upstream_commit: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_metadata_json_field_names() {
        let meta = SeriesMetadata {
            base_commit: "abc".into(),
            iteration: 2,
            references_message_ids: vec!["cover.1.git.a@b".into()],
            ..SeriesMetadata::default()
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["baseCommit"], "abc");
        assert_eq!(json["iteration"], 2);
        assert_eq!(json["referencesMessageIds"][0], "cover.1.git.a@b");
    }

    #[test]
    fn test_series_metadata_tolerates_missing_fields() {
        let meta: SeriesMetadata =
            serde_json::from_str(r#"{"headCommit":"def","iteration":3}"#).unwrap();
        assert_eq!(meta.head_commit, "def");
        assert_eq!(meta.iteration, 3);
        assert!(meta.references_message_ids.is_empty());
        assert_eq!(meta.cover_letter_message_id, None);
    }
}
