//! Pull-request metadata handed over by the forge, and the cover-letter text
//! derived from it.

use serde::{Deserialize, Serialize};

use crate::error::{PatchError, Result};
use crate::model::address::EmailAddress;

/// Pull-request data as provided by the forge (read-only for this crate).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PullRequestInfo {
    /// Web URL of the pull request, e.g. `https://github.com/git/git/pull/123`.
    pub url: String,
    /// Title, used as the cover-letter subject.
    pub title: String,
    /// Free-form description; may end in `Cc:` / `Based-On:` footers.
    pub body: String,
    /// Base branch label, e.g. `git:master`.
    pub base_label: String,
    /// Base commit.
    pub base_commit: String,
    /// Head branch label, e.g. `author:my-topic`.
    pub head_label: String,
    /// Head commit.
    pub head_commit: String,
    /// Display name of the contributor, used for the cover letter in bot mode.
    pub author: Option<String>,
}

/// Components of a pull-request URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestUrl {
    /// Owner of the repository the PR targets.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// PR number.
    pub number: u64,
}

impl PullRequestUrl {
    /// Parse `https://<host>/<owner>/<repo>/pull/<number>`.
    pub fn parse(url: &str) -> Result<Self> {
        let invalid = || PatchError::InvalidPullRequestUrl(url.to_string());
        let path = url
            .split_once("://")
            .map(|(_, rest)| rest)
            .ok_or_else(invalid)?;
        let segments: Vec<&str> = path.trim_end_matches('/').split('/').collect();
        match segments.as_slice() {
            [_host, owner, repo, "pull", number] => Ok(Self {
                owner: (*owner).to_string(),
                repo: (*repo).to_string(),
                number: number.parse().map_err(|_| invalid())?,
            }),
            _ => Err(invalid()),
        }
    }
}

/// Cover-letter prose with its footers parsed out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverLetterText {
    /// Subject text.
    pub title: String,
    /// Description, without the extracted footer lines.
    pub body: String,
    /// Addresses from `Cc:` footers.
    pub cc: Vec<EmailAddress>,
    /// Ref from a `Based-On:` footer.
    pub based_on: Option<String>,
}

/// Separate a PR description into prose and `Cc:` / `Based-On:` footers.
///
/// Footers are only recognized in the last paragraph; the paragraph is
/// dropped entirely if nothing else remains in it.
pub fn parse_description(title: &str, body: &str) -> CoverLetterText {
    let title = title.replace("\r\n", "\n").trim().to_string();
    let body = body.replace("\r\n", "\n");
    let body = body.trim();

    let (prose, last) = match body.rfind("\n\n") {
        Some(pos) => (&body[..pos], &body[pos + 2..]),
        None => ("", body),
    };

    let mut cc = Vec::new();
    let mut based_on = None;
    let mut kept: Vec<&str> = Vec::new();
    for line in last.lines() {
        match line.split_once(':') {
            Some((key, value)) if key.trim().eq_ignore_ascii_case("cc") => {
                cc.extend(EmailAddress::parse_list(value));
            }
            Some((key, value)) if key.trim().eq_ignore_ascii_case("based-on") => {
                let value = value.trim();
                if !value.is_empty() {
                    based_on = Some(value.to_string());
                }
            }
            _ => kept.push(line),
        }
    }

    let mut body = prose.to_string();
    let remainder = kept.join("\n");
    if !remainder.trim().is_empty() {
        if !body.is_empty() {
            body.push_str("\n\n");
        }
        body.push_str(&remainder);
    }

    CoverLetterText {
        title,
        body,
        cc,
        based_on,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pull_request_url() {
        let url = PullRequestUrl::parse("https://github.com/gitgitgadget/git/pull/1234").unwrap();
        assert_eq!(url.owner, "gitgitgadget");
        assert_eq!(url.repo, "git");
        assert_eq!(url.number, 1234);
        assert!(PullRequestUrl::parse("https://github.com/owner/repo/issues/1").is_err());
        assert!(PullRequestUrl::parse("not a url").is_err());
    }

    #[test]
    fn test_extracts_footers() {
        let text = parse_description(
            "Fix the frobnicator\r\n",
            "The frobnicator was broken.\r\n\r\nCc: Some One <one@example.com>, two@example.com\r\nBased-On: next\r\n",
        );
        assert_eq!(text.title, "Fix the frobnicator");
        assert_eq!(text.body, "The frobnicator was broken.");
        assert_eq!(text.cc.len(), 2);
        assert_eq!(text.cc[0].display_name, "Some One");
        assert_eq!(text.based_on.as_deref(), Some("next"));
    }

    #[test]
    fn test_keeps_other_lines_of_last_paragraph() {
        let text = parse_description("t", "Intro.\n\nThanks!\nCc: x@example.com");
        assert_eq!(text.body, "Intro.\n\nThanks!");
        assert_eq!(text.cc.len(), 1);
    }

    #[test]
    fn test_footers_only_in_last_paragraph() {
        let text = parse_description("t", "Cc: in the middle <m@example.com>\n\nLast words.");
        assert!(text.cc.is_empty());
        assert_eq!(text.body, "Cc: in the middle <m@example.com>\n\nLast words.");
    }

    #[test]
    fn test_body_of_only_footers() {
        let text = parse_description("t", "Cc: a@example.com");
        assert_eq!(text.body, "");
        assert_eq!(text.cc[0].address, "a@example.com");
    }
}
