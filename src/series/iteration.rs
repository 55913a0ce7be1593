//! Deciding whether a submission is new, a resend, or the next iteration.

use tracing::{debug, info};

use crate::error::{PatchError, Result};
use crate::model::metadata::SeriesMetadata;
use crate::repo::Repository;
use crate::series::pull_request::PullRequestUrl;

/// What the series is submitted from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeriesSource {
    /// A pull request on the forge.
    PullRequest { url: String, pr: PullRequestUrl },
    /// A plain local branch.
    Branch(String),
}

impl SeriesSource {
    /// Parse a pull-request URL.
    pub fn pull_request(url: &str) -> Result<Self> {
        Ok(Self::PullRequest {
            url: url.to_string(),
            pr: PullRequestUrl::parse(url)?,
        })
    }

    /// Annotation-store key under which the series metadata lives.
    pub fn key(&self) -> &str {
        match self {
            Self::PullRequest { url, .. } => url,
            Self::Branch(name) => name,
        }
    }

    pub fn pull_request_url(&self) -> Option<&str> {
        match self {
            Self::PullRequest { url, .. } => Some(url),
            Self::Branch(_) => None,
        }
    }
}

/// The commit range being submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeriesRange {
    pub base_commit: String,
    pub base_label: String,
    pub head_commit: String,
    pub head_label: String,
}

impl SeriesRange {
    /// `base..head`.
    pub fn range(&self) -> String {
        format!("{}..{}", self.base_commit, self.head_commit)
    }
}

/// How a submission relates to what was sent before.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    NoPriorSubmission,
    PriorSubmissionUnchanged,
    PriorSubmissionSuperseded,
}

/// Metadata to submit with, plus what the footers need to know about the
/// previous iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationPlan {
    pub state: SubmissionState,
    pub metadata: SeriesMetadata,
    /// Iteration the range-diff compares against.
    pub previous_iteration: Option<u32>,
    pub range_diff: Option<String>,
}

impl IterationPlan {
    /// Message-ID the new cover letter replies to: the most recent prior one.
    pub fn in_reply_to(&self) -> Option<&str> {
        self.metadata
            .references_message_ids
            .first()
            .map(String::as_str)
    }
}

/// Classify a submission against stored metadata.
pub fn classify(
    stored: Option<&SeriesMetadata>,
    range: &SeriesRange,
    repo: &dyn Repository,
) -> Result<SubmissionState> {
    let Some(stored) = stored.filter(|m| m.iteration > 0 && !m.head_commit.is_empty()) else {
        return Ok(SubmissionState::NoPriorSubmission);
    };
    if stored.head_commit == range.head_commit {
        return Ok(SubmissionState::PriorSubmissionUnchanged);
    }
    let new_commits = repo.rev_list(&format!("{}..{}", stored.head_commit, range.head_commit))?;
    if new_commits.is_empty() {
        Ok(SubmissionState::PriorSubmissionUnchanged)
    } else {
        Ok(SubmissionState::PriorSubmissionSuperseded)
    }
}

/// Work out the metadata for this submission.
///
/// An unchanged head fails with [`PatchError::AlreadySubmitted`] unless
/// `redo` is set, in which case it is treated as the next iteration.
pub fn plan_iteration(
    stored: Option<SeriesMetadata>,
    range: &SeriesRange,
    source: &SeriesSource,
    repo: &dyn Repository,
    redo: bool,
) -> Result<IterationPlan> {
    let state = classify(stored.as_ref(), range, repo)?;
    debug!(key = source.key(), ?state, "Classified submission");

    let previous = match (state, stored) {
        (SubmissionState::NoPriorSubmission, _) | (_, None) => {
            let metadata = SeriesMetadata {
                base_commit: range.base_commit.clone(),
                base_label: range.base_label.clone(),
                head_commit: range.head_commit.clone(),
                head_label: range.head_label.clone(),
                iteration: 1,
                pull_request_url: source.pull_request_url().map(str::to_string),
                ..SeriesMetadata::default()
            };
            return Ok(IterationPlan {
                state,
                metadata,
                previous_iteration: None,
                range_diff: None,
            });
        }
        (SubmissionState::PriorSubmissionUnchanged, Some(_)) if !redo => {
            return Err(PatchError::AlreadySubmitted {
                head: range.head_commit.clone(),
            });
        }
        (_, Some(previous)) => previous,
    };

    let old_range = format!("{}..{}", previous.base_commit, previous.head_commit);
    let range_diff = if previous.base_commit.is_empty() {
        None
    } else {
        Some(repo.range_diff(&old_range, &range.range())?).filter(|d| !d.trim().is_empty())
    };

    let mut metadata = previous.clone();
    metadata.iteration = previous.iteration + 1;
    metadata.base_commit = range.base_commit.clone();
    metadata.base_label = range.base_label.clone();
    metadata.head_commit = range.head_commit.clone();
    metadata.head_label = range.head_label.clone();
    if let Some(cover) = metadata.cover_letter_message_id.take() {
        metadata.references_message_ids.insert(0, cover);
    }
    if metadata.pull_request_url.is_none() {
        metadata.pull_request_url = source.pull_request_url().map(str::to_string);
    }

    info!(
        key = source.key(),
        iteration = metadata.iteration,
        "Preparing next iteration"
    );
    Ok(IterationPlan {
        state: SubmissionState::PriorSubmissionSuperseded,
        metadata,
        previous_iteration: Some(previous.iteration),
        range_diff,
    })
}

/// Text inside the `[...]` of each subject.
pub fn subject_prefix(iteration: u32, rfc: bool, preview: bool) -> String {
    let mut prefix = String::from(if preview { "PREVIEW" } else { "PATCH" });
    if rfc {
        prefix.push_str("/RFC");
    }
    if iteration > 1 {
        prefix.push_str(&format!(" v{iteration}"));
    }
    prefix
}

/// Name of the annotated tag recording an iteration.
///
/// Pull requests against a repository not owned by `canonical_owner` get the
/// owner in the tag name so tags from different forks cannot collide.
pub fn tag_name(
    source: &SeriesSource,
    head_label: &str,
    iteration: u32,
    canonical_owner: Option<&str>,
) -> String {
    match source {
        SeriesSource::PullRequest { pr, .. } => {
            let prefix = match canonical_owner {
                Some(owner) if owner != pr.owner => format!("pr-{}-{}", pr.owner, pr.number),
                _ => format!("pr-{}", pr.number),
            };
            format!("{prefix}/{}-v{iteration}", head_label.replace(':', "/"))
        }
        SeriesSource::Branch(branch) => format!("{branch}-v{iteration}"),
    }
}
