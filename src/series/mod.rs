//! Turning a commit range into a threaded patch series.
//!
//! [`PatchSeries::prepare`] runs every text transformation and returns the
//! finished mails without side effects; [`PatchSeries::submit`] tags, sends
//! and records them.

pub mod author;
pub mod cover_letter;
pub mod footer;
pub mod iteration;
pub mod message_id;
pub mod pull_request;
pub mod wrap;

use chrono::{DateTime, FixedOffset};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{PatchError, Result};
use crate::model::mail::Mail;
use crate::model::metadata::{MailMetadata, SeriesMetadata};
use crate::parser::header::normalize_series;
use crate::parser::mbox::{parse_series, MAIL_SEPARATOR};
use crate::repo::{ExportOptions, Repository};
use crate::store::{AnnotationStore, AnnotationStoreExt};
use crate::transport::MailTransport;

use author::{resolve_authors, Sender};
use cover_letter::{compose_cover_letter, insert_description};
use footer::{
    generate_tag_message, insert_footers, insert_links, normalize_forge_url, published_footers,
    range_diff_footer,
};
use iteration::{
    plan_iteration, subject_prefix, tag_name, SeriesRange, SeriesSource, SubmissionState,
};
use message_id::{force_dates, rewrite_message_ids};
use pull_request::{parse_description, PullRequestInfo};
use wrap::wrap_text;

/// Settings for generating a series.
#[derive(Debug, Clone)]
pub struct SeriesOptions {
    /// `Name <email>` the mails are sent as.
    pub sender: String,
    pub bot_name: Option<String>,
    pub canonical_owner: Option<String>,
    pub mid_url_prefix: String,
    pub forge_host: String,
    pub publish_remote: Option<String>,
    pub wrap_column: usize,
    pub single_patch_indent: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub add_headers: Vec<String>,
    /// Mark the series as a request for comments.
    pub rfc: bool,
    /// Send as `PREVIEW` without tagging or recording anything.
    pub preview: bool,
    /// Resend even if the head has not changed.
    pub redo: bool,
    /// Date of the last mail; earlier mails are one second apart.
    pub force_date: Option<DateTime<FixedOffset>>,
}

impl SeriesOptions {
    /// Options from the configuration file; run-specific flags are off.
    pub fn from_config(config: &Config) -> Self {
        Self {
            sender: config.identity.sender.clone().unwrap_or_default(),
            bot_name: config.identity.bot_name.clone(),
            canonical_owner: config.identity.canonical_owner.clone(),
            mid_url_prefix: config.series.mid_url_prefix.clone(),
            forge_host: config.series.forge_host.clone(),
            publish_remote: config.series.publish_remote.clone(),
            wrap_column: config.series.wrap_column,
            single_patch_indent: config.series.single_patch_indent.clone(),
            to: config.series.to.clone(),
            cc: config.series.cc.clone(),
            add_headers: config.series.add_headers.clone(),
            rfc: false,
            preview: false,
            redo: false,
            force_date: None,
        }
    }
}

/// What to submit.
#[derive(Debug, Clone)]
pub struct SeriesRequest {
    pub source: SeriesSource,
    pub range: SeriesRange,
    /// Cover-letter subject.
    pub title: String,
    /// Cover-letter prose, possibly ending in `Cc:` / `Based-On:` lines.
    pub body: String,
    /// Contributor name for the cover letter in bot mode.
    pub author: Option<String>,
}

impl SeriesRequest {
    pub fn from_pull_request(info: &PullRequestInfo) -> Result<Self> {
        Ok(Self {
            source: SeriesSource::pull_request(&info.url)?,
            range: SeriesRange {
                base_commit: info.base_commit.clone(),
                base_label: info.base_label.clone(),
                head_commit: info.head_commit.clone(),
                head_label: info.head_label.clone(),
            },
            title: info.title.clone(),
            body: info.body.clone(),
            author: info.author.clone(),
        })
    }

    /// A series sent straight from a local branch.
    pub fn for_branch(
        branch: &str,
        base_commit: &str,
        head_commit: &str,
        title: &str,
        body: &str,
    ) -> Self {
        Self {
            source: SeriesSource::Branch(branch.to_string()),
            range: SeriesRange {
                base_commit: base_commit.to_string(),
                base_label: base_commit.to_string(),
                head_commit: head_commit.to_string(),
                head_label: branch.to_string(),
            },
            title: title.to_string(),
            body: body.to_string(),
            author: None,
        }
    }
}

/// A fully generated series, ready to be sent.
#[derive(Debug, Clone)]
pub struct PreparedSeries {
    /// Annotation-store key of the series.
    pub key: String,
    pub state: SubmissionState,
    /// Metadata to store once the series is sent.
    pub metadata: SeriesMetadata,
    pub tag_name: String,
    pub tag_message: String,
    pub mails: Vec<Mail>,
    /// Raw stored metadata as read, for the compare-and-swap on write.
    stored_raw: Option<String>,
}

impl PreparedSeries {
    pub fn iteration(&self) -> u32 {
        self.metadata.iteration
    }

    /// Message-ID of the first mail.
    pub fn cover_letter_message_id(&self) -> Option<&str> {
        self.metadata.cover_letter_message_id.as_deref()
    }

    /// The whole series as one mbox.
    pub fn mbox(&self) -> String {
        self.mails
            .iter()
            .map(Mail::render)
            .collect::<Vec<_>>()
            .join(MAIL_SEPARATOR)
    }
}

/// Result of [`PatchSeries::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReport {
    /// Message-IDs reported by the transport, in send order.
    pub sent: Vec<String>,
    /// Whether tag and metadata were written.
    pub persisted: bool,
}

/// Generates and submits patch series.
pub struct PatchSeries<'a> {
    repo: &'a dyn Repository,
    store: &'a mut dyn AnnotationStore,
    options: SeriesOptions,
}

impl<'a> PatchSeries<'a> {
    pub fn new(
        repo: &'a dyn Repository,
        store: &'a mut dyn AnnotationStore,
        options: SeriesOptions,
    ) -> Self {
        Self {
            repo,
            store,
            options,
        }
    }

    pub fn options(&self) -> &SeriesOptions {
        &self.options
    }

    /// Stored metadata for `key`, if any.
    pub fn status(&self, key: &str) -> Result<Option<SeriesMetadata>> {
        self.store.get_json(key)
    }

    /// Generate the series for `request` without touching the repository,
    /// the store or the transport.
    pub fn prepare(&self, request: &SeriesRequest) -> Result<PreparedSeries> {
        let options = &self.options;
        let sender = Sender::new(&options.sender, options.bot_name.as_deref())?;
        let key = request.source.key().to_string();

        let stored_raw = self.store.get(&key)?;
        let stored: Option<SeriesMetadata> = match &stored_raw {
            Some(raw) => Some(serde_json::from_str(raw)?),
            None => None,
        };
        let plan = plan_iteration(
            stored,
            &request.range,
            &request.source,
            self.repo,
            options.redo,
        )?;
        let iteration = plan.metadata.iteration;

        let text = parse_description(&request.title, &request.body);
        let commits = self.repo.rev_list(&request.range.range())?;
        if commits.is_empty() {
            return Err(PatchError::EmptyRange {
                range: request.range.range(),
            });
        }
        let is_cover_letter = commits.len() > 1;

        let mut cc = options.cc.clone();
        cc.extend(text.cc.iter().map(|a| a.to_header_value(false)));
        let export = ExportOptions {
            subject_prefix: subject_prefix(iteration, options.rfc, options.preview),
            cover_letter: is_cover_letter,
            in_reply_to: plan.in_reply_to().map(str::to_string),
            to: options.to.clone(),
            cc,
            add_headers: options.add_headers.clone(),
        };
        let raw = self.repo.format_patch(
            &request.range.base_commit,
            &request.range.head_commit,
            &export,
        )?;

        let mut mails = parse_series(&raw)?;
        let expected = commits.len() + usize::from(is_cover_letter);
        if mails.len() != expected {
            return Err(PatchError::UnexpectedMailCount {
                expected,
                found: mails.len(),
            });
        }
        debug!(count = mails.len(), iteration, "Exported series");

        normalize_series(&mut mails);

        if is_cover_letter {
            let body = wrap_text(&text.body, options.wrap_column, "");
            compose_cover_letter(&mut mails[0], &text.title, &body)?;
        }

        if let SeriesSource::PullRequest { pr, .. } = &request.source {
            rewrite_message_ids(&mut mails, pr, iteration, sender.email())?;
        }
        let message_id = mails[0].message_id().ok_or(PatchError::MissingMessageId)?;

        let tag = tag_name(
            &request.source,
            &request.range.head_label,
            iteration,
            options.canonical_owner.as_deref(),
        );
        let mut tag_message = generate_tag_message(
            &mails[0],
            is_cover_letter,
            &options.mid_url_prefix,
            &plan.metadata.references_message_ids,
        )?;

        let mut published = Vec::new();
        if let Some(remote) = &options.publish_remote {
            tag_message = insert_links(
                &tag_message,
                remote,
                &tag,
                text.based_on.as_deref(),
                &options.forge_host,
            );
            if let Some(web_url) = normalize_forge_url(remote, &options.forge_host) {
                published = published_footers(&web_url, &tag);
            }
        }
        if let Some(url) = request.source.pull_request_url() {
            published.push(format!("Pull-Request: {url}"));
        }
        insert_footers(&mut mails[0], is_cover_letter, &published)?;

        if let (Some(previous), Some(range_diff)) = (plan.previous_iteration, &plan.range_diff) {
            let mut lines = range_diff_footer(previous, range_diff);
            if is_cover_letter {
                lines.insert(0, String::new());
            }
            insert_footers(&mut mails[0], is_cover_letter, &lines)?;
        }

        if !is_cover_letter {
            let description =
                wrap_text(&text.body, options.wrap_column, &options.single_patch_indent);
            insert_description(&mut mails[0], &description)?;
        }

        let on_behalf_of = request.author.as_deref();
        resolve_authors(&mut mails, &sender, on_behalf_of)?;

        if let Some(end) = options.force_date {
            force_dates(&mut mails, end);
        }

        let mut metadata = plan.metadata;
        metadata.cover_letter_message_id = Some(message_id);
        metadata.latest_tag = Some(tag.clone());

        info!(
            key = %key,
            iteration,
            tag = %tag,
            mails = mails.len(),
            "Prepared series"
        );
        Ok(PreparedSeries {
            key,
            state: plan.state,
            metadata,
            tag_name: tag,
            tag_message,
            mails,
            stored_raw,
        })
    }

    /// Send every mail in order, then tag the head commit, push the tag to
    /// the publish remote and record what was sent.
    ///
    /// In preview mode only the mails are sent. Fails with
    /// [`PatchError::StaleMetadata`] before sending anything if the stored
    /// metadata changed since [`PatchSeries::prepare`] read it. A failed send
    /// leaves no tag and no series metadata behind, so the same iteration
    /// can be retried.
    pub fn submit(
        &mut self,
        prepared: &PreparedSeries,
        transport: &mut dyn MailTransport,
        progress: Option<&dyn Fn(usize, usize)>,
    ) -> Result<SendReport> {
        let persist = !self.options.preview;
        if persist {
            self.store
                .ensure_unchanged(&prepared.key, prepared.stored_raw.as_deref())?;
        }

        let total = prepared.mails.len();
        let mut sent = Vec::with_capacity(total);
        for (i, mail) in prepared.mails.iter().enumerate() {
            if let Some(cb) = progress {
                cb(i, total);
            }
            sent.push(transport.send(&mail.render())?);

            if persist {
                if let Some(id) = mail.message_id() {
                    let record = MailMetadata {
                        original_commit: mail.commit().map(str::to_string),
                        pull_request_url: prepared.metadata.pull_request_url.clone(),
                        iteration: prepared.metadata.iteration,
                        upstream_commit: None,
                    };
                    self.store.set_json(&id, &record)?;
                }
            }
        }
        if let Some(cb) = progress {
            cb(total, total);
        }

        if persist {
            self.repo.create_tag(
                &prepared.tag_name,
                &prepared.tag_message,
                &prepared.metadata.head_commit,
            )?;
            if let Some(remote) = &self.options.publish_remote {
                self.repo.push_tag(remote, &prepared.tag_name)?;
                debug!(remote = %remote, tag = %prepared.tag_name, "Pushed tag");
            }

            let raw = serde_json::to_string(&prepared.metadata)?;
            self.store
                .compare_and_set(&prepared.key, prepared.stored_raw.as_deref(), &raw)?;
        }

        info!(
            key = %prepared.key,
            iteration = prepared.metadata.iteration,
            sent = sent.len(),
            persisted = persist,
            "Series submitted"
        );
        Ok(SendReport {
            sent,
            persisted: persist,
        })
    }
}
