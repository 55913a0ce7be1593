//! Stable Message-IDs for pull-request series and deterministic dates.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use tracing::debug;

use crate::error::{PatchError, Result};
use crate::model::mail::Mail;
use crate::parser::header::format_date;
use crate::series::pull_request::PullRequestUrl;

/// First all-digit dot-separated component of a Message-ID, which in ids
/// generated by git is the Unix timestamp.
pub fn extract_timestamp(message_id: &str) -> Option<&str> {
    let local = message_id.split('@').next().unwrap_or(message_id);
    local
        .split('.')
        .find(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()))
}

/// `pull.<number>[.v<iteration>].<repo>.<timestamp>.<sender-email>`.
pub fn pull_request_message_id(
    pr: &PullRequestUrl,
    iteration: u32,
    timestamp: &str,
    sender_email: &str,
) -> String {
    let version = if iteration > 1 {
        format!(".v{iteration}")
    } else {
        String::new()
    };
    format!(
        "pull.{}{version}.{}.{timestamp}.{sender_email}",
        pr.number, pr.repo
    )
}

/// Replace the cover letter's generated Message-ID with the pull-request
/// form everywhere it occurs in the series.
///
/// Returns the new id (without angle brackets).
pub fn rewrite_message_ids(
    mails: &mut [Mail],
    pr: &PullRequestUrl,
    iteration: u32,
    sender_email: &str,
) -> Result<String> {
    let old = mails
        .first()
        .and_then(Mail::message_id)
        .ok_or(PatchError::MissingMessageId)?;
    let timestamp = extract_timestamp(&old)
        .map(str::to_string)
        .unwrap_or_else(|| Utc::now().timestamp_millis().to_string());
    let new = pull_request_message_id(pr, iteration, &timestamp, sender_email);

    let from = format!("<{old}>");
    let to = format!("<{new}>");
    let replaced: usize = mails.iter_mut().map(|m| m.replace_all(&from, &to)).sum();
    debug!(%old, %new, replaced, "Rewrote Message-ID");
    Ok(new)
}

/// Give the mails `Date:` headers one second apart, the last one at `end`.
pub fn force_dates(mails: &mut [Mail], end: DateTime<FixedOffset>) {
    let count = mails.len() as i64;
    for (i, mail) in mails.iter_mut().enumerate() {
        let date = end - Duration::seconds(count - 1 - i as i64);
        mail.set_header("Date", format_date(&date));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series() -> Vec<Mail> {
        let cover = "From 0000000000000000000000000000000000000000 Mon Sep 17 00:00:00 2001\n\
Message-Id: <cover.1537000000.git.author@example.com>\n\
Date: Mon, 17 Sep 2018 12:00:00 +0000\n\
Subject: [PATCH 0/1] x\n\nblurb\n-- \n2.40.0\n";
        let patch = "From 1111111111111111111111111111111111111111 Mon Sep 17 00:00:00 2001\n\
Message-Id: <1111.1537000000.git.author@example.com>\n\
In-Reply-To: <cover.1537000000.git.author@example.com>\n\
References: <cover.1537000000.git.author@example.com>\n\
Date: Mon, 17 Sep 2018 12:00:00 +0000\n\
Subject: [PATCH 1/1] x\n\nbody\n";
        vec![Mail::parse(cover).unwrap(), Mail::parse(patch).unwrap()]
    }

    fn pr() -> PullRequestUrl {
        PullRequestUrl::parse("https://github.com/gitgitgadget/git/pull/42").unwrap()
    }

    #[test]
    fn test_extract_timestamp() {
        assert_eq!(
            extract_timestamp("cover.1537000000.git.author@example.com"),
            Some("1537000000")
        );
        assert_eq!(extract_timestamp("abc.def@1234"), None);
    }

    #[test]
    fn test_rewrite_everywhere() {
        let mut mails = series();
        let new = rewrite_message_ids(&mut mails, &pr(), 2, "bot@example.com").unwrap();
        assert_eq!(new, "pull.42.v2.git.1537000000.bot@example.com");
        assert_eq!(mails[0].message_id().as_deref(), Some(new.as_str()));
        let wanted = format!("<{new}>");
        assert_eq!(mails[1].header("In-Reply-To"), Some(wanted.as_str()));
        assert_eq!(mails[1].header("References"), Some(wanted.as_str()));
        assert_eq!(
            mails[1].message_id().as_deref(),
            Some("1111.1537000000.git.author@example.com")
        );
    }

    #[test]
    fn test_first_iteration_has_no_version() {
        let mut mails = series();
        let new = rewrite_message_ids(&mut mails, &pr(), 1, "bot@example.com").unwrap();
        assert_eq!(new, "pull.42.git.1537000000.bot@example.com");
    }

    #[test]
    fn test_rewrite_without_message_id() {
        let mut mails = series();
        mails[0].headers.retain(|h| h.name != "Message-Id");
        let err = rewrite_message_ids(&mut mails, &pr(), 1, "bot@example.com").unwrap_err();
        assert!(matches!(err, PatchError::MissingMessageId));
    }

    #[test]
    fn test_force_dates() {
        let mut mails = series();
        let end = DateTime::parse_from_rfc3339("2018-09-17T12:00:10+00:00").unwrap();
        force_dates(&mut mails, end);
        assert_eq!(mails[0].header("Date"), Some("Mon, 17 Sep 2018 12:00:09 +0000"));
        assert_eq!(mails[1].header("Date"), Some("Mon, 17 Sep 2018 12:00:10 +0000"));
    }
}
