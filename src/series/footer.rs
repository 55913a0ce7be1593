//! Tag messages and the cross-reference footers added to the first mail.

use crate::error::{PatchError, Result};
use crate::model::mail::Mail;

/// Signature separator that ends a cover letter's prose.
pub const SIGNATURE_SEPARATOR: &str = "-- ";

/// Line that separates a commit message from its diffstat.
pub const PATCH_SEPARATOR: &str = "---";

/// Byte offset of the first line in `text` equal to `line`.
pub(crate) fn find_line(text: &str, line: &str) -> Option<usize> {
    let mut start = 0;
    for candidate in text.split_inclusive('\n') {
        if candidate.strip_suffix('\n').unwrap_or(candidate) == line {
            return Some(start);
        }
        start += candidate.len();
    }
    None
}

/// Whether a line looks like `Some-Key: value`.
fn is_footer_line(line: &str) -> bool {
    let Some((key, _)) = line.split_once(": ") else {
        return false;
    };
    key.starts_with(|c: char| c.is_ascii_alphabetic())
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Build the annotated-tag message for a series from its first mail.
///
/// The message is the subject (without the `[PATCH ...]` prefix), the prose
/// up to the signature or diffstat separator, and `Submitted-As:` /
/// `In-Reply-To:` lines linking to the archived mails. `prior_ids` are
/// written in the order given.
pub fn generate_tag_message(
    mail: &Mail,
    is_cover_letter: bool,
    mid_url_prefix: &str,
    prior_ids: &[String],
) -> Result<String> {
    let subject = mail
        .subject()
        .ok_or(PatchError::MissingHeader { name: "Subject" })?;
    let subject = match subject.strip_prefix('[').and_then(|s| s.split_once("] ")) {
        Some((_, rest)) => rest.to_string(),
        None => subject,
    };
    let message_id = mail.message_id().ok_or(PatchError::MissingMessageId)?;

    let marker = if is_cover_letter {
        SIGNATURE_SEPARATOR
    } else {
        PATCH_SEPARATOR
    };
    let end = find_line(&mail.body, marker).ok_or_else(|| PatchError::MissingInsertionPoint {
        marker,
        subject: subject.clone(),
    })?;
    let prose = mail.body[..end].trim_start_matches('\n').trim_end();

    let mut message = subject;
    message.push_str("\n\n");
    if !prose.is_empty() {
        message.push_str(prose);
        message.push_str("\n\n");
    }
    message.push_str(&format!("Submitted-As: {mid_url_prefix}{message_id}"));
    for id in prior_ids {
        message.push_str(&format!("\nIn-Reply-To: {mid_url_prefix}{id}"));
    }
    Ok(message)
}

/// Turn a push URL into the `https://` form of its web page.
///
/// Accepts `http(s)://<host>/<path>` and `git@<host>:<path>`; a trailing
/// `.git` is dropped. Anything else, including other hosts, yields `None`.
pub fn normalize_forge_url(url: &str, forge_host: &str) -> Option<String> {
    let url = url.trim();
    let path = ["https://", "http://"]
        .iter()
        .find_map(|scheme| url.strip_prefix(scheme)?.strip_prefix(forge_host)?.strip_prefix('/'))
        .or_else(|| url.strip_prefix("git@")?.strip_prefix(forge_host)?.strip_prefix(':'))?;
    let path = path.trim_end_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    if path.is_empty() {
        return None;
    }
    Some(format!("https://{forge_host}/{path}"))
}

/// `Published-As:` / `Fetch-It-Via:` lines for a pushed tag.
pub fn published_footers(web_url: &str, tag_name: &str) -> Vec<String> {
    vec![
        format!("Published-As: {web_url}/releases/tag/{tag_name}"),
        format!("Fetch-It-Via: git fetch {web_url} {tag_name}"),
    ]
}

/// `Based-On:` / `Fetch-Base-Via:` lines for a series built on another ref.
pub fn based_on_footers(web_url: &str, based_on: &str) -> Vec<String> {
    vec![
        format!("Based-On: {based_on} at {web_url}"),
        format!("Fetch-Base-Via: git fetch {web_url} {based_on}"),
    ]
}

/// Footer block showing how this iteration differs from the previous one.
///
/// Every non-empty range-diff line is indented by one space so mail clients
/// keep it verbatim.
pub fn range_diff_footer(previous_iteration: u32, range_diff: &str) -> Vec<String> {
    let mut lines = vec![format!("Range-diff vs v{previous_iteration}:"), String::new()];
    lines.extend(range_diff.trim_end().lines().map(|line| {
        if line.is_empty() {
            String::new()
        } else {
            format!(" {line}")
        }
    }));
    lines
}

/// Append publishing links to a tag message.
///
/// Nothing happens when `remote_url` is not on `forge_host`.
pub fn insert_links(
    tag_message: &str,
    remote_url: &str,
    tag_name: &str,
    based_on: Option<&str>,
    forge_host: &str,
) -> String {
    let Some(web_url) = normalize_forge_url(remote_url, forge_host) else {
        return tag_message.to_string();
    };

    let mut message = tag_message.to_string();
    if !message.ends_with('\n') {
        message.push('\n');
    }
    let last_line = message.trim_end_matches('\n').lines().last().unwrap_or("");
    if !is_footer_line(last_line) {
        message.push('\n');
    }

    let mut lines = based_on
        .map(|base| based_on_footers(&web_url, base))
        .unwrap_or_default();
    lines.extend(published_footers(&web_url, tag_name));
    for line in lines {
        message.push_str(&line);
        message.push('\n');
    }
    message
}

/// Splice footer lines into a mail body.
///
/// In a cover letter the lines go right above the signature. In a patch mail
/// they go below the `---` separator, after one footer block that may already
/// be there, surrounded by blank lines.
pub fn insert_footers(mail: &mut Mail, is_cover_letter: bool, lines: &[String]) -> Result<()> {
    if lines.is_empty() {
        return Ok(());
    }
    let block = lines.join("\n");
    let missing = |mail: &Mail, marker| PatchError::MissingInsertionPoint {
        marker,
        subject: mail.subject().unwrap_or_default(),
    };

    if is_cover_letter {
        let at = find_line(&mail.body, SIGNATURE_SEPARATOR)
            .ok_or_else(|| missing(&*mail, SIGNATURE_SEPARATOR))?;
        mail.body.insert_str(at, &format!("{block}\n"));
        return Ok(());
    }

    let separator =
        find_line(&mail.body, PATCH_SEPARATOR).ok_or_else(|| missing(&*mail, PATCH_SEPARATOR))?;
    let after = separator + PATCH_SEPARATOR.len() + 1;
    let rest = &mail.body[after..];

    // Inner `None`: the existing block runs to the end of the body.
    let existing_block = rest
        .strip_prefix('\n')
        .filter(|r| is_footer_line(r.lines().next().unwrap_or("")))
        .map(|r| r.find("\n\n").map(|end| end + 3));

    match existing_block {
        Some(Some(len)) => mail.body.insert_str(after + len, &format!("{block}\n\n")),
        Some(None) => {
            if !mail.body.ends_with('\n') {
                mail.body.push('\n');
            }
            mail.body.push_str(&format!("\n{block}\n"));
        }
        None => mail.body.insert_str(after, &format!("\n{block}\n\n")),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MID_PREFIX: &str = "https://mid.lookup/";

    fn cover_letter() -> Mail {
        Mail::parse(
            "From 0000000000000000000000000000000000000000 Mon Sep 17 00:00:00 2001\n\
Message-Id: <cover.3.git.author@example.com>\n\
From: A U Thor <author@example.com>\n\
Subject: [PATCH v3 0/2] This is the subject of the cover\n letter that wraps around\n\
\n\
This is the actual body of the cover letter.\n\
\n\
A U Thor (2):\n\
\x20 one\n\
\x20 two\n\
\n\
-- \n\
2.40.0\n",
        )
        .unwrap()
    }

    fn patch() -> Mail {
        Mail::parse(
            "From 1111111111111111111111111111111111111111 Mon Sep 17 00:00:00 2001\n\
Message-Id: <1111.1537000000.git.author@example.com>\n\
Subject: [PATCH] fix the frobnicator\n\
\n\
It was broken.\n\
---\n\
\x20a.c | 1 +\n\
\n\
-- \n\
2.40.0\n",
        )
        .unwrap()
    }

    #[test]
    fn test_find_line() {
        assert_eq!(find_line("a\n---\nb", "---"), Some(2));
        assert_eq!(find_line("---\n", "---"), Some(0));
        assert_eq!(find_line("a\n----\n", "---"), None);
    }

    #[test]
    fn test_tag_message_for_cover_letter() {
        let prior = vec![
            "cover.2.git.author@example.com".to_string(),
            "cover.1.git.author@example.com".to_string(),
        ];
        let message = generate_tag_message(&cover_letter(), true, MID_PREFIX, &prior).unwrap();
        assert_eq!(
            message,
            "This is the subject of the cover letter that wraps around\n\
\n\
This is the actual body of the cover letter.\n\
\n\
A U Thor (2):\n\
\x20 one\n\
\x20 two\n\
\n\
Submitted-As: https://mid.lookup/cover.3.git.author@example.com\n\
In-Reply-To: https://mid.lookup/cover.2.git.author@example.com\n\
In-Reply-To: https://mid.lookup/cover.1.git.author@example.com"
        );
    }

    #[test]
    fn test_tag_message_for_single_patch() {
        let message = generate_tag_message(&patch(), false, MID_PREFIX, &[]).unwrap();
        assert_eq!(
            message,
            "fix the frobnicator\n\nIt was broken.\n\n\
Submitted-As: https://mid.lookup/1111.1537000000.git.author@example.com"
        );
    }

    #[test]
    fn test_tag_message_requires_message_id() {
        let mut mail = patch();
        mail.headers.retain(|h| h.name != "Message-Id");
        let err = generate_tag_message(&mail, false, MID_PREFIX, &[]).unwrap_err();
        assert!(matches!(err, PatchError::MissingMessageId));
    }

    #[test]
    fn test_normalize_forge_url() {
        let host = "github.com";
        assert_eq!(
            normalize_forge_url("http://github.com/author/git.git", host).as_deref(),
            Some("https://github.com/author/git")
        );
        assert_eq!(
            normalize_forge_url("git@github.com:author/git.git", host).as_deref(),
            Some("https://github.com/author/git")
        );
        assert_eq!(normalize_forge_url("https://gitlab.com/author/git", host), None);
        assert_eq!(normalize_forge_url("/srv/git/repo.git", host), None);
    }

    #[test]
    fn test_insert_links() {
        let message = "subject\n\nbody\n\nSubmitted-As: https://mid.lookup/x";
        let linked = insert_links(
            message,
            "https://github.com/author/git",
            "my-series-v1",
            Some("next"),
            "github.com",
        );
        assert_eq!(
            linked,
            "subject\n\nbody\n\nSubmitted-As: https://mid.lookup/x\n\
Based-On: next at https://github.com/author/git\n\
Fetch-Base-Via: git fetch https://github.com/author/git next\n\
Published-As: https://github.com/author/git/releases/tag/my-series-v1\n\
Fetch-It-Via: git fetch https://github.com/author/git my-series-v1\n"
        );
    }

    #[test]
    fn test_insert_links_separates_prose() {
        let linked = insert_links("subject\n\nbody", "git@github.com:a/b", "t-v1", None, "github.com");
        assert_eq!(
            linked,
            "subject\n\nbody\n\n\
Published-As: https://github.com/a/b/releases/tag/t-v1\n\
Fetch-It-Via: git fetch https://github.com/a/b t-v1\n"
        );
    }

    #[test]
    fn test_insert_links_skips_unknown_remote() {
        let message = "subject\n\nbody";
        assert_eq!(insert_links(message, "file:///tmp/x", "t", None, "github.com"), message);
    }

    #[test]
    fn test_insert_footers_in_cover_letter() {
        let mut mail = cover_letter();
        insert_footers(&mut mail, true, &["Published-As: x".into(), "Fetch-It-Via: y".into()])
            .unwrap();
        assert!(mail
            .body
            .ends_with("  two\n\nPublished-As: x\nFetch-It-Via: y\n-- \n2.40.0\n"));
    }

    #[test]
    fn test_insert_footers_in_patch_after_existing_block() {
        let mut mail = patch();
        insert_footers(&mut mail, false, &["Published-As: x".into()]).unwrap();
        assert_eq!(
            mail.body,
            "It was broken.\n---\n\nPublished-As: x\n\n a.c | 1 +\n\n-- \n2.40.0\n"
        );

        insert_footers(&mut mail, false, &range_diff_footer(1, "1:  abc = 1:  def one\n"))
            .unwrap();
        assert_eq!(
            mail.body,
            "It was broken.\n---\n\nPublished-As: x\n\n\
Range-diff vs v1:\n\n 1:  abc = 1:  def one\n\n a.c | 1 +\n\n-- \n2.40.0\n"
        );
    }

    #[test]
    fn test_insert_footers_after_block_at_end_of_body() {
        let mut mail = patch();
        mail.body = "It was broken.\n---\n\nPublished-As: x\nFetch-It-Via: y".into();
        insert_footers(&mut mail, false, &["Pull-Request: z".into()]).unwrap();
        assert_eq!(
            mail.body,
            "It was broken.\n---\n\nPublished-As: x\nFetch-It-Via: y\n\nPull-Request: z\n"
        );
    }

    #[test]
    fn test_insert_footers_without_marker_fails() {
        let mut mail = patch();
        mail.body = "no separator here\n".into();
        let err = insert_footers(&mut mail, false, &["X: y".into()]).unwrap_err();
        assert!(matches!(
            err,
            PatchError::MissingInsertionPoint { marker: PATCH_SEPARATOR, .. }
        ));
    }

    #[test]
    fn test_range_diff_footer() {
        let lines = range_diff_footer(2, "1:  a ! 1:  b one\n    @@ x\n\n    -old\n");
        assert_eq!(
            lines,
            vec![
                "Range-diff vs v2:",
                "",
                " 1:  a ! 1:  b one",
                "     @@ x",
                "",
                "     -old",
            ]
        );
    }
}
