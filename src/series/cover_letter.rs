//! Filling the user's title and description into the exported mails.

use crate::error::{PatchError, Result};
use crate::model::mail::Mail;
use crate::parser::header::fold;
use crate::series::footer::{find_line, PATCH_SEPARATOR};

/// Placeholder git puts into the cover-letter subject.
pub const SUBJECT_PLACEHOLDER: &str = "*** SUBJECT HERE ***";

/// Placeholder git puts into the cover-letter body.
pub const BLURB_PLACEHOLDER: &str = "*** BLURB HERE ***";

/// Replace the cover-letter placeholders with `title` and `body`.
///
/// `body` is expected to be wrapped already. The shortlog and diffstat that
/// follow the blurb are kept verbatim; an empty body removes the blurb
/// paragraph altogether.
pub fn compose_cover_letter(mail: &mut Mail, title: &str, body: &str) -> Result<()> {
    let subject = mail
        .header_mut("Subject")
        .filter(|h| h.value.contains(SUBJECT_PLACEHOLDER))
        .ok_or(PatchError::MissingPlaceholder(SUBJECT_PLACEHOLDER))?;
    subject.value = subject.value.replacen(SUBJECT_PLACEHOLDER, &fold(title), 1);

    let marker = format!("{BLURB_PLACEHOLDER}\n\n");
    let start = find_line(&mail.body, BLURB_PLACEHOLDER)
        .filter(|&pos| mail.body[pos..].starts_with(&marker))
        .ok_or(PatchError::MissingPlaceholder(BLURB_PLACEHOLDER))?;

    let body = body.trim_end_matches('\n');
    let replacement = if body.is_empty() {
        String::new()
    } else {
        format!("{body}\n\n")
    };
    mail.body
        .replace_range(start..start + marker.len(), &replacement);
    Ok(())
}

/// Put the description of a single-patch series right below the `---` line,
/// where `git am` ignores it.
pub fn insert_description(mail: &mut Mail, description: &str) -> Result<()> {
    let description = description.trim_end_matches('\n');
    if description.is_empty() {
        return Ok(());
    }

    let separator = find_line(&mail.body, PATCH_SEPARATOR).ok_or_else(|| {
        PatchError::MissingInsertionPoint {
            marker: PATCH_SEPARATOR,
            subject: mail.subject().unwrap_or_default(),
        }
    })?;
    let at = separator + PATCH_SEPARATOR.len() + 1;

    // A footer block inserted earlier already starts with a blank line.
    let insert = if mail.body[at..].starts_with('\n') {
        format!("{description}\n")
    } else {
        format!("{description}\n\n")
    };
    mail.body.insert_str(at, &insert);
    Ok(())
}
