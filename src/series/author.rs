//! Sending patches on someone else's behalf.
//!
//! When the sender is not the commit author, the `From:` header is rewritten
//! to the sender (or to `"Author via Bot" <bot@...>`), the author is added to
//! `Cc:`, and an in-body `From:` line keeps `git am` attributing the commit
//! correctly.

use tracing::debug;

use crate::error::{PatchError, Result};
use crate::model::address::EmailAddress;
use crate::model::mail::Mail;
use crate::parser::header::unfold;

/// Who is sending the series.
#[derive(Debug, Clone)]
pub struct Sender {
    raw: String,
    address: EmailAddress,
    bot_name: Option<String>,
}

impl Sender {
    /// Parse `Name <email>`. The identity counts as a bot when its display
    /// name equals `bot_name`.
    pub fn new(identity: &str, bot_name: Option<&str>) -> Result<Self> {
        let address = EmailAddress::parse(identity);
        if !address.address.contains('@') {
            return Err(PatchError::InvalidIdentity(identity.to_string()));
        }
        let bot_name = bot_name
            .filter(|name| !name.is_empty() && *name == address.display_name)
            .map(str::to_string);
        Ok(Self {
            raw: identity.trim().to_string(),
            address,
            bot_name,
        })
    }

    /// Bare email address of the sender.
    pub fn email(&self) -> &str {
        &self.address.address
    }

    /// Whether mails go out as `"Author via Bot"`.
    pub fn is_bot(&self) -> bool {
        self.bot_name.is_some()
    }

    fn from_value_for(&self, author: &EmailAddress, on_behalf_of: Option<&str>) -> String {
        match &self.bot_name {
            Some(bot) => {
                let name = on_behalf_of.unwrap_or_else(|| author.name_or_address());
                EmailAddress::new(format!("{name} via {bot}"), self.email()).to_header_value(true)
            }
            None => self.address.to_header_value(false),
        }
    }
}

/// Rewrite authorship of every mail in the series for `sender`.
///
/// `cover_letter_name` is the name the cover letter is sent on behalf of in
/// bot mode. The cover letter (first mail of a multi-mail series) only ever
/// gets its `From:` replaced.
pub fn resolve_authors(
    mails: &mut [Mail],
    sender: &Sender,
    cover_letter_name: Option<&str>,
) -> Result<()> {
    let has_cover_letter = mails.len() > 1;

    for (i, mail) in mails.iter_mut().enumerate() {
        let is_cover_letter = has_cover_letter && i == 0;
        let raw_author = mail
            .header("From")
            .map(unfold)
            .ok_or(PatchError::MissingHeader { name: "From" })?;
        let author = EmailAddress::parse(&raw_author);

        if raw_author.trim() == sender.raw && !sender.is_bot() {
            continue;
        }
        if sender.is_bot() && author.address == sender.email() && !is_cover_letter {
            continue;
        }

        let on_behalf_of = if is_cover_letter {
            cover_letter_name
        } else {
            None
        };
        mail.set_header("From", sender.from_value_for(&author, on_behalf_of));

        if is_cover_letter {
            continue;
        }

        add_cc(mail, &raw_author, &author.address);
        mail.body = format!("From: {raw_author}\n\n{}", mail.body);
        debug!(author = %author.address, "Sending on behalf of author");
    }
    Ok(())
}

/// Add `raw` to the `Cc:` header unless `address` is already listed.
fn add_cc(mail: &mut Mail, raw: &str, address: &str) {
    match mail.header_mut("Cc") {
        Some(cc) => {
            let listed = EmailAddress::parse_list(&unfold(&cc.value))
                .iter()
                .any(|a| a.address.eq_ignore_ascii_case(address));
            if !listed {
                cc.value = format!("{},\n    {raw}", cc.value.trim_end());
            }
        }
        None => mail.set_header("Cc", raw),
    }
}
