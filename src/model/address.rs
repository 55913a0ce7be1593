//! Email address parsing and formatting (RFC 5322 §3.4, RFC 2047).

use crate::parser::header::{decode_encoded_words, encode_phrase};

/// Characters that force a display name into a quoted-string.
const SPECIALS: &[char] = &['(', ')', '<', '>', '[', ']', ':', ';', '@', '\\', ',', '.', '"'];

/// A parsed email address.
///
/// # Examples
/// - `"Juan García <juan@ejemplo.com>"` → `display_name = "Juan García"`, `address = "juan@ejemplo.com"`
/// - `"user@example.com"` → `display_name = ""`, `address = "user@example.com"`
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct EmailAddress {
    /// Human-readable display name (may be empty), already decoded.
    pub display_name: String,
    /// The bare email address (`user@domain`).
    pub address: String,
}

impl EmailAddress {
    /// Build an address from its parts.
    pub fn new(display_name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            address: address.into(),
        }
    }

    /// Parse a single email address from a header value.
    ///
    /// Supported formats:
    /// - `"user@domain.com"`
    /// - `"<user@domain.com>"`
    /// - `"Display Name <user@domain.com>"`
    /// - `"\"Display, Name\" <user@domain.com>"`
    /// - `"=?UTF-8?q?Jos=C3=A9?= <jose@example.com>"`
    ///
    /// If parsing fails, the raw string is stored as `address`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::new("", "");
        }

        // Try "Display Name <address>" or "<address>"
        if let (Some(angle_start), Some(angle_end)) = (trimmed.rfind('<'), trimmed.rfind('>')) {
            if angle_end > angle_start {
                let addr = trimmed[angle_start + 1..angle_end].trim().to_string();
                let name_part = trimmed[..angle_start].trim();
                let display_name = decode_encoded_words(&strip_quotes(name_part));
                return Self::new(display_name, addr);
            }
        }

        Self::new("", trimmed)
    }

    /// Parse a comma-separated list of addresses.
    ///
    /// Handles quoted commas: `"Last, First" <a@b.com>, other@c.com`
    pub fn parse_list(raw: &str) -> Vec<Self> {
        let mut results = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut in_angle = false;
        let mut escaped = false;

        for ch in raw.chars() {
            if escaped {
                escaped = false;
                current.push(ch);
                continue;
            }
            match ch {
                '\\' if in_quotes => {
                    escaped = true;
                    current.push(ch);
                }
                '"' => {
                    in_quotes = !in_quotes;
                    current.push(ch);
                }
                '<' if !in_quotes => {
                    in_angle = true;
                    current.push(ch);
                }
                '>' if !in_quotes => {
                    in_angle = false;
                    current.push(ch);
                }
                ',' if !in_quotes && !in_angle => {
                    let addr = Self::parse(&current);
                    if !addr.address.is_empty() {
                        results.push(addr);
                    }
                    current.clear();
                }
                _ => current.push(ch),
            }
        }

        // Last segment
        let addr = Self::parse(&current);
        if !addr.address.is_empty() {
            results.push(addr);
        }

        results
    }

    /// Name to show when acting on someone's behalf: the display name, or the
    /// bare address when there is none.
    pub fn name_or_address(&self) -> &str {
        if self.display_name.is_empty() {
            &self.address
        } else {
            &self.display_name
        }
    }

    /// Format for a mail header, encoding the display name as needed.
    ///
    /// Non-ASCII names become RFC 2047 encoded-words; names with specials are
    /// quoted. With `force_quote`, plain ASCII names are quoted as well.
    pub fn to_header_value(&self, force_quote: bool) -> String {
        if self.display_name.is_empty() {
            return format!("<{}>", self.address);
        }
        format!(
            "{} <{}>",
            format_display_name(&self.display_name, force_quote),
            self.address
        )
    }

    /// Format for display: `"Display Name <address>"` or just `"address"`.
    pub fn display(&self) -> String {
        if self.display_name.is_empty() {
            self.address.clone()
        } else {
            format!("{} <{}>", self.display_name, self.address)
        }
    }
}

/// Encode a display name for use in an address header.
pub fn format_display_name(name: &str, force_quote: bool) -> String {
    if !name.is_ascii() {
        return encode_phrase(name);
    }
    if force_quote || name.contains(SPECIALS) {
        let mut quoted = String::with_capacity(name.len() + 2);
        quoted.push('"');
        for ch in name.chars() {
            if ch == '"' || ch == '\\' {
                quoted.push('\\');
            }
            quoted.push(ch);
        }
        quoted.push('"');
        return quoted;
    }
    name.to_string()
}

/// Strip surrounding double-quotes, undo backslash escapes and trim whitespace.
fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        let inner = &trimmed[1..trimmed.len() - 1];
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(ch) = chars.next() {
            if ch == '\\' {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            } else {
                out.push(ch);
            }
        }
        out.trim().to_string()
    } else {
        trimmed.to_string()
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_address() {
        let addr = EmailAddress::parse("user@example.com");
        assert_eq!(addr.address, "user@example.com");
        assert_eq!(addr.display_name, "");
    }

    #[test]
    fn test_parse_name_and_address() {
        let addr = EmailAddress::parse("User One <user1@example.com>");
        assert_eq!(addr.address, "user1@example.com");
        assert_eq!(addr.display_name, "User One");
    }

    #[test]
    fn test_parse_quoted_name_with_escapes() {
        let addr = EmailAddress::parse(r#""Doe, \"JD\" John" <jd@example.com>"#);
        assert_eq!(addr.address, "jd@example.com");
        assert_eq!(addr.display_name, r#"Doe, "JD" John"#);
    }

    #[test]
    fn test_parse_encoded_name() {
        let addr = EmailAddress::parse("=?UTF-8?q?Jos=C3=A9_Garc=C3=ADa?= <jose@example.com>");
        assert_eq!(addr.display_name, "José García");
        assert_eq!(addr.address, "jose@example.com");
    }

    #[test]
    fn test_parse_list_with_quoted_comma() {
        let list = EmailAddress::parse_list("\"Last, First\" <a@b.com>,\n    other@c.com");
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].display_name, "Last, First");
        assert_eq!(list[1].address, "other@c.com");
    }

    #[test]
    fn test_header_value_plain() {
        let addr = EmailAddress::new("Alice Example", "alice@example.com");
        assert_eq!(addr.to_header_value(false), "Alice Example <alice@example.com>");
    }

    #[test]
    fn test_header_value_quotes_specials() {
        let addr = EmailAddress::new("A. U. Thor", "author@example.com");
        assert_eq!(addr.to_header_value(false), "\"A. U. Thor\" <author@example.com>");

        let addr = EmailAddress::new(r#"The "Tester" \o/"#, "t@example.com");
        assert_eq!(
            addr.to_header_value(false),
            r#""The \"Tester\" \\o/" <t@example.com>"#
        );
    }

    #[test]
    fn test_header_value_forced_quotes() {
        let addr = EmailAddress::new("Jane via Bot", "bot@example.com");
        assert_eq!(addr.to_header_value(true), "\"Jane via Bot\" <bot@example.com>");
    }

    #[test]
    fn test_header_value_encodes_non_ascii() {
        let addr = EmailAddress::new("José", "jose@example.com");
        assert_eq!(addr.to_header_value(true), "=?UTF-8?q?Jos=C3=A9?= <jose@example.com>");
    }

    #[test]
    fn test_name_or_address() {
        assert_eq!(EmailAddress::parse("<x@y.z>").name_or_address(), "x@y.z");
        assert_eq!(EmailAddress::parse("X Y <x@y.z>").name_or_address(), "X Y");
    }
}
