//! Word wrapping for cover-letter prose.

use unicode_width::UnicodeWidthStr;

/// Wrap `text` so no line exceeds `width` display columns, then prefix every
/// non-empty line with `indent`.
///
/// Lines that start with whitespace (code, lists, quoted output) are kept as
/// they are. Words wider than the available space get a line of their own.
/// CRLF line endings are converted and trailing blank lines dropped.
pub fn wrap_text(text: &str, width: usize, indent: &str) -> String {
    let text = text.replace("\r\n", "\n");
    let available = width.saturating_sub(indent.width()).max(1);
    let mut out: Vec<String> = Vec::new();

    for line in text.trim_end().lines() {
        let line = line.trim_end();
        if line.starts_with(char::is_whitespace) || line.width() <= available {
            out.push(line.to_string());
            continue;
        }

        let mut current = String::new();
        for word in line.split(' ').filter(|w| !w.is_empty()) {
            if current.is_empty() {
                current.push_str(word);
            } else if current.width() + 1 + word.width() <= available {
                current.push(' ');
                current.push_str(word);
            } else {
                out.push(std::mem::take(&mut current));
                current.push_str(word);
            }
        }
        if !current.is_empty() {
            out.push(current);
        }
    }

    out.iter()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{indent}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_lines_untouched() {
        assert_eq!(wrap_text("one\n\ntwo\n", 76, ""), "one\n\ntwo");
    }

    #[test]
    fn test_wraps_long_line() {
        let text = "aaaa bbbb cccc dddd";
        assert_eq!(wrap_text(text, 10, ""), "aaaa bbbb\ncccc dddd");
    }

    #[test]
    fn test_indent_counts_against_width() {
        let text = "aaaa bbbb cccc";
        assert_eq!(wrap_text(text, 12, "    "), "    aaaa\n    bbbb\n    cccc");
    }

    #[test]
    fn test_keeps_indented_lines_and_blank_lines_unindented() {
        let text = "para one is long enough to wrap\n\n    code stays as it is even if long\n";
        let wrapped = wrap_text(text, 16, "");
        assert_eq!(
            wrapped,
            "para one is long\nenough to wrap\n\n    code stays as it is even if long"
        );
    }

    #[test]
    fn test_wide_characters_measured_by_columns() {
        // Each character is two columns wide.
        let text = "日本語 日本語 日本語";
        assert_eq!(wrap_text(text, 14, ""), "日本語 日本語\n日本語");
    }

    #[test]
    fn test_crlf_converted() {
        assert_eq!(wrap_text("a\r\nb\r\n", 76, ""), "a\nb");
    }
}
