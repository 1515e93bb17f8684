//! Text processing utilities.

use regex::Regex;
use std::sync::LazyLock;

static INLINE_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\u{a0}]+").expect("valid regex"));

static EXCESS_NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n(\s*\n)+").expect("valid regex"));

/// Collapse runs of spaces and tabs, keep paragraph breaks, trim the ends.
///
/// PDF text extraction pads words and lines unevenly; the chunker relies on
/// blank lines and spaces as split points.
pub fn normalize_whitespace(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = INLINE_WHITESPACE.replace_all(&text, " ");
    let text = EXCESS_NEWLINES.replace_all(&text, "\n\n");
    text.lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// True when the text holds anything other than whitespace.
pub fn has_content(text: &str) -> bool {
    text.chars().any(|c| !c.is_whitespace())
}
