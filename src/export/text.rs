//! Canonical tree to plain text.
//!
//! Runs the Markdown emitter, then strips the punctuation Markdown adds.
//! Best-effort by nature: code content containing Markdown-looking tokens
//! loses them too.

use regex::Regex;

use crate::document::Node;

use super::markdown::to_markdown;

/// Serialize a canonical document to plain text.
pub fn to_text(doc: &Node) -> String {
    strip_markdown(&to_markdown(doc))
}

fn strip_markdown(markdown: &str) -> String {
    let mut text = markdown.to_string();

    // Fence lines go, code content stays.
    text = Regex::new(r"(?m)^```[^\n]*\n?")
        .unwrap()
        .replace_all(&text, "")
        .to_string();

    // Images keep their alt text, links keep their label.
    text = Regex::new(r"!\[([^\]]*)\]\([^)]*\)")
        .unwrap()
        .replace_all(&text, "$1")
        .to_string();
    text = Regex::new(r"\[([^\]]*)\]\([^)]*\)")
        .unwrap()
        .replace_all(&text, "$1")
        .to_string();

    // Heading and blockquote prefixes.
    text = Regex::new(r"(?m)^#{1,6}\s+")
        .unwrap()
        .replace_all(&text, "")
        .to_string();
    text = Regex::new(r"(?m)^(?:>\s?)+")
        .unwrap()
        .replace_all(&text, "")
        .to_string();

    // Task checkboxes become plain bullets.
    text = Regex::new(r"(?m)^(\s*)- \[[ x]\] ")
        .unwrap()
        .replace_all(&text, "$1- ")
        .to_string();

    // Emphasis, strike, highlight and inline-code tokens.
    for token in ["**", "~~", "==", "*", "`"] {
        text = text.replace(token, "");
    }

    // Table separator rows vanish, pipes become spacing.
    text = Regex::new(r"(?m)^\|(?: ?:?-{3,}:? ?\|)+\n?")
        .unwrap()
        .replace_all(&text, "")
        .to_string();
    text = Regex::new(r"(?m)^\| | \|$")
        .unwrap()
        .replace_all(&text, "")
        .to_string();
    text = text.replace(" | ", "  ");

    // Horizontal rules carry no text.
    text = Regex::new(r"(?m)^---$\n?")
        .unwrap()
        .replace_all(&text, "")
        .to_string();

    Regex::new(r"\n{3,}")
        .unwrap()
        .replace_all(&text, "\n\n")
        .trim()
        .to_string()
}
