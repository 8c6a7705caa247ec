//! Generic `.html` file ingestion.
//!
//! Title comes from `<title>` (falling back to the file name), the body's
//! inner HTML is kept, and scripts, styles and comments are stripped.

use regex::Regex;

use crate::import::ImportedNote;

/// Extract the `<title>` content from an HTML document.
pub fn extract_title(html: &str) -> Option<String> {
    let title_re = Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap();
    title_re.captures(html).and_then(|caps| {
        let raw = caps[1].trim().to_string();
        // Strip any nested tags inside <title>
        let tag_re = Regex::new(r"<[^>]+>").unwrap();
        let clean = tag_re.replace_all(&raw, "").to_string();
        let clean = html_escape::decode_html_entities(&clean).trim().to_string();
        if clean.is_empty() {
            None
        } else {
            Some(clean)
        }
    })
}

/// Inner HTML of `<body>`, or the whole document when no body tag exists.
fn extract_body(html: &str) -> String {
    let body_re = Regex::new(r"(?is)<body[^>]*>(.*?)</body>").unwrap();
    match body_re.captures(html) {
        Some(caps) => caps[1].to_string(),
        None => html.to_string(),
    }
}

/// Remove script and style elements (with their content) and HTML comments.
fn strip_noise(html: &str) -> String {
    let mut text = html.to_string();

    let script_re = Regex::new(r"(?is)<script[^>]*>.*?</script>").unwrap();
    text = script_re.replace_all(&text, "").to_string();

    let style_re = Regex::new(r"(?is)<style[^>]*>.*?</style>").unwrap();
    text = style_re.replace_all(&text, "").to_string();

    let comment_re = Regex::new(r"(?s)<!--.*?-->").unwrap();
    text = comment_re.replace_all(&text, "").to_string();

    text
}

/// Ingest an arbitrary HTML document as a single note.
pub fn import_html(html: &str, fallback_title: &str) -> ImportedNote {
    let title = extract_title(html).unwrap_or_else(|| fallback_title.to_string());
    let content = strip_noise(&extract_body(html)).trim().to_string();

    ImportedNote {
        title,
        content,
        created_at: None,
        updated_at: None,
        tags: Vec::new(),
        resources: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_from_head() {
        let html = "<html><head><title>My Page</title></head><body><p>x</p></body></html>";
        let note = import_html(html, "fallback");
        assert_eq!(note.title, "My Page");
        assert_eq!(note.content, "<p>x</p>");
    }

    #[test]
    fn test_fallback_title_when_missing() {
        let note = import_html("<p>content</p>", "notes.html");
        assert_eq!(note.title, "notes.html");
    }

    #[test]
    fn test_scripts_styles_comments_stripped() {
        let html = "<body><script>alert(1)</script><style>p{}</style><!-- hi --><p>keep</p></body>";
        let note = import_html(html, "f");
        assert_eq!(note.content, "<p>keep</p>");
    }

    #[test]
    fn test_title_entities_decoded() {
        let html = "<title>A &amp; B</title><body><p>x</p></body>";
        assert_eq!(extract_title(html), Some("A & B".to_string()));
    }

    #[test]
    fn test_whole_document_used_without_body() {
        let note = import_html("<h1>Loose</h1><p>fragment</p>", "f");
        assert_eq!(note.content, "<h1>Loose</h1><p>fragment</p>");
    }
}
