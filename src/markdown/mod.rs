//! Markdown import: frontmatter extraction plus the regex compilation
//! pipeline in [`compile`].

mod compile;

pub use compile::compile_markdown;

use chrono::{DateTime, Utc};

use crate::import::ImportedNote;

/// Frontmatter extracted from a Markdown file.
#[derive(Default)]
struct Frontmatter {
    title: Option<String>,
    tags: Vec<String>,
    created: Option<DateTime<Utc>>,
    updated: Option<DateTime<Utc>>,
}

/// Split optional leading `---`-delimited frontmatter off a Markdown file.
fn parse_frontmatter(markdown: &str) -> (Frontmatter, String) {
    let mut frontmatter = Frontmatter::default();

    if !markdown.starts_with("---") {
        return (frontmatter, markdown.to_string());
    }

    let content_after_first = &markdown[3..];
    if let Some(end_pos) = content_after_first.find("\n---") {
        let yaml_content = content_after_first[..end_pos].trim();
        let body = content_after_first[end_pos + 4..].trim_start();

        // Simple key-value scan, not a YAML parser.
        for line in yaml_content.lines() {
            let line = line.trim();
            if let Some(rest) = line.strip_prefix("title:") {
                frontmatter.title = Some(parse_yaml_string(rest));
            } else if let Some(rest) = line.strip_prefix("created:") {
                frontmatter.created = parse_datetime(rest);
            } else if let Some(rest) = line.strip_prefix("updated:") {
                frontmatter.updated = parse_datetime(rest);
            } else if let Some(rest) = line.strip_prefix("- ") {
                let tag = parse_yaml_string(rest);
                if !tag.is_empty() {
                    frontmatter.tags.push(tag);
                }
            }
        }

        return (frontmatter, body.to_string());
    }

    (frontmatter, markdown.to_string())
}

/// Parse a YAML string value (handles quoted and unquoted).
fn parse_yaml_string(s: &str) -> String {
    let s = s.trim();
    if (s.starts_with('"') && s.ends_with('"') && s.len() >= 2)
        || (s.starts_with('\'') && s.ends_with('\'') && s.len() >= 2)
    {
        s[1..s.len() - 1].replace("\\\"", "\"").replace("\\'", "'")
    } else {
        s.to_string()
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Import a Markdown file as a single note. The title comes from the
/// frontmatter when present, otherwise from the file name.
pub fn import_markdown(markdown: &str, fallback_title: &str) -> ImportedNote {
    let (frontmatter, body) = parse_frontmatter(markdown);

    ImportedNote {
        title: frontmatter
            .title
            .unwrap_or_else(|| fallback_title.to_string()),
        content: compile_markdown(&body),
        created_at: frontmatter.created,
        updated_at: frontmatter.updated,
        tags: frontmatter.tags,
        resources: Vec::new(),
    }
}
