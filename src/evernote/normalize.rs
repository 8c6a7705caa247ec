//! Rewrites Evernote-proprietary markup into plain HTML.
//!
//! Ordered passes over `en-media`, `en-crypt` and `en-todo` elements using
//! the note's resource map. Idempotent: running the normalizer on its own
//! output is a no-op, and it never fails — unresolvable references degrade
//! to placeholders instead.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use regex::{Captures, Regex};

use crate::import::ImportedResource;

/// Normalize the ENML body of one note against its resources.
pub fn normalize_enex_content(html: &str, resources: &[ImportedResource]) -> String {
    let mut text = strip_enml_wrapper(html);
    text = replace_media(&text, resources);
    text = replace_crypt(&text);
    text = replace_todos(&text);
    text
}

/// Remove the XML prolog, DOCTYPE and `en-note` wrapper element.
fn strip_enml_wrapper(html: &str) -> String {
    let mut text = html.to_string();

    let prolog_re = Regex::new(r"(?s)<\?xml[^>]*\?>").unwrap();
    text = prolog_re.replace_all(&text, "").to_string();

    let doctype_re = Regex::new(r"(?s)<!DOCTYPE[^>]*>").unwrap();
    text = doctype_re.replace_all(&text, "").to_string();

    let en_note_re = Regex::new(r"(?s)</?en-note[^>]*>").unwrap();
    text = en_note_re.replace_all(&text, "").to_string();

    text.trim().to_string()
}

/// Pass 1: `en-media` references.
///
/// A matching image resource inlines as a data-URI `<img>`; a matching
/// non-image resource becomes a link placeholder; an unmatched hash becomes
/// a textual marker; an `en-media` without a hash is dropped.
fn replace_media(html: &str, resources: &[ImportedResource]) -> String {
    let media_re = Regex::new(r"(?is)<en-media([^>]*?)/?>(?:\s*</en-media>)?").unwrap();
    let hash_re = Regex::new(r#"hash="([0-9a-fA-F]+)""#).unwrap();

    media_re
        .replace_all(html, |caps: &Captures| {
            let attrs = &caps[1];
            let Some(hash) = hash_re.captures(attrs).map(|c| c[1].to_lowercase()) else {
                // Orphan reference, nothing it could ever resolve to.
                return String::new();
            };
            match resources.iter().find(|r| r.hash == hash) {
                Some(resource) if resource.is_image() => {
                    let alt = resource.filename.as_deref().unwrap_or(&resource.hash);
                    let mut tag = format!(
                        r#"<img src="data:{};base64,{}" alt="{}""#,
                        resource.mime,
                        BASE64.encode(&resource.data),
                        html_escape::encode_double_quoted_attribute(alt),
                    );
                    if let Some(width) = resource.width {
                        tag.push_str(&format!(r#" width="{}""#, width));
                    }
                    if let Some(height) = resource.height {
                        tag.push_str(&format!(r#" height="{}""#, height));
                    }
                    tag.push_str(" />");
                    tag
                }
                Some(resource) => {
                    let label = resource
                        .filename
                        .clone()
                        .unwrap_or_else(|| format!("attachment ({})", resource.mime));
                    format!(
                        r##"<a href="#{}">{}</a>"##,
                        resource.hash,
                        html_escape::encode_text(&label)
                    )
                }
                None => "[media missing]".to_string(),
            }
        })
        .to_string()
}

/// Pass 2: `en-crypt` blocks degrade to an italic placeholder. Decrypting
/// them is out of scope.
fn replace_crypt(html: &str) -> String {
    let crypt_re =
        Regex::new(r"(?is)<en-crypt[^>]*>.*?</en-crypt>|<en-crypt[^>]*/>").unwrap();
    crypt_re
        .replace_all(html, "<i>[encrypted content]</i>")
        .to_string()
}

/// Pass 3: `en-todo` checkboxes become task items, and contiguous runs of
/// task items merge into one task list.
fn replace_todos(html: &str) -> String {
    let task_item = |attrs: &str, text: &str| {
        let checked = attrs.to_lowercase().contains(r#"checked="true""#);
        format!(
            r#"<li data-type="taskItem" data-checked="{}"><input type="checkbox"{} disabled="disabled" /> {}</li>"#,
            checked,
            if checked { r#" checked="checked""# } else { "" },
            text.trim(),
        )
    };

    // Todos on their own line: <div><en-todo .../>text</div>
    let wrapped_re = Regex::new(r"(?is)<div[^>]*>\s*<en-todo([^>]*?)/?>\s*(.*?)</div>").unwrap();
    let mut text = wrapped_re
        .replace_all(html, |caps: &Captures| task_item(&caps[1], &caps[2]))
        .to_string();

    // Any leftover bare en-todo takes the trailing run of plain text.
    let bare_re = Regex::new(r"(?is)<en-todo([^>]*?)/?>\s*([^<]*)").unwrap();
    text = bare_re
        .replace_all(&text, |caps: &Captures| task_item(&caps[1], &caps[2]))
        .to_string();

    merge_task_runs(&text)
}

/// Greedily wrap each contiguous run of task `<li>` elements in a single
/// `data-type="taskList"` `<ul>`. Runs already wrapped are left alone, which
/// is what keeps the pass idempotent. The Markdown compiler groups its task
/// items with the same pass.
pub(crate) fn merge_task_runs(html: &str) -> String {
    let run_re = Regex::new(
        r#"(?s)(<ul data-type="taskList">)?((?:<li data-type="taskItem".*?</li>\s*)+)"#,
    )
    .unwrap();
    run_re
        .replace_all(html, |caps: &Captures| {
            if caps.get(1).is_some() {
                caps[0].to_string()
            } else {
                format!(
                    r#"<ul data-type="taskList">{}</ul>"#,
                    caps[2].trim_end()
                )
            }
        })
        .to_string()
}
