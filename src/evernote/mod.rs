//! Evernote .enex import.
//!
//! Two-tier parsing: a strict XML event parse as the primary path and a
//! regex scanner as the fallback for the malformed exports Evernote is known
//! to produce. Both tiers emit the same [`ImportedNote`] records and share
//! the content normalizer.
//!
//! [`ImportedNote`]: crate::import::ImportedNote

mod normalize;
mod parser;

pub use normalize::normalize_enex_content;
pub(crate) use normalize::merge_task_runs;
pub use parser::{import_enex, parse_enex, preview_enex, EnexPreview};

use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;

/// Parse the fixed-width Evernote date format (`yyyyMMddTHHmmssZ`).
/// Unparsable dates yield `None`.
pub(crate) fn parse_enex_date(raw: &str) -> Option<DateTime<Utc>> {
    let re = Regex::new(r"^(\d{4})(\d{2})(\d{2})T(\d{2})(\d{2})(\d{2})Z$").unwrap();
    let caps = re.captures(raw.trim())?;
    let field = |i: usize| caps[i].parse::<u32>().ok();
    Utc.with_ymd_and_hms(
        caps[1].parse::<i32>().ok()?,
        field(2)?,
        field(3)?,
        field(4)?,
        field(5)?,
        field(6)?,
    )
    .single()
}

/// Stable identifier for an embedded resource.
///
/// The `objID` attribute inside the embedded recognition XML wins when
/// present; otherwise a content-prefix digest over the first 100 base64
/// characters. Both parse tiers call this with the same inputs, so a
/// resource resolves to the same hash on either path.
pub(crate) fn resource_hash(recognition: Option<&str>, base64_data: &str) -> String {
    if let Some(xml) = recognition {
        let re = Regex::new(r#"objID="([0-9a-fA-F]+)""#).unwrap();
        if let Some(caps) = re.captures(xml) {
            return caps[1].to_lowercase();
        }
    }
    let prefix: String = base64_data
        .chars()
        .filter(|c| !c.is_whitespace())
        .take(100)
        .collect();
    format!("{:x}", md5::compute(prefix.as_bytes()))
}

/// Repairs applied before retrying a failed XML parse: strip the BOM and
/// escape bare ampersands.
pub(crate) fn repair_xml(text: &str) -> String {
    let text = text.trim_start_matches('\u{feff}');
    escape_bare_ampersands(text)
}

/// Escape `&` characters that do not begin a valid entity reference.
fn escape_bare_ampersands(text: &str) -> String {
    let entity_re =
        Regex::new(r"^(?:[a-zA-Z][a-zA-Z0-9]{1,31}|#[0-9]{1,7}|#x[0-9a-fA-F]{1,6});").unwrap();
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(idx) = rest.find('&') {
        out.push_str(&rest[..idx]);
        let after = &rest[idx + 1..];
        if entity_re.is_match(after) {
            out.push('&');
        } else {
            out.push_str("&amp;");
        }
        rest = after;
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_parse_enex_date() {
        let date = parse_enex_date("20231231T235959Z").unwrap();
        assert_eq!(date.year(), 2023);
        assert_eq!(date.month(), 12);
        assert_eq!(date.day(), 31);
    }

    #[test]
    fn test_parse_enex_date_rejects_garbage() {
        assert!(parse_enex_date("not a date").is_none());
        assert!(parse_enex_date("20231301T000000Z").is_none());
        assert!(parse_enex_date("20231231T235959").is_none());
    }

    #[test]
    fn test_resource_hash_prefers_recognition_obj_id() {
        let reco = r#"<recoIndex objID="abc123DEF" objType="image"/>"#;
        assert_eq!(resource_hash(Some(reco), "AAAA"), "abc123def");
    }

    #[test]
    fn test_resource_hash_is_prefix_stable() {
        let prefix: String = "QUJD".repeat(25);
        let a = format!("{}{}", prefix, "tail-one");
        let b = format!("{}{}", prefix, "tail-two");
        // Same first 100 characters, same hash.
        assert_eq!(resource_hash(None, &a), resource_hash(None, &b));
    }

    #[test]
    fn test_resource_hash_ignores_whitespace() {
        let folded = "QUJD\nREVG\nQUJD";
        let flat = "QUJDREVGQUJD";
        assert_eq!(resource_hash(None, folded), resource_hash(None, flat));
    }

    #[test]
    fn test_escape_bare_ampersands() {
        assert_eq!(
            escape_bare_ampersands("Tom & Jerry &amp; &#39; &unknown"),
            "Tom &amp; Jerry &amp; &#39; &amp;unknown"
        );
    }

    #[test]
    fn test_repair_strips_bom() {
        assert_eq!(repair_xml("\u{feff}<x/>"), "<x/>");
    }
}
