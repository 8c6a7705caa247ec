//! ENEX parsing: strict XML primary path with a regex fallback.
//!
//! The primary tier is a quick-xml event parse. When it errors, the input
//! is repaired (BOM stripped, bare ampersands escaped) and retried; when it
//! still fails, or finds zero `<note>` elements, the regex tier scans
//! balanced `<note>`/`<resource>`/`<content>` blocks instead. Only when
//! neither tier yields a note does parsing fail.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{normalize_enex_content, parse_enex_date, repair_xml, resource_hash};
use crate::error::{ImportError, Result};
use crate::import::{ImportedNote, ImportedResource};

/// Metadata about an ENEX file, gathered without importing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnexPreview {
    /// Number of notes found
    pub note_count: usize,
    /// Number of resources/attachments
    pub resource_count: usize,
    /// Titles of the first notes (up to 10)
    pub sample_titles: Vec<String>,
    /// Warnings during preview
    pub warnings: Vec<String>,
}

/// In-progress resource, finalized when its `</resource>` end tag arrives.
#[derive(Default)]
struct ResourceDraft {
    base64: String,
    mime: String,
    filename: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    recognition: String,
}

impl ResourceDraft {
    fn build(self) -> Option<ImportedResource> {
        if self.base64.trim().is_empty() {
            return None;
        }
        let hash = resource_hash(
            if self.recognition.is_empty() {
                None
            } else {
                Some(&self.recognition)
            },
            &self.base64,
        );
        let compact: String = self.base64.chars().filter(|c| !c.is_whitespace()).collect();
        let data = match BASE64.decode(compact.as_bytes()) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("Dropping resource with undecodable base64 data: {}", e);
                return None;
            }
        };
        Some(ImportedResource {
            hash,
            data,
            mime: self.mime,
            filename: self.filename,
            width: self.width,
            height: self.height,
        })
    }
}

/// Parse ENEX text into notes with raw (un-normalized) content.
///
/// Never fails on malformed XML alone; see the module docs for the tier
/// order. Fails with [`ImportError::MalformedInput`] only when neither tier
/// yields a note.
pub fn parse_enex(text: &str) -> Result<Vec<ImportedNote>> {
    match parse_enex_xml(text) {
        Ok(notes) if !notes.is_empty() => return Ok(notes),
        Ok(_) => log::warn!("ENEX XML parse found no notes, trying regex fallback"),
        Err(e) => {
            log::warn!("ENEX XML parse failed ({}), repairing and retrying", e);
            let repaired = repair_xml(text);
            match parse_enex_xml(&repaired) {
                Ok(notes) if !notes.is_empty() => return Ok(notes),
                Ok(_) => log::warn!("Repaired ENEX parse found no notes"),
                Err(e) => log::warn!("Repaired ENEX parse failed ({})", e),
            }
        }
    }

    let notes = parse_enex_regex(&repair_xml(text));
    if notes.is_empty() {
        return Err(ImportError::MalformedInput(
            "no notes found in ENEX file".to_string(),
        ));
    }
    Ok(notes)
}

/// Parse ENEX text and normalize each note's content against its resources.
pub fn import_enex(text: &str) -> Result<Vec<ImportedNote>> {
    let mut notes = parse_enex(text)?;
    for note in &mut notes {
        note.content = normalize_enex_content(&note.content, &note.resources);
        if note.title.trim().is_empty() {
            note.title = "Untitled".to_string();
        }
    }
    Ok(notes)
}

/// Preview an ENEX file without importing it.
pub fn preview_enex(text: &str) -> Result<EnexPreview> {
    let notes = parse_enex(text)?;
    let mut warnings = Vec::new();
    let resource_count = notes.iter().map(|n| n.resources.len()).sum();
    for note in &notes {
        if note.title.trim().is_empty() {
            warnings.push("Note with empty title".to_string());
        }
    }
    Ok(EnexPreview {
        note_count: notes.len(),
        resource_count,
        sample_titles: notes.iter().take(10).map(|n| n.title.clone()).collect(),
        warnings,
    })
}

/// Primary tier: strict XML event parse.
fn parse_enex_xml(text: &str) -> Result<Vec<ImportedNote>> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut notes = Vec::new();
    let mut buf = Vec::new();

    let mut current_note: Option<ImportedNote> = None;
    let mut current_resource: Option<ResourceDraft> = None;
    let mut current_element = String::new();
    let mut in_resource_attrs = false;

    let xml_err =
        |e: String| ImportError::MalformedInput(format!("XML parse error: {}", e));

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                current_element = name.clone();

                match name.as_str() {
                    "note" => {
                        current_note = Some(ImportedNote {
                            title: String::new(),
                            content: String::new(),
                            created_at: None,
                            updated_at: None,
                            tags: Vec::new(),
                            resources: Vec::new(),
                        });
                    }
                    "resource" => {
                        current_resource = Some(ResourceDraft::default());
                    }
                    "resource-attributes" => {
                        in_resource_attrs = true;
                    }
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();

                match name.as_str() {
                    "note" => {
                        if let Some(note) = current_note.take() {
                            notes.push(note);
                        }
                    }
                    "resource" => {
                        if let (Some(note), Some(draft)) =
                            (current_note.as_mut(), current_resource.take())
                        {
                            if let Some(resource) = draft.build() {
                                note.resources.push(resource);
                            }
                        }
                    }
                    "resource-attributes" => {
                        in_resource_attrs = false;
                    }
                    _ => {}
                }
                current_element.clear();
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape().map_err(|e| xml_err(e.to_string()))?.to_string();

                if let Some(note) = current_note.as_mut() {
                    if let Some(resource) = current_resource.as_mut() {
                        match current_element.as_str() {
                            "data" => resource.base64.push_str(&text),
                            "mime" => resource.mime = text,
                            "width" => resource.width = text.trim().parse().ok(),
                            "height" => resource.height = text.trim().parse().ok(),
                            "recognition" => resource.recognition.push_str(&text),
                            "file-name" if in_resource_attrs => {
                                resource.filename = Some(text);
                            }
                            _ => {}
                        }
                    } else {
                        match current_element.as_str() {
                            "title" => note.title = text,
                            "content" => note.content.push_str(&text),
                            "tag" => note.tags.push(text),
                            "created" => note.created_at = parse_enex_date(&text),
                            "updated" => note.updated_at = parse_enex_date(&text),
                            _ => {}
                        }
                    }
                }
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e).to_string();
                if let Some(note) = current_note.as_mut() {
                    if let Some(resource) = current_resource.as_mut() {
                        if current_element == "recognition" {
                            resource.recognition.push_str(&text);
                        }
                    } else if current_element == "content" {
                        note.content.push_str(&text);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_err(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(notes)
}

/// Fallback tier: regex scan over `<note>…</note>` blocks.
fn parse_enex_regex(text: &str) -> Vec<ImportedNote> {
    let note_re = Regex::new(r"(?s)<note[\s>].*?</note>").unwrap();
    note_re
        .find_iter(text)
        .map(|m| parse_note_block(m.as_str()))
        .collect()
}

fn parse_note_block(block: &str) -> ImportedNote {
    let field = |pattern: &str| -> Option<String> {
        Regex::new(pattern)
            .unwrap()
            .captures(block)
            .map(|caps| caps[1].to_string())
    };

    let title = field(r"(?s)<title[^>]*>(.*?)</title>")
        .map(|t| html_escape::decode_html_entities(t.trim()).to_string())
        .unwrap_or_default();

    let content = field(r"(?s)<content[^>]*>(.*?)</content>")
        .map(|c| strip_cdata(&c))
        .unwrap_or_default();

    let created_at = field(r"<created>([^<]*)</created>").and_then(|d| parse_enex_date(&d));
    let updated_at = field(r"<updated>([^<]*)</updated>").and_then(|d| parse_enex_date(&d));

    let tag_re = Regex::new(r"<tag>([^<]*)</tag>").unwrap();
    let tags = tag_re
        .captures_iter(block)
        .map(|caps| html_escape::decode_html_entities(caps[1].trim()).to_string())
        .collect();

    let resource_re = Regex::new(r"(?s)<resource>(.*?)</resource>").unwrap();
    let resources = resource_re
        .captures_iter(block)
        .filter_map(|caps| parse_resource_block(&caps[1]))
        .collect();

    ImportedNote {
        title,
        content,
        created_at,
        updated_at,
        tags,
        resources,
    }
}

fn parse_resource_block(block: &str) -> Option<ImportedResource> {
    let field = |pattern: &str| -> Option<String> {
        Regex::new(pattern)
            .unwrap()
            .captures(block)
            .map(|caps| caps[1].to_string())
    };

    let draft = ResourceDraft {
        base64: field(r"(?s)<data[^>]*>(.*?)</data>").unwrap_or_default(),
        mime: field(r"<mime>([^<]*)</mime>").unwrap_or_default(),
        filename: field(r"<file-name>([^<]*)</file-name>"),
        width: field(r"<width>(\d+)</width>").and_then(|w| w.parse().ok()),
        height: field(r"<height>(\d+)</height>").and_then(|h| h.parse().ok()),
        recognition: field(r"(?s)<recognition[^>]*>(.*?)</recognition>")
            .map(|r| strip_cdata(&r))
            .unwrap_or_default(),
    };
    draft.build()
}

fn strip_cdata(text: &str) -> String {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("<![CDATA[")
        .and_then(|t| t.strip_suffix("]]>"))
        .unwrap_or(trimmed)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn sample_enex(notes: &[(&str, &str)]) -> String {
        let mut out = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<en-export export-date=\"20240101T120000Z\" application=\"Evernote\">\n",
        );
        for (title, content) in notes {
            out.push_str(&format!(
                "<note><title>{}</title><content><![CDATA[<?xml version=\"1.0\"?><!DOCTYPE en-note SYSTEM \"http://xml.evernote.com/pub/enml2.dtd\"><en-note>{}</en-note>]]></content><created>20230601T080000Z</created><updated>20230602T090000Z</updated><tag>work</tag></note>\n",
                title, content
            ));
        }
        out.push_str("</en-export>\n");
        out
    }

    #[test]
    fn test_well_formed_enex_yields_all_notes_in_order() {
        let enex = sample_enex(&[("First", "<div>a</div>"), ("Second", "<div>b</div>"), ("Third", "<div>c</div>")]);
        let notes = parse_enex(&enex).unwrap();
        assert_eq!(notes.len(), 3);
        assert_eq!(notes[0].title, "First");
        assert_eq!(notes[1].title, "Second");
        assert_eq!(notes[2].title, "Third");
    }

    #[test]
    fn test_dates_and_tags_parsed() {
        let enex = sample_enex(&[("Dated", "<div>x</div>")]);
        let notes = parse_enex(&enex).unwrap();
        let created = notes[0].created_at.unwrap();
        assert_eq!(created.year(), 2023);
        assert_eq!(created.month(), 6);
        assert_eq!(notes[0].tags, vec!["work"]);
    }

    #[test]
    fn test_content_cdata_preserved() {
        let enex = sample_enex(&[("N", "<div>inner <b>html</b></div>")]);
        let notes = parse_enex(&enex).unwrap();
        assert!(notes[0].content.contains("<div>inner <b>html</b></div>"));
    }

    #[test]
    fn test_bare_ampersand_recovers_via_repair() {
        let enex = sample_enex(&[("A & B", "<div>x</div>")]);
        let notes = parse_enex(&enex).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "A & B");
    }

    #[test]
    fn test_truncated_export_recovers_via_regex_fallback() {
        // The final </en-export> is missing and a stray tag breaks the XML,
        // but whole <note> blocks are still present.
        let mut enex = sample_enex(&[("Kept", "<div>x</div>")]);
        enex.push_str("<note><title>Half");
        let notes = parse_enex(&enex).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "Kept");
    }

    #[test]
    fn test_zero_notes_is_malformed_input() {
        let err = parse_enex("this is not xml at all").unwrap_err();
        assert!(matches!(err, ImportError::MalformedInput(_)));
    }

    #[test]
    fn test_resource_parsed_with_hash() {
        let b64 = BASE64.encode(b"binary image bytes");
        let enex = format!(
            "<en-export><note><title>R</title><content><![CDATA[<en-note/>]]></content><resource><data encoding=\"base64\">{}</data><mime>image/png</mime><width>10</width><height>20</height><resource-attributes><file-name>pic.png</file-name></resource-attributes></resource></note></en-export>",
            b64
        );
        let notes = parse_enex(&enex).unwrap();
        let resource = &notes[0].resources[0];
        assert_eq!(resource.mime, "image/png");
        assert_eq!(resource.filename.as_deref(), Some("pic.png"));
        assert_eq!(resource.width, Some(10));
        assert_eq!(resource.height, Some(20));
        assert_eq!(resource.data, b"binary image bytes");
        assert!(!resource.hash.is_empty());
    }

    #[test]
    fn test_hash_identical_across_tiers() {
        let b64 = BASE64.encode([7u8; 256].as_slice());
        let make = |title: &str| {
            format!(
                "<en-export><note><title>{}</title><content><![CDATA[<en-note/>]]></content><resource><data encoding=\"base64\">{}</data><mime>image/png</mime></resource></note></en-export>",
                title, b64
            )
        };
        let xml_notes = parse_enex(&make("A")).unwrap();
        // Force the fallback tier by breaking the XML outside the note block.
        let broken = format!("<en-export><bad<{}", &make("A")[12..]);
        let regex_notes = parse_enex(&broken).unwrap();
        assert_eq!(
            xml_notes[0].resources[0].hash,
            regex_notes[0].resources[0].hash
        );
    }

    #[test]
    fn test_recognition_obj_id_wins() {
        let b64 = BASE64.encode(b"data");
        let enex = format!(
            "<en-export><note><title>R</title><content><![CDATA[<en-note/>]]></content><resource><data encoding=\"base64\">{}</data><mime>image/png</mime><recognition><![CDATA[<recoIndex objID=\"deadbeef\" objType=\"image\"/>]]></recognition></resource></note></en-export>",
            b64
        );
        let notes = parse_enex(&enex).unwrap();
        assert_eq!(notes[0].resources[0].hash, "deadbeef");
    }

    #[test]
    fn test_preview_counts() {
        let enex = sample_enex(&[("One", "<div>a</div>"), ("Two", "<div>b</div>")]);
        let preview = preview_enex(&enex).unwrap();
        assert_eq!(preview.note_count, 2);
        assert_eq!(preview.resource_count, 0);
        assert_eq!(preview.sample_titles, vec!["One", "Two"]);
    }

    #[test]
    fn test_import_normalizes_content() {
        let enex = sample_enex(&[("N", "<div><en-todo checked=\"true\"/>done</div>")]);
        let notes = import_enex(&enex).unwrap();
        assert!(!notes[0].content.contains("<en-todo"));
        assert!(notes[0].content.contains("taskItem"));
    }

    #[test]
    fn test_import_defaults_empty_title() {
        let enex = "<en-export><note><title></title><content><![CDATA[<en-note><div>x</div></en-note>]]></content></note></en-export>";
        let notes = import_enex(enex).unwrap();
        assert_eq!(notes[0].title, "Untitled");
    }
}
