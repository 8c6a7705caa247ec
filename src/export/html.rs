//! Canonical tree to HTML.

use crate::document::{MarkType, Node, NodeType};

use super::NoteExport;

const STYLESHEET: &str = "\
body { font-family: -apple-system, 'Segoe UI', Roboto, sans-serif; max-width: 46rem; margin: 2rem auto; padding: 0 1rem; line-height: 1.6; color: #1a1a1a; }
pre { background: #f5f5f5; padding: 0.75rem; border-radius: 4px; overflow-x: auto; }
code { font-family: 'SF Mono', Consolas, monospace; font-size: 0.9em; }
blockquote { border-left: 3px solid #ccc; margin-left: 0; padding-left: 1rem; color: #555; }
table { border-collapse: collapse; }
th, td { border: 1px solid #ccc; padding: 0.3rem 0.6rem; }
mark { background: #fff3a3; }
img { max-width: 100%; }
ul[data-type='taskList'] { list-style: none; padding-left: 0.5rem; }";

/// Export a note as a standalone HTML page with an inline stylesheet.
pub fn export_note_html(note: &NoteExport) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\" />\n<title>{}</title>\n<style>\n{}\n</style>\n</head>\n<body>\n<h1>{}</h1>\n{}\n</body>\n</html>\n",
        html_escape::encode_text(&note.title),
        STYLESHEET,
        html_escape::encode_text(&note.title),
        to_html(&note.content),
    )
}

/// Serialize a canonical document to an HTML fragment.
pub fn to_html(doc: &Node) -> String {
    doc.children().iter().map(node_to_html).collect()
}

fn node_to_html(node: &Node) -> String {
    match node.kind {
        NodeType::Doc => node.children().iter().map(node_to_html).collect(),
        NodeType::Paragraph => format!("<p>{}</p>", inner_html(node)),
        NodeType::Heading => {
            let level = node.attr_u64("level").unwrap_or(1).min(6);
            format!("<h{}>{}</h{}>", level, inner_html(node), level)
        }
        NodeType::BulletList => format!("<ul>{}</ul>", inner_html(node)),
        NodeType::OrderedList => format!("<ol>{}</ol>", inner_html(node)),
        NodeType::TaskList => {
            format!(r#"<ul data-type="taskList">{}</ul>"#, inner_html(node))
        }
        NodeType::ListItem => format!("<li>{}</li>", inner_html(node)),
        NodeType::TaskItem => {
            let checked = node.attr_bool("checked").unwrap_or(false);
            format!(
                r#"<li data-type="taskItem" data-checked="{}">{}</li>"#,
                checked,
                inner_html(node)
            )
        }
        NodeType::Blockquote => format!("<blockquote>{}</blockquote>", inner_html(node)),
        NodeType::CodeBlock => {
            let class = match node.attr_str("language") {
                Some(language) => format!(
                    r#" class="language-{}""#,
                    html_escape::encode_double_quoted_attribute(language)
                ),
                None => String::new(),
            };
            format!(
                "<pre><code{}>{}</code></pre>",
                class,
                html_escape::encode_text(&node.plain_text())
            )
        }
        NodeType::HorizontalRule => "<hr />".to_string(),
        NodeType::Image => {
            let mut tag = format!(
                r#"<img src="{}" alt="{}""#,
                html_escape::encode_double_quoted_attribute(node.attr_str("src").unwrap_or("")),
                html_escape::encode_double_quoted_attribute(node.attr_str("alt").unwrap_or("")),
            );
            if let Some(width) = node.attr_u64("width") {
                tag.push_str(&format!(r#" width="{}""#, width));
            }
            if let Some(height) = node.attr_u64("height") {
                tag.push_str(&format!(r#" height="{}""#, height));
            }
            tag.push_str(" />");
            tag
        }
        NodeType::Table => format!("<table>{}</table>", inner_html(node)),
        NodeType::TableRow => format!("<tr>{}</tr>", inner_html(node)),
        NodeType::TableCell => cell_to_html(node, "td"),
        NodeType::TableHeader => cell_to_html(node, "th"),
        NodeType::Text => text_to_html(node),
    }
}

fn cell_to_html(node: &Node, tag: &str) -> String {
    let style = match node.attr_str("align") {
        Some(align) => format!(r#" style="text-align: {}""#, align),
        None => String::new(),
    };
    format!("<{}{}>{}</{}>", tag, style, inner_html(node), tag)
}

fn inner_html(node: &Node) -> String {
    node.children().iter().map(node_to_html).collect()
}

/// Wrap escaped text in its marks' tags. Marks apply in array order, last
/// mark innermost.
fn text_to_html(node: &Node) -> String {
    let mut out = html_escape::encode_text(node.text.as_deref().unwrap_or("")).to_string();
    for mark in node.mark_list().iter().rev() {
        out = match mark.kind {
            MarkType::Bold => format!("<b>{}</b>", out),
            MarkType::Italic => format!("<i>{}</i>", out),
            MarkType::Underline => format!("<u>{}</u>", out),
            MarkType::Strike => format!("<s>{}</s>", out),
            MarkType::Code => format!("<code>{}</code>", out),
            MarkType::Highlight => format!("<mark>{}</mark>", out),
            MarkType::Link => format!(
                r#"<a href="{}">{}</a>"#,
                html_escape::encode_double_quoted_attribute(mark.attr_str("href").unwrap_or("")),
                out
            ),
            MarkType::TextStyle => format!(
                r#"<span style="color: {}">{}</span>"#,
                html_escape::encode_double_quoted_attribute(mark.attr_str("color").unwrap_or("")),
                out
            ),
        };
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Mark;

    #[test]
    fn test_paragraph_escapes_text() {
        let doc = Node::doc(vec![Node::paragraph(vec![Node::text("a < b", vec![])])]);
        assert_eq!(to_html(&doc), "<p>a &lt; b</p>");
    }

    #[test]
    fn test_marks_last_innermost() {
        let doc = Node::doc(vec![Node::paragraph(vec![Node::text(
            "x",
            vec![Mark::plain(MarkType::Italic), Mark::plain(MarkType::Bold)],
        )])]);
        assert_eq!(to_html(&doc), "<p><i><b>x</b></i></p>");
    }

    #[test]
    fn test_link_and_color_marks() {
        let doc = Node::doc(vec![Node::paragraph(vec![
            Node::text("go", vec![Mark::link("https://e.com")]),
            Node::text("red", vec![Mark::text_style("#ff0000")]),
        ])]);
        assert_eq!(
            to_html(&doc),
            r##"<p><a href="https://e.com">go</a><span style="color: #ff0000">red</span></p>"##
        );
    }

    #[test]
    fn test_task_list_round_trips_through_builder() {
        let doc = Node::doc(vec![Node::block(
            NodeType::TaskList,
            vec![Node::block_with_attrs(
                NodeType::TaskItem,
                serde_json::json!({ "checked": true }),
                vec![Node::paragraph(vec![Node::text("done", vec![])])],
            )],
        )]);
        let html = to_html(&doc);
        let back = crate::document::builder::build_document(&html);
        assert_eq!(back.children()[0].kind, NodeType::TaskList);
        assert_eq!(
            back.children()[0].children()[0].attr_bool("checked"),
            Some(true)
        );
    }

    #[test]
    fn test_code_block_language_class() {
        let doc = Node::doc(vec![Node::block_with_attrs(
            NodeType::CodeBlock,
            serde_json::json!({ "language": "rust" }),
            vec![Node::text("let a = 1 < 2;", vec![])],
        )]);
        assert_eq!(
            to_html(&doc),
            "<pre><code class=\"language-rust\">let a = 1 &lt; 2;</code></pre>"
        );
    }

    #[test]
    fn test_table_cell_alignment_style() {
        let doc = Node::doc(vec![Node::block(
            NodeType::Table,
            vec![Node::block(
                NodeType::TableRow,
                vec![Node::block_with_attrs(
                    NodeType::TableCell,
                    serde_json::json!({ "align": "center" }),
                    vec![Node::paragraph(vec![Node::text("c", vec![])])],
                )],
            )],
        )]);
        assert!(to_html(&doc).contains(r#"<td style="text-align: center"><p>c</p></td>"#));
    }

    #[test]
    fn test_document_round_trips_through_builder() {
        let doc = Node::doc(vec![
            Node::heading(2, vec![Node::text("Title", vec![])]),
            Node::paragraph(vec![
                Node::text("plain ", vec![]),
                Node::text("bold", vec![Mark::plain(MarkType::Bold)]),
                Node::text("struck", vec![Mark::plain(MarkType::Strike)]),
                Node::text("coded", vec![Mark::plain(MarkType::Code)]),
                Node::text("under", vec![Mark::plain(MarkType::Underline)]),
                Node::text("linked", vec![Mark::link("https://e.com")]),
            ]),
            Node::block(
                NodeType::BulletList,
                vec![Node::block(
                    NodeType::ListItem,
                    vec![Node::paragraph(vec![Node::text("item", vec![])])],
                )],
            ),
            Node::block(
                NodeType::Blockquote,
                vec![Node::paragraph(vec![Node::text("quoted", vec![])])],
            ),
            Node::leaf(
                NodeType::Image,
                serde_json::json!({ "src": "a.png", "alt": "pic" }),
            ),
        ]);
        let back = crate::document::builder::build_document(&to_html(&doc));

        let kinds: Vec<NodeType> = back.children().iter().map(|n| n.kind).collect();
        assert_eq!(
            kinds,
            vec![
                NodeType::Heading,
                NodeType::Paragraph,
                NodeType::BulletList,
                NodeType::Blockquote,
                NodeType::Image,
            ]
        );
        assert_eq!(back.plain_text(), doc.plain_text());
        let text_nodes = back.children()[1].children();
        for (node, kind) in text_nodes[1..].iter().zip([
            MarkType::Bold,
            MarkType::Strike,
            MarkType::Code,
            MarkType::Underline,
            MarkType::Link,
        ]) {
            assert_eq!(node.mark_list()[0].kind, kind);
        }
        assert_eq!(back.children()[4].attr_str("src"), Some("a.png"));
    }

    #[test]
    fn test_standalone_page_contains_stylesheet_and_title() {
        use chrono::TimeZone;
        let note = NoteExport {
            title: "A <Note>".to_string(),
            tags: vec![],
            created_at: chrono::Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            updated_at: chrono::Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            content: Node::doc(vec![]),
        };
        let page = export_note_html(&note);
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("<title>A &lt;Note&gt;</title>"));
        assert!(page.contains("<style>"));
        assert!(page.contains("<p></p>"));
    }
}
