//! HTML to canonical tree conversion.
//!
//! A recursive depth-first walk over the minimal DOM, one handler per tag.
//! Inline tags extend an immutable ordered mark set threaded through the
//! recursion — text nodes receive the set innermost-first — while block
//! tags build container nodes from their children's results. Unknown tags
//! flatten to their children; a node whose content would be empty collapses
//! to nothing and is filtered out by its parent.

use regex::Regex;
use serde_json::json;

use crate::document::{Mark, MarkType, Node, NodeType};
use crate::html::dom::{parse_fragment, DomNode, Element};

/// Build a canonical document from an HTML fragment.
pub fn build_document(html: &str) -> Node {
    let dom = parse_fragment(html);
    let nodes = walk_all(&dom, &[]);
    Node::doc(group_blocks(nodes))
}

fn walk_all(nodes: &[DomNode], marks: &[Mark]) -> Vec<Node> {
    nodes.iter().flat_map(|node| walk(node, marks)).collect()
}

fn walk(node: &DomNode, marks: &[Mark]) -> Vec<Node> {
    match node {
        DomNode::Text(raw) => text_node(raw, marks).into_iter().collect(),
        DomNode::Element(el) => element(el, marks),
    }
}

fn text_node(raw: &str, marks: &[Mark]) -> Option<Node> {
    let decoded = html_escape::decode_html_entities(raw).to_string();
    let collapsed = Regex::new(r"\s+").unwrap().replace_all(&decoded, " ");
    if collapsed.trim().is_empty() {
        return None;
    }
    Some(Node::text(collapsed.to_string(), marks.to_vec()))
}

/// Prepend the tag's mark so deeper marks stay first in the set.
fn extend_marks(marks: &[Mark], mark: Mark) -> Vec<Mark> {
    let mut extended = Vec::with_capacity(marks.len() + 1);
    extended.push(mark);
    extended.extend_from_slice(marks);
    extended
}

fn element(el: &Element, marks: &[Mark]) -> Vec<Node> {
    match el.tag.as_str() {
        // Inline tags: recurse with one more mark on the set.
        "b" | "strong" => inline(el, marks, Mark::plain(MarkType::Bold)),
        "i" | "em" => inline(el, marks, Mark::plain(MarkType::Italic)),
        "u" | "ins" => inline(el, marks, Mark::plain(MarkType::Underline)),
        "s" | "strike" | "del" => inline(el, marks, Mark::plain(MarkType::Strike)),
        "mark" => inline(el, marks, Mark::plain(MarkType::Highlight)),
        "code" => inline(el, marks, Mark::plain(MarkType::Code)),
        "a" => {
            let href = el.attr("href").unwrap_or("");
            inline(el, marks, Mark::link(href))
        }
        "span" => match style_color(el) {
            Some(color) => inline(el, marks, Mark::text_style(&color)),
            None => walk_all(&el.children, marks),
        },
        "font" => match el.attr("color") {
            Some(color) => inline(el, marks, Mark::text_style(color)),
            None => walk_all(&el.children, marks),
        },

        // Block tags.
        "p" | "div" => group_blocks(walk_all(&el.children, marks)),
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = el.tag[1..].parse::<u8>().unwrap_or(1);
            let content = walk_all(&el.children, marks);
            if content.is_empty() {
                Vec::new()
            } else {
                vec![Node::heading(level, content)]
            }
        }
        "ul" | "ol" => vec![build_list(el, marks)],
        "li" => vec![build_list_item(el, marks)],
        "blockquote" => {
            let content = group_blocks(walk_all(&el.children, marks));
            if content.is_empty() {
                Vec::new()
            } else {
                vec![Node::block(NodeType::Blockquote, content)]
            }
        }
        "pre" => build_code_block(el).into_iter().collect(),
        "img" => build_image(el).into_iter().collect(),
        "hr" => vec![Node::leaf(NodeType::HorizontalRule, serde_json::Value::Null)],
        "table" => vec![build_table(el, marks)],
        "thead" | "tbody" | "tfoot" => walk_all(&el.children, marks),
        "tr" => vec![build_table_row(el, marks)],
        "td" | "th" => vec![build_table_cell(el, marks)],

        // Consumed by the enclosing list item; nothing on its own.
        "input" => Vec::new(),
        "br" => Vec::new(),

        // Unknown tags flatten to their children's result.
        _ => walk_all(&el.children, marks),
    }
}

fn inline(el: &Element, marks: &[Mark], mark: Mark) -> Vec<Node> {
    walk_all(&el.children, &extend_marks(marks, mark))
}

fn style_color(el: &Element) -> Option<String> {
    let style = el.attr("style")?;
    let re = Regex::new(r"color:\s*([^;]+)").unwrap();
    re.captures(style).map(|caps| caps[1].trim().to_string())
}

fn is_task_list(el: &Element) -> bool {
    el.attr("data-type") == Some("taskList")
}

fn is_task_item(el: &Element) -> bool {
    el.attr("data-type") == Some("taskItem")
}

fn build_list(el: &Element, marks: &[Mark]) -> Node {
    if is_task_list(el) {
        // A task list holds task items only.
        let items: Vec<Node> = walk_all(&el.children, marks)
            .into_iter()
            .filter(|n| n.kind == NodeType::TaskItem)
            .collect();
        return Node::block(NodeType::TaskList, ensure_items(items, NodeType::TaskItem));
    }

    let kind = if el.tag == "ol" {
        NodeType::OrderedList
    } else {
        NodeType::BulletList
    };
    let items: Vec<Node> = walk_all(&el.children, marks)
        .into_iter()
        .filter(|n| {
            matches!(
                n.kind,
                NodeType::ListItem
                    | NodeType::TaskItem
                    | NodeType::BulletList
                    | NodeType::OrderedList
                    | NodeType::TaskList
            )
        })
        .collect();
    Node::block(kind, ensure_items(items, NodeType::ListItem))
}

fn ensure_items(items: Vec<Node>, kind: NodeType) -> Vec<Node> {
    if items.is_empty() {
        vec![Node::block(kind, vec![Node::empty_paragraph()])]
    } else {
        items
    }
}

fn build_list_item(el: &Element, marks: &[Mark]) -> Node {
    let content = group_blocks_or_default(walk_all(&el.children, marks));
    if is_task_item(el) {
        let checked = el.attr("data-checked") == Some("true") || has_checked_input(el);
        Node::block_with_attrs(NodeType::TaskItem, json!({ "checked": checked }), content)
    } else {
        Node::block(NodeType::ListItem, content)
    }
}

fn has_checked_input(el: &Element) -> bool {
    el.children.iter().any(|child| match child {
        DomNode::Element(e) => e.tag == "input" && e.attr("checked").is_some(),
        DomNode::Text(_) => false,
    })
}

fn build_code_block(el: &Element) -> Option<Node> {
    let language = find_code_language(el);
    let mut text = String::new();
    collect_raw_text(&el.children, &mut text);
    let text = html_escape::decode_html_entities(text.trim_end_matches('\n')).to_string();
    if text.is_empty() {
        return None;
    }
    let attrs = match language {
        Some(language) => json!({ "language": language }),
        None => serde_json::Value::Null,
    };
    Some(Node::block_with_attrs(
        NodeType::CodeBlock,
        attrs,
        vec![Node::text(text, Vec::new())],
    ))
}

fn find_code_language(el: &Element) -> Option<String> {
    el.children.iter().find_map(|child| match child {
        DomNode::Element(code) if code.tag == "code" => {
            let class = code.attr("class")?;
            class
                .split_whitespace()
                .find_map(|c| c.strip_prefix("language-"))
                .map(|l| l.to_string())
        }
        _ => None,
    })
}

fn collect_raw_text(nodes: &[DomNode], out: &mut String) {
    for node in nodes {
        match node {
            DomNode::Text(t) => out.push_str(t),
            DomNode::Element(e) => collect_raw_text(&e.children, out),
        }
    }
}

fn build_image(el: &Element) -> Option<Node> {
    let src = el.attr("src")?;
    let mut attrs = serde_json::Map::new();
    attrs.insert("src".to_string(), json!(src));
    attrs.insert(
        "alt".to_string(),
        json!(el.attr("alt").unwrap_or_default()),
    );
    if let Some(width) = el.attr("width").and_then(|w| w.parse::<u64>().ok()) {
        attrs.insert("width".to_string(), json!(width));
    }
    if let Some(height) = el.attr("height").and_then(|h| h.parse::<u64>().ok()) {
        attrs.insert("height".to_string(), json!(height));
    }
    Some(Node::leaf(NodeType::Image, serde_json::Value::Object(attrs)))
}

fn build_table(el: &Element, marks: &[Mark]) -> Node {
    // A table holds rows only.
    let rows: Vec<Node> = walk_all(&el.children, marks)
        .into_iter()
        .filter(|n| n.kind == NodeType::TableRow)
        .collect();
    let rows = if rows.is_empty() {
        vec![Node::block(
            NodeType::TableRow,
            vec![Node::block(NodeType::TableCell, vec![Node::empty_paragraph()])],
        )]
    } else {
        rows
    };
    Node::block(NodeType::Table, rows)
}

fn build_table_row(el: &Element, marks: &[Mark]) -> Node {
    let cells: Vec<Node> = walk_all(&el.children, marks)
        .into_iter()
        .filter(|n| matches!(n.kind, NodeType::TableCell | NodeType::TableHeader))
        .collect();
    Node::block(NodeType::TableRow, cells)
}

fn build_table_cell(el: &Element, marks: &[Mark]) -> Node {
    let kind = if el.tag == "th" {
        NodeType::TableHeader
    } else {
        NodeType::TableCell
    };
    let align = el.attr("style").and_then(|style| {
        Regex::new(r"text-align:\s*(left|right|center)")
            .unwrap()
            .captures(style)
            .map(|caps| caps[1].to_string())
    });
    let attrs = match align {
        Some(align) => json!({ "align": align }),
        None => serde_json::Value::Null,
    };
    Node::block_with_attrs(
        kind,
        attrs,
        group_blocks_or_default(walk_all(&el.children, marks)),
    )
}

/// Wrap runs of loose text nodes into paragraphs; block nodes pass through.
fn group_blocks(nodes: Vec<Node>) -> Vec<Node> {
    let mut out = Vec::new();
    let mut run: Vec<Node> = Vec::new();

    for node in nodes {
        if node.is_text() {
            run.push(node);
        } else {
            if !run.is_empty() {
                out.push(Node::paragraph(std::mem::take(&mut run)));
            }
            out.push(node);
        }
    }
    if !run.is_empty() {
        out.push(Node::paragraph(run));
    }
    out
}

/// Like [`group_blocks`], but containers that require children get the
/// single-empty-paragraph default instead of an empty array.
fn group_blocks_or_default(nodes: Vec<Node>) -> Vec<Node> {
    let grouped = group_blocks(nodes);
    if grouped.is_empty() {
        vec![Node::empty_paragraph()]
    } else {
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_yields_empty_paragraph_doc() {
        let doc = build_document("");
        assert_eq!(doc.kind, NodeType::Doc);
        assert_eq!(doc.children().len(), 1);
        assert_eq!(doc.children()[0].kind, NodeType::Paragraph);
    }

    #[test]
    fn test_paragraph_with_text() {
        let doc = build_document("<p>Hello world</p>");
        let p = &doc.children()[0];
        assert_eq!(p.kind, NodeType::Paragraph);
        assert_eq!(p.children()[0].text.as_deref(), Some("Hello world"));
    }

    #[test]
    fn test_marks_accumulate_innermost_first() {
        let doc = build_document("<p><b><i>x</i></b></p>");
        let text = &doc.children()[0].children()[0];
        let kinds: Vec<MarkType> = text.mark_list().iter().map(|m| m.kind).collect();
        assert_eq!(kinds, vec![MarkType::Italic, MarkType::Bold]);
    }

    #[test]
    fn test_sibling_branches_do_not_share_marks() {
        let doc = build_document("<p><b>bold</b> plain <i>italic</i></p>");
        let children = doc.children()[0].children();
        assert_eq!(children[0].mark_list()[0].kind, MarkType::Bold);
        assert!(children[1].mark_list().is_empty());
        assert_eq!(children[2].mark_list()[0].kind, MarkType::Italic);
    }

    #[test]
    fn test_link_mark_carries_href() {
        let doc = build_document(r#"<p><a href="https://e.com">go</a></p>"#);
        let text = &doc.children()[0].children()[0];
        assert_eq!(text.mark_list()[0].kind, MarkType::Link);
        assert_eq!(text.mark_list()[0].attr_str("href"), Some("https://e.com"));
    }

    #[test]
    fn test_span_color_becomes_text_style() {
        let doc = build_document(r#"<p><span style="color: #ff0000">red</span></p>"#);
        let text = &doc.children()[0].children()[0];
        assert_eq!(text.mark_list()[0].kind, MarkType::TextStyle);
        assert_eq!(text.mark_list()[0].attr_str("color"), Some("#ff0000"));
    }

    #[test]
    fn test_plain_span_flattens() {
        let doc = build_document("<p><span>just text</span></p>");
        let text = &doc.children()[0].children()[0];
        assert!(text.mark_list().is_empty());
    }

    #[test]
    fn test_heading_level() {
        let doc = build_document("<h3>Third</h3>");
        let h = &doc.children()[0];
        assert_eq!(h.kind, NodeType::Heading);
        assert_eq!(h.attr_u64("level"), Some(3));
    }

    #[test]
    fn test_empty_paragraph_collapses_away() {
        let doc = build_document("<p></p><p>kept</p>");
        assert_eq!(doc.children().len(), 1);
        assert_eq!(doc.children()[0].plain_text(), "kept");
    }

    #[test]
    fn test_divs_become_separate_paragraphs() {
        let doc = build_document("<div>one</div><div>two</div>");
        assert_eq!(doc.children().len(), 2);
        assert_eq!(doc.children()[0].plain_text(), "one");
        assert_eq!(doc.children()[1].plain_text(), "two");
    }

    #[test]
    fn test_bullet_list_items() {
        let doc = build_document("<ul><li>a</li><li>b</li></ul>");
        let list = &doc.children()[0];
        assert_eq!(list.kind, NodeType::BulletList);
        assert_eq!(list.children().len(), 2);
        assert_eq!(list.children()[0].kind, NodeType::ListItem);
        // List item text is wrapped in a paragraph.
        assert_eq!(list.children()[0].children()[0].kind, NodeType::Paragraph);
    }

    #[test]
    fn test_task_list_holds_only_task_items() {
        let html = r#"<ul data-type="taskList"><li data-type="taskItem" data-checked="true">done</li><li data-type="taskItem" data-checked="false">open</li></ul>"#;
        let doc = build_document(html);
        let list = &doc.children()[0];
        assert_eq!(list.kind, NodeType::TaskList);
        assert!(list.children().iter().all(|n| n.kind == NodeType::TaskItem));
        assert_eq!(list.children()[0].attr_bool("checked"), Some(true));
        assert_eq!(list.children()[1].attr_bool("checked"), Some(false));
    }

    #[test]
    fn test_code_block_language_and_raw_text() {
        let html = r#"<pre><code class="language-rust">let a = 1 &lt; 2;</code></pre>"#;
        let doc = build_document(html);
        let code = &doc.children()[0];
        assert_eq!(code.kind, NodeType::CodeBlock);
        assert_eq!(code.attr_str("language"), Some("rust"));
        assert_eq!(code.children()[0].text.as_deref(), Some("let a = 1 < 2;"));
    }

    #[test]
    fn test_image_attrs() {
        let doc = build_document(r#"<img src="a.png" alt="pic" width="40" height="30" />"#);
        // A loose image is a block of its own, not wrapped in a paragraph.
        let img = &doc.children()[0];
        assert_eq!(img.kind, NodeType::Image);
        assert_eq!(img.attr_str("src"), Some("a.png"));
        assert_eq!(img.attr_u64("width"), Some(40));
    }

    #[test]
    fn test_table_structure_and_alignment() {
        let html = r#"<table><thead><tr><th>H</th><th style="text-align: right">R</th></tr></thead><tbody><tr><td>a</td><td style="text-align: right">b</td></tr></tbody></table>"#;
        let doc = build_document(html);
        let table = &doc.children()[0];
        assert_eq!(table.kind, NodeType::Table);
        assert!(table.children().iter().all(|r| r.kind == NodeType::TableRow));
        let header_row = &table.children()[0];
        assert_eq!(header_row.children()[0].kind, NodeType::TableHeader);
        assert_eq!(header_row.children()[1].attr_str("align"), Some("right"));
        let body_row = &table.children()[1];
        assert_eq!(body_row.children()[1].attr_str("align"), Some("right"));
    }

    #[test]
    fn test_unknown_tags_flatten() {
        let doc = build_document("<article><p>inside</p></article>");
        assert_eq!(doc.children()[0].kind, NodeType::Paragraph);
        assert_eq!(doc.children()[0].plain_text(), "inside");
    }

    #[test]
    fn test_blockquote_wraps_inline_content() {
        let doc = build_document("<blockquote>quoted</blockquote>");
        let quote = &doc.children()[0];
        assert_eq!(quote.kind, NodeType::Blockquote);
        assert_eq!(quote.children()[0].kind, NodeType::Paragraph);
    }

    #[test]
    fn test_nested_list_kept_inside_outer_list() {
        let html = "<ul><li>a</li><ul><li>b</li></ul><li>d</li></ul>";
        let doc = build_document(html);
        let outer = &doc.children()[0];
        assert_eq!(outer.children().len(), 3);
        assert_eq!(outer.children()[1].kind, NodeType::BulletList);
    }
}
