//! Canonical tree to Markdown.

use crate::document::{MarkType, Node, NodeType};

use super::NoteExport;

/// Export a note to Markdown with YAML frontmatter.
pub fn export_note_markdown(note: &NoteExport) -> String {
    let mut output = String::new();

    output.push_str("---\n");
    output.push_str(&format!("title: \"{}\"\n", escape_yaml_string(&note.title)));

    if !note.tags.is_empty() {
        output.push_str("tags:\n");
        for tag in &note.tags {
            output.push_str(&format!("  - \"{}\"\n", escape_yaml_string(tag)));
        }
    }

    output.push_str(&format!("created: {}\n", note.created_at.to_rfc3339()));
    output.push_str(&format!("updated: {}\n", note.updated_at.to_rfc3339()));
    output.push_str("---\n\n");

    output.push_str(&to_markdown(&note.content));
    output.trim_end().to_string() + "\n"
}

/// Serialize a canonical document to Markdown. Best-effort: marks with no
/// Markdown spelling (underline, text color) are dropped.
pub fn to_markdown(doc: &Node) -> String {
    doc.children()
        .iter()
        .map(|block| block_to_markdown(block, 0))
        .filter(|md| !md.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn block_to_markdown(node: &Node, depth: usize) -> String {
    match node.kind {
        NodeType::Paragraph => inline_markdown(node),
        NodeType::Heading => {
            let level = node.attr_u64("level").unwrap_or(1).min(6) as usize;
            format!("{} {}", "#".repeat(level), inline_markdown(node))
        }
        NodeType::BulletList | NodeType::OrderedList | NodeType::TaskList => {
            list_to_markdown(node, depth)
        }
        NodeType::Blockquote => {
            let inner = node
                .children()
                .iter()
                .map(|child| block_to_markdown(child, depth))
                .filter(|md| !md.is_empty())
                .collect::<Vec<_>>()
                .join("\n\n");
            inner
                .lines()
                .map(|line| {
                    if line.is_empty() {
                        ">".to_string()
                    } else {
                        format!("> {}", line)
                    }
                })
                .collect::<Vec<_>>()
                .join("\n")
        }
        NodeType::CodeBlock => {
            let language = node.attr_str("language").unwrap_or("");
            format!("```{}\n{}\n```", language, node.plain_text())
        }
        NodeType::HorizontalRule => "---".to_string(),
        NodeType::Image => {
            let src = node.attr_str("src").unwrap_or("");
            let alt = node.attr_str("alt").unwrap_or("");
            format!("![{}]({})", alt, src)
        }
        NodeType::Table => table_to_markdown(node),
        NodeType::Text => text_to_markdown(node),
        _ => node
            .children()
            .iter()
            .map(|child| block_to_markdown(child, depth))
            .filter(|md| !md.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n"),
    }
}

fn list_to_markdown(list: &Node, depth: usize) -> String {
    let indent = "  ".repeat(depth);
    let mut lines: Vec<String> = Vec::new();
    let mut ordinal = 0usize;

    for item in list.children() {
        match item.kind {
            NodeType::ListItem => {
                ordinal += 1;
                let marker = if list.kind == NodeType::OrderedList {
                    format!("{}. ", ordinal)
                } else {
                    "- ".to_string()
                };
                push_item(&mut lines, &indent, &marker, item, depth);
            }
            NodeType::TaskItem => {
                let marker = if item.attr_bool("checked").unwrap_or(false) {
                    "- [x] "
                } else {
                    "- [ ] "
                };
                push_item(&mut lines, &indent, marker, item, depth);
            }
            NodeType::BulletList | NodeType::OrderedList | NodeType::TaskList => {
                lines.push(list_to_markdown(item, depth + 1));
            }
            _ => {}
        }
    }

    lines.join("\n")
}

/// Emit one list item: first paragraph on the marker line, every further
/// block (nested lists included) on its own lines.
fn push_item(lines: &mut Vec<String>, indent: &str, marker: &str, item: &Node, depth: usize) {
    let mut first_line = format!("{}{}", indent, marker);
    let mut rest: Vec<String> = Vec::new();

    for (i, block) in item.children().iter().enumerate() {
        if i == 0 && block.kind == NodeType::Paragraph {
            first_line.push_str(&inline_markdown(block));
        } else {
            let md = block_to_markdown(block, depth + 1);
            if !md.is_empty() {
                rest.push(md);
            }
        }
    }

    lines.push(first_line);
    lines.extend(rest);
}

fn table_to_markdown(table: &Node) -> String {
    let mut lines: Vec<String> = Vec::new();

    for (row_idx, row) in table.children().iter().enumerate() {
        let cells: Vec<String> = row
            .children()
            .iter()
            .map(|cell| cell.plain_text().trim().to_string())
            .collect();
        lines.push(format!("| {} |", cells.join(" | ")));

        // Separator after a header row, carrying each cell's alignment.
        let is_header_row = row.children().iter().any(|c| c.kind == NodeType::TableHeader);
        if row_idx == 0 && is_header_row {
            let separator: Vec<&str> = row
                .children()
                .iter()
                .map(|cell| match cell.attr_str("align") {
                    Some("right") => "---:",
                    Some("center") => ":---:",
                    Some("left") => ":---",
                    _ => "---",
                })
                .collect();
            lines.push(format!("| {} |", separator.join(" | ")));
        }
    }

    lines.join("\n")
}

fn inline_markdown(node: &Node) -> String {
    node.children()
        .iter()
        .map(|child| {
            if child.is_text() {
                text_to_markdown(child)
            } else {
                child.plain_text()
            }
        })
        .collect()
}

/// Wrap a text node in its marks' Markdown spellings. Marks apply in array
/// order, last mark innermost.
fn text_to_markdown(node: &Node) -> String {
    let mut out = node.text.clone().unwrap_or_default();
    for mark in node.mark_list().iter().rev() {
        out = match mark.kind {
            MarkType::Bold => format!("**{}**", out),
            MarkType::Italic => format!("*{}*", out),
            MarkType::Strike => format!("~~{}~~", out),
            MarkType::Code => format!("`{}`", out),
            MarkType::Highlight => format!("=={}==", out),
            MarkType::Link => {
                format!("[{}]({})", out, mark.attr_str("href").unwrap_or(""))
            }
            // No Markdown spelling; dropped.
            MarkType::Underline | MarkType::TextStyle => out,
        };
    }
    out
}

fn escape_yaml_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
