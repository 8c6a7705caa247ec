//! Canonical rich-text document model.
//!
//! The tree produced by import and consumed by export is the host editor's
//! document schema: typed nodes with loosely-shaped attribute bags, ordered
//! children, and inline marks on text nodes.

pub mod builder;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Node kinds of the canonical tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeType {
    Doc,
    Paragraph,
    Heading,
    BulletList,
    OrderedList,
    TaskList,
    ListItem,
    TaskItem,
    Blockquote,
    CodeBlock,
    HorizontalRule,
    Image,
    Table,
    TableRow,
    TableCell,
    TableHeader,
    Text,
}

/// Inline formatting annotations carried by text nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MarkType {
    Bold,
    Italic,
    Underline,
    Strike,
    Code,
    Link,
    Highlight,
    TextStyle,
}

/// A single mark: type plus optional attributes (link href, text color).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    #[serde(rename = "type")]
    pub kind: MarkType,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub attrs: Value,
}

impl Mark {
    pub fn plain(kind: MarkType) -> Self {
        Mark {
            kind,
            attrs: Value::Null,
        }
    }

    pub fn link(href: &str) -> Self {
        Mark {
            kind: MarkType::Link,
            attrs: serde_json::json!({ "href": href }),
        }
    }

    pub fn text_style(color: &str) -> Self {
        Mark {
            kind: MarkType::TextStyle,
            attrs: serde_json::json!({ "color": color }),
        }
    }

    /// String attribute lookup (`href`, `color`).
    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(|v| v.as_str())
    }
}

/// One node of the canonical document tree.
///
/// Only `text` nodes carry `text` and `marks`; every other kind carries
/// `content`. Containers that require children never hold an empty
/// `content` array — they default to a single empty paragraph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(rename = "type")]
    pub kind: NodeType,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub attrs: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<Node>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marks: Option<Vec<Mark>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Node {
    /// A text node with the given marks (empty slice means no `marks` key).
    pub fn text(text: impl Into<String>, marks: Vec<Mark>) -> Self {
        Node {
            kind: NodeType::Text,
            attrs: Value::Null,
            content: None,
            marks: if marks.is_empty() { None } else { Some(marks) },
            text: Some(text.into()),
        }
    }

    /// A container node without attributes.
    pub fn block(kind: NodeType, content: Vec<Node>) -> Self {
        Node {
            kind,
            attrs: Value::Null,
            content: Some(content),
            marks: None,
            text: None,
        }
    }

    /// A container node with an attribute bag.
    pub fn block_with_attrs(kind: NodeType, attrs: Value, content: Vec<Node>) -> Self {
        Node {
            kind,
            attrs,
            content: Some(content),
            marks: None,
            text: None,
        }
    }

    /// A leaf node (image, horizontal rule) with attributes and no children.
    pub fn leaf(kind: NodeType, attrs: Value) -> Self {
        Node {
            kind,
            attrs,
            content: None,
            marks: None,
            text: None,
        }
    }

    pub fn paragraph(content: Vec<Node>) -> Self {
        Node::block(NodeType::Paragraph, content)
    }

    pub fn empty_paragraph() -> Self {
        Node::block(NodeType::Paragraph, Vec::new())
    }

    pub fn heading(level: u8, content: Vec<Node>) -> Self {
        Node::block_with_attrs(
            NodeType::Heading,
            serde_json::json!({ "level": level }),
            content,
        )
    }

    /// A document root; empty content defaults to one empty paragraph.
    pub fn doc(content: Vec<Node>) -> Self {
        let content = if content.is_empty() {
            vec![Node::empty_paragraph()]
        } else {
            content
        };
        Node::block(NodeType::Doc, content)
    }

    pub fn is_text(&self) -> bool {
        self.kind == NodeType::Text
    }

    pub fn children(&self) -> &[Node] {
        self.content.as_deref().unwrap_or(&[])
    }

    /// The marks on a text node, in accumulation order.
    pub fn mark_list(&self) -> &[Mark] {
        self.marks.as_deref().unwrap_or(&[])
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(|v| v.as_str())
    }

    pub fn attr_u64(&self, key: &str) -> Option<u64> {
        self.attrs.get(key).and_then(|v| v.as_u64())
    }

    pub fn attr_bool(&self, key: &str) -> Option<bool> {
        self.attrs.get(key).and_then(|v| v.as_bool())
    }

    /// Concatenated text of this subtree.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        if let Some(text) = &self.text {
            out.push_str(text);
        }
        for child in self.children() {
            child.collect_text(out);
        }
    }
}
