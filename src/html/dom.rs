//! Minimal HTML fragment parser.
//!
//! Tokenizes a fragment into elements and text and builds a tree with an
//! open-element stack. Tolerant by construction: stray close tags are
//! ignored, unclosed elements are closed at end of input, and raw-text
//! elements (`script`, `style`) swallow their content verbatim.

use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq)]
pub enum DomNode {
    Element(Element),
    Text(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attrs: HashMap<String, String>,
    pub children: Vec<DomNode>,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(|s| s.as_str())
    }
}

/// Elements that never have children and never take a close tag.
fn is_void(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "source"
            | "track"
            | "wbr"
    )
}

fn is_raw_text(tag: &str) -> bool {
    matches!(tag, "script" | "style")
}

/// Parse an HTML fragment into a list of sibling nodes.
pub fn parse_fragment(html: &str) -> Vec<DomNode> {
    let bytes = html.as_bytes();
    let mut pos = 0;
    // Index 0 is a synthetic root frame.
    let mut stack: Vec<Element> = vec![Element {
        tag: String::new(),
        attrs: HashMap::new(),
        children: Vec::new(),
    }];

    while pos < bytes.len() {
        if bytes[pos] == b'<' {
            if html[pos..].starts_with("<!--") {
                pos = match html[pos..].find("-->") {
                    Some(end) => pos + end + 3,
                    None => bytes.len(),
                };
            } else if html[pos..].starts_with("<!") || html[pos..].starts_with("<?") {
                pos = match html[pos..].find('>') {
                    Some(end) => pos + end + 1,
                    None => bytes.len(),
                };
            } else if html[pos..].starts_with("</") {
                match html[pos..].find('>') {
                    Some(end) => {
                        let tag = html[pos + 2..pos + end].trim().to_ascii_lowercase();
                        close_element(&mut stack, &tag);
                        pos += end + 1;
                    }
                    None => pos = bytes.len(),
                }
            } else if let Some((element, self_closed, next)) = parse_open_tag(html, pos) {
                let tag = element.tag.clone();
                pos = next;
                if self_closed || is_void(&tag) {
                    top(&mut stack).children.push(DomNode::Element(element));
                } else if is_raw_text(&tag) {
                    // Consume everything up to the matching close tag as text.
                    let close = format!("</{}", tag);
                    let rest = &html[pos..];
                    let (content_end, resume) = match rest.to_ascii_lowercase().find(&close) {
                        Some(idx) => {
                            let after = rest[idx..].find('>').map(|e| idx + e + 1);
                            (idx, after.unwrap_or(rest.len()))
                        }
                        None => (rest.len(), rest.len()),
                    };
                    let mut element = element;
                    let raw = &rest[..content_end];
                    if !raw.is_empty() {
                        element.children.push(DomNode::Text(raw.to_string()));
                    }
                    top(&mut stack).children.push(DomNode::Element(element));
                    pos += resume;
                } else {
                    stack.push(element);
                }
            } else {
                // A lone '<' that is not a tag; treat as text.
                let text_end = html[pos + 1..]
                    .find('<')
                    .map(|e| pos + 1 + e)
                    .unwrap_or(bytes.len());
                top(&mut stack)
                    .children
                    .push(DomNode::Text(html[pos..text_end].to_string()));
                pos = text_end;
            }
        } else {
            let text_end = html[pos..].find('<').map(|e| pos + e).unwrap_or(bytes.len());
            let text = &html[pos..text_end];
            if !text.is_empty() {
                top(&mut stack).children.push(DomNode::Text(text.to_string()));
            }
            pos = text_end;
        }
    }

    // Close anything left open at end of input.
    while stack.len() > 1 {
        let element = stack.pop().expect("stack underflow");
        top(&mut stack).children.push(DomNode::Element(element));
    }

    stack.pop().map(|root| root.children).unwrap_or_default()
}

fn top(stack: &mut [Element]) -> &mut Element {
    stack.last_mut().expect("synthetic root always present")
}

/// Pop open elements until `tag` is matched; ignore the close tag if no
/// matching element is open.
fn close_element(stack: &mut Vec<Element>, tag: &str) {
    let Some(open_at) = stack.iter().rposition(|e| e.tag == tag) else {
        return;
    };
    if open_at == 0 {
        return;
    }
    while stack.len() > open_at {
        let element = stack.pop().expect("stack underflow");
        top(stack).children.push(DomNode::Element(element));
    }
}

/// Parse `<tag attr="value" ...>` starting at `pos` (which points at `<`).
/// Returns the element, whether it was self-closing, and the index after `>`.
fn parse_open_tag(html: &str, pos: usize) -> Option<(Element, bool, usize)> {
    let bytes = html.as_bytes();
    let mut i = pos + 1;

    let name_start = i;
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'-') {
        i += 1;
    }
    if i == name_start {
        return None;
    }
    let tag = html[name_start..i].to_ascii_lowercase();

    let mut attrs = HashMap::new();
    let mut self_closed = false;

    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }
        match bytes[i] {
            b'>' => {
                i += 1;
                break;
            }
            b'/' => {
                self_closed = true;
                i += 1;
            }
            _ => {
                let attr_start = i;
                while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'=' && bytes[i] != b'>' && bytes[i] != b'/' {
                    i += 1;
                }
                let name = html[attr_start..i].to_ascii_lowercase();
                while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
                let value = if i < bytes.len() && bytes[i] == b'=' {
                    i += 1;
                    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                        i += 1;
                    }
                    if i < bytes.len() && (bytes[i] == b'"' || bytes[i] == b'\'') {
                        let quote = bytes[i];
                        i += 1;
                        let value_start = i;
                        while i < bytes.len() && bytes[i] != quote {
                            i += 1;
                        }
                        let value = html[value_start..i].to_string();
                        if i < bytes.len() {
                            i += 1;
                        }
                        value
                    } else {
                        let value_start = i;
                        while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                            i += 1;
                        }
                        html[value_start..i].to_string()
                    }
                } else {
                    String::new()
                };
                if !name.is_empty() {
                    attrs.insert(name, value);
                }
            }
        }
    }

    Some((
        Element {
            tag,
            attrs,
            children: Vec::new(),
        },
        self_closed,
        i,
    ))
}
