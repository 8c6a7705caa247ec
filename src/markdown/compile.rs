//! Markdown to HTML compilation.
//!
//! A fixed-order regex pipeline; the stage order is load-bearing and must
//! not be rearranged. Code is extracted before entity escaping so its
//! content survives verbatim, blockquotes are matched after escaping (their
//! pattern targets `&gt;`), and paragraph wrapping runs last so every block
//! construct is already in place. Single-pass only: feeding the output back
//! in is not supported.

use regex::{Captures, Regex};

use crate::evernote::merge_task_runs;

/// Compile a Markdown body (frontmatter already removed) into HTML.
pub fn compile_markdown(source: &str) -> String {
    let mut code = Vec::new();
    let text = extract_code(source, &mut code); // 1
    let text = escape_and_restore(&text, &code); // 2
    let text = convert_tables(&text); // 3
    let text = convert_headings(&text); // 4
    let text = convert_emphasis(&text); // 5
    let text = convert_strike_highlight(&text); // 6
    let text = convert_blockquotes(&text); // 7
    let text = convert_task_lists(&text); // 8
    let text = normalize_lists(&text); // 9
    let text = convert_inline(&text); // 10
    wrap_paragraphs(&text) // 11
}

fn placeholder(index: usize) -> String {
    format!("\u{0}C{}\u{0}", index)
}

/// Stage 1: pull fenced and inline code out into opaque placeholders,
/// rendering (and escaping) them immediately.
fn extract_code(text: &str, code: &mut Vec<String>) -> String {
    let fenced_re = Regex::new(r"(?s)```([^\n`]*)\n(.*?)```").unwrap();
    let text = fenced_re
        .replace_all(text, |caps: &Captures| {
            let language = caps[1].trim();
            let body = html_escape::encode_text(caps[2].trim_end_matches('\n')).to_string();
            let html = if language.is_empty() {
                format!("<pre><code>{}</code></pre>", body)
            } else {
                format!(
                    r#"<pre><code class="language-{}">{}</code></pre>"#,
                    language, body
                )
            };
            code.push(html);
            placeholder(code.len() - 1)
        })
        .to_string();

    let inline_re = Regex::new(r"`([^`\n]+)`").unwrap();
    inline_re
        .replace_all(&text, |caps: &Captures| {
            code.push(format!(
                "<code>{}</code>",
                html_escape::encode_text(&caps[1])
            ));
            placeholder(code.len() - 1)
        })
        .to_string()
}

/// Stage 2: HTML-entity-escape everything else, then put the rendered code
/// back verbatim.
fn escape_and_restore(text: &str, code: &[String]) -> String {
    let mut escaped = html_escape::encode_text(text).to_string();
    for (index, html) in code.iter().enumerate() {
        escaped = escaped.replace(&placeholder(index), html);
    }
    escaped
}

fn is_alignment_row(line: &str) -> bool {
    let re = Regex::new(r"^\s*\|?(\s*:?-+:?\s*\|)*\s*:?-+:?\s*\|?\s*$").unwrap();
    line.contains('|') && line.contains('-') && re.is_match(line)
}

fn split_cells(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let trimmed = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix('|').unwrap_or(trimmed);
    trimmed.split('|').map(|c| c.trim().to_string()).collect()
}

fn cell_alignment(spec: &str) -> Option<&'static str> {
    let spec = spec.trim();
    let left = spec.starts_with(':');
    let right = spec.ends_with(':');
    match (left, right) {
        (true, true) => Some("center"),
        (false, true) => Some("right"),
        (true, false) => Some("left"),
        (false, false) => None,
    }
}

fn table_cell(tag: &str, text: &str, align: Option<&str>) -> String {
    match align {
        Some(align) => format!(r#"<{0} style="text-align: {1}">{2}</{0}>"#, tag, align, text),
        None => format!("<{0}>{1}</{0}>", tag, text),
    }
}

/// Stage 3: GFM tables. A header row immediately followed by an alignment
/// row starts a table; the table ends at the first line without a pipe.
fn convert_tables(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut out: Vec<String> = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let is_header = lines[i].contains('|')
            && i + 1 < lines.len()
            && is_alignment_row(lines[i + 1]);
        if !is_header {
            out.push(lines[i].to_string());
            i += 1;
            continue;
        }

        let aligns: Vec<Option<&'static str>> = split_cells(lines[i + 1])
            .iter()
            .map(|spec| cell_alignment(spec))
            .collect();
        let align_for = |col: usize| aligns.get(col).copied().flatten();

        out.push("<table>".to_string());
        out.push("<thead>".to_string());
        let header: String = split_cells(lines[i])
            .iter()
            .enumerate()
            .map(|(col, cell)| table_cell("th", cell, align_for(col)))
            .collect();
        out.push(format!("<tr>{}</tr>", header));
        out.push("</thead>".to_string());
        out.push("<tbody>".to_string());
        i += 2;

        while i < lines.len() && lines[i].contains('|') && !lines[i].trim().is_empty() {
            let row: String = split_cells(lines[i])
                .iter()
                .enumerate()
                .map(|(col, cell)| table_cell("td", cell, align_for(col)))
                .collect();
            out.push(format!("<tr>{}</tr>", row));
            i += 1;
        }

        out.push("</tbody>".to_string());
        out.push("</table>".to_string());
    }

    out.join("\n")
}

/// Stage 4: ATX headings, longest prefix first.
fn convert_headings(text: &str) -> String {
    let mut text = text.to_string();
    for level in (1..=6).rev() {
        let re = Regex::new(&format!(r"(?m)^{} +(.*)$", "#".repeat(level))).unwrap();
        text = re
            .replace_all(&text, format!("<h{0}>$1</h{0}>", level))
            .to_string();
    }
    text
}

/// Stage 5: emphasis, longest pattern first so `***` never half-matches.
fn convert_emphasis(text: &str) -> String {
    let passes: [(&str, &str); 6] = [
        (r"\*\*\*(.+?)\*\*\*", "<b><i>$1</i></b>"),
        (r"\*\*(.+?)\*\*", "<b>$1</b>"),
        (r"\*(.+?)\*", "<i>$1</i>"),
        (r"___(.+?)___", "<b><i>$1</i></b>"),
        (r"__(.+?)__", "<b>$1</b>"),
        (r"_(.+?)_", "<i>$1</i>"),
    ];
    let mut text = text.to_string();
    for (pattern, replacement) in passes {
        text = Regex::new(pattern)
            .unwrap()
            .replace_all(&text, replacement)
            .to_string();
    }
    text
}

/// Stage 6: strikethrough and highlight.
fn convert_strike_highlight(text: &str) -> String {
    let text = Regex::new(r"~~(.+?)~~")
        .unwrap()
        .replace_all(text, "<s>$1</s>")
        .to_string();
    Regex::new(r"==(.+?)==")
        .unwrap()
        .replace_all(&text, "<mark>$1</mark>")
        .to_string()
}

/// Stage 7: blockquotes. Runs after entity escaping, so the prefix to match
/// is `&gt;`; a repeated prefix sets the nesting depth.
fn convert_blockquotes(text: &str) -> String {
    let line_re = Regex::new(r"(?m)^((?:&gt;\s?)+)(.*)$").unwrap();
    let mut text = line_re
        .replace_all(text, |caps: &Captures| {
            let depth = caps[1].matches("&gt;").count();
            format!(
                "{}{}{}",
                "<blockquote>".repeat(depth),
                caps[2].trim(),
                "</blockquote>".repeat(depth)
            )
        })
        .to_string();

    // Adjacent quote lines fuse; repeated until deeper nestings settle.
    let join_re = Regex::new(r"</blockquote>\n<blockquote>").unwrap();
    loop {
        let next = join_re.replace_all(&text, "\n").to_string();
        if next == text {
            return next;
        }
        text = next;
    }
}

/// Stage 8: task-list lines, grouped into a task list by contiguous-run
/// wrapping (the same pass the ENEX normalizer uses).
fn convert_task_lists(text: &str) -> String {
    let item_re = Regex::new(r"(?m)^\s*[-*] \[( |x|X)\] (.*)$").unwrap();
    let text = item_re
        .replace_all(text, |caps: &Captures| {
            let checked = !caps[1].trim().is_empty();
            format!(
                r#"<li data-type="taskItem" data-checked="{}"><input type="checkbox"{} disabled="disabled" /> {}</li>"#,
                checked,
                if checked { r#" checked="checked""# } else { "" },
                caps[2].trim(),
            )
        })
        .to_string();
    merge_task_runs(&text)
}

/// Stage 9: list nesting. A stack of `(list tag, indent)` frames turns the
/// flat item lines into nested lists. Switching marker type at an unchanged
/// indent keeps the open frame; that quirk is part of the contract.
fn normalize_lists(text: &str) -> String {
    let bullet_re = Regex::new(r"^(\s*)[-*+] (.*)$").unwrap();
    let ordered_re = Regex::new(r"^(\s*)\d+\. (.*)$").unwrap();

    let mut out: Vec<String> = Vec::new();
    let mut stack: Vec<(&'static str, usize)> = Vec::new();

    let close_deeper = |stack: &mut Vec<(&'static str, usize)>, out: &mut Vec<String>, indent: usize| {
        while let Some(&(tag, frame_indent)) = stack.last() {
            if frame_indent > indent {
                out.push(format!("</{}>", tag));
                stack.pop();
            } else {
                break;
            }
        }
    };

    for line in text.lines() {
        let item = bullet_re
            .captures(line)
            .map(|caps| ("ul", caps))
            .or_else(|| ordered_re.captures(line).map(|caps| ("ol", caps)));

        match item {
            Some((tag, caps)) => {
                let indent = caps[1].len();
                close_deeper(&mut stack, &mut out, indent);
                let open_new = stack
                    .last()
                    .map_or(true, |&(_, frame_indent)| frame_indent < indent);
                if open_new {
                    stack.push((tag, indent));
                    out.push(format!("<{}>", tag));
                }
                out.push(format!("<li>{}</li>", &caps[2]));
            }
            None => {
                close_deeper(&mut stack, &mut out, 0);
                if let Some((tag, _)) = stack.pop() {
                    out.push(format!("</{}>", tag));
                }
                out.push(line.to_string());
            }
        }
    }

    while let Some((tag, _)) = stack.pop() {
        out.push(format!("</{}>", tag));
    }

    out.join("\n")
}

/// Stage 10: remaining inline constructs — images before links, then
/// horizontal rules.
fn convert_inline(text: &str) -> String {
    let image_re = Regex::new(r"!\[([^\]]*)\]\(([^)\s]+)\)").unwrap();
    let text = image_re
        .replace_all(text, r#"<img src="$2" alt="$1" />"#)
        .to_string();

    let link_re = Regex::new(r"\[([^\]]*)\]\(([^)\s]+)\)").unwrap();
    let text = link_re
        .replace_all(&text, r#"<a href="$2">$1</a>"#)
        .to_string();

    Regex::new(r"(?m)^(?:-{3,}|\*{3,}|_{3,})\s*$")
        .unwrap()
        .replace_all(&text, "<hr />")
        .to_string()
}

const BLOCK_PREFIXES: [&str; 21] = [
    "<h1", "<h2", "<h3", "<h4", "<h5", "<h6", "<ul", "</ul", "<ol", "</ol", "<li", "<blockquote",
    "</blockquote", "<pre", "<hr", "<table", "</table", "<thead", "</thead", "<tbody", "</tbody",
];

fn is_block_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("<tr")
        || trimmed.starts_with("<mark")
        || BLOCK_PREFIXES.iter().any(|p| trimmed.starts_with(p))
}

/// Stage 11: wrap runs of non-block lines in `<p>`; block-level lines pass
/// through untouched.
fn wrap_paragraphs(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut run: Vec<&str> = Vec::new();

    let flush = |out: &mut Vec<String>, run: &mut Vec<&str>| {
        if !run.is_empty() {
            out.push(format!("<p>{}</p>", run.join(" ")));
            run.clear();
        }
    };

    for line in text.lines() {
        if line.trim().is_empty() {
            flush(&mut out, &mut run);
        } else if is_block_line(line) {
            flush(&mut out, &mut run);
            out.push(line.to_string());
        } else {
            run.push(line.trim());
        }
    }
    flush(&mut out, &mut run);

    out.join("\n")
}
