//! Markdown → markup tree compiler.
//!
//! The dialect is small: `**bold**`, `__underline__`, `_italic_`,
//! `~~strike~~`, `[label](https://url)`, `{variable}` and hard newlines.
//! Delimiters must nest properly. An opener with no closer in its own scope
//! stays literal text, so the compiler is total and never produces an
//! unbalanced node.

use std::sync::LazyLock;

use regex::Regex;
use smol_str::SmolStr;

use crate::tree::{MarkupTree, NodeId, NodeKind};
use crate::types::Format;

/// `[label](http(s)://url)`. Other targets stay literal.
pub static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[([^\]\n]+)\]\((https?://[^\s()]+)\)").unwrap());

/// `{identifier}`: no braces or whitespace inside.
pub static VARIABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\{([^{}\s]+)\}").unwrap());

/// Formats are tried in this order at each position. Double-char markers
/// come before `_` so `__` is never read as two italic delimiters.
const OPENERS: [Format; 4] = [
    Format::Bold,
    Format::Underline,
    Format::Italic,
    Format::Strikethrough,
];

const MAX_NESTING: usize = 32;

const LOOKAHEAD_DEPTH: usize = 8;

/// Intermediate inline span, materialized into the tree afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Span {
    Text(String),
    Break,
    Variable(SmolStr),
    Link { label: Vec<Span>, href: String },
    Format(Format, Vec<Span>),
}

/// Compile markdown into a fresh markup tree.
pub fn compile(markdown: &str) -> MarkupTree {
    let spans = parse_inline(markdown, 0);
    let mut tree = MarkupTree::new();
    let root = tree.root();
    materialize(&mut tree, root, spans);
    tracing::trace!(
        target: "varmark::compile",
        input_len = markdown.len(),
        nodes = tree.len(),
        "compiled markdown"
    );
    tree
}

/// Compile straight to the escaped HTML form of the markup.
pub fn compile_to_html(markdown: &str) -> String {
    compile(markdown).to_html()
}

fn materialize(tree: &mut MarkupTree, parent: NodeId, spans: Vec<Span>) {
    for span in spans {
        match span {
            Span::Text(text) => {
                tree.append(parent, NodeKind::Text(text));
            }
            Span::Break => {
                tree.append(parent, NodeKind::LineBreak);
            }
            Span::Variable(name) => {
                tree.append(parent, NodeKind::variable(name));
            }
            Span::Link { label, href } => {
                let link = tree.append(parent, NodeKind::link(href));
                materialize(tree, link, label);
            }
            Span::Format(format, inner) => {
                let node = tree.append(parent, NodeKind::format(format));
                materialize(tree, node, inner);
            }
        }
    }
}

fn parse_inline(src: &str, depth: usize) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut text = String::new();
    let mut i = 0;

    while i < src.len() {
        let rest = &src[i..];

        if rest.starts_with('\n') {
            flush(&mut text, &mut spans);
            spans.push(Span::Break);
            i += 1;
            continue;
        }

        if let Some((span, consumed)) = match_atom(rest, depth) {
            flush(&mut text, &mut spans);
            spans.push(span);
            i += consumed;
            continue;
        }

        if depth < MAX_NESTING {
            if let Some((format, inner, consumed)) = match_format(rest) {
                flush(&mut text, &mut spans);
                spans.push(Span::Format(format, parse_inline(inner, depth + 1)));
                i += consumed;
                continue;
            }
        }

        // Unmatched opener: consume the whole marker literally so its second
        // char cannot start a shorter delimiter.
        let literal = OPENERS
            .iter()
            .map(|f| f.marker())
            .find(|m| rest.starts_with(m))
            .map(str::len)
            .unwrap_or_else(|| rest.chars().next().map_or(1, char::len_utf8));
        text.push_str(&rest[..literal]);
        i += literal;
    }

    flush(&mut text, &mut spans);
    spans
}

fn flush(text: &mut String, spans: &mut Vec<Span>) {
    if !text.is_empty() {
        spans.push(Span::Text(std::mem::take(text)));
    }
}

/// Links and variables, which are matched whole before any delimiter.
fn match_atom(rest: &str, depth: usize) -> Option<(Span, usize)> {
    if rest.starts_with('{') {
        let caps = VARIABLE_RE.captures(rest)?;
        let consumed = caps.get(0)?.end();
        return Some((Span::Variable(SmolStr::new(&caps[1])), consumed));
    }
    if rest.starts_with('[') {
        let caps = LINK_RE.captures(rest)?;
        let consumed = caps.get(0)?.end();
        let label = parse_inline(&caps[1], depth + 1);
        return Some((
            Span::Link {
                label,
                href: caps[2].to_string(),
            },
            consumed,
        ));
    }
    None
}

/// Try each opener at the start of `rest`. Returns the format, its inner
/// source, and the total bytes consumed including both delimiters.
fn match_format(rest: &str) -> Option<(Format, &str, usize)> {
    let mut spans = OPENERS
        .into_iter()
        .filter_map(|format| open_span(rest, format));
    let first = spans.next()?;
    if first.0 != Format::Underline {
        return Some(first);
    }
    // `___` opens either underline or italic first. Keep whichever span
    // reaches further.
    match spans.next() {
        Some(italic) if italic.0 == Format::Italic && italic.2 > first.2 => Some(italic),
        _ => Some(first),
    }
}

fn open_span(rest: &str, format: Format) -> Option<(Format, &str, usize)> {
    let marker = format.marker();
    let body = rest.strip_prefix(marker)?;
    match find_closer(body, format)? {
        0 => None,
        close => Some((format, &body[..close], marker.len() * 2 + close)),
    }
}

/// Find the closing delimiter for `format` in `body`, skipping over atoms
/// so a `_` inside `{order_id}` or a link never closes an outer span.
fn find_closer(body: &str, format: Format) -> Option<usize> {
    find_closer_at(body, format, 0)
}

/// `_` and `__` share a character, so italic and underline closers look
/// ahead for a complete span of the other format before stepping over it.
/// `depth` bounds that lookahead.
fn find_closer_at(body: &str, format: Format, depth: usize) -> Option<usize> {
    let marker = format.marker();
    let mut i = 0;
    while i < body.len() {
        let rest = &body[i..];
        if rest.starts_with('{') {
            if let Some(m) = VARIABLE_RE.find(rest) {
                i += m.end();
                continue;
            }
        }
        if rest.starts_with('[') {
            if let Some(m) = LINK_RE.find(rest) {
                i += m.end();
                continue;
            }
        }
        let run = rest.bytes().take_while(|&b| b == b'_').count();
        match format {
            Format::Italic if run == 2 => {
                // Step over `__x__` only if this italic still closes after
                // it. Otherwise the first `_` closes here, as in `_a__b_`.
                if let Some(end) = underscore_span(rest, Format::Underline, depth) {
                    if find_closer_at(&rest[end..], Format::Italic, depth + 1).is_some() {
                        i += end;
                        continue;
                    }
                }
                return Some(i);
            }
            Format::Underline if run == 1 => {
                // Same for an `_x_` inside underline, as in `__a _b__`.
                let step = underscore_span(rest, Format::Italic, depth)
                    .filter(|&end| {
                        find_closer_at(&rest[end..], Format::Underline, depth + 1).is_some()
                    })
                    .unwrap_or(1);
                i += step;
                continue;
            }
            Format::Italic | Format::Underline if run > 0 => return Some(i),
            Format::Bold | Format::Strikethrough if rest.starts_with(marker) => return Some(i),
            _ => {}
        }
        i += rest.chars().next().map_or(1, char::len_utf8);
    }
    None
}

/// Byte length of a non-empty `format` span opening at the start of
/// `rest`, delimiters included.
fn underscore_span(rest: &str, format: Format, depth: usize) -> Option<usize> {
    if depth >= LOOKAHEAD_DEPTH {
        return None;
    }
    let marker = format.marker();
    let body = rest.strip_prefix(marker)?;
    match find_closer_at(body, format, depth + 1)? {
        0 => None,
        close => Some(marker.len() * 2 + close),
    }
}
