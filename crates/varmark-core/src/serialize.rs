//! Markup tree → markdown serializer.
//!
//! Post-order walk: each node wraps the serialized text of its children.
//! Formatting comes either from the node kind or, for generic inline
//! elements, from their `style` attribute. Both paths end in the same
//! [`Format`] wrapping so nothing downstream cares how a format was
//! expressed. Unknown shapes serialize their children unwrapped.

use std::sync::LazyLock;

use regex::Regex;

use crate::tree::{MarkupTree, NodeId, NodeKind};
use crate::types::{Format, FormatState};

static BLANK_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Style-derived wraps, innermost first.
const STYLE_WRAP_ORDER: [Format; 4] = [
    Format::Underline,
    Format::Strikethrough,
    Format::Bold,
    Format::Italic,
];

/// Serialize a whole tree to canonical markdown.
pub fn serialize(tree: &MarkupTree) -> String {
    let mut raw = String::new();
    write_node(tree, tree.root(), &mut raw);
    normalize(&raw)
}

/// Paragraph-gap and whitespace normalization applied to serializer output.
///
/// Runs of three or more newlines collapse to two, non-breaking spaces
/// become plain spaces, and trailing whitespace is dropped.
pub fn normalize(markdown: &str) -> String {
    let collapsed = BLANK_RUN_RE.replace_all(markdown, "\n\n");
    collapsed.replace('\u{a0}', " ").trim_end().to_string()
}

fn write_node(tree: &MarkupTree, id: NodeId, out: &mut String) {
    match tree.kind(id) {
        NodeKind::Text(text) => out.push_str(text),
        NodeKind::LineBreak => out.push('\n'),
        NodeKind::Variable { name, text } => write_variable(name.as_deref(), text, out),
        NodeKind::Link { href, .. } => {
            let label = children_markdown(tree, id);
            match href.as_deref().map(str::trim) {
                Some(href) if !href.is_empty() => {
                    out.push('[');
                    out.push_str(&label);
                    out.push_str("](");
                    out.push_str(href);
                    out.push(')');
                }
                _ => out.push_str(&label),
            }
        }
        NodeKind::Bold | NodeKind::Italic | NodeKind::Underline | NodeKind::Strike => {
            let inner = children_markdown(tree, id);
            match tree.kind(id).as_format() {
                Some(format) => wrap(format, &inner, out),
                None => out.push_str(&inner),
            }
        }
        NodeKind::Element { tag, style } => {
            let inner = children_markdown(tree, id);
            if tree.kind(id).is_block() {
                out.push_str(&inner);
                out.push('\n');
            } else if let Some(format) = Format::from_tag(tag) {
                wrap(format, &inner, out);
            } else {
                let state = style
                    .as_deref()
                    .map(FormatState::from_style)
                    .unwrap_or_default();
                out.push_str(&wrap_styles(state, inner));
            }
        }
        NodeKind::Root => {
            for &child in tree.children(id) {
                write_node(tree, child, out);
            }
        }
    }
}

fn children_markdown(tree: &MarkupTree, id: NodeId) -> String {
    let mut inner = String::new();
    for &child in tree.children(id) {
        write_node(tree, child, &mut inner);
    }
    inner
}

fn write_variable(name: Option<&str>, text: &str, out: &mut String) {
    match name {
        Some(name) if !name.is_empty() => {
            out.push('{');
            out.push_str(name);
            out.push('}');
        }
        _ if text.len() >= 2 && text.starts_with('{') && text.ends_with('}') => {
            out.push_str(text)
        }
        _ => {
            out.push('{');
            out.push_str(text);
            out.push('}');
        }
    }
}

fn wrap(format: Format, inner: &str, out: &mut String) {
    if inner.is_empty() {
        return;
    }
    let marker = format.marker();
    out.push_str(marker);
    out.push_str(inner);
    out.push_str(marker);
}

fn wrap_styles(state: FormatState, inner: String) -> String {
    STYLE_WRAP_ORDER
        .into_iter()
        .filter(|&f| state.get(f))
        .fold(inner, |acc, f| {
            let mut out = String::new();
            wrap(f, &acc, &mut out);
            out
        })
}
