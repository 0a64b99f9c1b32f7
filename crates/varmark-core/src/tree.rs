//! Markup tree: the ephemeral, editable view derived from markdown.
//!
//! Nodes live in an arena addressed by [`NodeId`]. Removed nodes stay in the
//! arena but are detached, so ids handed out earlier never alias a different
//! node. Positions mirror DOM boundary points: inside a text node the offset
//! counts chars, everywhere else it counts children.

use std::fmt::{self, Write as FmtWrite};
use std::ops::Range;

use markdown_weaver_escape::escape_html;
use smol_str::SmolStr;

use crate::types::{Format, FormatState};

/// Index of a node in a [`MarkupTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Typed node payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// The editable root.
    Root,
    Text(String),
    Bold,
    Italic,
    Underline,
    Strike,
    Link {
        href: Option<String>,
        target: Option<SmolStr>,
        rel: Option<SmolStr>,
    },
    /// Atomic, non-editable variable token.
    Variable {
        name: Option<SmolStr>,
        /// Text content shown for the token (normally `{name}`).
        text: String,
    },
    LineBreak,
    /// Generic container (`div`, `p`, `span`, or anything unrecognized).
    Element {
        tag: SmolStr,
        style: Option<String>,
    },
}

impl NodeKind {
    pub fn text(s: impl Into<String>) -> Self {
        NodeKind::Text(s.into())
    }

    pub fn variable(name: impl Into<SmolStr>) -> Self {
        let name = name.into();
        let text = format!("{{{name}}}");
        NodeKind::Variable {
            name: Some(name),
            text,
        }
    }

    pub fn link(href: impl Into<String>) -> Self {
        NodeKind::Link {
            href: Some(href.into()),
            target: None,
            rel: None,
        }
    }

    pub fn format(format: Format) -> Self {
        match format {
            Format::Bold => NodeKind::Bold,
            Format::Italic => NodeKind::Italic,
            Format::Underline => NodeKind::Underline,
            Format::Strikethrough => NodeKind::Strike,
        }
    }

    /// Build a node from a host tag name, the way a contenteditable surface
    /// would hand one over.
    pub fn element(tag: &str, style: Option<String>) -> Self {
        if let Some(format) = Format::from_tag(tag) {
            return NodeKind::format(format);
        }
        match tag.to_ascii_lowercase().as_str() {
            "br" => NodeKind::LineBreak,
            "a" => NodeKind::Link {
                href: None,
                target: None,
                rel: None,
            },
            lower => NodeKind::Element {
                tag: SmolStr::new(lower),
                style,
            },
        }
    }

    /// Semantic inline format carried by this node, if any.
    pub fn as_format(&self) -> Option<Format> {
        match self {
            NodeKind::Bold => Some(Format::Bold),
            NodeKind::Italic => Some(Format::Italic),
            NodeKind::Underline => Some(Format::Underline),
            NodeKind::Strike => Some(Format::Strikethrough),
            NodeKind::Element { tag, .. } => Format::from_tag(tag),
            _ => None,
        }
    }

    /// Formats expressed through an inline `style` attribute.
    pub fn style_formats(&self) -> FormatState {
        match self {
            NodeKind::Element {
                style: Some(style), ..
            } => FormatState::from_style(style),
            _ => FormatState::default(),
        }
    }

    pub fn is_block(&self) -> bool {
        matches!(self, NodeKind::Element { tag, .. } if is_block_tag(tag))
    }

    /// Leaves never have children and are measured as a unit (except text).
    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            NodeKind::Text(_) | NodeKind::Variable { .. } | NodeKind::LineBreak
        )
    }

    pub fn is_link(&self) -> bool {
        matches!(self, NodeKind::Link { .. })
    }
}

fn is_block_tag(tag: &str) -> bool {
    matches!(
        tag,
        "div" | "p" | "section" | "article" | "blockquote" | "li" | "pre"
    )
}

/// A DOM-style boundary point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub node: NodeId,
    pub offset: usize,
}

impl Position {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// An ordered pair of boundary points. Only valid against the tree it was
/// taken from; convert to a [`crate::Selection`] to keep it across renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomRange {
    pub start: Position,
    pub end: Position,
}

impl DomRange {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    pub fn caret(pos: Position) -> Self {
        Self {
            start: pos,
            end: pos,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Arena-backed markup tree with a single root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupTree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Default for MarkupTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkupTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
            }],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes in the arena, detached ones included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes[self.root.0].children.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(id.0).map(|n| &n.kind)
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn kind_mut(&mut self, id: NodeId) -> &mut NodeKind {
        &mut self.nodes[id.0].kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&c| c == id)
    }

    /// Create a node that is not attached anywhere.
    pub fn create(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub fn append(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let len = self.children(parent).len();
        self.insert_child(parent, len, kind)
    }

    pub fn insert_child(&mut self, parent: NodeId, index: usize, kind: NodeKind) -> NodeId {
        let id = self.create(kind);
        self.attach(parent, index, id);
        id
    }

    /// Attach a detached node as child `index` of `parent`.
    pub fn attach(&mut self, parent: NodeId, index: usize, id: NodeId) {
        self.detach(id);
        let children = &mut self.nodes[parent.0].children;
        let index = index.min(children.len());
        children.insert(index, id);
        self.nodes[id.0].parent = Some(parent);
    }

    /// Unlink a node (and its subtree) from its parent.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    /// Remove a node from the tree. Its id stays valid but detached.
    pub fn remove(&mut self, id: NodeId) {
        if id != self.root {
            self.detach(id);
        }
    }

    /// Replace a node by its children in place (unwrap).
    pub fn replace_with_children(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        let Some(index) = self.index_in_parent(id) else {
            return;
        };
        let children = std::mem::take(&mut self.nodes[id.0].children);
        self.detach(id);
        for (i, child) in children.into_iter().enumerate() {
            self.nodes[child.0].parent = None;
            self.attach(parent, index + i, child);
        }
    }

    /// Remove all children of `id` and give it a single text child.
    pub fn set_text_content(&mut self, id: NodeId, text: &str) {
        for child in self.children(id).to_vec() {
            self.detach(child);
        }
        if !text.is_empty() {
            self.append(id, NodeKind::text(text));
        }
    }

    /// The node itself followed by each ancestor up to the root.
    pub fn self_and_ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: Some(id),
        }
    }

    /// Ancestors of a node, nearest first, root last.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.parent(id),
        }
    }

    /// Whether `node` is `ancestor` or lies beneath it.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        node.0 < self.nodes.len() && self.self_and_ancestors(node).any(|n| n == ancestor)
    }

    /// Whether a node is reachable from the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.contains(self.root, id)
    }

    /// Nodes beneath `id` in document order, `id` excluded.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    // === Flat text measurement ===

    /// Width of a node in flat chars. Variables count as their display text,
    /// line breaks as one char.
    pub fn flat_len(&self, id: NodeId) -> usize {
        match self.kind(id) {
            NodeKind::Text(t) => t.chars().count(),
            NodeKind::Variable { text, .. } => text.chars().count(),
            NodeKind::LineBreak => 1,
            _ => self.children(id).iter().map(|&c| self.flat_len(c)).sum(),
        }
    }

    /// Flat text of a subtree.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match self.kind(id) {
            NodeKind::Text(t) => out.push_str(t),
            NodeKind::Variable { text, .. } => out.push_str(text),
            NodeKind::LineBreak => out.push('\n'),
            _ => {
                for &child in self.children(id) {
                    self.collect_text(child, out);
                }
            }
        }
    }

    /// Flat offset where a node starts, `None` for detached nodes.
    pub fn node_start(&self, id: NodeId) -> Option<usize> {
        if id == self.root {
            return Some(0);
        }
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        let before: usize = self.children(parent)[..index]
            .iter()
            .map(|&c| self.flat_len(c))
            .sum();
        Some(self.node_start(parent)? + before)
    }

    pub fn position_to_offset(&self, pos: Position) -> Option<usize> {
        let start = self.node_start(pos.node)?;
        match self.kind(pos.node) {
            NodeKind::Text(t) => Some(start + pos.offset.min(t.chars().count())),
            NodeKind::Variable { .. } | NodeKind::LineBreak => Some(start),
            _ => {
                let children = self.children(pos.node);
                let upto = pos.offset.min(children.len());
                Some(
                    start
                        + children[..upto]
                            .iter()
                            .map(|&c| self.flat_len(c))
                            .sum::<usize>(),
                )
            }
        }
    }

    /// Map a flat offset back to a boundary point, preferring text nodes.
    /// Offsets past the end clamp to the end of the root.
    pub fn offset_to_position(&self, offset: usize) -> Position {
        let offset = offset.min(self.flat_len(self.root));
        self.locate(self.root, offset)
    }

    fn locate(&self, id: NodeId, mut offset: usize) -> Position {
        let children = self.children(id);
        for (i, &child) in children.iter().enumerate() {
            let len = self.flat_len(child);
            if offset > len {
                offset -= len;
                continue;
            }
            match self.kind(child) {
                NodeKind::Text(_) => return Position::new(child, offset),
                NodeKind::Variable { .. } | NodeKind::LineBreak => {
                    if offset < len {
                        return Position::new(id, i);
                    }
                    offset = 0;
                }
                _ => {
                    if len > 0 {
                        return self.locate(child, offset);
                    }
                }
            }
        }
        Position::new(id, children.len())
    }

    pub fn range_to_selection(&self, range: &DomRange) -> Option<crate::Selection> {
        Some(crate::Selection::new(
            self.position_to_offset(range.start)?,
            self.position_to_offset(range.end)?,
        ))
    }

    pub fn selection_to_range(&self, sel: crate::Selection) -> DomRange {
        let sel = sel.clamp(self.flat_len(self.root));
        DomRange::new(
            self.offset_to_position(sel.start()),
            self.offset_to_position(sel.end()),
        )
    }

    /// Leaf nodes with their flat spans, in document order.
    pub fn leaves(&self) -> Vec<(NodeId, Range<usize>)> {
        let mut out = Vec::new();
        let mut offset = 0;
        for id in self.descendants(self.root) {
            if self.kind(id).is_leaf() {
                let len = self.flat_len(id);
                out.push((id, offset..offset + len));
                offset += len;
            }
        }
        out
    }

    /// Flat text covered by a range.
    pub fn text_in_range(&self, range: &DomRange) -> String {
        let Some(sel) = self.range_to_selection(range) else {
            return String::new();
        };
        self.text_content(self.root)
            .chars()
            .skip(sel.start())
            .take(sel.end() - sel.start())
            .collect()
    }

    // === Structural edits ===

    /// Split a text node at a char offset. Returns the new right-hand node,
    /// inserted directly after the original.
    pub fn split_text(&mut self, id: NodeId, offset: usize) -> Option<NodeId> {
        let NodeKind::Text(text) = self.kind(id) else {
            return None;
        };
        let byte = char_to_byte(text, offset);
        let right = text[byte..].to_string();
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        if let NodeKind::Text(t) = self.kind_mut(id) {
            t.truncate(byte);
        }
        Some(self.insert_child(parent, index + 1, NodeKind::Text(right)))
    }

    /// Ensure a node boundary exists at a flat offset.
    fn split_at_offset(&mut self, offset: usize) {
        let pos = self.offset_to_position(offset);
        if let NodeKind::Text(t) = self.kind(pos.node) {
            let len = t.chars().count();
            if pos.offset > 0 && pos.offset < len {
                self.split_text(pos.node, pos.offset);
            }
        }
    }

    /// Insert a node at a boundary point, splitting text when needed.
    pub fn insert_at(&mut self, pos: Position, kind: NodeKind) -> NodeId {
        match self.kind(pos.node) {
            NodeKind::Text(t) => {
                let len = t.chars().count();
                let parent = self.parent(pos.node).unwrap_or(self.root);
                let index = self.index_in_parent(pos.node).unwrap_or(0);
                if pos.offset == 0 {
                    self.insert_child(parent, index, kind)
                } else {
                    if pos.offset < len {
                        self.split_text(pos.node, pos.offset);
                    }
                    self.insert_child(parent, index + 1, kind)
                }
            }
            NodeKind::Variable { .. } | NodeKind::LineBreak => {
                let parent = self.parent(pos.node).unwrap_or(self.root);
                let index = self.index_in_parent(pos.node).unwrap_or(0);
                self.insert_child(parent, index, kind)
            }
            _ => self.insert_child(pos.node, pos.offset, kind),
        }
    }

    /// Insert plain text at a boundary point. Returns the position right
    /// after the inserted text.
    pub fn insert_text_at(&mut self, pos: Position, text: &str) -> Position {
        if let NodeKind::Text(t) = self.kind_mut(pos.node) {
            let byte = char_to_byte(t, pos.offset);
            t.insert_str(byte, text);
            return Position::new(pos.node, pos.offset + text.chars().count());
        }
        let id = self.insert_at(pos, NodeKind::text(text));
        Position::new(id, text.chars().count())
    }

    /// Boundary point directly after a node.
    pub fn position_after(&self, id: NodeId) -> Position {
        match (self.parent(id), self.index_in_parent(id)) {
            (Some(parent), Some(index)) => Position::new(parent, index + 1),
            _ => Position::new(self.root, self.children(self.root).len()),
        }
    }

    /// Replace chars `start..end` of a text node with a new node.
    pub fn replace_text_span(
        &mut self,
        id: NodeId,
        span: Range<usize>,
        kind: NodeKind,
    ) -> Option<NodeId> {
        let NodeKind::Text(text) = self.kind(id) else {
            return None;
        };
        let len = text.chars().count();
        if span.start > span.end || span.end > len {
            return None;
        }
        if span.end < len {
            self.split_text(id, span.end);
        }
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        if let NodeKind::Text(t) = self.kind_mut(id) {
            let byte = char_to_byte(t, span.start);
            t.truncate(byte);
        }
        let empty_left = matches!(self.kind(id), NodeKind::Text(t) if t.is_empty());
        let inserted = self.insert_child(parent, index + 1, kind);
        if empty_left {
            self.detach(id);
        }
        Some(inserted)
    }

    /// Delete the contents of a range. Returns the collapsed caret left behind.
    pub fn delete_range(&mut self, range: &DomRange) -> Position {
        let Some(sel) = self.range_to_selection(range) else {
            return range.start;
        };
        let (start, end) = (sel.start(), sel.end());
        if start == end {
            return self.offset_to_position(start);
        }
        self.split_at_offset(end);
        self.split_at_offset(start);

        let doomed: Vec<NodeId> = self
            .leaves()
            .into_iter()
            .filter(|(_, span)| span.start >= start && span.end <= end && !span.is_empty())
            .map(|(id, _)| id)
            .collect();
        let mut parents = Vec::new();
        for id in doomed {
            if let Some(parent) = self.parent(id) {
                parents.push(parent);
            }
            self.detach(id);
        }
        for parent in parents {
            self.prune_empty(parent);
        }
        self.offset_to_position(start)
    }

    /// Detach now-empty inline wrappers walking upward from `id`.
    fn prune_empty(&mut self, id: NodeId) {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == self.root
                || !self.children(node).is_empty()
                || self.kind(node).is_block()
                || self.kind(node).is_leaf()
            {
                break;
            }
            current = self.parent(node);
            self.detach(node);
        }
    }

    /// Wrap the leaves covered by a flat span in new `kind` nodes, one wrapper
    /// per run of adjacent siblings. Returns the wrappers created.
    pub fn wrap_span(&mut self, span: Range<usize>, kind: NodeKind) -> Vec<NodeId> {
        if span.is_empty() {
            return Vec::new();
        }
        self.split_at_offset(span.end);
        self.split_at_offset(span.start);

        let covered: Vec<NodeId> = self
            .leaves()
            .into_iter()
            .filter(|(_, s)| s.start >= span.start && s.end <= span.end && !s.is_empty())
            .map(|(id, _)| id)
            .collect();

        // Group consecutive siblings sharing a parent.
        let mut runs: Vec<Vec<NodeId>> = Vec::new();
        for id in covered {
            let parent = self.parent(id);
            let index = self.index_in_parent(id);
            let extends = runs.last().and_then(|run| run.last()).is_some_and(|&prev| {
                self.parent(prev) == parent
                    && self.index_in_parent(prev).map(|i| i + 1) == index
            });
            if extends {
                if let Some(run) = runs.last_mut() {
                    run.push(id);
                }
            } else {
                runs.push(vec![id]);
            }
        }

        let mut wrappers = Vec::new();
        for run in runs {
            let Some(parent) = self.parent(run[0]) else {
                continue;
            };
            let Some(index) = self.index_in_parent(run[0]) else {
                continue;
            };
            let wrapper = self.insert_child(parent, index, kind.clone());
            for (i, id) in run.into_iter().enumerate() {
                self.attach(wrapper, i, id);
            }
            wrappers.push(wrapper);
        }
        wrappers
    }

    // === Output ===

    /// Render to the markup HTML form. Text is escaped here and only here.
    pub fn to_html(&self) -> String {
        let mut writer = HtmlWriter::default();
        // Writing into a String cannot fail.
        let _ = self.write_html(self.root, &mut writer);
        writer.into_string()
    }

    fn write_html(&self, id: NodeId, w: &mut HtmlWriter) -> fmt::Result {
        match self.kind(id) {
            NodeKind::Root => self.write_children_html(id, w),
            NodeKind::Text(t) => escape_text(w, t),
            NodeKind::LineBreak => w.write_str("<br>"),
            NodeKind::Variable { name, text } => {
                w.write_str("<span class=\"variable\" contenteditable=\"false\"")?;
                if let Some(name) = name {
                    w.write_str(" data-variable=\"")?;
                    escape_text(w, name)?;
                    w.write_str("\"")?;
                }
                w.write_str(">")?;
                escape_text(w, text)?;
                w.write_str("</span>")
            }
            NodeKind::Link { href, target, rel } => {
                w.write_str("<a")?;
                if let Some(href) = href {
                    w.write_str(" href=\"")?;
                    escape_text(w, href)?;
                    w.write_str("\"")?;
                }
                w.write_str(" target=\"")?;
                escape_text(w, target.as_deref().unwrap_or("_blank"))?;
                w.write_str("\" rel=\"")?;
                escape_text(w, rel.as_deref().unwrap_or("noopener noreferrer"))?;
                w.write_str("\">")?;
                self.write_children_html(id, w)?;
                w.write_str("</a>")
            }
            NodeKind::Bold => self.write_wrapped_html(id, "strong", w),
            NodeKind::Italic => self.write_wrapped_html(id, "em", w),
            NodeKind::Underline => self.write_wrapped_html(id, "u", w),
            NodeKind::Strike => self.write_wrapped_html(id, "s", w),
            NodeKind::Element { tag, style } => {
                write!(w, "<{tag}")?;
                if let Some(style) = style {
                    w.write_str(" style=\"")?;
                    escape_text(w, style)?;
                    w.write_str("\"")?;
                }
                w.write_str(">")?;
                self.write_children_html(id, w)?;
                write!(w, "</{tag}>")
            }
        }
    }

    fn write_wrapped_html(&self, id: NodeId, tag: &str, w: &mut HtmlWriter) -> fmt::Result {
        write!(w, "<{tag}>")?;
        self.write_children_html(id, w)?;
        write!(w, "</{tag}>")
    }

    fn write_children_html(&self, id: NodeId, w: &mut HtmlWriter) -> fmt::Result {
        for &child in self.children(id) {
            self.write_html(child, w)?;
        }
        Ok(())
    }

    /// Indented dump of the attached tree, one node per line.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        self.write_outline(self.root, 0, &mut out);
        out
    }

    fn write_outline(&self, id: NodeId, depth: usize, out: &mut String) {
        let indent = "  ".repeat(depth);
        let line = match self.kind(id) {
            NodeKind::Root => "root".to_string(),
            NodeKind::Text(t) => format!("text {t:?}"),
            NodeKind::Bold => "bold".to_string(),
            NodeKind::Italic => "italic".to_string(),
            NodeKind::Underline => "underline".to_string(),
            NodeKind::Strike => "strike".to_string(),
            NodeKind::Link { href, .. } => match href {
                Some(href) => format!("link {href}"),
                None => "link".to_string(),
            },
            NodeKind::Variable { name, text } => match name {
                Some(name) => format!("variable {name}"),
                None => format!("variable text={text:?}"),
            },
            NodeKind::LineBreak => "linebreak".to_string(),
            NodeKind::Element { tag, style } => match style {
                Some(style) => format!("element {tag} style={style:?}"),
                None => format!("element {tag}"),
            },
        };
        let _ = writeln!(out, "{indent}{line}");
        for &child in self.children(id) {
            self.write_outline(child, depth + 1, out);
        }
    }
}

/// Iterator over a node and its ancestors.
pub struct Ancestors<'a> {
    tree: &'a MarkupTree,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.parent(current);
        Some(current)
    }
}

pub(crate) fn char_to_byte(s: &str, char_offset: usize) -> usize {
    s.char_indices()
        .nth(char_offset)
        .map(|(b, _)| b)
        .unwrap_or(s.len())
}

/// String sink for HTML output.
#[derive(Debug, Default)]
struct HtmlWriter {
    out: String,
}

impl HtmlWriter {
    fn into_string(self) -> String {
        self.out
    }
}

impl FmtWrite for HtmlWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.out.push_str(s);
        Ok(())
    }
}

impl markdown_weaver_escape::StrWrite for HtmlWriter {
    type Error = fmt::Error;

    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.out.push_str(s);
        Ok(())
    }

    fn write_fmt(&mut self, args: fmt::Arguments<'_>) -> fmt::Result {
        std::fmt::Write::write_fmt(&mut self.out, args)
    }
}

/// Escape `&`, `<`, `>`, `"` via the shared escaper, plus `'`.
fn escape_text(w: &mut HtmlWriter, s: &str) -> fmt::Result {
    let mut parts = s.split('\'');
    if let Some(first) = parts.next() {
        escape_html(&mut *w, first)?;
    }
    for part in parts {
        FmtWrite::write_str(w, "&#39;")?;
        escape_html(&mut *w, part)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (MarkupTree, NodeId, NodeId, NodeId) {
        // "ab" + bold("cd") + {x} + "ef"
        let mut tree = MarkupTree::new();
        let root = tree.root();
        let t1 = tree.append(root, NodeKind::text("ab"));
        let bold = tree.append(root, NodeKind::Bold);
        tree.append(bold, NodeKind::text("cd"));
        tree.append(root, NodeKind::variable("x"));
        let t3 = tree.append(root, NodeKind::text("ef"));
        (tree, t1, bold, t3)
    }

    #[test]
    fn test_flat_text_and_len() {
        let (tree, ..) = sample();
        assert_eq!(tree.text_content(tree.root()), "abcd{x}ef");
        assert_eq!(tree.flat_len(tree.root()), 9);
    }

    #[test]
    fn test_offset_position_roundtrip() {
        let (tree, t1, _, t3) = sample();
        assert_eq!(tree.offset_to_position(1), Position::new(t1, 1));
        // End of "ab" stays in the text node.
        assert_eq!(tree.offset_to_position(2), Position::new(t1, 2));
        // Inside the variable snaps to before it.
        assert_eq!(tree.offset_to_position(5), Position::new(tree.root(), 2));
        // Right after the variable lands at the start of "ef".
        assert_eq!(tree.offset_to_position(7), Position::new(t3, 0));
        assert_eq!(tree.offset_to_position(100), Position::new(t3, 2));

        for offset in [0, 1, 3, 4, 7, 8, 9] {
            let pos = tree.offset_to_position(offset);
            assert_eq!(tree.position_to_offset(pos), Some(offset));
        }
    }

    #[test]
    fn test_split_and_insert() {
        let mut tree = MarkupTree::new();
        let root = tree.root();
        let t = tree.append(root, NodeKind::text("héllo"));
        let right = tree.split_text(t, 2).unwrap();
        assert_eq!(tree.kind(t), &NodeKind::text("hé"));
        assert_eq!(tree.kind(right), &NodeKind::text("llo"));
        assert_eq!(tree.children(root), &[t, right]);

        let after = tree.insert_text_at(Position::new(t, 2), "!");
        assert_eq!(tree.text_content(root), "hé!llo");
        assert_eq!(after, Position::new(t, 3));
    }

    #[test]
    fn test_replace_text_span() {
        let mut tree = MarkupTree::new();
        let root = tree.root();
        let t = tree.append(root, NodeKind::text("hi {ab there"));
        let var = tree
            .replace_text_span(t, 3..6, NodeKind::variable("x"))
            .unwrap();
        assert_eq!(tree.text_content(root), "hi {x} there");
        assert_eq!(tree.position_after(var), Position::new(root, 2));
    }

    #[test]
    fn test_delete_range_prunes_wrappers() {
        let (mut tree, t1, bold, _) = sample();
        let range = DomRange::new(Position::new(t1, 1), tree.offset_to_position(4));
        let caret = tree.delete_range(&range);
        assert_eq!(tree.text_content(tree.root()), "a{x}ef");
        assert!(!tree.is_attached(bold));
        assert_eq!(tree.position_to_offset(caret), Some(1));
    }

    #[test]
    fn test_wrap_span_across_siblings() {
        let mut tree = MarkupTree::new();
        let root = tree.root();
        tree.append(root, NodeKind::text("hello world"));
        let wrappers = tree.wrap_span(6..11, NodeKind::Bold);
        assert_eq!(wrappers.len(), 1);
        assert_eq!(tree.text_content(wrappers[0]), "world");
        assert_eq!(tree.to_html(), "hello <strong>world</strong>");
    }

    #[test]
    fn test_replace_with_children() {
        let (mut tree, _, bold, _) = sample();
        tree.replace_with_children(bold);
        assert_eq!(tree.children(tree.root()).len(), 4);
        assert_eq!(tree.text_content(tree.root()), "abcd{x}ef");
    }

    #[test]
    fn test_html_escaping() {
        let mut tree = MarkupTree::new();
        let root = tree.root();
        tree.append(root, NodeKind::text("<a href=\"x\">&'"));
        insta::assert_snapshot!(tree.to_html(), @"&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn test_element_classification() {
        assert_eq!(NodeKind::element("STRONG", None), NodeKind::Bold);
        assert_eq!(NodeKind::element("br", None), NodeKind::LineBreak);
        assert!(NodeKind::element("div", None).is_block());
        assert!(!NodeKind::element("span", None).is_block());
    }
}
