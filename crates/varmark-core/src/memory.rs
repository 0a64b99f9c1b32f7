//! In-memory editing surface.
//!
//! Behaves like a single contenteditable region laid out on a fixed-cell
//! grid: every flat char is `char_width` wide and every line break starts a
//! new `line_height` row. Collapsed ranges measure as zero-sized, the way
//! browsers commonly report them.

use crate::compile::compile;
use crate::config::LayoutConfig;
use crate::error::SurfaceError;
use crate::surface::EditingSurface;
use crate::tree::{DomRange, MarkupTree, NodeId, NodeKind, Position};
use crate::types::{Format, FormatState, Rect, Selection};

#[derive(Debug, Clone)]
pub struct MemorySurface {
    tree: MarkupTree,
    selection: Option<DomRange>,
    focused: bool,
    layout: LayoutConfig,
    commands_supported: bool,
    /// Node standing in for content outside the editable root.
    outside: Option<NodeId>,
}

impl Default for MemorySurface {
    fn default() -> Self {
        Self::new(LayoutConfig::default())
    }
}

impl MemorySurface {
    pub fn new(layout: LayoutConfig) -> Self {
        Self {
            tree: MarkupTree::new(),
            selection: None,
            focused: false,
            layout,
            commands_supported: true,
            outside: None,
        }
    }

    /// A surface already showing the compiled form of `markdown`.
    pub fn from_markdown(markdown: &str) -> Self {
        let mut surface = Self::default();
        surface.tree = compile(markdown);
        surface
    }

    /// Simulate an environment without native format commands.
    pub fn set_commands_supported(&mut self, supported: bool) {
        self.commands_supported = supported;
    }

    /// Drop focus without touching the selection.
    pub fn blur(&mut self) {
        self.focused = false;
    }

    /// Select by flat char offsets.
    pub fn select(&mut self, anchor: usize, head: usize) {
        let range = self.tree.selection_to_range(Selection::new(anchor, head));
        self.selection = Some(range);
    }

    /// Put the caret at a flat char offset.
    pub fn place_caret(&mut self, offset: usize) {
        self.select(offset, offset);
    }

    /// Move the live selection somewhere outside the editable root, as when a
    /// toolbar button or another field takes it.
    pub fn select_outside(&mut self) {
        let node = match self.outside {
            Some(node) => node,
            None => {
                let node = self.tree.create(NodeKind::text("outside"));
                self.outside = Some(node);
                node
            }
        };
        self.selection = Some(DomRange::caret(Position::new(node, 0)));
    }

    /// The live selection as flat offsets, when it lies inside the root.
    pub fn selection_offsets(&self) -> Option<Selection> {
        let range = self.selection?;
        if !self.contains_range(&range) {
            return None;
        }
        self.tree.range_to_selection(&range)
    }

    /// Insert text at the selection the way typing would, replacing any
    /// selected content and leaving a collapsed caret after it.
    pub fn type_text(&mut self, text: &str) {
        let range = match self.selection {
            Some(range) if self.contains_range(&range) => range,
            _ => {
                let end = self.tree.flat_len(self.tree.root());
                self.tree.selection_to_range(Selection::collapsed(end))
            }
        };
        let caret = if range.is_collapsed() {
            range.start
        } else {
            self.tree.delete_range(&range)
        };
        let after = self.tree.insert_text_at(caret, text);
        self.selection = Some(DomRange::caret(after));
    }

    /// The node a boundary point resolves to for format inspection.
    fn resolve(&self, pos: Position) -> NodeId {
        match self.tree.kind(pos.node) {
            NodeKind::Text(_) => pos.node,
            _ => self
                .tree
                .children(pos.node)
                .get(pos.offset)
                .copied()
                .unwrap_or(pos.node),
        }
    }

    /// Leaves a range covers. A collapsed range inspects the node at its
    /// boundary point instead.
    fn covered_nodes(&self, range: &DomRange) -> Vec<NodeId> {
        let Some(sel) = self.tree.range_to_selection(range) else {
            return Vec::new();
        };
        if sel.is_collapsed() {
            return vec![self.resolve(range.start)];
        }
        self.tree
            .leaves()
            .into_iter()
            .filter(|(_, span)| span.end > sel.start() && span.start < sel.end())
            .map(|(id, _)| id)
            .collect()
    }

    fn format_active_at(&self, node: NodeId, format: Format) -> bool {
        self.tree.self_and_ancestors(node).any(|id| {
            let kind = self.tree.kind(id);
            kind.as_format() == Some(format) || kind.style_formats().get(format)
        })
    }

    /// Strip `format` from every ancestor of `node` that carries it.
    fn clear_format_at(&mut self, node: NodeId, format: Format) {
        let carriers: Vec<NodeId> = self.tree.self_and_ancestors(node).collect();
        for id in carriers {
            if self.tree.kind(id).as_format() == Some(format) {
                self.tree.replace_with_children(id);
                continue;
            }
            if let NodeKind::Element { style, .. } = self.tree.kind_mut(id) {
                if let Some(current) = style.as_deref() {
                    let mut state = FormatState::from_style(current);
                    if state.get(format) {
                        state.set(format, false);
                        *style = state.to_style();
                    }
                }
            }
        }
    }

    fn line_col(&self, offset: usize) -> (usize, usize) {
        let text = self.tree.text_content(self.tree.root());
        let mut line = 0;
        let mut col = 0;
        for c in text.chars().take(offset) {
            if c == '\n' {
                line += 1;
                col = 0;
            } else {
                col += 1;
            }
        }
        (line, col)
    }
}

impl EditingSurface for MemorySurface {
    fn tree(&self) -> &MarkupTree {
        &self.tree
    }

    fn tree_mut(&mut self) -> &mut MarkupTree {
        &mut self.tree
    }

    fn replace_tree(&mut self, tree: MarkupTree) {
        self.tree = tree;
        self.selection = None;
        self.outside = None;
    }

    fn selection(&self) -> Option<DomRange> {
        self.selection
    }

    fn set_selection(&mut self, range: Option<DomRange>) {
        self.selection = range;
    }

    fn has_focus(&self) -> bool {
        self.focused
    }

    fn focus(&mut self) {
        self.focused = true;
    }

    fn query_format(&self, format: Format) -> Result<bool, SurfaceError> {
        if !self.commands_supported {
            return Err(SurfaceError::Unsupported(format.command()));
        }
        let range = self.selection.ok_or(SurfaceError::NoSelection)?;
        if !self.contains_range(&range) {
            return Ok(false);
        }
        Ok(self
            .covered_nodes(&range)
            .first()
            .is_some_and(|&node| self.format_active_at(node, format)))
    }

    fn exec_format(&mut self, format: Format) -> Result<(), SurfaceError> {
        if !self.commands_supported {
            return Err(SurfaceError::Unsupported(format.command()));
        }
        let range = self.selection.ok_or(SurfaceError::NoSelection)?;
        let sel = self
            .tree
            .range_to_selection(&range)
            .ok_or(SurfaceError::NoSelection)?;

        if self.query_format(format)? {
            for node in self.covered_nodes(&range) {
                self.clear_format_at(node, format);
            }
        } else if !sel.is_collapsed() {
            self.tree.wrap_span(sel.to_range(), NodeKind::format(format));
        }
        // Wrapping and unwrapping keep flat offsets stable.
        self.selection = Some(self.tree.selection_to_range(sel));
        Ok(())
    }

    fn range_rect(&self, range: &DomRange) -> Option<Rect> {
        if !self.contains_range(range) {
            return None;
        }
        let sel = self.tree.range_to_selection(range)?;
        let (line_s, col_s) = self.line_col(sel.start());
        let x = col_s as f64 * self.layout.char_width;
        let y = line_s as f64 * self.layout.line_height;
        if sel.is_collapsed() {
            return Some(Rect::new(x, y, 0.0, 0.0));
        }
        let (line_e, col_e) = self.line_col(sel.end());
        if line_s == line_e {
            let width = (col_e - col_s) as f64 * self.layout.char_width;
            Some(Rect::new(x, y, width, self.layout.line_height))
        } else {
            let root = self.root_rect();
            let height = (line_e - line_s + 1) as f64 * self.layout.line_height;
            Some(Rect::new(0.0, y, root.width, height))
        }
    }

    fn root_rect(&self) -> Rect {
        let text = self.tree.text_content(self.tree.root());
        let lines: Vec<usize> = text.split('\n').map(|l| l.chars().count()).collect();
        let widest = lines.iter().copied().max().unwrap_or(0).max(1);
        Rect::new(
            0.0,
            0.0,
            widest as f64 * self.layout.char_width,
            lines.len() as f64 * self.layout.line_height,
        )
    }
}
