//! Editing surface abstraction.
//!
//! The surface is the live, mutable view the user types into: in a browser
//! it is a contenteditable element plus the global selection. The editing
//! core never owns it; it reads the view, folds edits back into markdown,
//! and regenerates the view from markdown on external updates.
//!
//! [`crate::MemorySurface`] is the in-process implementation.

use crate::error::SurfaceError;
use crate::tree::{DomRange, MarkupTree, NodeId};
use crate::types::{Format, Rect};

/// Platform-specific access to the live editing view.
pub trait EditingSurface {
    /// The current view tree.
    fn tree(&self) -> &MarkupTree;

    /// Mutable access for in-place edits (link mutation, token splicing).
    fn tree_mut(&mut self) -> &mut MarkupTree;

    /// Replace the whole view, as on an external value update. Clears the
    /// live selection, which referred to the old nodes.
    fn replace_tree(&mut self, tree: MarkupTree);

    /// The live selection, which may lie outside the editable root.
    fn selection(&self) -> Option<DomRange>;

    /// Set (or clear) the live selection.
    fn set_selection(&mut self, range: Option<DomRange>);

    fn has_focus(&self) -> bool;

    /// Move input focus into the editable root.
    fn focus(&mut self);

    /// Whether `format` is active at the live selection.
    fn query_format(&self, format: Format) -> Result<bool, SurfaceError>;

    /// Toggle `format` over the live selection using the surface's native
    /// command.
    fn exec_format(&mut self, format: Format) -> Result<(), SurfaceError>;

    /// Bounding rect of a range relative to the editable root. `None` when
    /// the range cannot be measured.
    fn range_rect(&self, range: &DomRange) -> Option<Rect>;

    /// Bounding rect of the editable root itself.
    fn root_rect(&self) -> Rect;

    fn root(&self) -> NodeId {
        self.tree().root()
    }

    /// Whether both ends of a range lie inside the editable root.
    fn contains_range(&self, range: &DomRange) -> bool {
        let tree = self.tree();
        let root = tree.root();
        tree.contains(root, range.start.node) && tree.contains(root, range.end.node)
    }
}
