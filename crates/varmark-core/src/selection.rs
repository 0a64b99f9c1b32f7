//! Selection persistence and format-state queries.
//!
//! Live ranges point at nodes of one particular view tree and go stale as
//! soon as the view is regenerated. The tracker therefore keeps the last
//! in-bounds selection as flat offsets and converts back to a range only
//! when it restores it.

use crate::surface::EditingSurface;
use crate::tree::DomRange;
use crate::types::{Format, FormatState, Selection};

#[derive(Debug, Clone, Default)]
pub struct SelectionTracker {
    saved: Option<Selection>,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last selection captured inside the editable root.
    pub fn saved(&self) -> Option<Selection> {
        self.saved
    }

    /// Capture the live selection if it lies inside the editable root.
    ///
    /// Selections elsewhere leave the saved one untouched, so a toolbar that
    /// briefly takes the selection does not lose the user's place.
    pub fn save<S: EditingSurface + ?Sized>(&mut self, surface: &S) -> Option<DomRange> {
        let range = surface.selection()?;
        if !surface.contains_range(&range) {
            tracing::trace!(target: "varmark::selection", "ignoring selection outside root");
            return None;
        }
        let selection = surface.tree().range_to_selection(&range)?;
        self.saved = Some(selection);
        Some(range)
    }

    /// Make `range` the live selection. A range inside the root also
    /// becomes the saved selection.
    pub fn restore<S: EditingSurface + ?Sized>(&mut self, surface: &mut S, range: DomRange) {
        surface.set_selection(Some(range));
        if surface.contains_range(&range) {
            if let Some(selection) = surface.tree().range_to_selection(&range) {
                self.saved = Some(selection);
            }
        }
    }

    /// Re-apply the saved selection to the current view, clamped to its
    /// length. Returns whether anything was restored.
    pub fn restore_saved<S: EditingSurface + ?Sized>(&mut self, surface: &mut S) -> bool {
        let Some(range) = self.saved_range(surface) else {
            return false;
        };
        self.restore(surface, range);
        true
    }

    /// The saved selection as a range in the current view.
    pub fn saved_range<S: EditingSurface + ?Sized>(&self, surface: &S) -> Option<DomRange> {
        self.saved
            .map(|selection| surface.tree().selection_to_range(selection))
    }

    /// Format state at `range`, or at the saved selection when `None`.
    ///
    /// The range is applied to the live selection only for the duration of
    /// the query; whatever was selected before is put back. Predicates the
    /// surface cannot answer count as inactive.
    pub fn query_format_state<S: EditingSurface + ?Sized>(
        &self,
        surface: &mut S,
        range: Option<DomRange>,
    ) -> FormatState {
        let Some(range) = range.or_else(|| self.saved_range(surface)) else {
            return FormatState::default();
        };
        if !surface.contains_range(&range) {
            return FormatState::default();
        }

        let previous = surface.selection();
        surface.set_selection(Some(range));
        let mut state = FormatState::default();
        for format in Format::ALL {
            match surface.query_format(format) {
                Ok(active) => state.set(format, active),
                Err(err) => {
                    tracing::trace!(
                        target: "varmark::selection",
                        %err,
                        format = format.command(),
                        "format query failed, treating as inactive"
                    );
                }
            }
        }
        surface.set_selection(previous);
        state
    }
}
