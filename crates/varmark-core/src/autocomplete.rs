//! `{name}` token autocomplete.
//!
//! A session opens when a `{` is typed (or the insert-variable command puts
//! one at the caret) and tracks the text typed after it. Typing `}` or
//! whitespace, moving the caret out of the brace's text node, `Escape`,
//! committing a candidate, or blur (after a grace window) ends it.

use std::time::Duration;

use smol_str::SmolStr;
use web_time::Instant;

use crate::actions::InputEvent;
use crate::surface::EditingSurface;
use crate::tree::{DomRange, NodeKind, Position};
use crate::types::Rect;

/// Source of variable names offered as candidates.
///
/// Polled on every filter, so the list may change between keystrokes.
pub trait VariableProvider {
    /// Ordered, duplicate-free names.
    fn variables(&self) -> Vec<SmolStr>;
}

impl VariableProvider for Vec<SmolStr> {
    fn variables(&self) -> Vec<SmolStr> {
        self.clone()
    }
}

impl VariableProvider for Vec<String> {
    fn variables(&self) -> Vec<SmolStr> {
        self.iter().map(SmolStr::new).collect()
    }
}

impl VariableProvider for [&str] {
    fn variables(&self) -> Vec<SmolStr> {
        self.iter().map(|s| SmolStr::new(s)).collect()
    }
}

impl<T: VariableProvider + ?Sized> VariableProvider for &T {
    fn variables(&self) -> Vec<SmolStr> {
        (**self).variables()
    }
}

/// Provider backed by a closure.
pub struct VariablesFn<F>(pub F);

impl<F> VariableProvider for VariablesFn<F>
where
    F: Fn() -> Vec<SmolStr>,
{
    fn variables(&self) -> Vec<SmolStr> {
        (self.0)()
    }
}

/// Where a host should render the candidate dropdown, relative to the
/// editable root.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DropdownAnchor {
    pub top: f64,
    pub left: f64,
    /// The rect the position was derived from.
    pub rect: Rect,
}

impl DropdownAnchor {
    /// Below the anchor range, or below the root when the range has no
    /// usable rect.
    pub fn compute<S: EditingSurface + ?Sized>(surface: &S, anchor: &DomRange) -> Self {
        let rect = surface
            .range_rect(anchor)
            .filter(|r| r.is_finite() && !r.is_zero_sized())
            .unwrap_or_else(|| surface.root_rect());
        Self {
            top: rect.bottom(),
            left: rect.x,
            rect,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Covers the `{` that opened the session.
    pub anchor: DomRange,
    pub search: String,
    pub highlighted: usize,
    pub position: DropdownAnchor,
    /// Deferred teardown deadline set on blur.
    pub closing_at: Option<Instant>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum AutocompleteState {
    #[default]
    Idle,
    Open(Session),
}

/// Why a session ended. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Escape,
    Committed,
    Blur,
    /// `}` or whitespace typed after the brace.
    Disqualified,
    /// Caret left the token or the selection became unusable.
    CaretMoved,
    /// The view was regenerated from a new value.
    Reset,
}

#[derive(Debug, Clone)]
pub struct Autocomplete {
    state: AutocompleteState,
    grace: Duration,
    max_candidates: usize,
}

impl Default for Autocomplete {
    fn default() -> Self {
        Self::new(Duration::from_millis(150), 50)
    }
}

impl Autocomplete {
    pub fn new(grace: Duration, max_candidates: usize) -> Self {
        Self {
            state: AutocompleteState::Idle,
            grace,
            max_candidates,
        }
    }

    pub fn state(&self) -> &AutocompleteState {
        &self.state
    }

    pub fn session(&self) -> Option<&Session> {
        match &self.state {
            AutocompleteState::Open(session) => Some(session),
            AutocompleteState::Idle => None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.session().is_some()
    }

    pub fn search(&self) -> Option<&str> {
        self.session().map(|s| s.search.as_str())
    }

    pub fn position(&self) -> Option<DropdownAnchor> {
        self.session().map(|s| s.position)
    }

    pub fn highlighted(&self) -> Option<usize> {
        self.session().map(|s| s.highlighted)
    }

    /// Open a session on the `{` directly before the caret. Returns false
    /// (and stays idle) when there is no such brace or no usable caret.
    pub fn open<S: EditingSurface + ?Sized>(&mut self, surface: &S) -> bool {
        let Some(caret) = caret_in_text(surface) else {
            self.close(CloseReason::CaretMoved);
            return false;
        };
        let NodeKind::Text(text) = surface.tree().kind(caret.node) else {
            return false;
        };
        if caret.offset == 0 || text.chars().nth(caret.offset - 1) != Some('{') {
            self.close(CloseReason::CaretMoved);
            return false;
        }
        let anchor = DomRange::new(Position::new(caret.node, caret.offset - 1), caret);
        let position = DropdownAnchor::compute(surface, &anchor);
        tracing::debug!(target: "varmark::autocomplete", top = position.top, left = position.left, "session opened");
        self.state = AutocompleteState::Open(Session {
            anchor,
            search: String::new(),
            highlighted: 0,
            position,
            closing_at: None,
        });
        true
    }

    /// Feed an input event the surface has already applied.
    pub fn on_input<S: EditingSurface + ?Sized>(&mut self, surface: &S, event: &InputEvent) {
        if event.is_open_brace() {
            self.open(surface);
            return;
        }
        if !self.is_open() {
            return;
        }
        let kind = &event.input_type;
        if kind.is_insertion() || kind.is_deletion() || kind.format().is_some() {
            self.refresh(surface);
        } else {
            // Undo/redo or anything unrecognized may have rewritten the
            // token wholesale.
            self.close(CloseReason::Reset);
        }
    }

    /// Re-derive the search from the caret. Closes the session when the
    /// caret has left the token or the search is disqualified.
    pub fn refresh<S: EditingSurface + ?Sized>(&mut self, surface: &S) {
        let AutocompleteState::Open(session) = &mut self.state else {
            return;
        };
        let Some(caret) = caret_in_text(surface) else {
            self.close(CloseReason::CaretMoved);
            return;
        };
        let anchor = session.anchor;
        let NodeKind::Text(text) = surface.tree().kind(caret.node) else {
            self.close(CloseReason::CaretMoved);
            return;
        };
        let brace_intact = text.chars().nth(anchor.start.offset) == Some('{');
        if caret.node != anchor.end.node || caret.offset < anchor.end.offset || !brace_intact {
            self.close(CloseReason::CaretMoved);
            return;
        }
        let search: String = text
            .chars()
            .skip(anchor.end.offset)
            .take(caret.offset - anchor.end.offset)
            .collect();
        if search.chars().any(|c| c == '}' || c.is_whitespace()) {
            self.close(CloseReason::Disqualified);
            return;
        }
        if search != session.search {
            session.highlighted = 0;
        }
        session.search = search;
        session.position = DropdownAnchor::compute(surface, &anchor);
        tracing::trace!(target: "varmark::autocomplete", search = %session.search, "search updated");
    }

    /// Candidates for the current search, capped at the configured maximum.
    pub fn candidates<P: VariableProvider + ?Sized>(&self, provider: &P) -> Vec<SmolStr> {
        let Some(search) = self.search() else {
            return Vec::new();
        };
        filter_candidates(&provider.variables(), search, self.max_candidates)
    }

    /// Move the highlighted candidate by `delta`, wrapping at both ends.
    pub fn move_highlight(&mut self, delta: isize, candidate_count: usize) {
        let AutocompleteState::Open(session) = &mut self.state else {
            return;
        };
        if candidate_count == 0 {
            session.highlighted = 0;
            return;
        }
        let count = candidate_count as isize;
        let current = (session.highlighted as isize).min(count - 1);
        session.highlighted = (current + delta).rem_euclid(count) as usize;
    }

    /// Replace the open `{search` before the caret with a variable token and
    /// put the caret right after it. Done as one tree edit. Without an open
    /// brace the token replaces the selection instead. Returns the new
    /// caret, or `None` when there is no selection inside the root.
    pub fn commit<S: EditingSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        name: &str,
    ) -> Option<Position> {
        self.close(CloseReason::Committed);
        let range = surface
            .selection()
            .filter(|range| surface.contains_range(range))?;
        let text_caret = caret_in_text(surface);

        let tree = surface.tree_mut();
        let variable = match text_caret {
            Some(caret) => {
                let brace = match tree.kind(caret.node) {
                    NodeKind::Text(text) => find_open_brace(text, caret.offset),
                    _ => None,
                };
                match brace {
                    Some(start) => tree.replace_text_span(
                        caret.node,
                        start..caret.offset,
                        NodeKind::variable(name),
                    )?,
                    None => tree.insert_at(caret, NodeKind::variable(name)),
                }
            }
            None => {
                let caret = if range.is_collapsed() {
                    range.start
                } else {
                    tree.delete_range(&range)
                };
                tree.insert_at(caret, NodeKind::variable(name))
            }
        };
        let after = tree.position_after(variable);
        surface.set_selection(Some(DomRange::caret(after)));
        tracing::debug!(target: "varmark::autocomplete", name, "variable committed");
        Some(after)
    }

    /// Start the blur grace window.
    pub fn schedule_close(&mut self, now: Instant) {
        let grace = self.grace;
        if let AutocompleteState::Open(session) = &mut self.state {
            session.closing_at = Some(now + grace);
        }
    }

    /// Focus came back before the grace window ran out.
    pub fn cancel_scheduled_close(&mut self) {
        if let AutocompleteState::Open(session) = &mut self.state {
            session.closing_at = None;
        }
    }

    /// Close the session if its blur deadline has passed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let expired = self
            .session()
            .and_then(|s| s.closing_at)
            .is_some_and(|deadline| now >= deadline);
        if expired {
            self.close(CloseReason::Blur);
        }
        expired
    }

    pub fn close(&mut self, reason: CloseReason) {
        if self.is_open() {
            tracing::debug!(target: "varmark::autocomplete", ?reason, "session closed");
        }
        self.state = AutocompleteState::Idle;
    }
}

/// The collapsed caret, normalized into a text node when possible.
fn caret_in_text<S: EditingSurface + ?Sized>(surface: &S) -> Option<Position> {
    let range = surface.selection()?;
    if !surface.contains_range(&range) || !range.is_collapsed() {
        return None;
    }
    let tree = surface.tree();
    let offset = tree.position_to_offset(range.end)?;
    let pos = tree.offset_to_position(offset);
    matches!(tree.kind(pos.node), NodeKind::Text(_)).then_some(pos)
}

/// Case-insensitive substring filter, preserving provider order.
pub fn filter_candidates(names: &[SmolStr], search: &str, limit: usize) -> Vec<SmolStr> {
    let needle = search.to_lowercase();
    names
        .iter()
        .filter(|name| name.to_lowercase().contains(&needle))
        .take(limit)
        .cloned()
        .collect()
}

/// Char index of the `{` opening the token being typed at `caret` (a char
/// offset into `text`).
///
/// The brace must not be escaped with `\`, and nothing between it and the
/// caret may be `}` or whitespace; otherwise there is no open token.
pub fn find_open_brace(text: &str, caret: usize) -> Option<usize> {
    let chars: Vec<char> = text.chars().take(caret).collect();
    for i in (0..chars.len()).rev() {
        match chars[i] {
            '{' if i > 0 && chars[i - 1] == '\\' => return None,
            '{' => return Some(i),
            '}' => return None,
            c if c.is_whitespace() => return None,
            _ => {}
        }
    }
    None
}

/// String form of a token commit: replace the open `{search` before `caret`
/// (char offset) with `{name}`, or insert `{name}` at the caret when there
/// is none. Returns the new markdown and the caret after the closing brace.
pub fn splice_variable(markdown: &str, caret: usize, name: &str) -> (String, usize) {
    let caret = caret.min(markdown.chars().count());
    let start = find_open_brace(markdown, caret).unwrap_or(caret);
    let token = format!("{{{name}}}");
    let mut out: String = markdown.chars().take(start).collect();
    out.push_str(&token);
    out.extend(markdown.chars().skip(caret));
    (out, start + token.chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::InputType;
    use crate::memory::MemorySurface;
    use crate::serialize::serialize;

    fn type_into(surface: &mut MemorySurface, ac: &mut Autocomplete, text: &str) {
        for c in text.chars() {
            let s = c.to_string();
            surface.type_text(&s);
            ac.on_input(surface, &InputEvent::text(s.as_str()));
        }
    }

    #[test]
    fn test_session_lifecycle() {
        let mut surface = MemorySurface::from_markdown("Hi ");
        surface.place_caret(3);
        let mut ac = Autocomplete::default();

        type_into(&mut surface, &mut ac, "{");
        assert_eq!(ac.search(), Some(""));

        type_into(&mut surface, &mut ac, "ab");
        assert_eq!(ac.search(), Some("ab"));

        type_into(&mut surface, &mut ac, "}");
        assert!(!ac.is_open());
        assert_eq!(serialize(surface.tree()), "Hi {ab}");
    }

    #[test]
    fn test_whitespace_closes_session() {
        let mut surface = MemorySurface::default();
        let mut ac = Autocomplete::default();
        type_into(&mut surface, &mut ac, "{a");
        assert!(ac.is_open());
        type_into(&mut surface, &mut ac, " ");
        assert!(!ac.is_open());
    }

    #[test]
    fn test_caret_leaving_token_closes() {
        let mut surface = MemorySurface::from_markdown("x ");
        surface.place_caret(2);
        let mut ac = Autocomplete::default();
        type_into(&mut surface, &mut ac, "{ab");
        surface.place_caret(1);
        ac.refresh(&surface);
        assert!(!ac.is_open());
    }

    #[test]
    fn test_commit_replaces_search() {
        let mut surface = MemorySurface::from_markdown("Hi ");
        surface.place_caret(3);
        let mut ac = Autocomplete::default();
        type_into(&mut surface, &mut ac, "{ab");

        let caret = ac.commit(&mut surface, "x").unwrap();
        assert!(!ac.is_open());
        assert_eq!(serialize(surface.tree()), "Hi {x}");
        assert_eq!(surface.tree().position_to_offset(caret), Some(6));
        assert_eq!(surface.selection_offsets().map(|s| s.head), Some(6));
    }

    #[test]
    fn test_commit_outside_text_inserts_at_caret() {
        let mut surface = MemorySurface::default();
        surface.place_caret(0);
        let mut ac = Autocomplete::default();
        let caret = ac.commit(&mut surface, "name").unwrap();
        assert_eq!(serialize(surface.tree()), "{name}");
        assert_eq!(surface.tree().position_to_offset(caret), Some(6));

        // Caret right after a trailing variable.
        let mut surface = MemorySurface::from_markdown("Hi {x}");
        surface.place_caret(6);
        ac.commit(&mut surface, "y").unwrap();
        assert_eq!(serialize(surface.tree()), "Hi {x}{y}");
        assert_eq!(surface.selection_offsets().map(|s| s.head), Some(9));

        // A non-collapsed selection is replaced.
        let mut surface = MemorySurface::from_markdown("a **bc** d");
        surface.select(2, 4);
        ac.commit(&mut surface, "v").unwrap();
        assert_eq!(serialize(surface.tree()), "a {v} d");

        surface.select_outside();
        assert_eq!(ac.commit(&mut surface, "v"), None);
    }

    #[test]
    fn test_history_input_closes_session() {
        let mut surface = MemorySurface::from_markdown("Hi ");
        surface.place_caret(3);
        let mut ac = Autocomplete::default();
        type_into(&mut surface, &mut ac, "{a");
        ac.on_input(&surface, &InputEvent::new(InputType::FormatBold, None));
        assert!(ac.is_open());
        ac.on_input(&surface, &InputEvent::new(InputType::HistoryUndo, None));
        assert!(!ac.is_open());
    }

    #[test]
    fn test_deleting_the_brace_closes_session() {
        let mut surface = MemorySurface::from_markdown("Hi ");
        surface.place_caret(3);
        let mut ac = Autocomplete::default();
        type_into(&mut surface, &mut ac, "{");
        surface.select(3, 4);
        surface.type_text("");
        ac.on_input(&surface, &InputEvent::delete_backward());
        assert!(!ac.is_open());
    }

    #[test]
    fn test_candidates_filter_and_cap() {
        let provider = vec![
            "order_id".to_string(),
            "ORDER_total".to_string(),
            "customer".to_string(),
        ];
        let mut surface = MemorySurface::default();
        let mut ac = Autocomplete::new(Duration::from_millis(150), 1);
        type_into(&mut surface, &mut ac, "{Ord");
        assert_eq!(ac.candidates(&provider), vec![SmolStr::new("order_id")]);

        let all = filter_candidates(&provider.variables(), "order", 10);
        assert_eq!(all.len(), 2);
        assert_eq!(filter_candidates(&provider.variables(), "", 10).len(), 3);

        let dynamic = VariablesFn(|| vec![SmolStr::new("later")]);
        assert_eq!(filter_candidates(&dynamic.variables(), "LAT", 10).len(), 1);
    }

    #[test]
    fn test_highlight_wraps() {
        let mut surface = MemorySurface::default();
        let mut ac = Autocomplete::default();
        type_into(&mut surface, &mut ac, "{");
        ac.move_highlight(-1, 3);
        assert_eq!(ac.highlighted(), Some(2));
        ac.move_highlight(1, 3);
        assert_eq!(ac.highlighted(), Some(0));
        ac.move_highlight(4, 3);
        assert_eq!(ac.highlighted(), Some(1));
    }

    #[test]
    fn test_blur_grace_window() {
        let mut surface = MemorySurface::default();
        let mut ac = Autocomplete::default();
        type_into(&mut surface, &mut ac, "{");

        let now = Instant::now();
        ac.schedule_close(now);
        assert!(!ac.tick(now + Duration::from_millis(100)));
        assert!(ac.is_open());
        assert!(ac.tick(now + Duration::from_millis(150)));
        assert!(!ac.is_open());

        type_into(&mut surface, &mut ac, "{");
        ac.schedule_close(now);
        ac.cancel_scheduled_close();
        assert!(!ac.tick(now + Duration::from_secs(1)));
        assert!(ac.is_open());
    }

    #[test]
    fn test_dropdown_position() {
        let mut surface = MemorySurface::from_markdown("ab");
        surface.place_caret(2);
        let mut ac = Autocomplete::default();
        type_into(&mut surface, &mut ac, "{");
        let pos = ac.position().unwrap();
        assert_eq!(pos.left, 16.0);
        assert_eq!(pos.top, 18.0);

        // A collapsed anchor has no size and falls back to the root.
        let caret = surface.selection().unwrap();
        let fallback = DropdownAnchor::compute(&surface, &caret);
        assert_eq!(fallback.rect, surface.root_rect());
    }

    #[test]
    fn test_open_without_brace_stays_idle() {
        let mut surface = MemorySurface::from_markdown("abc");
        surface.place_caret(3);
        let mut ac = Autocomplete::default();
        assert!(!ac.open(&surface));
        surface.select_outside();
        ac.on_input(&surface, &InputEvent::text("{"));
        assert!(!ac.is_open());
    }

    #[test]
    fn test_find_open_brace() {
        assert_eq!(find_open_brace("Hi {ab", 6), Some(3));
        assert_eq!(find_open_brace("Hi {ab", 4), Some(3));
        assert_eq!(find_open_brace("{a} b", 5), None);
        assert_eq!(find_open_brace("a \\{b", 5), None);
        assert_eq!(find_open_brace("\\{x {y", 6), Some(4));
        assert_eq!(find_open_brace("no brace", 8), None);
    }

    #[test]
    fn test_splice_variable() {
        assert_eq!(
            splice_variable("Track {ord now", 10, "order_id"),
            ("Track {order_id} now".to_string(), 16)
        );
        assert_eq!(
            splice_variable("Hello ", 6, "name"),
            ("Hello {name}".to_string(), 12)
        );
    }
}
