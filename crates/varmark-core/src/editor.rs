//! The editor façade: markdown in, markdown out.
//!
//! The markdown value is the only document. The surface's tree is derived
//! from it on every external update, and every edit made in the surface is
//! serialized straight back into a new value and reported through the
//! change callback.

use smol_str::SmolStr;
use web_time::Instant;

use crate::actions::{EditorAction, InputEvent, Key, KeyCombo, KeydownResult, Keybindings};
use crate::autocomplete::{Autocomplete, CloseReason, DropdownAnchor, VariableProvider};
use crate::compile::compile;
use crate::config::EditorConfig;
use crate::error::LinkError;
use crate::link::{self, LinkAttrs, LinkSeed};
use crate::selection::SelectionTracker;
use crate::serialize::serialize;
use crate::surface::EditingSurface;
use crate::tree::DomRange;
use crate::types::{Format, FormatState, Selection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusState {
    #[default]
    Blurred,
    Focused,
}

/// Payload of the blur callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlurEvent {
    /// The value at the moment focus left.
    pub markdown: String,
}

type ChangeCallback = Box<dyn FnMut(&str)>;
type BlurCallback = Box<dyn FnMut(&BlurEvent)>;

pub struct Editor<S: EditingSurface, P: VariableProvider> {
    surface: S,
    provider: P,
    config: EditorConfig,
    keybindings: Keybindings,

    value: String,
    /// Value this editor just emitted; the next `set_value` with it is our
    /// own echo and must not re-render.
    suppress: Option<String>,

    focus: FocusState,
    selection: SelectionTracker,
    format_state: FormatState,
    autocomplete: Autocomplete,
    link: Option<LinkSeed>,

    on_change: Option<ChangeCallback>,
    on_blur: Option<BlurCallback>,
}

impl<S: EditingSurface, P: VariableProvider> Editor<S, P> {
    pub fn new(mut surface: S, provider: P, config: EditorConfig) -> Self {
        surface.replace_tree(compile(""));
        let autocomplete = Autocomplete::new(config.blur_grace(), config.max_candidates);
        Self {
            surface,
            provider,
            config,
            keybindings: Keybindings::default_for_platform(false),
            value: String::new(),
            suppress: None,
            focus: FocusState::Blurred,
            selection: SelectionTracker::new(),
            format_state: FormatState::default(),
            autocomplete,
            link: None,
            on_change: None,
            on_blur: None,
        }
    }

    pub fn with_keybindings(mut self, keybindings: Keybindings) -> Self {
        self.keybindings = keybindings;
        self
    }

    pub fn set_on_change(&mut self, callback: impl FnMut(&str) + 'static) {
        self.on_change = Some(Box::new(callback));
    }

    pub fn set_on_blur(&mut self, callback: impl FnMut(&BlurEvent) + 'static) {
        self.on_blur = Some(Box::new(callback));
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Direct access for hosts that drive the surface themselves. Report
    /// the resulting edits through [`Editor::input`].
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn focus_state(&self) -> FocusState {
        self.focus
    }

    pub fn format_state(&self) -> FormatState {
        self.format_state
    }

    /// The last selection captured inside the editor.
    pub fn saved_selection(&self) -> Option<Selection> {
        self.selection.saved()
    }

    /// Text for the host to show while the document is empty.
    pub fn placeholder(&self) -> Option<&str> {
        (self.value.is_empty() && !self.config.placeholder.is_empty())
            .then_some(self.config.placeholder.as_str())
    }

    pub fn class_name(&self) -> Option<&str> {
        self.config.class_name.as_deref()
    }

    // === External updates ===

    /// Accept a new value from the host.
    ///
    /// The value this editor emitted last is recognized once and skipped, so
    /// echoing a change back does not rebuild the view under the caret.
    /// An unchanged value is a no-op.
    pub fn set_value(&mut self, markdown: &str) {
        if let Some(echo) = self.suppress.take() {
            if echo == markdown {
                tracing::trace!(target: "varmark::editor", "ignoring echo of emitted value");
                return;
            }
        }
        if markdown == self.value {
            return;
        }
        self.value = markdown.to_string();
        self.render();
    }

    /// Rebuild the view from the current value.
    fn render(&mut self) {
        self.surface.replace_tree(compile(&self.value));
        self.link = None;
        self.autocomplete.close(CloseReason::Reset);
        if self.focus == FocusState::Focused {
            self.selection.restore_saved(&mut self.surface);
        }
        tracing::debug!(target: "varmark::editor", len = self.value.len(), "rendered value");
    }

    // === Focus ===

    /// Move focus into the editor, re-asserting the saved selection.
    pub fn focus(&mut self) {
        self.surface.focus();
        self.focus = FocusState::Focused;
        if !self.live_selection_in_root() {
            self.selection.restore_saved(&mut self.surface);
        }
        self.autocomplete.cancel_scheduled_close();
        self.refresh_format_state();
    }

    /// Focus left the editor. Autocomplete teardown waits for the grace
    /// window so a click on the dropdown can still land.
    pub fn blur(&mut self, now: Instant) {
        if self.focus == FocusState::Blurred {
            return;
        }
        self.focus = FocusState::Blurred;
        self.format_state = FormatState::default();
        self.autocomplete.schedule_close(now);
        let event = BlurEvent {
            markdown: self.value.clone(),
        };
        if let Some(callback) = self.on_blur.as_mut() {
            callback(&event);
        }
    }

    /// Drive deferred work (blur grace window).
    pub fn tick(&mut self, now: Instant) {
        self.autocomplete.tick(now);
    }

    // === Surface events ===

    /// The global selection changed. Ignored unless it lies in the editor.
    pub fn selection_changed(&mut self) {
        if self.selection.save(&self.surface).is_none() {
            return;
        }
        self.autocomplete.refresh(&self.surface);
        self.refresh_format_state();
    }

    /// An input event the surface is about to apply. Native format
    /// commands are taken over so they go through the same toggle as the
    /// keybindings; everything else is left to the surface.
    pub fn before_input(&mut self, event: &InputEvent) -> KeydownResult {
        match event.input_type.format() {
            Some(format) => {
                self.apply_format(format);
                KeydownResult::Handled
            }
            None => KeydownResult::PassThrough,
        }
    }

    /// The surface applied an input event.
    pub fn input(&mut self, event: &InputEvent) {
        if event.input_type.is_history() {
            // Undo may have removed or rebuilt the link being edited.
            self.cancel_link();
        }
        self.selection.save(&self.surface);
        self.autocomplete.on_input(&self.surface, event);
        self.refresh_format_state();
        self.emit_change();
    }

    pub fn keydown(&mut self, combo: &KeyCombo) -> KeydownResult {
        if self.autocomplete.is_open() {
            match combo.key {
                Key::ArrowDown => {
                    let count = self.candidates().len();
                    self.autocomplete.move_highlight(1, count);
                    return KeydownResult::Handled;
                }
                Key::ArrowUp => {
                    let count = self.candidates().len();
                    self.autocomplete.move_highlight(-1, count);
                    return KeydownResult::Handled;
                }
                Key::Enter | Key::Tab => {
                    let index = self.autocomplete.highlighted().unwrap_or(0);
                    if self.select_candidate(index) {
                        return KeydownResult::Handled;
                    }
                }
                Key::Escape => {
                    self.autocomplete.close(CloseReason::Escape);
                    return KeydownResult::Handled;
                }
                _ => {}
            }
        }

        if combo.key == Key::Escape && self.link.is_some() {
            self.cancel_link();
            return KeydownResult::Handled;
        }

        if let Some(action) = self.keybindings.lookup(combo) {
            self.run_action(action);
            return KeydownResult::Handled;
        }

        if combo.key.is_navigation() || combo.key.is_modifier() {
            return KeydownResult::PassThrough;
        }
        KeydownResult::NotHandled
    }

    pub fn run_action(&mut self, action: EditorAction) {
        match action {
            EditorAction::ToggleFormat(format) => self.apply_format(format),
            EditorAction::EditLink => {
                self.open_link();
            }
            EditorAction::InsertVariable => self.insert_variable(),
        }
    }

    // === Commands ===

    /// Toggle an inline format over the saved selection.
    pub fn apply_format(&mut self, format: Format) {
        self.reassert_selection();
        if let Err(err) = self.surface.exec_format(format) {
            tracing::debug!(target: "varmark::editor", %err, "format command failed");
            return;
        }
        self.selection.save(&self.surface);
        self.refresh_format_state();
        self.emit_change();
    }

    /// Toggle a format by command name (`bold`, `italic`, `underline`,
    /// `strikethrough`). Returns false for unknown names.
    pub fn apply_command(&mut self, command: &str) -> bool {
        match Format::from_command(command) {
            Some(format) => {
                self.apply_format(format);
                true
            }
            None => false,
        }
    }

    /// Put a `{` at the caret and open the autocomplete on it.
    pub fn insert_variable(&mut self) {
        let range = self.reassert_selection();
        let tree = self.surface.tree_mut();
        let caret = if range.is_collapsed() {
            range.start
        } else {
            tree.delete_range(&range)
        };
        let after = tree.insert_text_at(caret, "{");
        self.surface.set_selection(Some(DomRange::caret(after)));
        self.selection.save(&self.surface);
        self.autocomplete.open(&self.surface);
        self.emit_change();
    }

    // === Autocomplete ===

    pub fn candidates(&self) -> Vec<SmolStr> {
        self.autocomplete.candidates(&self.provider)
    }

    pub fn is_autocomplete_open(&self) -> bool {
        self.autocomplete.is_open()
    }

    pub fn autocomplete_search(&self) -> Option<&str> {
        self.autocomplete.search()
    }

    pub fn autocomplete_anchor(&self) -> Option<DropdownAnchor> {
        self.autocomplete.position()
    }

    pub fn highlighted_candidate(&self) -> Option<usize> {
        self.autocomplete.highlighted()
    }

    /// Commit the candidate at `index`. Returns false if there is none.
    pub fn select_candidate(&mut self, index: usize) -> bool {
        let Some(name) = self.candidates().get(index).cloned() else {
            return false;
        };
        self.commit_variable(&name)
    }

    /// Replace the open token with `{name}`.
    pub fn commit_variable(&mut self, name: &str) -> bool {
        if !self.live_selection_in_root() {
            self.selection.restore_saved(&mut self.surface);
        }
        if self.autocomplete.commit(&mut self.surface, name).is_none() {
            return false;
        }
        self.selection.save(&self.surface);
        self.emit_change();
        true
    }

    // === Links ===

    /// Start a link edit for the current (or saved) selection.
    pub fn open_link(&mut self) -> Option<&LinkSeed> {
        let range = self.reassert_selection();
        self.link = link::open(&self.surface, range);
        self.link.as_ref()
    }

    pub fn link_session(&self) -> Option<&LinkSeed> {
        self.link.as_ref()
    }

    pub fn can_commit_link(&self, label: &str, href: &str) -> bool {
        self.link.is_some() && link::can_commit(label, href)
    }

    /// Commit the open link edit. A rejected pair leaves the document and
    /// the session untouched.
    pub fn apply_link(&mut self, label: &str, href: &str) -> Result<(), LinkError> {
        let seed = self.link.clone().ok_or(LinkError::NoSelection)?;
        let attrs = LinkAttrs {
            target: self.config.link_target.clone(),
            rel: self.config.link_rel.clone(),
        };
        link::apply(&mut self.surface, &seed, label, href, &attrs)?;
        self.link = None;
        self.selection.save(&self.surface);
        self.emit_change();
        Ok(())
    }

    pub fn cancel_link(&mut self) {
        if self.link.take().is_some() {
            tracing::debug!(target: "varmark::link", "link edit cancelled");
        }
    }

    // === Internals ===

    fn live_selection_in_root(&self) -> bool {
        self.surface
            .selection()
            .is_some_and(|range| self.surface.contains_range(&range))
    }

    /// Make sure the live selection is inside the editor, falling back to
    /// the saved selection and then to the end of the document.
    fn reassert_selection(&mut self) -> DomRange {
        if let Some(range) = self.surface.selection() {
            if self.surface.contains_range(&range) {
                return range;
            }
        }
        let range = self.selection.saved_range(&self.surface).unwrap_or_else(|| {
            let tree = self.surface.tree();
            tree.selection_to_range(Selection::collapsed(tree.flat_len(tree.root())))
        });
        self.selection.restore(&mut self.surface, range);
        range
    }

    fn refresh_format_state(&mut self) {
        if self.focus != FocusState::Focused {
            self.format_state = FormatState::default();
            return;
        }
        self.format_state = self.selection.query_format_state(&mut self.surface, None);
    }

    /// Serialize the view and report it if it changed.
    fn emit_change(&mut self) {
        let next = serialize(self.surface.tree());
        if next == self.value {
            tracing::trace!(target: "varmark::editor", "edit produced no change");
            return;
        }
        self.value = next;
        self.suppress = Some(self.value.clone());
        tracing::debug!(target: "varmark::editor", len = self.value.len(), "emitting change");
        if let Some(callback) = self.on_change.as_mut() {
            callback(&self.value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySurface;

    use std::cell::RefCell;
    use std::rc::Rc;

    fn editor(markdown: &str) -> (Editor<MemorySurface, Vec<String>>, Rc<RefCell<Vec<String>>>) {
        let mut editor = Editor::new(
            MemorySurface::default(),
            vec!["order_id".to_string(), "name".to_string()],
            EditorConfig::default(),
        );
        editor.set_value(markdown);
        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = changes.clone();
        editor.set_on_change(move |md| sink.borrow_mut().push(md.to_string()));
        (editor, changes)
    }

    #[test]
    fn test_echo_is_suppressed_once() {
        let (mut editor, changes) = editor("hello");
        editor.focus();
        editor.surface_mut().place_caret(5);
        editor.surface_mut().type_text("!");
        editor.input(&InputEvent::text("!"));
        assert_eq!(changes.borrow().as_slice(), ["hello!"]);

        let tree_before = editor.surface().tree().clone();
        let caret_before = editor.surface().selection();
        editor.set_value("hello!");
        // Same node ids and caret: the view was not rebuilt.
        assert_eq!(editor.surface().tree(), &tree_before);
        assert_eq!(editor.surface().selection(), caret_before);
    }

    #[test]
    fn test_external_update_rerenders_and_restores_caret() {
        let (mut editor, changes) = editor("hello world");
        editor.focus();
        editor.surface_mut().place_caret(3);
        editor.selection_changed();

        editor.set_value("**hi** there");
        assert!(changes.borrow().is_empty());
        assert_eq!(editor.value(), "**hi** there");
        assert_eq!(
            editor.surface().selection_offsets(),
            Some(Selection::collapsed(3))
        );
    }

    #[test]
    fn test_placeholder_only_when_empty() {
        let config = EditorConfig {
            placeholder: "Say something".into(),
            class_name: Some("composer".into()),
            ..Default::default()
        };
        let mut editor = Editor::new(MemorySurface::default(), Vec::<String>::new(), config);
        assert_eq!(editor.placeholder(), Some("Say something"));
        assert_eq!(editor.class_name(), Some("composer"));
        editor.set_value("x");
        assert_eq!(editor.placeholder(), None);
    }

    #[test]
    fn test_blur_clears_format_state_and_reports() {
        let (mut editor, _) = editor("**bold**");
        let blurred = Rc::new(RefCell::new(None));
        let sink = blurred.clone();
        editor.set_on_blur(move |event| *sink.borrow_mut() = Some(event.markdown.clone()));

        editor.focus();
        editor.surface_mut().place_caret(2);
        editor.selection_changed();
        assert!(editor.format_state().bold);

        editor.blur(Instant::now());
        assert_eq!(editor.focus_state(), FocusState::Blurred);
        assert!(editor.format_state().is_empty());
        assert_eq!(blurred.borrow().as_deref(), Some("**bold**"));
    }
}
