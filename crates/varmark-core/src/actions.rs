//! Input events, keys and the editor actions they map to.
//!
//! Platform code converts native events (`beforeinput`, `keydown`) into
//! these types; the editor never sees a platform event directly.

use std::collections::HashMap;

use smol_str::SmolStr;

use crate::types::Format;

/// Semantic input types from input events.
///
/// A subset of the W3C Input Events types: the ones a single-block inline
/// editor receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputType {
    /// Insert typed text.
    InsertText,
    /// Insert text from IME composition.
    InsertCompositionText,
    /// Insert a line break (Shift+Enter).
    InsertLineBreak,
    InsertFromPaste,
    /// Spell check correction and similar.
    InsertReplacementText,

    DeleteContentBackward,
    DeleteContentForward,
    DeleteWordBackward,
    DeleteByCut,

    /// Native undo/redo. History lives in the surface, the editor only
    /// re-serializes afterwards.
    HistoryUndo,
    HistoryRedo,

    FormatBold,
    FormatItalic,
    FormatUnderline,
    FormatStrikethrough,

    /// Unrecognized input type.
    Unknown(String),
}

impl InputType {
    /// Whether this input type is a deletion operation.
    pub fn is_deletion(&self) -> bool {
        matches!(
            self,
            Self::DeleteContentBackward
                | Self::DeleteContentForward
                | Self::DeleteWordBackward
                | Self::DeleteByCut
        )
    }

    /// Whether this input type is an insertion operation.
    pub fn is_insertion(&self) -> bool {
        matches!(
            self,
            Self::InsertText
                | Self::InsertCompositionText
                | Self::InsertLineBreak
                | Self::InsertFromPaste
                | Self::InsertReplacementText
        )
    }

    pub fn is_history(&self) -> bool {
        matches!(self, Self::HistoryUndo | Self::HistoryRedo)
    }

    pub fn format(&self) -> Option<Format> {
        match self {
            Self::FormatBold => Some(Format::Bold),
            Self::FormatItalic => Some(Format::Italic),
            Self::FormatUnderline => Some(Format::Underline),
            Self::FormatStrikethrough => Some(Format::Strikethrough),
            _ => None,
        }
    }
}

/// An input event after the surface has applied it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputEvent {
    pub input_type: InputType,
    /// Inserted text, for insertions that carry any.
    pub data: Option<SmolStr>,
}

impl InputEvent {
    pub fn new(input_type: InputType, data: Option<SmolStr>) -> Self {
        Self { input_type, data }
    }

    /// Typed text.
    pub fn text(data: impl Into<SmolStr>) -> Self {
        Self::new(InputType::InsertText, Some(data.into()))
    }

    pub fn delete_backward() -> Self {
        Self::new(InputType::DeleteContentBackward, None)
    }

    /// Whether this event typed exactly one `{`.
    pub fn is_open_brace(&self) -> bool {
        self.input_type == InputType::InsertText && self.data.as_deref() == Some("{")
    }
}

/// Key values for keyboard input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// A character key.
    Character(SmolStr),

    /// Unknown/unidentified key.
    Unidentified,

    Backspace,
    Delete,
    Enter,
    Tab,
    Escape,
    Space,

    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
    Home,
    End,
    PageUp,
    PageDown,

    Alt,
    Control,
    Meta,
    Shift,
}

impl Key {
    /// Create a character key.
    pub fn character(s: impl Into<SmolStr>) -> Self {
        Self::Character(s.into())
    }

    /// Parse a DOM `KeyboardEvent.key` value.
    pub fn from_name(name: &str) -> Self {
        match name {
            "Backspace" => Self::Backspace,
            "Delete" => Self::Delete,
            "Enter" => Self::Enter,
            "Tab" => Self::Tab,
            "Escape" | "Esc" => Self::Escape,
            " " => Self::Space,
            "ArrowLeft" => Self::ArrowLeft,
            "ArrowRight" => Self::ArrowRight,
            "ArrowUp" => Self::ArrowUp,
            "ArrowDown" => Self::ArrowDown,
            "Home" => Self::Home,
            "End" => Self::End,
            "PageUp" => Self::PageUp,
            "PageDown" => Self::PageDown,
            "Alt" => Self::Alt,
            "Control" => Self::Control,
            "Meta" => Self::Meta,
            "Shift" => Self::Shift,
            other if other.chars().count() == 1 => Self::character(other.to_lowercase()),
            _ => Self::Unidentified,
        }
    }

    /// Check if this is a navigation key.
    pub fn is_navigation(&self) -> bool {
        matches!(
            self,
            Self::ArrowLeft
                | Self::ArrowRight
                | Self::ArrowUp
                | Self::ArrowDown
                | Self::Home
                | Self::End
                | Self::PageUp
                | Self::PageDown
        )
    }

    /// Check if this is a modifier key.
    pub fn is_modifier(&self) -> bool {
        matches!(self, Self::Alt | Self::Control | Self::Meta | Self::Shift)
    }
}

/// Modifier key state for a key combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        ctrl: false,
        alt: false,
        shift: false,
        meta: false,
    };

    pub const CTRL: Self = Self {
        ctrl: true,
        ..Self::NONE
    };

    pub const META: Self = Self {
        meta: true,
        ..Self::NONE
    };

    pub const CTRL_SHIFT: Self = Self {
        ctrl: true,
        shift: true,
        ..Self::NONE
    };

    pub const META_SHIFT: Self = Self {
        meta: true,
        shift: true,
        ..Self::NONE
    };

    /// Get the primary modifier for the platform (Cmd on Mac, Ctrl elsewhere).
    pub fn primary(is_mac: bool) -> Self {
        if is_mac { Self::META } else { Self::CTRL }
    }

    /// Get the primary modifier + Shift for the platform.
    pub fn primary_shift(is_mac: bool) -> Self {
        if is_mac {
            Self::META_SHIFT
        } else {
            Self::CTRL_SHIFT
        }
    }
}

/// A key combination for triggering an action.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyCombo {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyCombo {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn with_modifiers(key: Key, modifiers: Modifiers) -> Self {
        Self { key, modifiers }
    }

    pub fn primary(key: Key, is_mac: bool) -> Self {
        Self::with_modifiers(key, Modifiers::primary(is_mac))
    }

    pub fn primary_shift(key: Key, is_mac: bool) -> Self {
        Self::with_modifiers(key, Modifiers::primary_shift(is_mac))
    }
}

/// Commands the editor runs in response to key bindings or host calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorAction {
    /// Toggle an inline format over the selection.
    ToggleFormat(Format),
    /// Open the link form for the selection.
    EditLink,
    /// Start a variable token at the caret.
    InsertVariable,
}

/// Maps key combinations to editor actions.
#[derive(Debug, Clone, Default)]
pub struct Keybindings {
    bindings: HashMap<KeyCombo, EditorAction>,
}

impl Keybindings {
    /// Primary+B/I/U, Primary+Shift+X and Primary+K.
    pub fn default_for_platform(is_mac: bool) -> Self {
        let mut bindings = Self::default();
        for (key, format) in [
            ("b", Format::Bold),
            ("i", Format::Italic),
            ("u", Format::Underline),
        ] {
            bindings.bind(
                KeyCombo::primary(Key::character(key), is_mac),
                EditorAction::ToggleFormat(format),
            );
        }
        bindings.bind(
            KeyCombo::primary_shift(Key::character("x"), is_mac),
            EditorAction::ToggleFormat(Format::Strikethrough),
        );
        bindings.bind(
            KeyCombo::primary(Key::character("k"), is_mac),
            EditorAction::EditLink,
        );
        bindings
    }

    pub fn bind(&mut self, combo: KeyCombo, action: EditorAction) {
        self.bindings.insert(combo, action);
    }

    pub fn lookup(&self, combo: &KeyCombo) -> Option<EditorAction> {
        self.bindings.get(combo).copied()
    }
}

/// Result of handling a keydown event.
#[derive(Debug, Clone, PartialEq)]
pub enum KeydownResult {
    /// Event was handled, prevent default.
    Handled,
    /// Event was not a keybinding, let platform handle it.
    NotHandled,
    /// Event should be passed through (navigation, etc.).
    PassThrough,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bindings() {
        let bindings = Keybindings::default_for_platform(false);
        assert_eq!(
            bindings.lookup(&KeyCombo::primary(Key::character("b"), false)),
            Some(EditorAction::ToggleFormat(Format::Bold))
        );
        assert_eq!(
            bindings.lookup(&KeyCombo::primary_shift(Key::character("x"), false)),
            Some(EditorAction::ToggleFormat(Format::Strikethrough))
        );
        // Cmd bindings don't fire on non-mac layouts.
        assert_eq!(
            bindings.lookup(&KeyCombo::primary(Key::character("b"), true)),
            None
        );
        assert_eq!(bindings.lookup(&KeyCombo::new(Key::character("b"))), None);
    }

    #[test]
    fn test_key_from_name() {
        assert_eq!(Key::from_name("B"), Key::character("b"));
        assert_eq!(Key::from_name("Escape"), Key::Escape);
        assert_eq!(Key::from_name("F13"), Key::Unidentified);
        assert!(Key::from_name("ArrowDown").is_navigation());
    }

    #[test]
    fn test_input_classification() {
        assert!(InputType::DeleteByCut.is_deletion());
        assert!(InputType::InsertFromPaste.is_insertion());
        assert!(InputType::HistoryRedo.is_history());
        assert_eq!(
            InputType::FormatStrikethrough.format(),
            Some(Format::Strikethrough)
        );
        assert_eq!(InputType::InsertText.format(), None);
        assert!(InputEvent::text("{").is_open_brace());
        assert!(!InputEvent::text("{a").is_open_brace());
        assert!(!InputEvent::delete_backward().is_open_brace());
    }

    #[test]
    fn test_custom_binding() {
        let mut bindings = Keybindings::default_for_platform(true);
        let combo = KeyCombo::with_modifiers(Key::character("v"), Modifiers::META_SHIFT);
        bindings.bind(combo.clone(), EditorAction::InsertVariable);
        assert_eq!(bindings.lookup(&combo), Some(EditorAction::InsertVariable));
        assert_eq!(
            bindings.lookup(&KeyCombo::primary(Key::character("k"), true)),
            Some(EditorAction::EditLink)
        );
    }
}
