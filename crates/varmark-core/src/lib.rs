//! varmark-core: rich-text editing over a small markdown dialect with
//! `{name}` variable tokens.
//!
//! This crate provides:
//! - `compile` / `serialize` - markdown ↔ markup tree transforms
//! - `MarkupTree` - the arena-backed view tree and its DOM-like positions
//! - `EditingSurface` - the seam for a live editing view, with
//!   `MemorySurface` as the in-process implementation
//! - `SelectionTracker`, `Autocomplete`, `link` - the interactive protocols
//! - `Editor<S, P>` - the façade composing all of the above

pub mod actions;
pub mod autocomplete;
pub mod compile;
pub mod config;
pub mod editor;
pub mod error;
pub mod link;
pub mod memory;
pub mod selection;
pub mod serialize;
pub mod surface;
pub mod tree;
pub mod types;

pub use actions::{
    EditorAction, InputEvent, InputType, Key, KeyCombo, KeydownResult, Keybindings, Modifiers,
};
pub use autocomplete::{
    Autocomplete, AutocompleteState, DropdownAnchor, VariableProvider, VariablesFn,
    find_open_brace, splice_variable,
};
pub use compile::{compile, compile_to_html};
pub use config::{ConfigFile, EditorConfig, LayoutConfig};
pub use editor::{BlurEvent, Editor, FocusState};
pub use error::{ConfigError, LinkError, SurfaceError};
pub use link::{LinkAttrs, LinkSeed, LinkTarget};
pub use memory::MemorySurface;
pub use selection::SelectionTracker;
pub use serialize::{normalize, serialize};
pub use smol_str::SmolStr;
pub use surface::EditingSurface;
pub use tree::{DomRange, MarkupTree, NodeId, NodeKind, Position};
pub use types::{Format, FormatState, Rect, Selection};
