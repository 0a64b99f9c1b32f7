//! Core value types: inline formats, format state, offset selections and rects.
//!
//! These carry no reference to a live editing surface and can be stored
//! across event handlers.

use std::ops::Range;

/// One of the four inline formats the markdown dialect can express.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Bold,
    Italic,
    Underline,
    Strikethrough,
}

impl Format {
    /// All formats, in the order format state is queried.
    pub const ALL: [Format; 4] = [
        Format::Bold,
        Format::Italic,
        Format::Underline,
        Format::Strikethrough,
    ];

    /// Markdown delimiter wrapped around formatted content.
    pub fn marker(self) -> &'static str {
        match self {
            Format::Bold => "**",
            Format::Italic => "_",
            Format::Underline => "__",
            Format::Strikethrough => "~~",
        }
    }

    /// Command name, the inverse of [`Format::from_command`].
    pub fn command(self) -> &'static str {
        match self {
            Format::Bold => "bold",
            Format::Italic => "italic",
            Format::Underline => "underline",
            Format::Strikethrough => "strikethrough",
        }
    }

    /// Classify a host tag name (`b`, `strong`, `em`, ...) as a format.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "b" | "strong" => Some(Format::Bold),
            "i" | "em" => Some(Format::Italic),
            "u" | "ins" => Some(Format::Underline),
            "s" | "strike" | "del" => Some(Format::Strikethrough),
            _ => None,
        }
    }

    /// Parse a command name as issued by a toolbar or host binding.
    pub fn from_command(command: &str) -> Option<Self> {
        match command {
            "bold" => Some(Format::Bold),
            "italic" => Some(Format::Italic),
            "underline" => Some(Format::Underline),
            "strikethrough" | "strikeThrough" => Some(Format::Strikethrough),
            _ => None,
        }
    }
}

/// Which inline formats are active at a range.
///
/// Also used as the classification result for inline `style` attributes,
/// so the serializer's wrapping rules stay independent of how a format
/// was expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FormatState {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
}

impl FormatState {
    pub fn get(&self, format: Format) -> bool {
        match format {
            Format::Bold => self.bold,
            Format::Italic => self.italic,
            Format::Underline => self.underline,
            Format::Strikethrough => self.strikethrough,
        }
    }

    pub fn set(&mut self, format: Format, on: bool) {
        match format {
            Format::Bold => self.bold = on,
            Format::Italic => self.italic = on,
            Format::Underline => self.underline = on,
            Format::Strikethrough => self.strikethrough = on,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.bold || self.italic || self.underline || self.strikethrough)
    }

    /// Classify an inline `style` attribute value.
    ///
    /// Recognizes `font-weight` (`bold`, `bolder`, numeric >= 600),
    /// `font-style` (`italic`, `oblique`) and `text-decoration` /
    /// `text-decoration-line` (`underline`, `line-through`).
    pub fn from_style(style: &str) -> Self {
        let mut state = Self::default();
        for decl in style.split(';') {
            let Some((prop, value)) = decl.split_once(':') else {
                continue;
            };
            let prop = prop.trim().to_ascii_lowercase();
            let value = value.trim().to_ascii_lowercase();
            match prop.as_str() {
                "font-weight" => {
                    state.bold = match value.as_str() {
                        "bold" | "bolder" => true,
                        other => other.parse::<u32>().map(|w| w >= 600).unwrap_or(false),
                    };
                }
                "font-style" => {
                    state.italic = value.starts_with("italic") || value.starts_with("oblique");
                }
                "text-decoration" | "text-decoration-line" => {
                    state.underline |= value.contains("underline");
                    state.strikethrough |= value.contains("line-through");
                }
                _ => {}
            }
        }
        state
    }

    /// Render back to a `style` attribute value, `None` when nothing is set.
    pub fn to_style(&self) -> Option<String> {
        let mut decls = Vec::new();
        if self.bold {
            decls.push("font-weight: bold".to_string());
        }
        if self.italic {
            decls.push("font-style: italic".to_string());
        }
        let decoration: Vec<&str> = [
            (self.underline, "underline"),
            (self.strikethrough, "line-through"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect();
        if !decoration.is_empty() {
            decls.push(format!("text-decoration: {}", decoration.join(" ")));
        }
        if decls.is_empty() {
            None
        } else {
            Some(decls.join("; "))
        }
    }
}

/// Text selection with anchor and head positions, in flat char offsets.
///
/// This is the persistable form of a caret: it stays meaningful after the
/// markup tree is regenerated, unlike a node-based range.
#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub struct Selection {
    /// Where selection started
    pub anchor: usize,
    /// Where cursor is now
    pub head: usize,
}

impl Selection {
    pub fn new(anchor: usize, head: usize) -> Self {
        Self { anchor, head }
    }

    /// Create a collapsed selection (cursor position).
    pub fn collapsed(offset: usize) -> Self {
        Self {
            anchor: offset,
            head: offset,
        }
    }

    pub fn start(&self) -> usize {
        self.anchor.min(self.head)
    }

    pub fn end(&self) -> usize {
        self.anchor.max(self.head)
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.head
    }

    /// Clamp both ends to a document length.
    pub fn clamp(self, len: usize) -> Self {
        Self {
            anchor: self.anchor.min(len),
            head: self.head.min(len),
        }
    }

    pub fn to_range(&self) -> Range<usize> {
        self.start()..self.end()
    }
}

/// Screen rectangle, relative to the editable root.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A rect with no area in either dimension (collapsed or detached range).
    pub fn is_zero_sized(&self) -> bool {
        self.width == 0.0 && self.height == 0.0
    }

    /// Whether all coordinates are finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_classification() {
        let state = FormatState::from_style("font-weight: 700; font-style: italic");
        assert!(state.bold);
        assert!(state.italic);
        assert!(!state.underline);

        let state = FormatState::from_style("text-decoration: underline line-through");
        assert!(state.underline);
        assert!(state.strikethrough);
        assert!(!state.bold);

        let state = FormatState::from_style("font-weight: 400; color: red");
        assert!(state.is_empty());
    }

    #[test]
    fn test_style_roundtrip() {
        let state = FormatState {
            bold: true,
            underline: true,
            ..Default::default()
        };
        let style = state.to_style().unwrap();
        assert_eq!(FormatState::from_style(&style), state);
        assert_eq!(FormatState::default().to_style(), None);
    }

    #[test]
    fn test_format_from_tag() {
        assert_eq!(Format::from_tag("STRONG"), Some(Format::Bold));
        assert_eq!(Format::from_tag("em"), Some(Format::Italic));
        assert_eq!(Format::from_tag("del"), Some(Format::Strikethrough));
        assert_eq!(Format::from_tag("span"), None);
    }

    #[test]
    fn test_selection_bounds() {
        let sel = Selection::new(10, 5);
        assert_eq!(sel.start(), 5);
        assert_eq!(sel.end(), 10);
        assert_eq!(sel.to_range(), 5..10);
        assert_eq!(sel.clamp(7), Selection::new(7, 5));
        assert!(Selection::collapsed(3).is_collapsed());
    }

    #[test]
    fn test_rect_zero_sized() {
        assert!(Rect::default().is_zero_sized());
        assert!(!Rect::new(0.0, 0.0, 0.0, 18.0).is_zero_sized());
        assert!(!Rect::new(f64::NAN, 0.0, 1.0, 1.0).is_finite());
    }
}
