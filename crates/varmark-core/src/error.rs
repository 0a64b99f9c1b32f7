//! Error types for the editing core.
//!
//! The façade itself never returns these for ordinary editing; they surface
//! only from explicitly fallible calls (link commits, config loading) and
//! from surface implementations that cannot answer a query.

use miette::Diagnostic;
use thiserror::Error;

/// Errors from committing a link annotation.
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
#[non_exhaustive]
pub enum LinkError {
    /// The href does not start with `https://` after trimming.
    #[error("link target must start with https:// (got {0:?})")]
    #[diagnostic(code(varmark::link::insecure_href))]
    InsecureHref(String),

    /// The href contains whitespace or parentheses, which the markdown link
    /// form cannot carry.
    #[error("link target {0:?} cannot be written as markdown")]
    #[diagnostic(
        code(varmark::link::malformed_href),
        help("percent-encode spaces and parentheses")
    )]
    MalformedHref(String),

    /// The label contains `]` or a line break.
    #[error("link label cannot contain `]` or line breaks")]
    #[diagnostic(code(varmark::link::invalid_label))]
    InvalidLabel,

    /// The label is empty.
    #[error("link label is empty")]
    #[diagnostic(code(varmark::link::empty_label))]
    EmptyLabel,

    /// No link session is open, or its target no longer exists.
    #[error("no link edit in progress")]
    #[diagnostic(code(varmark::link::no_selection))]
    NoSelection,
}

/// Errors from a live editing surface.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SurfaceError {
    /// The environment cannot answer format queries or run format commands.
    #[error("format command {0:?} is not supported by this surface")]
    Unsupported(&'static str),

    /// The surface has no usable selection.
    #[error("no selection available")]
    NoSelection,
}

/// Errors from loading or saving configuration.
#[derive(Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to read config file")]
    #[diagnostic(code(varmark::config::io))]
    Io(#[from] std::io::Error),

    #[error("invalid TOML config")]
    #[diagnostic(code(varmark::config::toml))]
    Toml(#[from] toml::de::Error),

    #[error("failed to write TOML config")]
    #[diagnostic(code(varmark::config::toml))]
    TomlWrite(#[from] toml::ser::Error),

    #[error("invalid JSON config")]
    #[diagnostic(code(varmark::config::json))]
    Json(#[from] serde_json::Error),

    #[error("unsupported config format {0:?}")]
    #[diagnostic(
        code(varmark::config::format),
        help("use a .toml or .json file")
    )]
    UnsupportedFormat(String),
}
