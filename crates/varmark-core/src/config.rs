use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Editor configuration. Every field has a default, so partial files load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Shown by hosts while the document is empty.
    pub placeholder: String,
    /// Styling hook passed through to the host.
    pub class_name: Option<String>,
    /// Delay before autocomplete teardown after blur.
    pub blur_grace_ms: u64,
    /// Upper bound on autocomplete candidates.
    pub max_candidates: usize,
    /// `target` attribute for committed links.
    pub link_target: SmolStr,
    /// `rel` attribute for committed links.
    pub link_rel: SmolStr,
    pub layout: LayoutConfig,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            placeholder: String::new(),
            class_name: None,
            blur_grace_ms: 150,
            max_candidates: 50,
            link_target: SmolStr::new_static("_blank"),
            link_rel: SmolStr::new_static("noopener noreferrer"),
            layout: LayoutConfig::default(),
        }
    }
}

/// Fixed-cell metrics for the in-memory surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub char_width: f64,
    pub line_height: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            char_width: 8.0,
            line_height: 18.0,
        }
    }
}

impl EditorConfig {
    /// Load from a `.toml` or `.json` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        ConfigFile::new(path).load()
    }

    pub fn blur_grace(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.blur_grace_ms)
    }
}

/// A config file whose format is picked by extension.
pub struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self) -> Result<EditorConfig, ConfigError> {
        let config = match self.extension()? {
            ConfigFormat::Json => serde_json::from_str(&std::fs::read_to_string(&self.path)?)?,
            ConfigFormat::Toml => toml::from_str(&std::fs::read_to_string(&self.path)?)?,
        };
        tracing::debug!(target: "varmark::config", path = %self.path.display(), "loaded config");
        Ok(config)
    }

    pub fn save(&self, config: &EditorConfig) -> Result<(), ConfigError> {
        let text = match self.extension()? {
            ConfigFormat::Json => serde_json::to_string_pretty(config)?,
            ConfigFormat::Toml => toml::to_string_pretty(config)?,
        };
        std::fs::write(&self.path, text)?;
        Ok(())
    }

    fn extension(&self) -> Result<ConfigFormat, ConfigError> {
        match self.path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(ConfigFormat::Json),
            Some("toml") => Ok(ConfigFormat::Toml),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or_default().to_string(),
            )),
        }
    }
}

enum ConfigFormat {
    Json,
    Toml,
}
