//! Configuration file support
//!
//! Loads settings from ~/.glint.toml (or %USERPROFILE%\.glint.toml on Windows)
//!
//! Example:
//! ```toml
//! # glint configuration
//! fence = "~~~"
//! case-insensitive = true
//! enabled = true
//! grammar-dir = "/home/me/.config/glint/grammars"
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Result;
use crate::syntax::DEFAULT_FENCE;

/// Configuration settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Delimiter opening and closing a fenced block
    pub fence: String,
    /// Whether the language id after the fence ignores case
    pub case_insensitive: bool,
    /// Whether highlighting is enabled
    pub enabled: bool,
    /// Directory of extra grammar files
    pub grammar_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fence: DEFAULT_FENCE.to_string(),
            case_insensitive: true,
            enabled: true,
            grammar_dir: None,
        }
    }
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        #[cfg(windows)]
        {
            std::env::var("USERPROFILE")
                .ok()
                .map(|home| PathBuf::from(home).join(".glint.toml"))
        }

        #[cfg(not(windows))]
        {
            std::env::var("HOME")
                .ok()
                .map(|home| PathBuf::from(home).join(".glint.toml"))
        }
    }

    /// Load configuration from the default location, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Config::default();
        };
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("ignoring config {}: {}", path.display(), e);
                Config::default()
            }
        }
    }

    /// Load configuration from a file; a missing file gives the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Config::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Parse config file contents
    pub fn parse(contents: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(contents)?;
        config.sanitize();
        Ok(config)
    }

    fn sanitize(&mut self) {
        if self.fence.trim().is_empty() {
            self.fence = DEFAULT_FENCE.to_string();
        }
    }
}
