//! Error types for glint

use thiserror::Error;

/// Result type alias for glint operations
pub type Result<T> = std::result::Result<T, HighlightError>;

/// Highlighting error types
#[derive(Error, Debug)]
pub enum HighlightError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Grammar not found: {0}")]
    GrammarNotFound(String),

    #[error("Invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: Box<fancy_regex::Error>,
    },

    #[error("Invalid fence delimiter: {0}")]
    InvalidFence(#[from] regex::Error),

    #[error("Highlighting engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{0}")]
    Message(String),
}

impl HighlightError {
    pub(crate) fn invalid_pattern(pattern: &str, source: fancy_regex::Error) -> Self {
        HighlightError::InvalidPattern {
            pattern: pattern.to_string(),
            source: Box::new(source),
        }
    }
}
