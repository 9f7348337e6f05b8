//! glint - grammar-driven highlighting for fenced code blocks
//!
//! Computes which parts of a document should be styled, and as what. A
//! document embeds code in fenced blocks; every block whose language has
//! a registered grammar is tokenized and projected into [`StyleRange`]s
//! with offsets into the original document. Rendering the ranges is up to
//! the caller.
//!
//! ```
//! use glint::GrammarRegistry;
//!
//! let registry = GrammarRegistry::with_builtins();
//! let ranges = glint::highlight_block(&registry, "add $t0, $t1, $t2", "mips").unwrap();
//! assert_eq!(ranges[0].tag, "keyword");
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod syntax;

pub use config::Config;
pub use error::{HighlightError, Result};
pub use syntax::{
    CodeBlock, Engine, FenceScanner, Grammar, GrammarRegistry, HighlightScheduler, Rule,
    StyleRange,
};

/// Highlight a standalone piece of code with the default configuration
///
/// Offsets in the result start at 0.
pub fn highlight_block(
    registry: &GrammarRegistry,
    text: &str,
    language_id: &str,
) -> Result<Vec<StyleRange>> {
    Engine::default().highlight_block(registry, text, language_id)
}
