//! Grammar-driven syntax highlighting
//!
//! The pipeline has four stages:
//! - [`FenceScanner`] finds fenced code blocks in a host document
//! - [`tokenize`] turns text into a tree of tagged tokens using a [`Grammar`]
//! - [`project`] flattens the tree into [`StyleRange`]s over the document
//! - [`HighlightScheduler`] reruns all of it when the document changes and
//!   keeps only the newest result
//!
//! Grammars live in a [`GrammarRegistry`], where they can be extended,
//! embedded into one another and loaded from grammar files.

mod builtin;
mod engine;
mod fence;
mod grammar;
mod loader;
mod projector;
mod registry;
mod rules;
mod scheduler;
mod style;
mod tokenizer;
mod tokens;

pub use engine::{BuiltinLoader, Engine, EngineLoader};
pub use fence::{Blocks, CodeBlock, FenceScanner, DEFAULT_FENCE};
pub use grammar::Grammar;
pub use projector::project;
pub use registry::GrammarRegistry;
pub use rules::{Delimiters, Inside, Matcher, Rule, RuleMatch};
pub use scheduler::{BlockCache, HighlightScheduler, SchedulerMsg, SchedulerState};
pub use style::{sort_ranges, EntityTitle, RangeTransform, StyleRange};
pub use tokenizer::tokenize;
pub use tokens::{Token, TokenTree, TEXT_TAG};
