//! Built-in language definitions
//!
//! Grammars shipped with the crate, stored as grammar files and compiled
//! when a registry is created with [`GrammarRegistry::with_builtins`].
//!
//! [`GrammarRegistry::with_builtins`]: super::registry::GrammarRegistry::with_builtins

/// `(file name, contents)` in load order; a grammar comes after the one it extends
pub const GRAMMAR_FILES: &[(&str, &str)] = &[
    ("javascript.toml", include_str!("javascript.toml")),
    ("css.toml", include_str!("css.toml")),
    ("markup.toml", include_str!("markup.toml")),
    ("svelte.toml", include_str!("svelte.toml")),
    ("mips.toml", include_str!("mips.toml")),
];
