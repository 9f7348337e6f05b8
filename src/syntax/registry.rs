//! Grammar registry
//!
//! Owns every named grammar. The registry is populated during setup and
//! then only read; tokenization resolves named `inside` references
//! through it, which is what lets a grammar embed itself.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use super::builtin;
use super::grammar::Grammar;
use super::loader::LanguageFile;
use super::rules::{Delimiters, Rule};
use crate::error::{HighlightError, Result};

/// Named grammars available to the tokenizer
#[derive(Debug, Clone, Default)]
pub struct GrammarRegistry {
    grammars: HashMap<String, Arc<Grammar>>,
    /// Bumped on every mutation
    version: u64,
}

impl GrammarRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in grammars
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for (file, source) in builtin::GRAMMAR_FILES {
            if let Err(e) = registry.load_toml(source) {
                tracing::error!("built-in grammar {} failed to load: {}", file, e);
            }
        }
        registry
    }

    /// Insert or replace the grammar under `name`
    pub fn register(&mut self, name: &str, grammar: Grammar) {
        self.grammars.insert(name.to_string(), Arc::new(grammar));
        self.version += 1;
        tracing::debug!("registered grammar {}", name);
    }

    /// Remove a grammar, returning whether it was present
    pub fn remove(&mut self, name: &str) -> bool {
        let removed = self.grammars.remove(name).is_some();
        if removed {
            self.version += 1;
        }
        removed
    }

    /// Look up a grammar by name
    pub fn lookup(&self, name: &str) -> Result<Arc<Grammar>> {
        self.grammars
            .get(name)
            .cloned()
            .ok_or_else(|| HighlightError::GrammarNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.grammars.contains_key(name)
    }

    /// Build a new grammar from `base_name` with `overrides` layered on top
    pub fn extend(&self, base_name: &str, overrides: &Grammar) -> Result<Grammar> {
        Ok(self.lookup(base_name)?.extended(overrides))
    }

    /// Install a rule into `host_name` whose content is tokenized by `inner`
    ///
    /// The rule matches the delimited region with depth counting and is
    /// placed ahead of every other host rule, so it wins over rules that
    /// match the opening delimiter itself. `inner` is resolved only when
    /// tokenization reaches the region; it may name the host grammar or a
    /// grammar registered later.
    pub fn embed(&mut self, host_name: &str, delimiters: Delimiters, inner: &str) -> Result<()> {
        let (name, rule) = embedding_rule(delimiters, inner);
        let mut host = (*self.lookup(host_name)?).clone();
        host.insert_first(&name, vec![rule]);
        self.register(host_name, host);
        Ok(())
    }

    /// Like [`GrammarRegistry::embed`], but places the rule before `before`
    pub fn embed_before(
        &mut self,
        host_name: &str,
        before: &str,
        delimiters: Delimiters,
        inner: &str,
    ) -> Result<()> {
        let (name, rule) = embedding_rule(delimiters, inner);
        self.insert_before(host_name, before, &name, vec![rule])
    }

    /// Insert rules into a registered grammar right before the rule `before`
    pub fn insert_before(
        &mut self,
        host_name: &str,
        before: &str,
        name: &str,
        rules: Vec<Rule>,
    ) -> Result<()> {
        let mut host = (*self.lookup(host_name)?).clone();
        host.insert_before(before, name, rules);
        self.register(host_name, host);
        Ok(())
    }

    /// Load a grammar definition file and register it
    ///
    /// Returns the registered name.
    pub fn load_toml(&mut self, source: &str) -> Result<String> {
        let file: LanguageFile = toml::from_str(source)?;
        file.install(self)
    }

    /// Load every `*.toml` grammar file in a directory, in file name order
    pub fn load_dir(&mut self, dir: &Path) -> Result<Vec<String>> {
        let mut paths: Vec<_> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
            .collect();
        paths.sort();

        let mut names = Vec::new();
        for path in paths {
            let source = fs::read_to_string(&path)?;
            let name = self.load_toml(&source).map_err(|e| {
                HighlightError::Message(format!("{}: {}", path.display(), e))
            })?;
            names.push(name);
        }
        Ok(names)
    }

    /// Registered grammar names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.grammars.keys().map(|s| s.as_str()).collect();
        names.sort();
        names
    }

    /// Mutation counter, used to tell snapshots apart
    pub fn version(&self) -> u64 {
        self.version
    }
}

fn embedding_rule(delimiters: Delimiters, inner: &str) -> (String, Rule) {
    let alias = format!("language-{}", inner);
    let name = delimiters
        .tag_name()
        .map(str::to_string)
        .unwrap_or_else(|| alias.clone());
    let rule = Rule::balanced(delimiters)
        .with_alias(&alias)
        .inside_named(inner)
        .greedy();
    (name, rule)
}
