//! Grammars: ordered sets of named rules
//!
//! Rule order is significant. When two rules match at the same offset the
//! one declared first wins, so every operation here keeps the existing
//! order of names and only appends names it introduces.

use indexmap::IndexMap;

use super::rules::Rule;

/// Named, ordered set of tokenization rules for one language
#[derive(Debug, Clone, Default)]
pub struct Grammar {
    rules: IndexMap<String, Vec<Rule>>,
}

impl Grammar {
    /// Create an empty grammar
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add or replace a rule
    pub fn with(mut self, name: &str, rule: Rule) -> Self {
        self.insert(name, vec![rule]);
        self
    }

    /// Builder: add or replace a rule with alternatives tried in order
    pub fn with_alternatives(mut self, name: &str, rules: Vec<Rule>) -> Self {
        self.insert(name, rules);
        self
    }

    /// Insert rules under `name`
    ///
    /// An existing name keeps its position and adopts the new rules; a new
    /// name is appended.
    pub fn insert(&mut self, name: &str, rules: Vec<Rule>) {
        self.rules.insert(name.to_string(), rules);
    }

    /// Insert rules under `name` ahead of every other rule
    pub fn insert_first(&mut self, name: &str, rules: Vec<Rule>) {
        self.rules.shift_remove(name);
        self.rules.shift_insert(0, name.to_string(), rules);
    }

    /// Insert rules under `name` right before the rule named `before`
    ///
    /// Appends when `before` does not exist. A name that is already present
    /// is moved to the new position.
    pub fn insert_before(&mut self, before: &str, name: &str, rules: Vec<Rule>) {
        self.rules.shift_remove(name);
        match self.rules.get_index_of(before) {
            Some(index) => {
                self.rules.shift_insert(index, name.to_string(), rules);
            }
            None => {
                self.rules.insert(name.to_string(), rules);
            }
        }
    }

    /// Remove a rule, keeping the order of the rest
    pub fn remove(&mut self, name: &str) -> Option<Vec<Rule>> {
        self.rules.shift_remove(name)
    }

    /// Get the alternatives registered under `name`
    pub fn get(&self, name: &str) -> Option<&[Rule]> {
        self.rules.get(name).map(|rules| rules.as_slice())
    }

    /// Build a new grammar by layering `overrides` onto a copy of this one
    pub fn extended(&self, overrides: &Grammar) -> Grammar {
        let mut grammar = self.clone();
        for (name, rules) in &overrides.rules {
            grammar.insert(name, rules.clone());
        }
        grammar
    }

    /// Rule names in declaration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(|name| name.as_str())
    }

    /// Every rule with its name, in the order they are tried
    pub fn rules(&self) -> impl Iterator<Item = (&str, &Rule)> {
        self.rules
            .iter()
            .flat_map(|(name, rules)| rules.iter().map(move |rule| (name.as_str(), rule)))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
