//! Grammar definition files
//!
//! Grammars can be written as TOML. Rule order in the file is the rule
//! order of the grammar.
//!
//! ```toml
//! name = "mips"
//!
//! [rules.comment]
//! pattern = '(?m)#.*$'
//! greedy = true
//!
//! [[rules.label]]
//! pattern = '(?m)^\s*\w+(?=:)'
//! alias = "function"
//!
//! [rules.macro]
//! open = '\.macro\b'
//! close = '\.end_macro\b'
//! inside = "mips"
//!
//! [[embed]]
//! open = '\{'
//! close = '\}'
//! language = "mips"
//! ```
//!
//! A rule gives either a `pattern` or an `open`/`close` pair. The pair
//! matches a balanced region the way embeddings do: the opening delimiter
//! is context, the content runs up to the matching close, and `nested`
//! can name a different opener to count inside the region.

use indexmap::IndexMap;
use serde::Deserialize;

use super::grammar::Grammar;
use super::registry::GrammarRegistry;
use super::rules::{Delimiters, Rule};
use crate::error::{HighlightError, Result};

/// A grammar definition file
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct LanguageFile {
    name: String,
    /// Base grammar to layer these rules onto
    #[serde(default)]
    extends: Option<String>,
    #[serde(default)]
    rules: IndexMap<String, RuleDefs>,
    #[serde(default)]
    embed: Vec<EmbedDef>,
}

#[derive(Debug, Deserialize)]
struct GrammarDef {
    #[serde(default)]
    rules: IndexMap<String, RuleDefs>,
}

/// One rule, a list of alternatives, or a bare pattern
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RuleDefs {
    Pattern(String),
    One(RuleDef),
    Many(Vec<RuleDef>),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleDef {
    #[serde(default)]
    pattern: Option<String>,
    #[serde(default)]
    open: Option<String>,
    #[serde(default)]
    close: Option<String>,
    #[serde(default)]
    nested: Option<String>,
    #[serde(default)]
    alias: Option<String>,
    #[serde(default)]
    inside: Option<InsideDef>,
    #[serde(default)]
    greedy: bool,
    #[serde(default)]
    lookbehind: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InsideDef {
    Named(String),
    Inline(GrammarDef),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EmbedDef {
    language: String,
    #[serde(default)]
    tag: Option<String>,
    #[serde(default)]
    open: Option<String>,
    #[serde(default)]
    close: Option<String>,
    #[serde(default)]
    nested: Option<String>,
    /// Rule to install the embedding in front of
    #[serde(default)]
    before: Option<String>,
}

impl LanguageFile {
    /// Compile, register and embed; returns the grammar name
    pub(crate) fn install(self, registry: &mut GrammarRegistry) -> Result<String> {
        let rules = compile_rules(&self.rules)?;
        let grammar = match &self.extends {
            Some(base) => registry.extend(base, &rules)?,
            None => rules,
        };
        registry.register(&self.name, grammar);

        for embed in &self.embed {
            let delimiters = embed.delimiters()?;
            match &embed.before {
                Some(before) => {
                    registry.embed_before(&self.name, before, delimiters, &embed.language)?
                }
                None => registry.embed(&self.name, delimiters, &embed.language)?,
            }
        }
        Ok(self.name)
    }
}

impl EmbedDef {
    fn delimiters(&self) -> Result<Delimiters> {
        let delimiters = match (&self.tag, &self.open, &self.close) {
            (Some(tag), None, None) => Delimiters::tag(tag)?,
            (None, Some(open), Some(close)) => Delimiters::new(open, close)?,
            _ => {
                return Err(HighlightError::Message(format!(
                    "embedding of {} needs either `tag` or both `open` and `close`",
                    self.language
                )))
            }
        };
        with_nested(delimiters, self.nested.as_deref())
    }
}

fn compile_rules(defs: &IndexMap<String, RuleDefs>) -> Result<Grammar> {
    let mut grammar = Grammar::new();
    for (name, def) in defs {
        let rules = match def {
            RuleDefs::Pattern(pattern) => vec![Rule::new(pattern)?],
            RuleDefs::One(def) => vec![def.compile(name)?],
            RuleDefs::Many(defs) => defs
                .iter()
                .map(|def| def.compile(name))
                .collect::<Result<_>>()?,
        };
        grammar.insert(name, rules);
    }
    Ok(grammar)
}

impl RuleDef {
    fn compile(&self, name: &str) -> Result<Rule> {
        let mut rule = match (&self.pattern, &self.open, &self.close) {
            (Some(pattern), None, None) => {
                let mut rule = Rule::new(pattern)?;
                rule.lookbehind = self.lookbehind;
                rule
            }
            // the opening delimiter is always context
            (None, Some(open), Some(close)) => Rule::balanced(with_nested(
                Delimiters::new(open, close)?,
                self.nested.as_deref(),
            )?),
            _ => {
                return Err(HighlightError::Message(format!(
                    "rule {} needs either `pattern` or both `open` and `close`",
                    name
                )))
            }
        };
        rule.alias = self.alias.clone();
        rule.greedy = self.greedy;
        match &self.inside {
            Some(InsideDef::Named(name)) => rule = rule.inside_named(name),
            Some(InsideDef::Inline(def)) => rule = rule.inside(compile_rules(&def.rules)?),
            None => {}
        }
        Ok(rule)
    }
}

fn with_nested(delimiters: Delimiters, nested: Option<&str>) -> Result<Delimiters> {
    match nested {
        Some(pattern) => delimiters.with_nested(pattern),
        None => Ok(delimiters),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::rules::Inside;

    #[test]
    fn test_load_preserves_order() {
        let mut registry = GrammarRegistry::new();
        let name = registry
            .load_toml(
                r#"
name = "asm"

[rules.comment]
pattern = '(?m)#.*$'
greedy = true

[[rules.label]]
pattern = '(?m)^\w+(?=:)'
alias = "function"

[[rules.label]]
pattern = '(,\s*)\w+'
lookbehind = true

[rules.number]
pattern = '\d+'

[rules.block]
pattern = '\[[^\]]*\]'
inside = "asm"
"#,
            )
            .unwrap();
        assert_eq!(name, "asm");

        let grammar = registry.lookup("asm").unwrap();
        let names: Vec<_> = grammar.names().collect();
        assert_eq!(names, vec!["comment", "label", "number", "block"]);
        assert!(grammar.get("comment").unwrap()[0].greedy);
        let labels = grammar.get("label").unwrap();
        assert_eq!(labels.len(), 2);
        assert!(labels[1].lookbehind);
        assert!(matches!(
            &grammar.get("block").unwrap()[0].inside,
            Some(Inside::Named(inner)) if inner == "asm"
        ));
    }

    #[test]
    fn test_bare_patterns_and_inline_inside() {
        let mut registry = GrammarRegistry::new();
        registry
            .load_toml(
                r#"
name = "tiny"

[rules]
punctuation = '[(),]'

[rules.call]
pattern = '\w+\([^)]*\)'

[rules.call.inside.rules]
punctuation = '[(),]'
"#,
            )
            .unwrap();
        let grammar = registry.lookup("tiny").unwrap();
        let call = &grammar.get("call").unwrap()[0];
        match &call.inside {
            Some(Inside::Inline(inner)) => assert!(inner.get("punctuation").is_some()),
            other => panic!("expected inline grammar, got {:?}", other),
        }
    }

    #[test]
    fn test_extends_and_embed() {
        let mut registry = GrammarRegistry::new();
        registry
            .load_toml("name = \"base\"\n[rules.tag]\npattern = '</?\\w+>'\n")
            .unwrap();
        registry
            .load_toml(
                r#"
name = "page"
extends = "base"

[rules.entity]
pattern = '&\w+;'

[[embed]]
tag = "script"
language = "js"

[[embed]]
open = '\{'
close = '\}'
language = "js"
before = "entity"
"#,
            )
            .unwrap();
        let page = registry.lookup("page").unwrap();
        let names: Vec<_> = page.names().collect();
        assert_eq!(names, vec!["script", "tag", "language-js", "entity"]);
    }

    #[test]
    fn test_balanced_rule() {
        let mut registry = GrammarRegistry::new();
        registry
            .load_toml(
                r#"
name = "tmpl"

[rules.expr]
open = '\{'
close = '\}'
alias = "language-expr"

[rules.expr.inside.rules]
punctuation = '[{}()]'
"#,
            )
            .unwrap();
        let grammar = registry.lookup("tmpl").unwrap();
        let expr = &grammar.get("expr").unwrap()[0];
        assert!(expr.lookbehind);

        let text = "a {f({x})} b";
        let found = expr.find(text, 0, text.len()).unwrap();
        assert_eq!(&text[found.content_start..found.end], "f({x})");
    }

    #[test]
    fn test_rule_needs_pattern_or_delimiters() {
        let mut registry = GrammarRegistry::new();
        let err = registry
            .load_toml("name = \"x\"\n[rules.bad]\nopen = '\\{'\npattern = 'a'\n")
            .unwrap_err();
        assert!(matches!(err, HighlightError::Message(m) if m.contains("bad")));

        let err = registry
            .load_toml("name = \"x\"\n[rules.bad]\nalias = \"y\"\n")
            .unwrap_err();
        assert!(matches!(err, HighlightError::Message(_)));
    }

    #[test]
    fn test_extends_unknown_base() {
        let mut registry = GrammarRegistry::new();
        let err = registry
            .load_toml("name = \"x\"\nextends = \"missing\"\n")
            .unwrap_err();
        assert!(matches!(err, HighlightError::GrammarNotFound(_)));
        assert!(!registry.contains("x"));
    }

    #[test]
    fn test_bad_embed_and_bad_toml() {
        let mut registry = GrammarRegistry::new();
        let err = registry
            .load_toml("name = \"x\"\n[[embed]]\nlanguage = \"js\"\nopen = '\\{'\n")
            .unwrap_err();
        assert!(matches!(err, HighlightError::Message(_)));

        let err = registry.load_toml("name = ").unwrap_err();
        assert!(matches!(err, HighlightError::Parse(_)));
    }
}
