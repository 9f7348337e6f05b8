//! Highlighting engine
//!
//! Ties block extraction, tokenization and projection together. An engine
//! holds no document state; every call is a pure function of its inputs.

use super::fence::{CodeBlock, FenceScanner};
use super::projector::project;
use super::registry::GrammarRegistry;
use super::style::{sort_ranges, EntityTitle, RangeTransform, StyleRange};
use super::tokenizer::tokenize;
use crate::config::Config;
use crate::error::Result;

/// Computes style ranges for blocks and documents
pub struct Engine {
    fence: String,
    case_insensitive: bool,
    enabled: bool,
    transforms: Vec<Box<dyn RangeTransform>>,
}

impl Engine {
    /// Create an engine with the default transforms
    pub fn new(config: &Config) -> Self {
        Self {
            fence: config.fence.clone(),
            case_insensitive: config.case_insensitive,
            enabled: config.enabled,
            transforms: vec![Box::new(EntityTitle)],
        }
    }

    /// Builder: append a transform
    pub fn with_transform(mut self, transform: impl RangeTransform + 'static) -> Self {
        self.transforms.push(Box::new(transform));
        self
    }

    /// Builder: drop all transforms
    pub fn without_transforms(mut self) -> Self {
        self.transforms.clear();
        self
    }

    /// Scanner for fenced blocks of `language_id`
    pub fn scanner(&self, language_id: &str) -> Result<FenceScanner> {
        FenceScanner::new(&self.fence, language_id, self.case_insensitive)
    }

    /// Highlight a standalone piece of code; offsets start at 0
    pub fn highlight_block(
        &self,
        registry: &GrammarRegistry,
        text: &str,
        language_id: &str,
    ) -> Result<Vec<StyleRange>> {
        let grammar = registry.lookup(language_id)?;
        let tree = tokenize(text, &grammar, registry)?;
        Ok(self.transform(text, project(&tree, 0)))
    }

    /// Highlight a fenced block; offsets refer to `document`
    pub fn highlight_code_block(
        &self,
        registry: &GrammarRegistry,
        block: &CodeBlock,
        document: &str,
    ) -> Result<Vec<StyleRange>> {
        let grammar = registry.lookup(&block.language_id)?;
        let tree = tokenize(&block.raw_text, &grammar, registry)?;
        Ok(self.transform(document, project(&tree, block.document_offset)))
    }

    /// Highlight every fenced block of every language in `languages`
    ///
    /// A language that fails (unknown grammar, bad embedding) is skipped
    /// and the others still contribute.
    pub fn highlight_document(
        &self,
        registry: &GrammarRegistry,
        languages: &[String],
        document: &str,
    ) -> Vec<StyleRange> {
        let mut ranges = Vec::new();
        if !self.enabled {
            return ranges;
        }
        for language in languages {
            match self.highlight_language(registry, language, document) {
                Ok(found) => ranges.extend(found),
                Err(e) => tracing::warn!("skipping {} blocks: {}", language, e),
            }
        }
        sort_ranges(&mut ranges);
        ranges
    }

    fn highlight_language(
        &self,
        registry: &GrammarRegistry,
        language_id: &str,
        document: &str,
    ) -> Result<Vec<StyleRange>> {
        let scanner = self.scanner(language_id)?;
        let mut ranges = Vec::new();
        for block in scanner.blocks(document) {
            ranges.extend(self.highlight_code_block(registry, &block, document)?);
        }
        Ok(ranges)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn transform(&self, source: &str, mut ranges: Vec<StyleRange>) -> Vec<StyleRange> {
        for transform in &self.transforms {
            ranges = transform.apply(source, ranges);
        }
        ranges
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

/// Acquires an engine; runs on a worker thread
pub trait EngineLoader: Send + Sync + 'static {
    fn load(&self) -> Result<Engine>;
}

impl<F> EngineLoader for F
where
    F: Fn() -> Result<Engine> + Send + Sync + 'static,
{
    fn load(&self) -> Result<Engine> {
        self()
    }
}

/// Builds an engine straight from a `Config`
#[derive(Debug, Clone, Default)]
pub struct BuiltinLoader {
    pub config: Config,
}

impl BuiltinLoader {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl EngineLoader for BuiltinLoader {
    fn load(&self) -> Result<Engine> {
        Ok(Engine::new(&self.config))
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("fence", &self.fence)
            .field("case_insensitive", &self.case_insensitive)
            .field("enabled", &self.enabled)
            .field("transforms", &self.transforms.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HighlightError;
    use crate::syntax::grammar::Grammar;
    use crate::syntax::rules::Rule;

    fn registry() -> GrammarRegistry {
        let mut registry = GrammarRegistry::new();
        registry.register(
            "mips",
            Grammar::new()
                .with("register", Rule::new(r"\$[a-z0-9]+").unwrap())
                .with("instruction", Rule::new(r"(?m)^\s*\badd\b").unwrap()),
        );
        registry.register(
            "html",
            Grammar::new().with("entity", Rule::new(r"&[a-z]+;").unwrap()),
        );
        registry
    }

    #[test]
    fn test_highlight_block() {
        let ranges = Engine::default()
            .highlight_block(&registry(), "add $t0", "mips")
            .unwrap();
        assert_eq!(
            ranges,
            vec![
                StyleRange::new(0, 3, "instruction"),
                StyleRange::new(4, 7, "register"),
            ]
        );
    }

    #[test]
    fn test_highlight_block_unknown_language() {
        let err = Engine::default()
            .highlight_block(&registry(), "x", "python")
            .unwrap_err();
        assert!(matches!(err, HighlightError::GrammarNotFound(_)));
    }

    #[test]
    fn test_document_offsets() {
        let doc = "before\n```mips\nadd $t0 $t1 $t2\n```\nafter $t9";
        let ranges =
            Engine::default().highlight_document(&registry(), &["mips".to_string()], doc);
        let registers: Vec<_> = ranges
            .iter()
            .filter(|r| r.tag == "register")
            .map(|r| &doc[r.start..r.end])
            .collect();
        assert_eq!(registers, vec!["$t0", "$t1", "$t2"]);
        assert!(ranges.iter().any(|r| &doc[r.start..r.end] == "add"));
    }

    #[test]
    fn test_unknown_language_is_skipped() {
        let doc = "```mips\n$a0\n```\n```python\nx\n```";
        let languages = vec!["python".to_string(), "mips".to_string()];
        let ranges = Engine::default().highlight_document(&registry(), &languages, doc);
        assert_eq!(ranges.len(), 1);
        assert_eq!(&doc[ranges[0].start..ranges[0].end], "$a0");
    }

    #[test]
    fn test_entity_title_uses_document() {
        let doc = "x\n```html\n&amp;\n```";
        let ranges = Engine::default().highlight_document(&registry(), &["html".to_string()], doc);
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].title.as_deref(), Some("&"));

        let ranges = Engine::default()
            .without_transforms()
            .highlight_document(&registry(), &["html".to_string()], doc);
        assert_eq!(ranges[0].title, None);
    }

    #[test]
    fn test_disabled_engine() {
        let config = Config {
            enabled: false,
            ..Config::default()
        };
        let engine = Engine::new(&config);
        assert!(!engine.is_enabled());
        let doc = "```mips\n$a0\n```";
        assert!(engine
            .highlight_document(&registry(), &["mips".to_string()], doc)
            .is_empty());
    }

    #[test]
    fn test_loaders() {
        let config = Config {
            enabled: false,
            ..Config::default()
        };
        assert!(!BuiltinLoader::new(config).load().unwrap().is_enabled());

        let failing = || -> Result<Engine> { Err(HighlightError::EngineUnavailable("gone".into())) };
        assert!(matches!(
            failing.load(),
            Err(HighlightError::EngineUnavailable(_))
        ));
    }
}
