//! Grammar-driven tokenizer
//!
//! Scans text left to right. At each step every rule is searched from the
//! cursor in declaration order, the earliest match wins and ties go to the
//! rule declared first. Text before the winning match becomes a plain
//! text token. A rule with an inner grammar has its content tokenized
//! again, so the leaves of the result always partition the input.
//!
//! Nested tokenizations are kept on an explicit stack of frames rather
//! than the call stack, so nesting depth is bounded only by memory.

use std::ops::Deref;
use std::sync::Arc;

use super::grammar::Grammar;
use super::registry::GrammarRegistry;
use super::rules::{Inside, Rule, RuleMatch};
use super::tokens::{push_text, Token, TokenTree};
use crate::error::Result;

/// Tokenize `text` with `grammar`, resolving named inner grammars in `registry`
pub fn tokenize(text: &str, grammar: &Grammar, registry: &GrammarRegistry) -> Result<TokenTree> {
    let root = Frame {
        grammar: FrameGrammar::Root(grammar),
        text,
        cursor: 0,
        tokens: Vec::new(),
        node: None,
    };
    let tokenizer = Tokenizer {
        registry,
        frames: vec![root],
    };
    Ok(TokenTree::new(tokenizer.run()?))
}

/// Grammar driving a frame: the caller's for the root, shared below it
enum FrameGrammar<'a> {
    Root(&'a Grammar),
    Inner(Arc<Grammar>),
}

impl Deref for FrameGrammar<'_> {
    type Target = Grammar;

    fn deref(&self) -> &Grammar {
        match self {
            FrameGrammar::Root(grammar) => grammar,
            FrameGrammar::Inner(grammar) => grammar,
        }
    }
}

/// One tokenization in progress
struct Frame<'a> {
    grammar: FrameGrammar<'a>,
    /// Slice of the root text this frame covers
    text: &'a str,
    cursor: usize,
    tokens: Vec<Token>,
    /// Rule name and alias of the composite this frame becomes, `None` at the root
    node: Option<(String, Option<String>)>,
}

/// A match taken off a frame, owned so the stack can grow
struct Matched<'a> {
    kind: String,
    alias: Option<String>,
    inside: Option<Inside>,
    content: &'a str,
}

/// The rule chosen for the next token
struct Candidate<'g> {
    name: &'g str,
    rule: &'g Rule,
    found: RuleMatch,
}

impl<'a> Frame<'a> {
    /// Consume text up to the next match and return it, `None` once the frame is done
    fn advance(&mut self) -> Option<Matched<'a>> {
        let text = self.text;
        if self.cursor >= text.len() {
            return None;
        }
        let Some(candidate) = next_match(text, self.cursor, &self.grammar) else {
            // nothing matches in the rest of the text
            push_text(&mut self.tokens, &text[self.cursor..]);
            self.cursor = text.len();
            return None;
        };
        let found = candidate.found;
        // the lookbehind prefix joins the text before it
        push_text(&mut self.tokens, &text[self.cursor..found.content_start]);
        self.cursor = found.end;

        Some(Matched {
            kind: candidate.name.to_string(),
            alias: candidate.rule.alias.clone(),
            inside: candidate.rule.inside.clone(),
            content: &text[found.content_start..found.end],
        })
    }
}

struct Tokenizer<'a> {
    registry: &'a GrammarRegistry,
    /// Innermost frame last; never empty while running
    frames: Vec<Frame<'a>>,
}

impl<'a> Tokenizer<'a> {
    fn run(mut self) -> Result<Vec<Token>> {
        loop {
            let Some(frame) = self.frames.last_mut() else {
                return Ok(Vec::new());
            };
            if let Some(matched) = frame.advance() {
                self.enter(matched)?;
                continue;
            }

            let Some(done) = self.frames.pop() else {
                return Ok(Vec::new());
            };
            match (done.node, self.frames.last_mut()) {
                (Some((kind, alias)), Some(parent)) => parent.tokens.push(Token::Composite {
                    kind,
                    alias,
                    children: done.tokens,
                }),
                _ => return Ok(done.tokens),
            }
        }
    }

    /// Emit a leaf for `matched` or open a frame for its inner grammar
    fn enter(&mut self, matched: Matched<'a>) -> Result<()> {
        let inner = match matched.inside {
            None => {
                self.emit_leaf(matched.kind, matched.alias, matched.content);
                return Ok(());
            }
            Some(Inside::Inline(grammar)) => grammar,
            Some(Inside::Named(name)) => self.registry.lookup(&name)?,
        };

        if self.is_repeat(&inner, matched.content.len()) {
            // same grammar over the same text again would never finish
            tracing::debug!(
                "rule {} does not shrink its content, kept as leaf",
                matched.kind
            );
            self.emit_leaf(matched.kind, matched.alias, matched.content);
            return Ok(());
        }

        self.frames.push(Frame {
            grammar: FrameGrammar::Inner(inner),
            text: matched.content,
            cursor: 0,
            tokens: Vec::new(),
            node: Some((matched.kind, matched.alias)),
        });
        Ok(())
    }

    fn emit_leaf(&mut self, kind: String, alias: Option<String>, content: &str) {
        if let Some(frame) = self.frames.last_mut() {
            frame.tokens.push(Token::Leaf {
                kind,
                alias,
                content: content.to_string(),
            });
        }
    }

    /// Whether `grammar` is already tokenizing text of this length
    ///
    /// Content is always a slice of the enclosing text, so equal lengths
    /// along the chain of frames mean identical text.
    fn is_repeat(&self, grammar: &Grammar, len: usize) -> bool {
        self.frames
            .iter()
            .any(|frame| frame.text.len() == len && std::ptr::eq(&*frame.grammar, grammar))
    }
}

/// Pick the rule that produces the next token at or after `cursor`
///
/// A non-greedy rule may not match across the start of a match found for
/// an earlier rule, so its search stops there. Greedy rules search the
/// whole remaining text.
fn next_match<'g>(text: &str, cursor: usize, grammar: &'g Grammar) -> Option<Candidate<'g>> {
    let mut best: Option<Candidate<'g>> = None;
    let mut limit = text.len();

    for (name, rule) in grammar.rules() {
        let bound = if rule.greedy { text.len() } else { limit };
        let Some(found) = rule.find(text, cursor, bound) else {
            continue;
        };
        let earlier = best.as_ref().map_or(true, |b| found.start < b.found.start);
        if earlier {
            best = Some(Candidate { name, rule, found });
        }
        limit = limit.min(found.start);
        if found.start == cursor {
            // nothing declared later can start earlier or win the tie
            break;
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::rules::Delimiters;

    fn rule(pattern: &str) -> Rule {
        Rule::new(pattern).unwrap()
    }

    fn leaf(kind: &str, content: &str) -> Token {
        Token::Leaf {
            kind: kind.to_string(),
            alias: None,
            content: content.to_string(),
        }
    }

    fn text(content: &str) -> Token {
        Token::Text(content.to_string())
    }

    fn assert_covers(tree: &TokenTree, input: &str) {
        let joined: String = tree.leaves().iter().map(|t| t.text()).collect();
        assert_eq!(joined, input);
        assert_eq!(tree.len(), input.len());
        assert!(tree.leaves().iter().all(|t| !t.is_empty()));
    }

    fn mips() -> Grammar {
        Grammar::new()
            .with("register", rule(r"\$[a-z0-9]+"))
            .with("instruction", rule(r"\b[a-z]+\b"))
    }

    #[test]
    fn test_instruction_and_registers() {
        let registry = GrammarRegistry::new();
        let tree = tokenize("add $t0 $t1 $t2", &mips(), &registry).unwrap();
        assert_eq!(
            tree.children,
            vec![
                leaf("instruction", "add"),
                text(" "),
                leaf("register", "$t0"),
                text(" "),
                leaf("register", "$t1"),
                text(" "),
                leaf("register", "$t2"),
            ]
        );
    }

    #[test]
    fn test_earliest_match_then_declaration_order() {
        let registry = GrammarRegistry::new();
        let grammar = Grammar::new()
            .with("keyword", rule(r"\bif\b"))
            .with("word", rule(r"[a-z]+"));
        let tree = tokenize("x if", &grammar, &registry).unwrap();
        assert_eq!(
            tree.children,
            vec![leaf("word", "x"), text(" "), leaf("keyword", "if")]
        );
    }

    #[test]
    fn test_alias_becomes_tag() {
        let registry = GrammarRegistry::new();
        let grammar = Grammar::new().with("register", rule(r"\$\w+").with_alias("variable"));
        let tree = tokenize("$sp", &grammar, &registry).unwrap();
        assert_eq!(tree.children[0].tag(), "variable");
        assert_eq!(tree.children[0].kind(), "register");
    }

    #[test]
    fn test_lookbehind_prefix_is_plain_text() {
        let registry = GrammarRegistry::new();
        let grammar = Grammar::new().with("label", rule(r"(,\s*)\w+").lookbehind());
        let tree = tokenize("a, b", &grammar, &registry).unwrap();
        assert_eq!(tree.children, vec![text("a, "), leaf("label", "b")]);
    }

    #[test]
    fn test_non_greedy_stops_at_earlier_rule() {
        let registry = GrammarRegistry::new();
        let grammar = Grammar::new()
            .with("number", rule(r"\d+"))
            .with("string", rule(r#""[^"]*""#));
        let tree = tokenize(r#""a1b""#, &grammar, &registry).unwrap();
        // the string cannot cross the number
        assert_eq!(
            tree.children,
            vec![text("\"a"), leaf("number", "1"), text("b\"")]
        );

        let grammar = Grammar::new()
            .with("number", rule(r"\d+"))
            .with("string", rule(r#""[^"]*""#).greedy());
        let tree = tokenize(r#""a1b""#, &grammar, &registry).unwrap();
        assert_eq!(tree.children, vec![leaf("string", r#""a1b""#)]);
    }

    #[test]
    fn test_inline_inside() {
        let registry = GrammarRegistry::new();
        let call = Grammar::new().with("punctuation", rule(r"[(),]"));
        let grammar = Grammar::new().with("call", rule(r"\w+\([^)]*\)").inside(call));
        let tree = tokenize("f(a,b);", &grammar, &registry).unwrap();
        assert_eq!(tree.children.len(), 2);
        let children = tree.children[0].children();
        assert_eq!(children[0], text("f"));
        assert_eq!(children[1], leaf("punctuation", "("));
        assert_eq!(tree.children[1], text(";"));
        assert_covers(&tree, "f(a,b);");
    }

    #[test]
    fn test_missing_inner_grammar() {
        let registry = GrammarRegistry::new();
        let grammar = Grammar::new().with("block", rule(r"\{[^}]*\}").inside_named("js"));
        assert!(tokenize("{x}", &grammar, &registry).is_err());
        // no match, no lookup
        assert!(tokenize("x", &grammar, &registry).is_ok());
    }

    #[test]
    fn test_self_reference_without_progress_is_leaf() {
        let mut registry = GrammarRegistry::new();
        registry.register(
            "loop",
            Grammar::new().with("all", rule(r"[\s\S]+").inside_named("loop")),
        );
        let grammar = registry.lookup("loop").unwrap();
        let tree = tokenize("abc", &grammar, &registry).unwrap();
        assert_eq!(tree.children, vec![leaf("all", "abc")]);
    }

    #[test]
    fn test_empty_matching_rule_terminates() {
        let registry = GrammarRegistry::new();
        let grammar = Grammar::new()
            .with("nothing", rule(r"x*"))
            .with("lookahead", rule(r"(?=a)"));
        let input = "abcxxdé";
        let tree = tokenize(input, &grammar, &registry).unwrap();
        assert_covers(&tree, input);
        assert_eq!(
            tree.children,
            vec![text("abc"), leaf("nothing", "xx"), text("dé")]
        );
    }

    #[test]
    fn test_coverage_and_determinism() {
        let registry = GrammarRegistry::new();
        let grammar = Grammar::new()
            .with("comment", rule(r"(?m)#.*$").greedy())
            .with("string", rule(r#"(["'])(?:\\.|(?!\1)[^\\\n])*\1"#).greedy())
            .with("number", rule(r"\b\d+\b"))
            .with("label", rule(r"((?:^|,)\s*)\w+(?=\s*$)").lookbehind())
            .with("punctuation", rule(r"[(),]"));
        let inputs = [
            "",
            "plain",
            "li $v0, 10 # exit",
            "msg: .asciiz \"hi # not a comment\"\n  j loop",
            "ünïcödé, 12 'x' ()",
            "\n\n,\n",
        ];
        for input in inputs {
            let first = tokenize(input, &grammar, &registry).unwrap();
            let second = tokenize(input, &grammar, &registry).unwrap();
            assert_covers(&first, input);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_balanced_embedding_nests_without_limit() {
        let mut registry = GrammarRegistry::new();
        registry.register(
            "js",
            Grammar::new()
                .with("keyword", rule(r"\bif\b"))
                .with("punctuation", rule(r"[{}();]")),
        );
        registry
            .embed("js", Delimiters::pair("{", "}").unwrap(), "js")
            .unwrap();
        registry.register(
            "page",
            Grammar::new().with("tag", rule(r"</?[a-zA-Z]+[^>]*>")),
        );
        registry
            .embed("page", Delimiters::tag("script").unwrap(), "js")
            .unwrap();

        let input = "<p>x</p><script>if (a) { b { c { d { e } } } }</script>";
        let page = registry.lookup("page").unwrap();
        let tree = tokenize(input, &page, &registry).unwrap();
        assert_covers(&tree, input);

        let script = tree
            .children
            .iter()
            .find(|t| t.kind() == "script")
            .expect("script region");
        assert_eq!(script.tag(), "language-js");
        assert_eq!(script.text(), "if (a) { b { c { d { e } } } }");
        assert_eq!(script.children()[0], leaf("keyword", "if"));

        let mut depth = 0;
        let mut node = script;
        while let Some(block) = node.children().iter().find(|t| t.kind() == "language-js") {
            depth += 1;
            node = block;
        }
        assert_eq!(depth, 4);
        assert_eq!(node.children(), &[text(" e ")]);

        assert_eq!(tree.children.last().unwrap(), &leaf("tag", "</script>"));
    }

    #[test]
    fn test_nesting_depth_is_not_bounded_by_the_call_stack() {
        let mut registry = GrammarRegistry::new();
        registry.register(
            "deep",
            Grammar::new()
                .with("head", rule(r"^[\s\S]"))
                .with("rest", rule(r"[\s\S]+").inside_named("deep")),
        );
        let depth = 10_000;
        let input = "a".repeat(depth);
        let deep = registry.lookup("deep").unwrap();
        let tree = tokenize(&input, &deep, &registry).unwrap();

        assert_eq!(tree.len(), depth);
        assert_eq!(tree.text(), input);
        assert_eq!(tree.leaves().len(), depth);

        let ranges = crate::syntax::projector::project(&tree, 0);
        assert_eq!(ranges.len(), 2 * depth - 1);
        assert_eq!(ranges[1], crate::syntax::StyleRange::new(1, depth, "rest"));
    }

    #[test]
    fn test_deep_balanced_self_embedding() {
        let mut registry = GrammarRegistry::new();
        registry.register("js", Grammar::new().with("punctuation", rule(r"[{}]")));
        registry
            .embed("js", Delimiters::pair("{", "}").unwrap(), "js")
            .unwrap();
        let depth = 2_000;
        let input = format!("{}{}", "{".repeat(depth), "}".repeat(depth));
        let js = registry.lookup("js").unwrap();
        let tree = tokenize(&input, &js, &registry).unwrap();
        assert_covers(&tree, &input);

        let ranges = crate::syntax::projector::project(&tree, 0);
        let blocks = ranges.iter().filter(|r| r.tag == "language-js").count();
        assert_eq!(blocks, depth - 1);
    }
}
