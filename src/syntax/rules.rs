//! Pattern rules for tokenization
//!
//! A rule recognizes one lexical construct. It matches either with a
//! regex pattern or with a pair of open/close delimiters that are scanned
//! with an explicit nesting counter, so nested constructs of any depth
//! are matched as a whole.

use std::sync::Arc;

use fancy_regex::Regex;

use super::grammar::Grammar;
use crate::error::{HighlightError, Result};

/// Location of a rule match inside the text being tokenized
///
/// `start..content_start` is the lookbehind prefix (context the pattern
/// needed but which does not belong to the token), `content_start..end`
/// is the token content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleMatch {
    pub start: usize,
    pub content_start: usize,
    pub end: usize,
}

impl RuleMatch {
    /// Whether the match produces no token content
    pub fn is_empty(&self) -> bool {
        self.content_start >= self.end
    }
}

/// Grammar used to tokenize the content of a matched rule
#[derive(Debug, Clone)]
pub enum Inside {
    /// Looked up in the registry by name when tokenization reaches it.
    /// The name may refer to the grammar being defined.
    Named(String),
    /// Grammar owned by the rule
    Inline(Arc<Grammar>),
}

/// Opening and closing delimiters of a nestable region
#[derive(Debug, Clone)]
pub struct Delimiters {
    open: Regex,
    close: Regex,
    /// Openers that deepen nesting inside the region, `open` when unset
    nested: Option<Regex>,
    tag: Option<String>,
}

impl Delimiters {
    /// Delimiters given as regex patterns
    pub fn new(open: &str, close: &str) -> Result<Self> {
        Ok(Self {
            open: compile(open)?,
            close: compile(close)?,
            nested: None,
            tag: None,
        })
    }

    /// Count `pattern` instead of the opening delimiter when tracking depth
    ///
    /// Lets a region start with a specific opener, such as `{#each`, while
    /// any plain `{` inside it still pairs with a `}`.
    pub fn with_nested(mut self, pattern: &str) -> Result<Self> {
        self.nested = Some(compile(pattern)?);
        Ok(self)
    }

    /// Delimiters given as literal strings, e.g. `("{", "}")`
    pub fn pair(open: &str, close: &str) -> Result<Self> {
        Self::new(&regex::escape(open), &regex::escape(close))
    }

    /// A markup element: `<name ...>` up to the matching `</name>`
    pub fn tag(name: &str) -> Result<Self> {
        let name_pattern = regex::escape(name);
        let mut delimiters = Self::new(
            &format!(r"(?i)<{}\b[^>]*(?<!/)>", name_pattern),
            &format!(r"(?i)</{}\s*>", name_pattern),
        )?;
        delimiters.tag = Some(name.to_string());
        Ok(delimiters)
    }

    /// Element name for delimiters built with [`Delimiters::tag`]
    pub fn tag_name(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Find the first balanced region at or after `from`
    ///
    /// The returned match starts at an opening delimiter, its content
    /// starts right after it and ends where the matching closing delimiter
    /// begins. An opening delimiter without a matching close is skipped.
    fn find_balanced(&self, hay: &str, from: usize) -> Option<RuleMatch> {
        let mut search = from;
        while search <= hay.len() {
            let open = find_from(&self.open, hay, search)?;
            if open.1 > open.0 {
                if let Some(close_start) = self.matching_close(hay, open.1) {
                    return Some(RuleMatch {
                        start: open.0,
                        content_start: open.1,
                        end: close_start,
                    });
                }
            }
            search = next_char_boundary(hay, open.0);
        }
        None
    }

    /// Scan forward from just after an opening delimiter, counting depth
    ///
    /// The next opener and closer are remembered until the scan passes
    /// them, so one call is linear in the number of delimiters.
    fn matching_close(&self, hay: &str, mut pos: usize) -> Option<usize> {
        let nested = self.nested.as_ref().unwrap_or(&self.open);
        let mut depth = 1usize;
        let mut next_open = find_from(nested, hay, pos);
        let mut next_close = find_from(&self.close, hay, pos);
        loop {
            if next_open.is_some_and(|(start, _)| start < pos) {
                next_open = find_from(nested, hay, pos);
            }
            if next_close.is_some_and(|(start, _)| start < pos) {
                next_close = find_from(&self.close, hay, pos);
            }
            let close = next_close?;
            match next_open {
                Some((start, end)) if start < close.0 && end > start => {
                    depth += 1;
                    pos = end;
                }
                _ => {
                    if close.1 == close.0 {
                        // empty closers never count
                        if close.0 >= hay.len() {
                            return None;
                        }
                        pos = next_char_boundary(hay, close.0);
                        continue;
                    }
                    depth -= 1;
                    if depth == 0 {
                        return Some(close.0);
                    }
                    pos = close.1;
                }
            }
        }
    }
}

/// How a rule recognizes its construct
#[derive(Debug, Clone)]
pub enum Matcher {
    Pattern(Regex),
    Balanced(Delimiters),
}

/// A single tokenization rule
#[derive(Debug, Clone)]
pub struct Rule {
    pub matcher: Matcher,
    /// Tag used instead of the rule name
    pub alias: Option<String>,
    /// Grammar applied to the matched content
    pub inside: Option<Inside>,
    /// May match across the start of an earlier rule's match
    pub greedy: bool,
    /// First capture group (or opening delimiter) is context, not content
    pub lookbehind: bool,
}

impl Rule {
    /// Create a rule from a regex pattern
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self::from_matcher(Matcher::Pattern(compile(pattern)?)))
    }

    /// Create a rule matching a delimiter-balanced region
    ///
    /// The opening delimiter is treated as lookbehind context and the
    /// closing delimiter is left for the following rules.
    pub fn balanced(delimiters: Delimiters) -> Self {
        let mut rule = Self::from_matcher(Matcher::Balanced(delimiters));
        rule.lookbehind = true;
        rule
    }

    fn from_matcher(matcher: Matcher) -> Self {
        Self {
            matcher,
            alias: None,
            inside: None,
            greedy: false,
            lookbehind: false,
        }
    }

    /// Builder: set the alias
    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    /// Builder: tokenize matched content with a registered grammar
    pub fn inside_named(mut self, name: &str) -> Self {
        self.inside = Some(Inside::Named(name.to_string()));
        self
    }

    /// Builder: tokenize matched content with an inline grammar
    pub fn inside(mut self, grammar: Grammar) -> Self {
        self.inside = Some(Inside::Inline(Arc::new(grammar)));
        self
    }

    /// Builder: mark as greedy
    pub fn greedy(mut self) -> Self {
        self.greedy = true;
        self
    }

    /// Builder: mark as lookbehind
    pub fn lookbehind(mut self) -> Self {
        self.lookbehind = true;
        self
    }

    /// Find the first non-empty match in `text[from..limit]`
    ///
    /// Matches whose content would be empty (zero-length matches, or a
    /// match made only of lookbehind context) are skipped and the search
    /// resumes one character further on.
    pub fn find(&self, text: &str, from: usize, limit: usize) -> Option<RuleMatch> {
        if from >= limit {
            return None;
        }
        let hay = &text[..limit];
        let mut pos = from;
        while pos < hay.len() {
            let found = self.find_raw(hay, pos)?;
            if !found.is_empty() {
                return Some(found);
            }
            pos = next_char_boundary(hay, found.start.max(pos));
        }
        None
    }

    fn find_raw(&self, hay: &str, pos: usize) -> Option<RuleMatch> {
        match &self.matcher {
            Matcher::Pattern(regex) if self.lookbehind => {
                let caps = match regex.captures_from_pos(hay, pos) {
                    Ok(caps) => caps?,
                    Err(e) => {
                        tracing::warn!("pattern {} failed at {}: {}", regex.as_str(), pos, e);
                        return None;
                    }
                };
                let whole = caps.get(0)?;
                let prefix = caps.get(1).map_or(0, |m| m.as_str().len());
                Some(RuleMatch {
                    start: whole.start(),
                    content_start: (whole.start() + prefix).min(whole.end()),
                    end: whole.end(),
                })
            }
            Matcher::Pattern(regex) => {
                let (start, end) = find_from(regex, hay, pos)?;
                Some(RuleMatch {
                    start,
                    content_start: start,
                    end,
                })
            }
            Matcher::Balanced(delimiters) => {
                let mut found = delimiters.find_balanced(hay, pos)?;
                if !self.lookbehind {
                    found.content_start = found.start;
                }
                Some(found)
            }
        }
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| HighlightError::invalid_pattern(pattern, e))
}

/// Run a regex from `pos`, reporting runtime failures as no match
fn find_from(regex: &Regex, hay: &str, pos: usize) -> Option<(usize, usize)> {
    match regex.find_from_pos(hay, pos) {
        Ok(found) => found.map(|m| (m.start(), m.end())),
        Err(e) => {
            tracing::warn!("pattern {} failed at {}: {}", regex.as_str(), pos, e);
            None
        }
    }
}

/// Byte offset of the character after the one starting at `pos`
pub(crate) fn next_char_boundary(text: &str, pos: usize) -> usize {
    let mut next = pos + 1;
    while next < text.len() && !text.is_char_boundary(next) {
        next += 1;
    }
    next
}
