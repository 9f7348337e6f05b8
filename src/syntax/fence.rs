//! Fenced code block extraction
//!
//! Finds regions of a host document written as
//!
//! ````text
//! ```mips
//! add $t0 $t1 $t2
//! ```
//! ````
//!
//! An opening fence carries the language id, optionally followed by
//! modifier characters, then a line break, the body, a line break and
//! the closing fence. An opening fence that is never closed yields no
//! block. A block with no body may close right after the opening line,
//! so ```` ```mips\n``` ```` is an empty block.

use std::ops::Range;

use regex::{Regex, RegexBuilder};

use crate::error::Result;

/// Fence delimiter used when none is configured
pub const DEFAULT_FENCE: &str = "```";

/// Characters allowed between the language id and the line break
const MODIFIERS: &str = r"[ \t:!?.;,@%&(){}\[\]<>*~]*";

/// A located embedded region of a host document
///
/// Two blocks are the same block only if language, offset and text all
/// match; any change to one of them makes earlier results stale.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CodeBlock {
    pub language_id: String,
    /// The whole fenced span, fences included
    pub raw_text: String,
    /// Offset of `raw_text` in the document
    pub document_offset: usize,
    /// Body position relative to `raw_text`
    body: Range<usize>,
}

impl CodeBlock {
    /// Code between the fences
    pub fn body(&self) -> &str {
        &self.raw_text[self.body.clone()]
    }

    /// Offset of the body in the document
    pub fn body_offset(&self) -> usize {
        self.document_offset + self.body.start
    }

    /// Offset just past the closing fence
    pub fn end(&self) -> usize {
        self.document_offset + self.raw_text.len()
    }
}

/// Finds fenced blocks of one language
#[derive(Debug, Clone)]
pub struct FenceScanner {
    language_id: String,
    fence_len: usize,
    regex: Regex,
}

impl FenceScanner {
    /// Scanner for `language_id` blocks fenced with `fence`
    pub fn new(fence: &str, language_id: &str, case_insensitive: bool) -> Result<Self> {
        let pattern = format!(
            r"{fence}{lang}{MODIFIERS}\r?\n(?:([\s\S]*?)\r?\n)??{fence}",
            fence = regex::escape(fence),
            lang = regex::escape(language_id),
        );
        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(case_insensitive)
            .build()?;
        Ok(Self {
            language_id: language_id.to_string(),
            fence_len: fence.len(),
            regex,
        })
    }

    pub fn language_id(&self) -> &str {
        &self.language_id
    }

    /// Blocks of `document` in document order
    ///
    /// The iterator is lazy; clone it or call again to restart.
    pub fn blocks<'s, 'd>(&'s self, document: &'d str) -> Blocks<'s, 'd> {
        Blocks {
            scanner: self,
            document,
            pos: 0,
        }
    }
}

/// Iterator over the fenced blocks of a document
#[derive(Debug, Clone)]
pub struct Blocks<'s, 'd> {
    scanner: &'s FenceScanner,
    document: &'d str,
    pos: usize,
}

impl Iterator for Blocks<'_, '_> {
    type Item = CodeBlock;

    fn next(&mut self) -> Option<CodeBlock> {
        if self.pos > self.document.len() {
            return None;
        }
        let caps = self.scanner.regex.captures_at(self.document, self.pos)?;
        let whole = caps.get(0)?;
        self.pos = whole.end();

        let start = whole.start();
        let body = match caps.get(1) {
            Some(body) => body.start() - start..body.end() - start,
            None => {
                // empty body: it sits right before the closing fence
                let close = whole.len() - self.scanner.fence_len;
                close..close
            }
        };
        Some(CodeBlock {
            language_id: self.scanner.language_id.clone(),
            raw_text: whole.as_str().to_string(),
            document_offset: start,
            body,
        })
    }
}
