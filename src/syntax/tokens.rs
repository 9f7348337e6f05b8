//! Token trees produced by the tokenizer

/// Tag reported for unmatched text
pub const TEXT_TAG: &str = "text";

/// A unit of tokenizer output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Text no rule claimed
    Text(String),
    /// Content matched by a rule without an inner grammar
    Leaf {
        kind: String,
        alias: Option<String>,
        content: String,
    },
    /// Content matched by a rule and tokenized again by its inner grammar
    Composite {
        kind: String,
        alias: Option<String>,
        children: Vec<Token>,
    },
}

impl Token {
    /// Style tag: the alias when set, otherwise the rule name
    pub fn tag(&self) -> &str {
        match self {
            Token::Text(_) => TEXT_TAG,
            Token::Leaf { kind, alias, .. } | Token::Composite { kind, alias, .. } => {
                alias.as_deref().unwrap_or(kind)
            }
        }
    }

    /// Rule name that produced the token
    pub fn kind(&self) -> &str {
        match self {
            Token::Text(_) => TEXT_TAG,
            Token::Leaf { kind, .. } | Token::Composite { kind, .. } => kind,
        }
    }

    /// Length in bytes of the text covered by the token
    pub fn len(&self) -> usize {
        Leaves::of(std::slice::from_ref(self)).map(Token::own_len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether this is unmatched text
    pub fn is_text(&self) -> bool {
        matches!(self, Token::Text(_))
    }

    /// Child tokens of a composite, empty for leaves
    pub fn children(&self) -> &[Token] {
        match self {
            Token::Composite { children, .. } => children,
            _ => &[],
        }
    }

    /// The covered text
    pub fn text(&self) -> String {
        concat(Leaves::of(std::slice::from_ref(self)))
    }

    /// Text held directly by a text token or a leaf
    fn own_text(&self) -> &str {
        match self {
            Token::Text(text) => text,
            Token::Leaf { content, .. } => content,
            Token::Composite { .. } => "",
        }
    }

    fn own_len(&self) -> usize {
        self.own_text().len()
    }
}

// Composites can nest as deep as the input, so children are dropped from a
// work list instead of through the recursive drop glue.
impl Drop for Token {
    fn drop(&mut self) {
        let Token::Composite { children, .. } = self else {
            return;
        };
        let mut pending = std::mem::take(children);
        while let Some(mut token) = pending.pop() {
            if let Token::Composite { children, .. } = &mut token {
                pending.append(children);
            }
        }
    }
}

/// Depth-first walk over text tokens and leaves, in document order
struct Leaves<'a> {
    stack: Vec<&'a Token>,
}

impl<'a> Leaves<'a> {
    fn of(roots: &'a [Token]) -> Self {
        Self {
            stack: roots.iter().rev().collect(),
        }
    }
}

impl<'a> Iterator for Leaves<'a> {
    type Item = &'a Token;

    fn next(&mut self) -> Option<&'a Token> {
        while let Some(token) = self.stack.pop() {
            match token {
                Token::Composite { children, .. } => self.stack.extend(children.iter().rev()),
                _ => return Some(token),
            }
        }
        None
    }
}

fn concat<'a>(leaves: impl Iterator<Item = &'a Token>) -> String {
    let mut out = String::new();
    for leaf in leaves {
        out.push_str(leaf.own_text());
    }
    out
}

/// Synthetic root holding the top-level tokens of one tokenization
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenTree {
    pub children: Vec<Token>,
}

impl TokenTree {
    pub fn new(children: Vec<Token>) -> Self {
        Self { children }
    }

    /// Length in bytes of the tokenized text
    pub fn len(&self) -> usize {
        Leaves::of(&self.children).map(Token::own_len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// The tokenized text, reassembled
    pub fn text(&self) -> String {
        concat(Leaves::of(&self.children))
    }

    /// Leaf tokens (text and matched leaves) in document order
    pub fn leaves(&self) -> Vec<&Token> {
        Leaves::of(&self.children).collect()
    }
}

/// Append plain text, merging with a preceding text token
pub(crate) fn push_text(tokens: &mut Vec<Token>, text: &str) {
    if text.is_empty() {
        return;
    }
    match tokens.last_mut() {
        Some(Token::Text(prev)) => prev.push_str(text),
        _ => tokens.push(Token::Text(text.to_string())),
    }
}
