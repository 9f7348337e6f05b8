//! Projection of token trees onto document offsets

use super::style::{sort_ranges, StyleRange};
use super::tokens::{Token, TokenTree};

/// Turn a token tree into style ranges, offset by `base`
///
/// Every matched token yields a range; plain text only advances the
/// offset. The result is sorted by start with enclosing ranges ahead of
/// the ranges they contain. A composite and its only child can cover the
/// same span, in which case the composite still comes first.
pub fn project(tree: &TokenTree, base: usize) -> Vec<StyleRange> {
    let mut ranges: Vec<StyleRange> = Vec::new();
    let mut offset = base;
    // children left to visit, with the range their composite closes when done
    let mut stack = vec![(tree.children.iter(), None::<usize>)];

    while let Some((children, open)) = stack.last_mut() {
        let open = *open;
        let Some(token) = children.next() else {
            if let Some(index) = open {
                ranges[index].end = offset;
            }
            stack.pop();
            continue;
        };
        match token {
            Token::Text(text) => offset += text.len(),
            Token::Leaf { content, .. } => {
                ranges.push(StyleRange::new(offset, offset + content.len(), token.tag()));
                offset += content.len();
            }
            Token::Composite { children, .. } => {
                // pushed before its children so it sorts ahead of equal spans
                ranges.push(StyleRange::new(offset, offset, token.tag()));
                stack.push((children.iter(), Some(ranges.len() - 1)));
            }
        }
    }

    ranges.retain(|range| !range.is_empty());
    sort_ranges(&mut ranges);
    ranges
}
