//! Style ranges: the engine's output
//!
//! A style range names a tag to apply over `[start, end)` of the original
//! document. The engine never edits the document; transforms only adjust
//! the ranges, reading the source where they need to.

/// A styled span of the original document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StyleRange {
    /// Start byte offset (inclusive)
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
    /// Style tag, e.g. `keyword`
    pub tag: String,
    /// Optional title attribute
    pub title: Option<String>,
}

impl StyleRange {
    pub fn new(start: usize, end: usize, tag: &str) -> Self {
        Self {
            start,
            end,
            tag: tag.to_string(),
            title: None,
        }
    }

    /// Check if an offset is within this range
    pub fn contains(&self, pos: usize) -> bool {
        pos >= self.start && pos < self.end
    }

    /// Check if this range shares any offset with `[start, end)`
    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        self.start < end && start < self.end
    }

    /// Length of the range
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Order ranges by start; at equal starts the wider (enclosing) range first
///
/// The sort is stable: ranges with the same span keep their input order,
/// which the projector relies on to keep a composite ahead of a child
/// covering the same text.
pub fn sort_ranges(ranges: &mut [StyleRange]) {
    ranges.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));
}

/// A pure post-processing step over projected ranges
pub trait RangeTransform: Send + Sync {
    /// `source` is the text the range offsets refer to
    fn apply(&self, source: &str, ranges: Vec<StyleRange>) -> Vec<StyleRange>;
}

/// Gives `entity` ranges a title showing the entity text, with the first
/// `&amp;` unescaped
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityTitle;

impl RangeTransform for EntityTitle {
    fn apply(&self, source: &str, mut ranges: Vec<StyleRange>) -> Vec<StyleRange> {
        for range in ranges.iter_mut().filter(|r| r.tag == "entity") {
            if let Some(text) = source.get(range.start..range.end) {
                range.title = Some(text.replacen("&amp;", "&", 1));
            }
        }
        ranges
    }
}
