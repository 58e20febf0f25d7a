//! Text splice buffer.
//!
//! Holds the immutable original source plus a list of span replacements expressed in
//! original offsets. Edits to disjoint spans commute, so components can be rewritten in any
//! order; the buffer is only materialized by [`SpliceBuffer::render`].

use std::fmt;

use crate::error::SpliceError;
use crate::syntax::Span;

#[derive(Debug, Clone)]
struct Edit {
    span: Span,
    text: String,
}

#[derive(Debug, Clone, Default)]
pub struct SpliceBuffer {
    original: String,
    edits: Vec<Edit>,
    prefix: String,
    suffix: String,
}

impl SpliceBuffer {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            original: source.into(),
            ..Self::default()
        }
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    /// Replace `span` of the original text. Fails if the span is out of range, splits a
    /// character, or overlaps an earlier edit.
    pub fn overwrite(&mut self, span: Span, text: impl Into<String>) -> Result<(), SpliceError> {
        let len = self.original.len();
        if span.start > span.end || span.end as usize > len {
            return Err(SpliceError::OutOfBounds {
                start: span.start,
                end: span.end,
                len,
            });
        }
        if !self.original.is_char_boundary(span.start as usize)
            || !self.original.is_char_boundary(span.end as usize)
        {
            return Err(SpliceError::NotCharBoundary {
                start: span.start,
                end: span.end,
            });
        }
        if let Some(other) = self.edits.iter().find(|e| e.span.overlaps(span)) {
            return Err(SpliceError::Overlap {
                start: span.start,
                end: span.end,
                other_start: other.span.start,
                other_end: other.span.end,
            });
        }
        self.edits.push(Edit {
            span,
            text: text.into(),
        });
        Ok(())
    }

    /// Insert before everything, including earlier prepends.
    pub fn prepend(&mut self, text: &str) {
        self.prefix.insert_str(0, text);
    }

    pub fn append(&mut self, text: &str) {
        self.suffix.push_str(text);
    }

    pub fn has_changed(&self) -> bool {
        !self.edits.is_empty() || !self.prefix.is_empty() || !self.suffix.is_empty()
    }

    pub fn render(&self) -> String {
        let mut edits: Vec<&Edit> = self.edits.iter().collect();
        edits.sort_by_key(|e| e.span.start);

        let mut out = String::with_capacity(self.original.len() + self.prefix.len() + self.suffix.len());
        out.push_str(&self.prefix);
        let mut cursor = 0usize;
        for edit in edits {
            out.push_str(&self.original[cursor..edit.span.start as usize]);
            out.push_str(&edit.text);
            cursor = edit.span.end as usize;
        }
        out.push_str(&self.original[cursor..]);
        out.push_str(&self.suffix);
        out
    }
}

impl fmt::Display for SpliceBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_edits_in_any_order() {
        let mut forward = SpliceBuffer::new("aaa bbb ccc");
        forward.overwrite(Span::new(0, 3), "A").unwrap();
        forward.overwrite(Span::new(8, 11), "C").unwrap();

        let mut backward = SpliceBuffer::new("aaa bbb ccc");
        backward.overwrite(Span::new(8, 11), "C").unwrap();
        backward.overwrite(Span::new(0, 3), "A").unwrap();

        assert_eq!(forward.render(), "A bbb C");
        assert_eq!(backward.render(), forward.render());
    }

    #[test]
    fn test_prepend_and_append() {
        let mut buf = SpliceBuffer::new("body");
        assert!(!buf.has_changed());
        buf.prepend("b\n");
        buf.prepend("a\n");
        buf.append("\nz");
        assert!(buf.has_changed());
        assert_eq!(buf.to_string(), "a\nb\nbody\nz");
        assert_eq!(buf.original(), "body");
    }

    #[test]
    fn test_overlap_is_rejected() {
        let mut buf = SpliceBuffer::new("0123456789");
        buf.overwrite(Span::new(2, 5), "x").unwrap();
        let err = buf.overwrite(Span::new(4, 6), "y").unwrap_err();
        assert_eq!(
            err,
            SpliceError::Overlap {
                start: 4,
                end: 6,
                other_start: 2,
                other_end: 5
            }
        );
        // Touching spans are fine.
        buf.overwrite(Span::new(5, 6), "y").unwrap();
        assert_eq!(buf.render(), "01xy6789");
    }

    #[test]
    fn test_bounds_and_char_boundaries() {
        let mut buf = SpliceBuffer::new("héllo");
        assert!(matches!(
            buf.overwrite(Span::new(0, 99), ""),
            Err(SpliceError::OutOfBounds { .. })
        ));
        assert!(matches!(
            buf.overwrite(Span::new(2, 3), ""),
            Err(SpliceError::NotCharBoundary { .. })
        ));
    }
}
