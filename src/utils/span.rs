//! Source location tracking

/// A span represents a range in the source code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    /// Start char offset
    pub start: usize,
    /// End char offset (exclusive)
    pub end: usize,
    /// 1-based line of the first character
    pub line: usize,
    /// 1-based column of the first character
    pub column: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, line: usize, column: usize) -> Self {
        Self { start, end, line, column }
    }

    /// Create a dummy span for synthesized nodes
    pub fn dummy() -> Self {
        Self { start: 0, end: 0, line: 1, column: 1 }
    }

    /// Merge two spans, keeping the position of whichever starts first
    pub fn merge(&self, other: &Span) -> Span {
        let (line, column) = if other.start < self.start {
            (other.line, other.column)
        } else {
            (self.line, self.column)
        };
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            line,
            column,
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl Default for Span {
    fn default() -> Self {
        Self::dummy()
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_earliest_position() {
        let a = Span::new(10, 12, 2, 3);
        let b = Span::new(4, 6, 1, 5);
        let merged = a.merge(&b);
        assert_eq!(merged, Span::new(4, 12, 1, 5));
        assert_eq!(merged.len(), 8);
    }

    #[test]
    fn test_display_is_line_column() {
        assert_eq!(Span::new(0, 1, 7, 9).to_string(), "7:9");
    }
}
