//! Source spans
//!
//! Every node in a scope graph carries a [`TextRange`]. Placement of scopes,
//! definitions and references is decided purely by byte containment.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A zero-based row/column position in a file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Point {
    pub row: usize,
    pub column: usize,
}

impl Point {
    pub fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }
}

impl From<(usize, usize)> for Point {
    fn from((row, column): (usize, usize)) -> Self {
        Self { row, column }
    }
}

/// Byte and line/column span of a syntax node.
///
/// Ranges are immutable values; `start_byte <= end_byte` always holds for
/// ranges built through [`TextRange::new`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextRange {
    pub start_byte: usize,
    pub end_byte: usize,
    pub start_point: Point,
    pub end_point: Point,
}

impl TextRange {
    /// Create a range. Inverted byte offsets are swapped so the invariant holds.
    pub fn new(
        start_byte: usize,
        end_byte: usize,
        start_point: impl Into<Point>,
        end_point: impl Into<Point>,
    ) -> Self {
        let (start_point, end_point) = (start_point.into(), end_point.into());
        if start_byte <= end_byte {
            Self { start_byte, end_byte, start_point, end_point }
        } else {
            Self {
                start_byte: end_byte,
                end_byte: start_byte,
                start_point: end_point,
                end_point: start_point,
            }
        }
    }

    /// Range covering bytes only, with points left at the origin
    pub fn from_bytes(start_byte: usize, end_byte: usize) -> Self {
        Self::new(start_byte, end_byte, Point::default(), Point::default())
    }

    /// `true` when `other` lies entirely within `self` (bounds inclusive)
    pub fn contains(&self, other: &TextRange) -> bool {
        other.start_byte >= self.start_byte && other.end_byte <= self.end_byte
    }

    pub fn len(&self) -> usize {
        self.end_byte.saturating_sub(self.start_byte)
    }

    pub fn is_empty(&self) -> bool {
        self.start_byte == self.end_byte
    }

    /// The source text covered by this range, decoded lossily
    pub fn text(&self, source: &[u8]) -> String {
        let end = self.end_byte.min(source.len());
        let start = self.start_byte.min(end);
        String::from_utf8_lossy(&source[start..end]).into_owned()
    }
}

impl From<tree_sitter::Range> for TextRange {
    fn from(range: tree_sitter::Range) -> Self {
        Self::new(
            range.start_byte,
            range.end_byte,
            (range.start_point.row, range.start_point.column),
            (range.end_point.row, range.end_point.column),
        )
    }
}

impl fmt::Display for TextRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}) {}:{}-{}:{}",
            self.start_byte,
            self.end_byte,
            self.start_point.row + 1,
            self.start_point.column,
            self.end_point.row + 1,
            self.end_point.column
        )
    }
}
