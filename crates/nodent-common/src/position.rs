//! Source spans and line/column conversion.
//!
//! Syntax tree nodes carry byte offsets plus the line/column of their start so
//! the transform can report structural errors and build a position map without
//! access to the original text. `LineMap` converts between the two forms for
//! callers that only have offsets.

use serde::{Deserialize, Serialize};

/// A position in a source file (0-indexed line and column).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourcePosition {
    /// 0-indexed line number
    pub line: u32,
    /// 0-indexed column (UTF-16 code units, as source maps expect)
    pub column: u32,
}

impl SourcePosition {
    pub fn new(line: u32, column: u32) -> Self {
        SourcePosition { line, column }
    }
}

/// Source range of a node: byte offsets plus the line/column of `pos`.
///
/// Nodes synthesized by the transform copy the span of the node they were
/// derived from; nodes built without source text use `Span::default()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub pos: u32,
    pub end: u32,
    pub line: u32,
    pub column: u32,
}

impl Span {
    /// Span with offsets only; line/column are left at the origin.
    pub const fn new(pos: u32, end: u32) -> Self {
        Span {
            pos,
            end,
            line: 0,
            column: 0,
        }
    }

    pub const fn with_location(pos: u32, end: u32, line: u32, column: u32) -> Self {
        Span {
            pos,
            end,
            line,
            column,
        }
    }

    /// Build a span from offsets, resolving line/column through a line map.
    pub fn from_offsets(line_map: &LineMap, source: &str, pos: u32, end: u32) -> Self {
        let start = line_map.offset_to_position(pos, source);
        Span::with_location(pos, end, start.line, start.column)
    }

    #[inline]
    pub const fn len(&self) -> u32 {
        self.end.saturating_sub(self.pos)
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.end <= self.pos
    }

    pub const fn start(&self) -> SourcePosition {
        SourcePosition {
            line: self.line,
            column: self.column,
        }
    }
}

/// Line map for efficient offset <-> position conversion.
/// Stores the starting offset of each line.
#[derive(Debug, Clone, Default)]
pub struct LineMap {
    /// Starting offset of each line (line_starts[0] is always 0)
    line_starts: Vec<u32>,
}

impl LineMap {
    /// Build a line map from source text.
    pub fn build(source: &str) -> Self {
        let mut line_starts = vec![0u32];

        for (i, ch) in source.char_indices() {
            if ch == '\n' {
                line_starts.push((i + 1) as u32);
            } else if ch == '\r' {
                // \r\n is handled by the \n; a lone \r ends the line itself
                let next_idx = i + 1;
                if source.as_bytes().get(next_idx) != Some(&b'\n') {
                    line_starts.push(next_idx as u32);
                }
            }
        }

        LineMap { line_starts }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Convert a byte offset to a line/column position.
    /// Columns are counted in UTF-16 code units.
    pub fn offset_to_position(&self, offset: u32, source: &str) -> SourcePosition {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(insert_point) => insert_point.saturating_sub(1),
        };

        let line_start = self.line_starts.get(line).copied().unwrap_or(0);
        let clamped_end = (offset as usize).min(source.len());
        let start = (line_start as usize).min(clamped_end);
        let slice = source.get(start..clamped_end).unwrap_or("");
        let column = slice.chars().map(|ch| ch.len_utf16() as u32).sum();

        SourcePosition {
            line: line as u32,
            column,
        }
    }

    /// Convert a line/column position back to a byte offset.
    pub fn position_to_offset(&self, position: SourcePosition, source: &str) -> Option<u32> {
        let line_idx = position.line as usize;
        let line_start = *self.line_starts.get(line_idx)?;
        let line_limit = self
            .line_starts
            .get(line_idx + 1)
            .copied()
            .unwrap_or(source.len() as u32);
        let slice = source
            .get(line_start as usize..line_limit as usize)
            .unwrap_or("");

        let mut utf16_count = 0u32;
        let mut byte_count = 0u32;
        for ch in slice.chars() {
            if ch == '\n' || ch == '\r' || utf16_count >= position.column {
                break;
            }
            utf16_count += ch.len_utf16() as u32;
            byte_count += ch.len_utf8() as u32;
        }

        Some(line_start + byte_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_map_round_trips_offsets() {
        let source = "async function f() {\n  await g();\r\n  return 1;\n}";
        let map = LineMap::build(source);
        assert_eq!(map.line_count(), 4);

        let await_offset = source.find("await").unwrap() as u32;
        let pos = map.offset_to_position(await_offset, source);
        assert_eq!(pos, SourcePosition::new(1, 2));
        assert_eq!(map.position_to_offset(pos, source), Some(await_offset));

        let ret_offset = source.find("return").unwrap() as u32;
        assert_eq!(
            map.offset_to_position(ret_offset, source),
            SourcePosition::new(2, 2)
        );
    }

    #[test]
    fn test_span_from_offsets() {
        let source = "a;\nbb;";
        let map = LineMap::build(source);
        let span = Span::from_offsets(&map, source, 3, 5);
        assert_eq!(span.line, 1);
        assert_eq!(span.column, 0);
        assert_eq!(span.len(), 2);
        assert!(!span.is_empty());
        assert!(Span::default().is_empty());
    }
}
