//! Source location tree attached to a parsed schema file.
//!
//! Locations are keyed by structural path segment (`elements`, `0`,
//! `entity`, `keys`, ...) mirroring the syntax tree's field names.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::diagnostics::Position;

/// 0-based line/column span, descriptor style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct Span {
    pub start_line: i32,
    pub start_column: i32,
    pub end_line: i32,
    pub end_column: i32,
}

impl From<[i32; 4]> for Span {
    fn from(v: [i32; 4]) -> Self {
        Self {
            start_line: v[0],
            start_column: v[1],
            end_line: v[2],
            end_column: v[3],
        }
    }
}

impl From<Span> for [i32; 4] {
    fn from(s: Span) -> Self {
        [s.start_line, s.start_column, s.end_line, s.end_column]
    }
}

impl Span {
    pub fn new(start_line: i32, start_column: i32, end_line: i32, end_column: i32) -> Self {
        Self {
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    /// Descriptor `SourceCodeInfo.Location.span` form. Single-line spans
    /// use the three-element encoding.
    pub fn to_descriptor(&self) -> Vec<i32> {
        if self.start_line == self.end_line {
            vec![self.start_line, self.start_column, self.end_column]
        } else {
            vec![self.start_line, self.start_column, self.end_line, self.end_column]
        }
    }

    pub fn start_position(&self, filename: &str) -> Position {
        Position::new(
            filename,
            (self.start_line.max(0) + 1) as u32,
            (self.start_column.max(0) + 1) as u32,
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, SourceLocation>,
}

impl SourceLocation {
    pub fn new(span: Span) -> Self {
        Self {
            span: Some(span),
            children: BTreeMap::new(),
        }
    }

    pub fn with_child(mut self, key: impl Into<String>, child: SourceLocation) -> Self {
        self.children.insert(key.into(), child);
        self
    }

    /// Exact lookup along a dotted path, no fallback.
    pub fn lookup(&self, path: &str) -> Option<&SourceLocation> {
        path.split('.')
            .filter(|s| !s.is_empty())
            .try_fold(self, |loc, key| loc.children.get(key))
    }
}
