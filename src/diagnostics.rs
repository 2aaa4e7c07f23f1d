//! Diagnostics
//!
//! Collects errors and warnings produced while loading and converting
//! packages. Builds fail on any error; lint runs report everything.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{SchemaError, Warning};

// =============================================================================
// Position
// =============================================================================

/// A 1-based source position within a named file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub filename: String,
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(filename: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            filename: filename.into(),
            line,
            column,
        }
    }

    /// Position of a byte offset within `source`.
    pub fn from_offset(filename: impl Into<String>, source: &str, offset: usize) -> Self {
        let mut line = 1;
        let mut column = 1;
        for (idx, c) in source.char_indices() {
            if idx >= offset {
                break;
            }
            if c == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        Self::new(filename, line, column)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.filename, self.line, self.column)
    }
}

// =============================================================================
// Severity
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

// =============================================================================
// Diagnostic
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    Error(SchemaError),
    Warning(Warning),
}

/// A single finding, positioned when the source offers a location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub position: Option<Position>,
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn severity(&self) -> Severity {
        match self.kind {
            DiagnosticKind::Error(_) => Severity::Error,
            DiagnosticKind::Warning(_) => Severity::Warning,
        }
    }

    pub fn code(&self) -> &'static str {
        match &self.kind {
            DiagnosticKind::Error(err) => err.code(),
            DiagnosticKind::Warning(warning) => warning.code(),
        }
    }

    pub fn as_error(&self) -> Option<&SchemaError> {
        match &self.kind {
            DiagnosticKind::Error(err) => Some(err),
            DiagnosticKind::Warning(_) => None,
        }
    }

    pub fn as_warning(&self) -> Option<&Warning> {
        match &self.kind {
            DiagnosticKind::Warning(warning) => Some(warning),
            DiagnosticKind::Error(_) => None,
        }
    }

    fn message(&self) -> String {
        match &self.kind {
            DiagnosticKind::Error(err) => err.to_string(),
            DiagnosticKind::Warning(warning) => warning.to_string(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(position) = &self.position {
            write!(f, "{}: ", position)?;
        }
        write!(f, "[{}] {}: {}", self.code(), self.severity(), self.message())
    }
}

// =============================================================================
// Diagnostics Collection
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: Diagnostic) {
        self.items.push(item);
    }

    pub fn error(&mut self, position: Option<Position>, err: SchemaError) {
        self.push(Diagnostic {
            position,
            kind: DiagnosticKind::Error(err),
        });
    }

    pub fn warning(&mut self, position: Option<Position>, warning: Warning) {
        self.push(Diagnostic {
            position,
            kind: DiagnosticKind::Warning(warning),
        });
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|i| i.severity() == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &SchemaError> {
        self.items.iter().filter_map(Diagnostic::as_error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Warning> {
        self.items.iter().filter_map(Diagnostic::as_warning)
    }

    pub fn all(&self) -> &[Diagnostic] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    pub fn merge(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn format_all(&self) -> String {
        let mut output = String::new();

        for item in &self.items {
            output.push_str(&format!("{}\n", item));
        }

        if !self.is_empty() {
            output.push_str(&format!(
                "\n{} error(s), {} warning(s)\n",
                self.error_count(),
                self.warning_count()
            ));
        }

        output
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_all())
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
