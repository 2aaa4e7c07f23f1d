//! Source positions for normalised nodes.

use crate::diagnostics::Position;
use crate::sourcedef::{SourceLocation, Span};

/// Read-only view over one file's location tree.
#[derive(Debug, Clone, Copy)]
pub struct SourceTree<'a> {
    pub filename: &'a str,
    pub root: Option<&'a SourceLocation>,
}

impl<'a> SourceTree<'a> {
    pub fn new(filename: &'a str, root: Option<&'a SourceLocation>) -> Self {
        Self { filename, root }
    }

    pub fn root_node(&self) -> SourceNode {
        SourceNode {
            filename: self.filename.to_string(),
            path: Vec::new(),
            span: self.root.and_then(|r| r.span),
            synthetic: self.root.is_none(),
        }
    }

    fn lookup(&self, path: &[String]) -> Option<&'a SourceLocation> {
        let mut current = self.root?;
        for key in path {
            current = current.children.get(key)?;
        }
        Some(current)
    }
}

/// Where a node came from. Synthetic nodes (entity expansion output, or
/// paths missing from the location tree) carry their nearest ancestor's span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceNode {
    pub filename: String,
    pub path: Vec<String>,
    pub span: Option<Span>,
    pub synthetic: bool,
}

impl SourceNode {
    /// Step into `key`, falling back to this node's span on a miss.
    pub fn child(&self, tree: &SourceTree<'_>, key: impl ToString) -> SourceNode {
        let mut path = self.path.clone();
        path.push(key.to_string());
        match tree.lookup(&path).and_then(|loc| loc.span) {
            Some(span) => SourceNode {
                filename: self.filename.clone(),
                path,
                span: Some(span),
                synthetic: false,
            },
            _ => SourceNode {
                filename: self.filename.clone(),
                path,
                span: self.span,
                synthetic: true,
            },
        }
    }

    /// A generated node that has no text of its own.
    pub fn synthetic_child(&self, key: impl ToString) -> SourceNode {
        let mut path = self.path.clone();
        path.push(key.to_string());
        SourceNode {
            filename: self.filename.clone(),
            path,
            span: self.span,
            synthetic: true,
        }
    }

    pub fn position(&self) -> Option<Position> {
        self.span.map(|s| s.start_position(&self.filename))
    }

    pub fn dotted_path(&self) -> String {
        self.path.join(".")
    }
}
