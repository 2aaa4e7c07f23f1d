//! Schema Normaliser
//!
//! Turns a parsed [`crate::sourcedef::SourceFile`] into a flat [`FileNode`]
//! tree: inline definitions hoisted into named nested schemas, entities
//! expanded into ordinary schemas and services, positions attached to every
//! node.

mod entity;
pub mod location;
pub mod nodes;
mod walk;

pub use entity::{LIST_PACKAGE, STATE_PACKAGE};
pub use location::{SourceNode, SourceTree};
pub use nodes::*;
pub use walk::walk_file;
