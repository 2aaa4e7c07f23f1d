//! j5build
//!
//! Compiles J5 schema sources, together with native `.proto` files, into
//! annotated protobuf descriptors.
//!
//! ## Pipeline
//!
//! ```text
//! PackageSet::load("foo.v1")
//!   ├── list foo/v1/*.j5s, foo/v1/*.proto
//!   ├── parse + summarise each file        (exports, dependencies)
//!   ├── load each dependency package       (recursive, cycle-checked)
//!   └── convert each file                  (sourcewalk → j5convert)
//! PackageSet::build(&["foo.v1"])           → BuildOutput { files }
//! ```
//!
//! Conversion problems are collected as [`Diagnostics`]; graph and parse
//! failures abort with a [`BuildError`].

pub mod config;
pub mod descriptor;
pub mod diagnostics;
pub mod error;
pub mod j5convert;
pub mod names;
pub mod protobuild;
pub mod sourcedef;
pub mod sourcewalk;
pub mod typeref;

pub use config::BuildConfig;
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Position, Severity};
pub use error::{BuildError, Result, SchemaError, Warning};
pub use protobuild::{
    BuildOutput, DirectorySource, MemoryDependencySet, MemorySource, Package, PackageSet,
    ResolveBaton,
};
pub use typeref::{TypeRef, TypeRefHandle};
