//! Type Resolution
//!
//! Maps `(alias, name)` pairs written in schema source onto exported
//! [`TypeRef`](crate::typeref::TypeRef)s, through the file's import table.

use std::collections::{BTreeMap, BTreeSet};

use crate::diagnostics::Position;
use crate::error::SchemaError;
use crate::sourcewalk::ImportNode;
use crate::typeref::TypeRefHandle;

/// Exports of one package, by dotted name.
pub type Exports = BTreeMap<String, TypeRefHandle>;

// =============================================================================
// Constant Tables
// =============================================================================

/// Packages every schema file may reference without importing them, with
/// their short alias where they have one.
pub const IMPLICIT_IMPORTS: &[(&str, Option<&str>)] = &[
    ("j5.state.v1", Some("state")),
    ("j5.list.v1", Some("list")),
    ("google.protobuf", None),
    ("j5.types.date.v1", None),
    ("j5.types.decimal.v1", None),
    ("j5.types.any.v1", None),
];

/// Packages whose explicit import never triggers an unused-import warning.
pub const IGNORE_UNUSED_IMPORTS: &[&str] = &[
    "j5.state.v1",
    "j5.list.v1",
    "j5.ext.v1",
    "google.protobuf",
    "google.api",
    "buf.validate",
];

/// `foo.bar.v1` → `bar`; version segments (`v1`, `v2beta`) are skipped.
pub fn default_alias(package: &str) -> &str {
    package
        .rsplit('.')
        .find(|segment| !is_version_segment(segment))
        .unwrap_or(package)
}

fn is_version_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    chars.next() == Some('v') && chars.next().map(|c| c.is_ascii_digit()).unwrap_or(false)
}

/// Package of a file path under the package-directory convention.
pub fn package_of_file(path: &str) -> String {
    match path.rsplit_once('/') {
        Some((dir, _)) => dir.replace('/', "."),
        None => String::new(),
    }
}

// =============================================================================
// Import Table
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEntry {
    pub package: String,
    /// Written in source, as opposed to implicit
    pub explicit: bool,
    pub position: Option<Position>,
}

#[derive(Debug, Clone, Default)]
pub struct ImportTable {
    aliases: BTreeMap<String, ImportEntry>,
    used: BTreeSet<String>,
}

impl ImportTable {
    pub fn new(imports: &[ImportNode]) -> Self {
        let mut table = Self::default();

        for import in imports {
            let package = if import.is_file() {
                package_of_file(&import.path)
            } else {
                import.path.clone()
            };
            let entry = ImportEntry {
                package: package.clone(),
                explicit: true,
                position: import.source.position(),
            };
            if let Some(alias) = &import.alias {
                table.aliases.insert(alias.clone(), entry.clone());
            }
            table
                .aliases
                .entry(default_alias(&package).to_string())
                .or_insert_with(|| entry.clone());
            table.aliases.insert(package, entry);
        }

        for (package, short) in IMPLICIT_IMPORTS {
            let entry = ImportEntry {
                package: package.to_string(),
                explicit: false,
                position: None,
            };
            if let Some(short) = short {
                table
                    .aliases
                    .entry(short.to_string())
                    .or_insert_with(|| entry.clone());
            }
            table.aliases.entry(package.to_string()).or_insert(entry);
        }

        table
    }

    pub fn package_for(&self, alias: &str) -> Option<&str> {
        self.aliases.get(alias).map(|e| e.package.as_str())
    }

    pub fn mark_used(&mut self, package: &str) {
        self.used.insert(package.to_string());
    }

    pub fn is_used(&self, package: &str) -> bool {
        self.used.contains(package)
    }

    /// Explicit imports nothing referenced, one entry per package.
    pub fn unused(&self, ignore: &[String]) -> Vec<&ImportEntry> {
        let mut seen = BTreeSet::new();
        self.aliases
            .values()
            .filter(|e| e.explicit && !self.used.contains(&e.package))
            .filter(|e| !IGNORE_UNUSED_IMPORTS.contains(&e.package.as_str()))
            .filter(|e| !ignore.iter().any(|i| i == &e.package))
            .filter(|e| seen.insert(e.package.as_str()))
            .collect()
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Access to the exports of already-loaded dependency packages.
pub trait TypeLookup {
    fn exports(&self, package: &str) -> Option<&Exports>;
}

impl TypeLookup for BTreeMap<String, Exports> {
    fn exports(&self, package: &str) -> Option<&Exports> {
        self.get(package)
    }
}

pub struct TypeResolver<'a> {
    package: String,
    local: &'a Exports,
    dependencies: &'a dyn TypeLookup,
    imports: ImportTable,
}

impl<'a> TypeResolver<'a> {
    pub fn new(
        package: impl Into<String>,
        local: &'a Exports,
        dependencies: &'a dyn TypeLookup,
        imports: ImportTable,
    ) -> Self {
        Self {
            package: package.into(),
            local,
            dependencies,
            imports,
        }
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn imports(&self) -> &ImportTable {
        &self.imports
    }

    pub fn resolve(&mut self, alias: Option<&str>, name: &str) -> Result<TypeRefHandle, SchemaError> {
        let alias = alias.filter(|a| !a.is_empty() && *a != self.package);
        let Some(alias) = alias else {
            return self.local.get(name).cloned().ok_or_else(|| SchemaError::TypeNotFound {
                package: None,
                name: name.to_string(),
            });
        };

        let package = self
            .imports
            .package_for(alias)
            .ok_or_else(|| SchemaError::PackageNotFound {
                package: alias.to_string(),
                name: name.to_string(),
            })?
            .to_string();

        let found = if package == self.package {
            self.local.get(name).cloned()
        } else {
            self.dependencies
                .exports(&package)
                .and_then(|exports| exports.get(name))
                .cloned()
        };
        let found = found.ok_or_else(|| SchemaError::TypeNotFound {
            package: Some(package.clone()),
            name: name.to_string(),
        })?;
        self.imports.mark_used(&package);
        Ok(found)
    }
}
