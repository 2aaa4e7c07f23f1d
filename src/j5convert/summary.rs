//! File Summaries
//!
//! What a file exports and what it needs, computed before any dependency
//! is loaded.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::diagnostics::{Diagnostics, Position};
use crate::error::Warning;
use crate::sourcewalk::{EnumNode, FileNode, ObjectNode, OneofNode, RefNode, SchemaVisitor};
use crate::typeref::{EnumRef, TypeRef};

use super::resolve::{package_of_file, Exports, ImportTable};

/// Suffix of files generated from schema sources.
pub const GENERATED_SUFFIX: &str = ".p.j5s.proto";

// =============================================================================
// Output Filenames
// =============================================================================

fn split_source(source: &str) -> (&str, &str) {
    let stem = source.strip_suffix(".j5s").unwrap_or(source);
    match stem.rsplit_once('/') {
        Some((dir, base)) => (dir, base),
        None => ("", stem),
    }
}

fn join(dir: &str, rest: &str) -> String {
    if dir.is_empty() {
        rest.to_string()
    } else {
        format!("{dir}/{rest}")
    }
}

/// `foo/v1/foo.j5s` → `foo/v1/foo.p.j5s.proto`
pub fn main_filename(source: &str) -> String {
    let (dir, base) = split_source(source);
    join(dir, &format!("{base}{GENERATED_SUFFIX}"))
}

/// `foo/v1/foo.j5s` → `foo/v1/service/foo.p.j5s.proto`
pub fn service_filename(source: &str) -> String {
    let (dir, base) = split_source(source);
    join(dir, &format!("service/{base}{GENERATED_SUFFIX}"))
}

/// `foo/v1/foo.j5s` → `foo/v1/topic/foo.p.j5s.proto`
pub fn topic_filename(source: &str) -> String {
    let (dir, base) = split_source(source);
    join(dir, &format!("topic/{base}{GENERATED_SUFFIX}"))
}

// =============================================================================
// Summary
// =============================================================================

/// A reference written in schema source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDependency {
    pub alias: Option<String>,
    /// Package the alias maps to; `None` when the file never imported it
    pub package: Option<String>,
    pub schema: String,
    pub position: Option<Position>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSummary {
    pub source_filename: String,
    pub package: String,
    pub exports: Exports,
    pub file_dependencies: Vec<String>,
    pub type_dependencies: Vec<TypeDependency>,
    pub produces_files: Vec<String>,
}

impl FileSummary {
    /// Foreign packages that must be loaded before this file converts.
    pub fn dependency_packages(&self) -> BTreeSet<String> {
        let from_types = self
            .type_dependencies
            .iter()
            .filter_map(|d| d.package.clone());
        let from_files = self.file_dependencies.iter().map(|f| package_of_file(f));
        from_types
            .chain(from_files)
            .filter(|p| !p.is_empty() && *p != self.package)
            .collect()
    }
}

/// Summarise a normalised schema file. Unused explicit imports are
/// reported as warnings unless listed in `ignore_unused`.
pub fn summarize(file: &FileNode, ignore_unused: &[String], diagnostics: &mut Diagnostics) -> FileSummary {
    let defining_file = main_filename(&file.filename);

    let mut exports = ExportCollector {
        package: &file.package,
        defining_file: &defining_file,
        exports: Exports::new(),
    };
    file.visit_schemas(&mut exports);

    let mut refs = RefCollector {
        imports: ImportTable::new(&file.imports),
        dependencies: Vec::new(),
    };
    file.visit(&mut refs);

    for unused in refs.imports.unused(ignore_unused) {
        diagnostics.warning(
            unused.position.clone(),
            Warning::UnusedImport {
                package: unused.package.clone(),
            },
        );
    }

    let mut produces_files = vec![defining_file.clone()];
    if file.service_file.is_some() {
        produces_files.push(service_filename(&file.filename));
    }
    if file.topic_file.is_some() {
        produces_files.push(topic_filename(&file.filename));
    }

    FileSummary {
        source_filename: file.filename.clone(),
        package: file.package.clone(),
        exports: exports.exports,
        file_dependencies: file
            .imports
            .iter()
            .filter(|i| i.is_file())
            .map(|i| {
                if i.path.ends_with(".j5s") {
                    main_filename(&i.path)
                } else {
                    i.path.clone()
                }
            })
            .collect(),
        type_dependencies: refs.dependencies,
        produces_files,
    }
}

/// Exports for schemas hoisted out of request, response and topic message
/// bodies. They live in the output file's own package, not the source
/// package.
pub(crate) fn local_exports<'n>(
    package: &str,
    defining_file: &str,
    objects: impl IntoIterator<Item = &'n ObjectNode>,
) -> Exports {
    let mut collector = ExportCollector {
        package,
        defining_file,
        exports: Exports::new(),
    };
    for object in objects {
        object.visit(&mut collector);
    }
    collector.exports
}

struct ExportCollector<'f> {
    package: &'f str,
    defining_file: &'f str,
    exports: Exports,
}

impl ExportCollector<'_> {
    fn insert(&mut self, type_ref: TypeRef) {
        self.exports.insert(type_ref.name.clone(), Arc::new(type_ref));
    }
}

impl SchemaVisitor for ExportCollector<'_> {
    fn visit_object(&mut self, node: &ObjectNode) {
        let r = TypeRef::message(self.package, &node.full_name, self.defining_file, false)
            .with_position(node.source.position());
        self.insert(r);
    }

    fn visit_oneof(&mut self, node: &OneofNode) {
        let r = TypeRef::message(self.package, &node.full_name, self.defining_file, true)
            .with_position(node.source.position());
        self.insert(r);
    }

    fn visit_enum(&mut self, node: &EnumNode) {
        let enum_ref = EnumRef {
            prefix: node.prefix.clone(),
            values: node
                .options
                .iter()
                .map(|o| (o.name.clone(), o.number))
                .collect(),
        };
        let r = TypeRef::enumeration(self.package, &node.full_name, self.defining_file, enum_ref)
            .with_position(node.source.position());
        self.insert(r);
    }
}

struct RefCollector {
    imports: ImportTable,
    dependencies: Vec<TypeDependency>,
}

impl SchemaVisitor for RefCollector {
    fn visit_ref(&mut self, node: &RefNode) {
        if node.inline {
            return;
        }
        let package = node
            .package_alias
            .as_deref()
            .and_then(|alias| self.imports.package_for(alias))
            .map(str::to_string);
        if let Some(package) = &package {
            self.imports.mark_used(package);
        }
        self.dependencies.push(TypeDependency {
            alias: node.package_alias.clone(),
            package,
            schema: node.schema.clone(),
            position: node.source.position(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sourcedef::SourceFile;
    use crate::sourcewalk::walk_file;
    use serde_json::json;

    fn summarize_json(value: serde_json::Value) -> (FileSummary, Diagnostics) {
        let file: SourceFile = serde_json::from_value(value).unwrap();
        let mut diagnostics = Diagnostics::new();
        let node = walk_file("foo.v1", "foo/v1/foo.j5s", &file, &mut diagnostics);
        let summary = summarize(&node, &[], &mut diagnostics);
        (summary, diagnostics)
    }

    #[test]
    fn test_output_filenames() {
        assert_eq!(main_filename("foo/v1/foo.j5s"), "foo/v1/foo.p.j5s.proto");
        assert_eq!(service_filename("foo/v1/foo.j5s"), "foo/v1/service/foo.p.j5s.proto");
        assert_eq!(topic_filename("foo/v1/foo.j5s"), "foo/v1/topic/foo.p.j5s.proto");
    }

    #[test]
    fn test_exports_one_per_top_level_schema() {
        let (summary, diagnostics) = summarize_json(json!({ "elements": [
            { "object": { "name": "A" } },
            { "oneof": { "name": "B" } },
            { "enum": { "name": "C", "options": [{ "name": "X" }] } },
        ] }));
        assert!(diagnostics.is_empty());
        let names: Vec<&str> = summary.exports.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert!(summary.exports["B"].is_oneof());
        assert_eq!(summary.exports["C"].as_enum().unwrap().values["X"], 1);
        assert_eq!(summary.exports["A"].defining_file, "foo/v1/foo.p.j5s.proto");
        assert_eq!(summary.produces_files, vec!["foo/v1/foo.p.j5s.proto"]);
    }

    #[test]
    fn test_type_dependencies_and_unused_imports() {
        let (summary, diagnostics) = summarize_json(json!({
            "imports": [{ "path": "bar.v1" }, { "path": "baz.v1" }],
            "elements": [{ "object": { "name": "A", "properties": [
                { "name": "bar", "schema": { "object": { "ref": { "package": "bar", "schema": "Bar" } } } },
                { "name": "local", "schema": { "object": { "ref": { "schema": "A" } } } },
                { "name": "inline", "schema": { "object": { "object": {} } } },
            ] } }]
        }));
        assert_eq!(summary.type_dependencies.len(), 2);
        assert_eq!(summary.type_dependencies[0].package.as_deref(), Some("bar.v1"));
        assert_eq!(summary.type_dependencies[1].package, None);
        assert_eq!(
            summary.dependency_packages().into_iter().collect::<Vec<_>>(),
            vec!["bar.v1"]
        );

        let warnings: Vec<&Warning> = diagnostics.warnings().collect();
        assert_eq!(
            warnings,
            vec![&Warning::UnusedImport { package: "baz.v1".into() }]
        );
        // The hoisted inline object is exported under its nested name
        assert!(summary.exports.contains_key("A.Inline"));
    }

    #[test]
    fn test_entity_produces_service_file() {
        let (summary, _) = summarize_json(json!({ "elements": [{ "entity": {
            "name": "foo",
            "base_url_path": "/foo/v1",
            "keys": [{ "name": "fooId", "entity_key": { "primary_key": true },
                       "schema": { "key": {} } }]
        } }] }));
        assert_eq!(
            summary.produces_files,
            vec!["foo/v1/foo.p.j5s.proto", "foo/v1/service/foo.p.j5s.proto"]
        );
        assert!(summary.dependency_packages().contains("j5.state.v1"));
        assert!(summary.dependency_packages().contains("j5.list.v1"));
    }
}
