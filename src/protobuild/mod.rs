//! Package Resolver
//!
//! Loads packages by name, recursively loading the packages they depend on,
//! and converts their files once every dependency's exports are known.
//! Loaded packages are frozen behind an `Arc` and memoised for the life of
//! the [`PackageSet`].
//!
//! Packages come from, in order of preference:
//! - the builtin table ([`builtin`]);
//! - the local source tree;
//! - the external dependency set.

pub mod baton;
pub mod builtin;
pub mod graph;
pub mod native;
pub mod source;

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use prost::Message;
use tracing::{debug, info};

use crate::config::BuildConfig;
use crate::descriptor::{encode_descriptor_set, FileDescriptorProto};
use crate::diagnostics::{Diagnostics, Position};
use crate::error::{BuildError, Result};
use crate::j5convert::{convert_file, summarize, Exports, FileSummary, ImportTable, TypeLookup, TypeResolver};
use crate::sourcedef::{self, JsonSchemaParser, SchemaParser};
use crate::sourcewalk::walk_file;

pub use baton::ResolveBaton;
pub use graph::{order_files, PackageGraph};
pub use native::{parse_native, summarize_native};
pub use source::{
    classify, is_generated, package_dir, DirectorySource, ExternalDependencySet, LocalFileSource,
    MemoryDependencySet, MemorySource, SourceKind,
};

// =============================================================================
// Source Files & Packages
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum SourceContent {
    Native(FileDescriptorProto),
    Schema(sourcedef::SourceFile),
}

/// One parsed and summarised member file of a package.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub filename: String,
    pub summary: FileSummary,
    pub raw: Vec<u8>,
    pub content: SourceContent,
}

impl SourceFile {
    /// Classify, parse and summarise `raw`. Summary warnings and walk
    /// errors go to `diagnostics`.
    pub fn parse(
        package: &str,
        filename: &str,
        raw: Vec<u8>,
        parser: &dyn SchemaParser,
        ignore_unused: &[String],
        diagnostics: &mut Diagnostics,
    ) -> Result<Self> {
        let (summary, content) = match classify(filename)? {
            SourceKind::Native => {
                let text = std::str::from_utf8(&raw).map_err(|e| BuildError::Parse {
                    position: Position::new(filename, 1, 1),
                    message: e.to_string(),
                })?;
                let descriptor = parse_native(filename, text)?;
                let summary = summarize_native(&descriptor, diagnostics);
                (summary, SourceContent::Native(descriptor))
            }
            SourceKind::Schema => {
                let tree = parser.parse(filename, &raw)?;
                let node = walk_file(package, filename, &tree, diagnostics);
                let summary = summarize(&node, ignore_unused, diagnostics);
                (summary, SourceContent::Schema(tree))
            }
        };
        Ok(Self {
            filename: filename.to_string(),
            summary,
            raw,
            content,
        })
    }
}

/// A fully loaded, converted package. Never mutated once built.
#[derive(Debug, Clone)]
pub struct Package {
    pub name: String,
    pub source_files: Vec<SourceFile>,
    /// Descriptor files by filename
    pub files: BTreeMap<String, FileDescriptorProto>,
    pub exports: Exports,
    pub direct_dependencies: BTreeMap<String, Arc<Package>>,
    /// This package's own warnings and errors
    pub diagnostics: Diagnostics,
}

impl Package {
    fn builtin(name: &str) -> Self {
        Self {
            name: name.to_string(),
            source_files: Vec::new(),
            files: BTreeMap::new(),
            exports: builtin::package_exports(name),
            direct_dependencies: BTreeMap::new(),
            diagnostics: Diagnostics::new(),
        }
    }
}

/// Resolves exports against the packages a package depends on directly.
struct DependencyExports<'p>(&'p BTreeMap<String, Arc<Package>>);

impl TypeLookup for DependencyExports<'_> {
    fn exports(&self, package: &str) -> Option<&Exports> {
        self.0.get(package).map(|p| &p.exports)
    }
}

// =============================================================================
// Build Output
// =============================================================================

#[derive(Debug, Clone)]
pub struct BuildOutput {
    /// Every file of the requested packages and their dependencies, each
    /// after the files it imports
    pub files: Vec<FileDescriptorProto>,
    /// Warnings from the whole closure
    pub diagnostics: Diagnostics,
}

impl BuildOutput {
    pub fn encode_descriptor_set(&self) -> Vec<u8> {
        encode_descriptor_set(&self.files)
    }

    pub fn file(&self, name: &str) -> Option<&FileDescriptorProto> {
        self.files.iter().find(|f| f.name() == name)
    }
}

// =============================================================================
// Package Set
// =============================================================================

pub struct PackageSet {
    source: Box<dyn LocalFileSource>,
    external: Option<Box<dyn ExternalDependencySet>>,
    parser: Box<dyn SchemaParser>,
    ignore_unused: Vec<String>,
    packages: BTreeMap<String, Arc<Package>>,
    diagnostics: Diagnostics,
}

impl PackageSet {
    pub fn new(source: impl LocalFileSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            external: None,
            parser: Box::new(JsonSchemaParser),
            ignore_unused: Vec::new(),
            packages: BTreeMap::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    /// A set reading the configured source root.
    pub fn from_config(config: &BuildConfig) -> Self {
        Self::new(DirectorySource::new(config.source_root()))
            .with_ignored_unused(config.lint.ignore_unused_imports.clone())
    }

    pub fn with_external(mut self, external: impl ExternalDependencySet + 'static) -> Self {
        self.external = Some(Box::new(external));
        self
    }

    pub fn with_parser(mut self, parser: impl SchemaParser + 'static) -> Self {
        self.parser = Box::new(parser);
        self
    }

    /// Packages whose unused imports are never reported.
    pub fn with_ignored_unused(mut self, packages: Vec<String>) -> Self {
        self.ignore_unused = packages;
        self
    }

    pub fn package(&self, name: &str) -> Option<&Arc<Package>> {
        self.packages.get(name)
    }

    pub fn loaded_packages(&self) -> impl Iterator<Item = &Arc<Package>> {
        self.packages.values()
    }

    /// Every diagnostic recorded by loads on this set so far.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn local_packages(&self) -> Result<Vec<String>> {
        self.source.list_packages()
    }

    /// Load a package and everything it depends on. A package already
    /// loaded by this set is returned as is.
    pub fn load(&mut self, name: &str) -> Result<Arc<Package>> {
        let collector = RefCell::new(Diagnostics::new());
        let result = {
            let baton = ResolveBaton::new(&collector);
            self.load_with(name, &baton)
        };
        self.diagnostics.merge(collector.into_inner());
        result
    }

    pub fn load_all(&mut self) -> Result<Vec<Arc<Package>>> {
        let names = self.local_packages()?;
        names.iter().map(|name| self.load(name)).collect()
    }

    /// Link the requested packages. Fails when any package in the closure
    /// recorded an error.
    pub fn build(&mut self, names: &[&str]) -> Result<BuildOutput> {
        let closure = self.closure(names)?;
        let diagnostics = merged_diagnostics(&closure);
        if diagnostics.has_errors() {
            return Err(BuildError::Failed(diagnostics));
        }
        let files = closure
            .iter()
            .flat_map(|p| p.files.values().cloned())
            .collect();
        let files = order_files(files);
        info!(
            packages = closure.len(),
            files = files.len(),
            warnings = diagnostics.warning_count(),
            "build complete"
        );
        Ok(BuildOutput { files, diagnostics })
    }

    /// Every diagnostic of the requested packages and their dependencies,
    /// warnings included.
    pub fn lint(&mut self, names: &[&str]) -> Result<Diagnostics> {
        let closure = self.closure(names)?;
        Ok(merged_diagnostics(&closure))
    }

    /// Graph of the requested packages, or of every loaded one.
    pub fn graph(&self, names: &[&str]) -> PackageGraph {
        if names.is_empty() {
            return PackageGraph::from_packages(self.packages.values());
        }
        PackageGraph::from_packages(names.iter().filter_map(|n| self.packages.get(*n)))
    }

    /// Loaded closure of `names`, dependencies first.
    fn closure(&mut self, names: &[&str]) -> Result<Vec<Arc<Package>>> {
        let roots = names
            .iter()
            .map(|name| self.load(name))
            .collect::<Result<Vec<_>>>()?;
        let graph = PackageGraph::from_packages(&roots);
        Ok(graph
            .dependency_order()
            .iter()
            .filter_map(|name| self.packages.get(name).cloned())
            .collect())
    }

    fn load_with(&mut self, name: &str, baton: &ResolveBaton<'_>) -> Result<Arc<Package>> {
        if let Some(package) = self.packages.get(name) {
            return Ok(Arc::clone(package));
        }
        baton.check(name)?;
        let requester = baton.requester().map(str::to_string);
        let baton = baton.clone_for(name);

        let package = if builtin::is_builtin_package(name) {
            Package::builtin(name)
        } else {
            let local = self.source.list_source_files(name)?;
            if !local.is_empty() {
                self.load_local(name, local, &baton)?
            } else if let Some(package) = self.load_external(name, &baton)? {
                package
            } else {
                return Err(BuildError::MissingPackage {
                    package: name.to_string(),
                    required_by: requester.unwrap_or_else(|| "<root>".to_string()),
                });
            }
        };

        let package = Arc::new(package);
        baton.record(&package.diagnostics);
        self.packages.insert(name.to_string(), Arc::clone(&package));
        Ok(package)
    }

    fn load_local(&mut self, name: &str, filenames: Vec<String>, baton: &ResolveBaton<'_>) -> Result<Package> {
        debug!(package = name, files = filenames.len(), "loading package");
        let mut diagnostics = Diagnostics::new();

        let mut source_files = Vec::with_capacity(filenames.len());
        for filename in &filenames {
            let raw = self.source.read(filename)?;
            source_files.push(SourceFile::parse(
                name,
                filename,
                raw,
                self.parser.as_ref(),
                &self.ignore_unused,
                &mut diagnostics,
            )?);
        }
        let exports = merge_exports(name, &source_files)?;

        let needed = needed_packages(name, source_files.iter().map(|f| &f.summary));
        let direct_dependencies = self.resolve_dependencies(name, needed, baton)?;

        let mut files = BTreeMap::new();
        let lookup = DependencyExports(&direct_dependencies);
        for source in &source_files {
            match &source.content {
                SourceContent::Native(descriptor) => {
                    files.insert(descriptor.name().to_string(), descriptor.clone());
                }
                SourceContent::Schema(tree) => {
                    // Walk problems were recorded while loading
                    let mut walked = Diagnostics::new();
                    let node = walk_file(name, &source.filename, tree, &mut walked);
                    let mut resolver =
                        TypeResolver::new(name, &exports, &lookup, ImportTable::new(&node.imports));
                    for file in convert_file(&node, &mut resolver, &mut diagnostics) {
                        files.insert(file.name().to_string(), file);
                    }
                }
            }
        }

        info!(
            package = name,
            files = files.len(),
            warnings = diagnostics.warning_count(),
            errors = diagnostics.error_count(),
            "converted package"
        );

        Ok(Package {
            name: name.to_string(),
            source_files,
            files,
            exports,
            direct_dependencies,
            diagnostics,
        })
    }

    fn load_external(&mut self, name: &str, baton: &ResolveBaton<'_>) -> Result<Option<Package>> {
        let Some(external) = &self.external else {
            return Ok(None);
        };
        let prefix = format!("{}/", package_dir(name));
        let descriptors: Vec<FileDescriptorProto> = external
            .list_files(&prefix)
            .iter()
            .filter_map(|filename| external.get_file(filename))
            .filter(|file| file.package() == name)
            .collect();
        if descriptors.is_empty() {
            return Ok(None);
        }
        debug!(package = name, files = descriptors.len(), "loading external package");

        let mut diagnostics = Diagnostics::new();
        let source_files: Vec<SourceFile> = descriptors
            .into_iter()
            .map(|descriptor| SourceFile {
                filename: descriptor.name().to_string(),
                summary: summarize_native(&descriptor, &mut diagnostics),
                raw: descriptor.encode_to_vec(),
                content: SourceContent::Native(descriptor),
            })
            .collect();
        let exports = merge_exports(name, &source_files)?;

        let needed = needed_packages(name, source_files.iter().map(|f| &f.summary));
        let direct_dependencies = self.resolve_dependencies(name, needed, baton)?;

        let files = source_files
            .iter()
            .filter_map(|f| match &f.content {
                SourceContent::Native(descriptor) => Some((f.filename.clone(), descriptor.clone())),
                SourceContent::Schema(_) => None,
            })
            .collect();

        Ok(Some(Package {
            name: name.to_string(),
            source_files,
            files,
            exports,
            direct_dependencies,
            diagnostics,
        }))
    }

    fn resolve_dependencies(
        &mut self,
        name: &str,
        needed: BTreeSet<String>,
        baton: &ResolveBaton<'_>,
    ) -> Result<BTreeMap<String, Arc<Package>>> {
        let mut dependencies = BTreeMap::new();
        for dependency in needed {
            debug!(package = name, dependency = %dependency, "dependency edge");
            let package = self.load_with(&dependency, baton)?;
            dependencies.insert(dependency, package);
        }
        Ok(dependencies)
    }
}

fn needed_packages<'s>(name: &str, summaries: impl Iterator<Item = &'s FileSummary>) -> BTreeSet<String> {
    summaries
        .flat_map(|s| s.dependency_packages())
        .filter(|p| p != name)
        .collect()
}

/// Union of member exports. A name exported by two files aborts the load.
fn merge_exports(package: &str, files: &[SourceFile]) -> Result<Exports> {
    let mut exports = Exports::new();
    let mut owners: BTreeMap<&str, &str> = BTreeMap::new();
    for file in files {
        for (name, type_ref) in &file.summary.exports {
            if let Some(first) = owners.insert(name, &file.filename) {
                return Err(BuildError::DuplicateExport {
                    package: package.to_string(),
                    name: name.clone(),
                    first: first.to_string(),
                    second: file.filename.clone(),
                });
            }
            exports.insert(name.clone(), Arc::clone(type_ref));
        }
    }
    Ok(exports)
}

fn merged_diagnostics(packages: &[Arc<Package>]) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();
    for package in packages {
        diagnostics.merge(package.diagnostics.clone());
    }
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaError;

    fn object_file(name: &str, imports: &[&str], refs: &[(&str, &str)]) -> String {
        let properties: Vec<serde_json::Value> = refs
            .iter()
            .enumerate()
            .map(|(i, (package, schema))| {
                serde_json::json!({
                    "name": format!("f{i}"),
                    "schema": { "object": { "ref": { "package": package, "schema": schema } } }
                })
            })
            .collect();
        let imports: Vec<serde_json::Value> =
            imports.iter().map(|p| serde_json::json!({ "path": p })).collect();
        serde_json::json!({
            "imports": imports,
            "elements": [{ "object": { "name": name, "properties": properties } }]
        })
        .to_string()
    }

    fn chain_source() -> MemorySource {
        MemorySource::new()
            .with_file("a/v1/a.j5s", object_file("A", &["b.v1"], &[("b", "B")]))
            .with_file("b/v1/b.j5s", object_file("B", &["c.v1"], &[("c", "C")]))
            .with_file("c/v1/c.j5s", object_file("C", &[], &[]))
    }

    #[test]
    fn test_load_resolves_dependencies() {
        let mut set = PackageSet::new(chain_source());
        let a = set.load("a.v1").unwrap();
        assert_eq!(a.direct_dependencies.keys().collect::<Vec<_>>(), vec!["b.v1"]);
        assert!(a.diagnostics.is_empty(), "{}", a.diagnostics);

        let file = &a.files["a/v1/a.p.j5s.proto"];
        assert!(file.dependency.contains(&"b/v1/b.p.j5s.proto".to_string()));
        let field = file.find_message("A").unwrap().find_field("f0").unwrap();
        assert_eq!(field.type_name(), ".b.v1.B");
        assert!(set.package("c.v1").is_some());
    }

    #[test]
    fn test_load_is_memoised() {
        let mut set = PackageSet::new(chain_source());
        let first = set.load("b.v1").unwrap();
        let second = set.load("b.v1").unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let a = set.load("a.v1").unwrap();
        assert!(Arc::ptr_eq(&a.direct_dependencies["b.v1"], &first));
    }

    #[test]
    fn test_cycle_is_reported_with_chain() {
        let source = chain_source()
            .with_file("c/v1/c.j5s", object_file("C", &["a.v1"], &[("a", "A")]));
        let mut set = PackageSet::new(source);
        match set.load("a.v1") {
            Err(BuildError::CircularDependency { chain, dependency }) => {
                assert_eq!(chain, vec!["a.v1", "b.v1", "c.v1"]);
                assert_eq!(dependency, "a.v1");
            }
            other => panic!("Expected circular dependency, got {:?}", other.map(|p| p.name.clone())),
        }
        assert!(set.package("a.v1").is_none());
    }

    #[test]
    fn test_missing_package() {
        let source = MemorySource::new()
            .with_file("a/v1/a.j5s", object_file("A", &["nope.v1"], &[("nope", "X")]));
        let mut set = PackageSet::new(source);
        match set.load("a.v1") {
            Err(BuildError::MissingPackage { package, required_by }) => {
                assert_eq!(package, "nope.v1");
                assert_eq!(required_by, "a.v1");
            }
            other => panic!("Expected missing package, got {:?}", other.map(|p| p.name.clone())),
        }
    }

    #[test]
    fn test_duplicate_export_across_files() {
        let source = MemorySource::new()
            .with_file("a/v1/one.j5s", object_file("A", &[], &[]))
            .with_file("a/v1/two.j5s", object_file("A", &[], &[]));
        let mut set = PackageSet::new(source);
        assert!(matches!(
            set.load("a.v1"),
            Err(BuildError::DuplicateExport { name, .. }) if name == "A"
        ));
    }

    #[test]
    fn test_build_fails_on_collected_errors() {
        let source = MemorySource::new()
            .with_file("a/v1/a.j5s", object_file("A", &[], &[("", "Missing")]));
        let mut set = PackageSet::new(source);
        match set.build(&["a.v1"]) {
            Err(BuildError::Failed(diagnostics)) => {
                assert_eq!(
                    diagnostics.errors().collect::<Vec<_>>(),
                    vec![&SchemaError::TypeNotFound {
                        package: None,
                        name: "Missing".into()
                    }]
                );
            }
            other => panic!("Expected failed build, got {:?}", other.map(|o| o.files.len())),
        }
        // Lint still reports, and the cached package keeps its diagnostics
        assert_eq!(set.lint(&["a.v1"]).unwrap().error_count(), 1);
    }

    #[test]
    fn test_external_dependency() {
        let bar = parse_native(
            "bar/v1/bar.proto",
            "syntax = \"proto3\";\npackage bar.v1;\nmessage Bar { string id = 1; }\n",
        )
        .unwrap();
        let mut external = MemoryDependencySet::new();
        external.insert(bar);

        let source = MemorySource::new()
            .with_file("a/v1/a.j5s", object_file("A", &["bar.v1"], &[("bar", "Bar")]));
        let mut set = PackageSet::new(source).with_external(external);
        let output = set.build(&["a.v1"]).unwrap();

        let names: Vec<&str> = output.files.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["bar/v1/bar.proto", "a/v1/a.p.j5s.proto"]);
        assert!(!output.encode_descriptor_set().is_empty());
    }
}
