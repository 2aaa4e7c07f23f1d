//! Source Listing & Classification
//!
//! Where package files come from. Local sources hold the files being
//! compiled; an external dependency set supplies already-compiled
//! descriptors for packages that are not in the local tree.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use prost::Message;
use walkdir::WalkDir;

use crate::descriptor::{FileDescriptorProto, FileDescriptorSet};
use crate::diagnostics::Position;
use crate::error::{BuildError, Result};
use crate::j5convert::GENERATED_SUFFIX;

/// `foo.bar.v1` → `foo/bar/v1`
pub fn package_dir(package: &str) -> String {
    package.replace('.', "/")
}

// =============================================================================
// Classification
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// `.proto`, parsed straight into a descriptor
    Native,
    /// `.j5s`, parsed into a schema syntax tree
    Schema,
}

pub fn classify(filename: &str) -> Result<SourceKind> {
    if filename.ends_with(".j5s") {
        Ok(SourceKind::Schema)
    } else if filename.ends_with(".proto") {
        Ok(SourceKind::Native)
    } else {
        Err(BuildError::UnsupportedFile(filename.to_string()))
    }
}

/// Output written next to its source by a previous build.
pub fn is_generated(filename: &str) -> bool {
    filename.ends_with(GENERATED_SUFFIX)
}

fn is_source_file(filename: &str) -> bool {
    !is_generated(filename) && classify(filename).is_ok()
}

/// Whether `filename` sits directly inside `dir` (no sub-directory).
fn directly_in(dir: &str, filename: &str) -> bool {
    filename
        .strip_prefix(dir)
        .and_then(|rest| rest.strip_prefix('/'))
        .map(|base| !base.is_empty() && !base.contains('/'))
        .unwrap_or(false)
}

// =============================================================================
// Local Sources
// =============================================================================

pub trait LocalFileSource {
    /// Every package with at least one source file.
    fn list_packages(&self) -> Result<Vec<String>>;

    /// Source files directly inside the package directory, sorted.
    fn list_source_files(&self, package: &str) -> Result<Vec<String>>;

    fn read(&self, filename: &str) -> Result<Vec<u8>>;
}

/// Source tree on disk. Filenames are relative to `root` with `/`
/// separators.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
    /// Directory prefixes never listed
    skip_prefixes: Vec<String>,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            skip_prefixes: vec![
                "target/".to_string(),
                ".git/".to_string(),
                "node_modules/".to_string(),
            ],
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn relative(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }
}

impl LocalFileSource for DirectorySource {
    fn list_packages(&self) -> Result<Vec<String>> {
        let mut packages = BTreeSet::new();
        for entry in WalkDir::new(&self.root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(relative) = self.relative(entry.path()) else {
                continue;
            };
            if self.skip_prefixes.iter().any(|p| relative.starts_with(p)) {
                continue;
            }
            if !is_source_file(&relative) {
                continue;
            }
            if let Some((dir, _)) = relative.rsplit_once('/') {
                packages.insert(dir.replace('/', "."));
            }
        }
        Ok(packages.into_iter().collect())
    }

    fn list_source_files(&self, package: &str) -> Result<Vec<String>> {
        let dir = self.root.join(package_dir(package));
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(relative) = self.relative(entry.path()) {
                if is_source_file(&relative) {
                    files.push(relative);
                }
            }
        }
        files.sort();
        Ok(files)
    }

    fn read(&self, filename: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.root.join(filename))?)
    }
}

/// In-memory source tree, keyed by relative filename.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, filename: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.files.insert(filename.into(), content.into());
    }

    pub fn with_file(mut self, filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(filename, content);
        self
    }
}

impl LocalFileSource for MemorySource {
    fn list_packages(&self) -> Result<Vec<String>> {
        let packages: BTreeSet<String> = self
            .files
            .keys()
            .filter(|f| is_source_file(f))
            .filter_map(|f| f.rsplit_once('/').map(|(dir, _)| dir.replace('/', ".")))
            .collect();
        Ok(packages.into_iter().collect())
    }

    fn list_source_files(&self, package: &str) -> Result<Vec<String>> {
        let dir = package_dir(package);
        Ok(self
            .files
            .keys()
            .filter(|f| directly_in(&dir, f) && is_source_file(f))
            .cloned()
            .collect())
    }

    fn read(&self, filename: &str) -> Result<Vec<u8>> {
        self.files.get(filename).cloned().ok_or_else(|| {
            BuildError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{filename} not found"),
            ))
        })
    }
}

// =============================================================================
// External Dependencies
// =============================================================================

/// Already-compiled descriptors for packages outside the local tree.
pub trait ExternalDependencySet {
    fn get_file(&self, filename: &str) -> Option<FileDescriptorProto>;

    /// Filenames under `prefix`, sorted.
    fn list_files(&self, prefix: &str) -> Vec<String>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryDependencySet {
    files: BTreeMap<String, FileDescriptorProto>,
}

impl MemoryDependencySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file: FileDescriptorProto) {
        self.files.insert(file.name().to_string(), file);
    }

    /// Load every file of an encoded `FileDescriptorSet`.
    pub fn from_descriptor_set(bytes: &[u8]) -> Result<Self> {
        let set = FileDescriptorSet::decode(bytes).map_err(|e| BuildError::Parse {
            position: Position::new("<descriptor set>", 0, 0),
            message: e.to_string(),
        })?;
        let mut deps = Self::new();
        for file in set.file {
            deps.insert(file);
        }
        Ok(deps)
    }
}

impl ExternalDependencySet for MemoryDependencySet {
    fn get_file(&self, filename: &str) -> Option<FileDescriptorProto> {
        self.files.get(filename).cloned()
    }

    fn list_files(&self, prefix: &str) -> Vec<String> {
        self.files
            .keys()
            .filter(|f| f.starts_with(prefix))
            .cloned()
            .collect()
    }
}
