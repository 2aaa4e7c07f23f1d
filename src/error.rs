//! Error types for the schema build

use thiserror::Error;

use crate::diagnostics::{Diagnostics, Position};

/// Result type for build operations
pub type Result<T> = std::result::Result<T, BuildError>;

/// Errors that abort a package load or build.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("circular dependency: {} -> {dependency}", .chain.join(" -> "))]
    CircularDependency { chain: Vec<String>, dependency: String },

    #[error("{position}: parse error: {message}")]
    Parse { position: Position, message: String },

    #[error("package not found: {package} (required by {required_by})")]
    MissingPackage { package: String, required_by: String },

    #[error("duplicate export {name} in package {package} ({first} and {second})")]
    DuplicateExport {
        package: String,
        name: String,
        first: String,
        second: String,
    },

    #[error("unsupported source file: {0}")]
    UnsupportedFile(String),

    #[error("build failed with {} error(s)", .0.error_count())]
    Failed(Diagnostics),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-schema semantic errors. These are collected rather than raised so a
/// single pass reports every defect in a file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("type not found: {}", qualified(.package, .name))]
    TypeNotFound { package: Option<String>, name: String },

    #[error("package {package} is not imported (referenced by {package}.{name})")]
    PackageNotFound { package: String, name: String },

    #[error("field {field} has no schema: {reason}")]
    MissingSubSchema { field: String, reason: String },

    #[error("field {field} is both required and explicitly optional")]
    RequiredAndOptional { field: String },

    #[error("field {field} has unknown format {format:?}")]
    UnknownFormat { field: String, format: String },

    #[error("field {field} has invalid pattern {pattern:?}: {message}")]
    InvalidPattern {
        field: String,
        pattern: String,
        message: String,
    },

    #[error("method {method}: path parameter :{param} has no matching request field")]
    PathParameterMissing { method: String, param: String },

    #[error("duplicate schema name {name}")]
    DuplicateSchema { name: String },

    #[error("duplicate field number {number} in {schema} ({first} and {second})")]
    DuplicateFieldNumber {
        schema: String,
        number: i32,
        first: String,
        second: String,
    },

    #[error("field {field}: {outer} cannot contain {inner}")]
    NestedCollection {
        field: String,
        outer: &'static str,
        inner: &'static str,
    },

    #[error("field {field}: map keys must be strings")]
    InvalidMapKey { field: String },

    #[error("field {field}: enum {enum_name} has no option {option}")]
    UnknownEnumOption {
        field: String,
        enum_name: String,
        option: String,
    },

    #[error("field {field}: rule value {value} does not fit {format}")]
    RuleOutOfRange {
        field: String,
        value: String,
        format: &'static str,
    },

    #[error("expected {expected} for {name}, found {found}")]
    WrongKind {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
}

fn qualified(package: &Option<String>, name: &str) -> String {
    match package {
        Some(package) => format!("{}.{}", package, name),
        None => name.to_string(),
    }
}

impl SchemaError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::TypeNotFound { .. } => "E101",
            Self::PackageNotFound { .. } => "E102",
            Self::MissingSubSchema { .. } => "E103",
            Self::RequiredAndOptional { .. } => "E104",
            Self::UnknownFormat { .. } => "E105",
            Self::InvalidPattern { .. } => "E106",
            Self::PathParameterMissing { .. } => "E107",
            Self::DuplicateSchema { .. } => "E108",
            Self::DuplicateFieldNumber { .. } => "E109",
            Self::NestedCollection { .. } => "E110",
            Self::InvalidMapKey { .. } => "E111",
            Self::UnknownEnumOption { .. } => "E112",
            Self::RuleOutOfRange { .. } => "E113",
            Self::WrongKind { .. } => "E114",
        }
    }
}

/// Non-fatal findings. Lint callers treat them as failures; builds do not.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    #[error("import {package} is never used")]
    UnusedImport { package: String },

    #[error("enum {enum_name}: zero value {value} does not end in _UNSPECIFIED, prefix left empty")]
    EnumZeroSuffix { enum_name: String, value: String },
}

impl Warning {
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnusedImport { .. } => "W101",
            Self::EnumZeroSuffix { .. } => "W102",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_dependency_message() {
        let err = BuildError::CircularDependency {
            chain: vec!["a.v1".into(), "b.v1".into()],
            dependency: "a.v1".into(),
        };
        assert_eq!(err.to_string(), "circular dependency: a.v1 -> b.v1 -> a.v1");
    }

    #[test]
    fn test_type_not_found_message() {
        let local = SchemaError::TypeNotFound { package: None, name: "Foo".into() };
        assert_eq!(local.to_string(), "type not found: Foo");

        let foreign = SchemaError::TypeNotFound {
            package: Some("bar.v1".into()),
            name: "Foo".into(),
        };
        assert_eq!(foreign.to_string(), "type not found: bar.v1.Foo");
        assert_eq!(foreign.code(), "E101");
    }
}
