//! Exported schema identities
//!
//! A `TypeRef` is created once while summarising a file and then shared by
//! every package and converter that needs to point at the type.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::diagnostics::Position;

/// Shared handle to an immutable type reference
pub type TypeRefHandle = Arc<TypeRef>;

/// One exported message, oneof or enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    pub package: String,
    /// Name within the package, dotted for nested types (`Parent.Child`)
    pub name: String,
    /// Descriptor filename that dependents must import
    pub defining_file: String,
    pub position: Option<Position>,
    pub kind: TypeRefKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRefKind {
    Enum(EnumRef),
    Message(MessageRef),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumRef {
    pub prefix: String,
    /// Option names without the prefix, mapped to their numbers
    pub values: BTreeMap<String, i32>,
}

impl EnumRef {
    /// Look up an option by short or fully prefixed name.
    pub fn value(&self, name: &str) -> Option<i32> {
        if let Some(number) = self.values.get(name) {
            return Some(*number);
        }
        name.strip_prefix(self.prefix.as_str())
            .filter(|_| !self.prefix.is_empty())
            .and_then(|short| self.values.get(short).copied())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    pub is_oneof: bool,
}

impl TypeRef {
    pub fn message(
        package: impl Into<String>,
        name: impl Into<String>,
        defining_file: impl Into<String>,
        is_oneof: bool,
    ) -> Self {
        Self {
            package: package.into(),
            name: name.into(),
            defining_file: defining_file.into(),
            position: None,
            kind: TypeRefKind::Message(MessageRef { is_oneof }),
        }
    }

    pub fn enumeration(
        package: impl Into<String>,
        name: impl Into<String>,
        defining_file: impl Into<String>,
        enum_ref: EnumRef,
    ) -> Self {
        Self {
            package: package.into(),
            name: name.into(),
            defining_file: defining_file.into(),
            position: None,
            kind: TypeRefKind::Enum(enum_ref),
        }
    }

    pub fn with_position(mut self, position: Option<Position>) -> Self {
        self.position = position;
        self
    }

    /// `package.Name`
    pub fn full_name(&self) -> String {
        if self.package.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.package, self.name)
        }
    }

    /// Fully qualified descriptor type name: `.package.Name`
    pub fn type_name(&self) -> String {
        format!(".{}", self.full_name())
    }

    pub fn as_enum(&self) -> Option<&EnumRef> {
        match &self.kind {
            TypeRefKind::Enum(e) => Some(e),
            TypeRefKind::Message(_) => None,
        }
    }

    pub fn as_message(&self) -> Option<&MessageRef> {
        match &self.kind {
            TypeRefKind::Message(m) => Some(m),
            TypeRefKind::Enum(_) => None,
        }
    }

    pub fn is_enum(&self) -> bool {
        self.as_enum().is_some()
    }

    pub fn is_oneof(&self) -> bool {
        self.as_message().map(|m| m.is_oneof).unwrap_or(false)
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            TypeRefKind::Enum(_) => "enum",
            TypeRefKind::Message(m) if m.is_oneof => "oneof",
            TypeRefKind::Message(_) => "object",
        }
    }
}
