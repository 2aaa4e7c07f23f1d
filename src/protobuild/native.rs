//! Native `.proto` Sources
//!
//! Parsed with `protox-parse` and summarised from the resulting descriptor.
//! Native files state their cross-file needs as imports, so their summary
//! carries file dependencies only.

use std::sync::Arc;

use miette::Diagnostic as _;
use tracing::warn;

use crate::descriptor::{from_prost_types, DescriptorProto, EnumDescriptorProto, FileDescriptorProto};
use crate::diagnostics::{Diagnostics, Position};
use crate::error::{BuildError, Result, Warning};
use crate::j5convert::{Exports, FileSummary};
use crate::typeref::{EnumRef, TypeRef};

const FILE_MESSAGE: i32 = 4;
const FILE_ENUM: i32 = 5;
const MESSAGE_NESTED: i32 = 3;
const MESSAGE_ENUM: i32 = 4;

pub fn parse_native(filename: &str, source: &str) -> Result<FileDescriptorProto> {
    let parsed = protox_parse::parse(filename, source).map_err(|e| {
        let offset = e
            .labels()
            .and_then(|mut labels| labels.next())
            .map(|label| label.offset())
            .unwrap_or(0);
        BuildError::Parse {
            position: Position::from_offset(filename, source, offset),
            message: e.to_string(),
        }
    })?;
    from_prost_types(&parsed).map_err(|e| BuildError::Parse {
        position: Position::new(filename, 1, 1),
        message: e.to_string(),
    })
}

/// Summarise a native descriptor: every message and enum, nested ones
/// under dotted names, is an export.
pub fn summarize_native(file: &FileDescriptorProto, diagnostics: &mut Diagnostics) -> FileSummary {
    let mut collector = NativeExports {
        file,
        exports: Exports::new(),
        diagnostics,
    };
    for (i, message) in file.message_type.iter().enumerate() {
        collector.message(message, None, vec![FILE_MESSAGE, i as i32]);
    }
    for (i, e) in file.enum_type.iter().enumerate() {
        collector.enumeration(e, None, vec![FILE_ENUM, i as i32]);
    }

    FileSummary {
        source_filename: file.name().to_string(),
        package: file.package().to_string(),
        exports: collector.exports,
        file_dependencies: file.dependency.clone(),
        type_dependencies: Vec::new(),
        produces_files: vec![file.name().to_string()],
    }
}

struct NativeExports<'a> {
    file: &'a FileDescriptorProto,
    exports: Exports,
    diagnostics: &'a mut Diagnostics,
}

impl NativeExports<'_> {
    fn message(&mut self, message: &DescriptorProto, parent: Option<&str>, path: Vec<i32>) {
        if message.is_map_entry() {
            return;
        }
        let name = dotted(parent, message.name());
        let type_ref = TypeRef::message(self.file.package(), &name, self.file.name(), false)
            .with_position(self.position(&path));
        self.exports.insert(name.clone(), Arc::new(type_ref));

        for (i, nested) in message.nested_type.iter().enumerate() {
            let mut child = path.clone();
            child.extend([MESSAGE_NESTED, i as i32]);
            self.message(nested, Some(&name), child);
        }
        for (i, e) in message.enum_type.iter().enumerate() {
            let mut child = path.clone();
            child.extend([MESSAGE_ENUM, i as i32]);
            self.enumeration(e, Some(&name), child);
        }
    }

    fn enumeration(&mut self, e: &EnumDescriptorProto, parent: Option<&str>, path: Vec<i32>) {
        let name = dotted(parent, e.name());
        let position = self.position(&path);

        let prefix = match e.value.first() {
            Some(zero) => match zero.name().strip_suffix("UNSPECIFIED") {
                Some(prefix) if prefix.is_empty() || prefix.ends_with('_') => prefix.to_string(),
                _ => {
                    warn!(
                        file = self.file.name(),
                        enum_name = %name,
                        value = zero.name(),
                        "enum zero value lacks _UNSPECIFIED suffix"
                    );
                    self.diagnostics.warning(
                        position.clone(),
                        Warning::EnumZeroSuffix {
                            enum_name: format!("{}.{}", self.file.package(), name),
                            value: zero.name().to_string(),
                        },
                    );
                    String::new()
                }
            },
            None => String::new(),
        };

        let values = e
            .value
            .iter()
            .map(|v| {
                let short = v.name().strip_prefix(prefix.as_str()).unwrap_or(v.name());
                (short.to_string(), v.number())
            })
            .collect();
        let enum_ref = EnumRef { prefix, values };
        let type_ref = TypeRef::enumeration(self.file.package(), &name, self.file.name(), enum_ref)
            .with_position(position);
        self.exports.insert(name, Arc::new(type_ref));
    }

    /// Position recorded by the parser for a descriptor path, 1-based.
    fn position(&self, path: &[i32]) -> Option<Position> {
        let location = self
            .file
            .source_code_info
            .as_ref()?
            .location
            .iter()
            .find(|l| l.path == path)?;
        let line = *location.span.first()?;
        let column = *location.span.get(1)?;
        Some(Position::new(self.file.name(), line as u32 + 1, column as u32 + 1))
    }
}

fn dotted(parent: Option<&str>, name: &str) -> String {
    match parent {
        Some(parent) => format!("{parent}.{name}"),
        None => name.to_string(),
    }
}
