//! Descriptor Builders
//!
//! Owned fragment accumulators. Each builder keeps its comments relative to
//! itself; attaching a child consumes it and re-roots the child's comments
//! under the index the child now occupies.

use std::collections::BTreeSet;

use crate::descriptor::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, Location, MethodDescriptorProto, OneofDescriptorProto,
    ServiceDescriptorProto, SourceCodeInfo,
};
use crate::sourcedef::Span;
use crate::sourcewalk::SourceNode;

// Descriptor field numbers used in SourceCodeInfo paths
const FILE_MESSAGE: i32 = 4;
const FILE_ENUM: i32 = 5;
const FILE_SERVICE: i32 = 6;
const MESSAGE_FIELD: i32 = 2;
const MESSAGE_NESTED: i32 = 3;
const MESSAGE_ENUM: i32 = 4;
const MESSAGE_ONEOF: i32 = 8;
const ENUM_VALUE: i32 = 2;
const SERVICE_METHOD: i32 = 2;

// =============================================================================
// Comments
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub path: Vec<i32>,
    pub span: Span,
    pub leading: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentSet {
    entries: Vec<Comment>,
}

impl CommentSet {
    pub fn add(&mut self, path: Vec<i32>, source: &SourceNode, description: Option<&str>) {
        let Some(span) = source.span else {
            return;
        };
        self.entries.push(Comment {
            path,
            span,
            leading: description.map(format_comment),
        });
    }

    /// Move `child`'s entries under `prefix`.
    pub fn attach(&mut self, prefix: &[i32], child: CommentSet) {
        for mut entry in child.entries {
            let mut path = prefix.to_vec();
            path.append(&mut entry.path);
            entry.path = path;
            self.entries.push(entry);
        }
    }

    pub fn entries(&self) -> &[Comment] {
        &self.entries
    }

    pub fn into_source_code_info(self) -> SourceCodeInfo {
        SourceCodeInfo {
            location: self
                .entries
                .into_iter()
                .map(|c| Location {
                    path: c.path,
                    span: c.span.to_descriptor(),
                    leading_comments: c.leading,
                    trailing_comments: None,
                    leading_detached_comments: Vec::new(),
                })
                .collect(),
        }
    }
}

/// protoc style: every line starts with a space and ends with a newline.
fn format_comment(text: &str) -> String {
    text.lines().map(|line| format!(" {}\n", line.trim_end())).collect()
}

// =============================================================================
// Message
// =============================================================================

#[derive(Debug, Clone)]
pub struct MessageBuilder {
    pub descriptor: DescriptorProto,
    comments: CommentSet,
}

impl MessageBuilder {
    pub fn new(name: impl Into<String>, source: &SourceNode, description: Option<&str>) -> Self {
        let mut comments = CommentSet::default();
        comments.add(Vec::new(), source, description);
        Self {
            descriptor: DescriptorProto {
                name: Some(name.into()),
                ..Default::default()
            },
            comments,
        }
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn add_field(
        &mut self,
        field: FieldDescriptorProto,
        source: &SourceNode,
        description: Option<&str>,
    ) {
        let index = self.descriptor.field.len() as i32;
        self.comments.add(vec![MESSAGE_FIELD, index], source, description);
        self.descriptor.field.push(field);
    }

    /// Returns the new oneof's index.
    pub fn add_oneof(&mut self, name: impl Into<String>, source: &SourceNode) -> i32 {
        let index = self.descriptor.oneof_decl.len() as i32;
        self.comments.add(vec![MESSAGE_ONEOF, index], source, None);
        self.descriptor.oneof_decl.push(OneofDescriptorProto {
            name: Some(name.into()),
        });
        index
    }

    pub fn attach_message(&mut self, child: MessageBuilder) {
        let index = self.descriptor.nested_type.len() as i32;
        self.comments.attach(&[MESSAGE_NESTED, index], child.comments);
        self.descriptor.nested_type.push(child.descriptor);
    }

    pub fn attach_enum(&mut self, child: EnumBuilder) {
        let index = self.descriptor.enum_type.len() as i32;
        self.comments.attach(&[MESSAGE_ENUM, index], child.comments);
        self.descriptor.enum_type.push(child.descriptor);
    }
}

// =============================================================================
// Enum
// =============================================================================

#[derive(Debug, Clone)]
pub struct EnumBuilder {
    pub descriptor: EnumDescriptorProto,
    comments: CommentSet,
}

impl EnumBuilder {
    pub fn new(name: impl Into<String>, source: &SourceNode, description: Option<&str>) -> Self {
        let mut comments = CommentSet::default();
        comments.add(Vec::new(), source, description);
        Self {
            descriptor: EnumDescriptorProto {
                name: Some(name.into()),
                ..Default::default()
            },
            comments,
        }
    }

    pub fn add_value(
        &mut self,
        name: impl Into<String>,
        number: i32,
        source: &SourceNode,
        description: Option<&str>,
    ) {
        let index = self.descriptor.value.len() as i32;
        self.comments.add(vec![ENUM_VALUE, index], source, description);
        self.descriptor.value.push(EnumValueDescriptorProto {
            name: Some(name.into()),
            number: Some(number),
        });
    }
}

// =============================================================================
// Service
// =============================================================================

#[derive(Debug, Clone)]
pub struct ServiceBuilder {
    pub descriptor: ServiceDescriptorProto,
    comments: CommentSet,
}

impl ServiceBuilder {
    pub fn new(name: impl Into<String>, source: &SourceNode, description: Option<&str>) -> Self {
        let mut comments = CommentSet::default();
        comments.add(Vec::new(), source, description);
        Self {
            descriptor: ServiceDescriptorProto {
                name: Some(name.into()),
                ..Default::default()
            },
            comments,
        }
    }

    pub fn add_method(
        &mut self,
        method: MethodDescriptorProto,
        source: &SourceNode,
        description: Option<&str>,
    ) {
        let index = self.descriptor.method.len() as i32;
        self.comments.add(vec![SERVICE_METHOD, index], source, description);
        self.descriptor.method.push(method);
    }
}

// =============================================================================
// File
// =============================================================================

#[derive(Debug, Clone)]
pub struct FileBuilder {
    descriptor: FileDescriptorProto,
    dependencies: BTreeSet<String>,
    comments: CommentSet,
}

impl FileBuilder {
    pub fn new(name: impl Into<String>, package: impl Into<String>) -> Self {
        Self {
            descriptor: FileDescriptorProto {
                name: Some(name.into()),
                package: Some(package.into()),
                syntax: Some("proto3".to_string()),
                ..Default::default()
            },
            dependencies: BTreeSet::new(),
            comments: CommentSet::default(),
        }
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn package(&self) -> &str {
        self.descriptor.package()
    }

    pub fn add_dependencies(&mut self, files: impl IntoIterator<Item = String>) {
        self.dependencies.extend(files);
    }

    pub fn attach_message(&mut self, child: MessageBuilder) {
        let index = self.descriptor.message_type.len() as i32;
        self.comments.attach(&[FILE_MESSAGE, index], child.comments);
        self.descriptor.message_type.push(child.descriptor);
    }

    pub fn attach_enum(&mut self, child: EnumBuilder) {
        let index = self.descriptor.enum_type.len() as i32;
        self.comments.attach(&[FILE_ENUM, index], child.comments);
        self.descriptor.enum_type.push(child.descriptor);
    }

    pub fn attach_service(&mut self, child: ServiceBuilder) {
        let index = self.descriptor.service.len() as i32;
        self.comments.attach(&[FILE_SERVICE, index], child.comments);
        self.descriptor.service.push(child.descriptor);
    }

    pub fn finish(self) -> FileDescriptorProto {
        let mut descriptor = self.descriptor;
        let own_name = descriptor.name().to_string();
        descriptor.dependency = self
            .dependencies
            .into_iter()
            .filter(|d| *d != own_name)
            .collect();
        if !self.comments.entries().is_empty() {
            descriptor.source_code_info = Some(self.comments.into_source_code_info());
        }
        descriptor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(line: i32) -> SourceNode {
        SourceNode {
            filename: "foo/v1/foo.j5s".into(),
            path: vec![],
            span: Some(Span::new(line, 2, line, 20)),
            synthetic: false,
        }
    }

    #[test]
    fn test_nested_comments_are_rerooted() {
        let mut inner = MessageBuilder::new("Child", &at(5), Some("Inner type"));
        inner.add_field(FieldDescriptorProto::default(), &at(6), Some("A field"));

        let mut outer = MessageBuilder::new("Parent", &at(1), None);
        outer.add_field(FieldDescriptorProto::default(), &at(2), None);
        outer.attach_message(MessageBuilder::new("First", &at(3), None));
        outer.attach_message(inner);

        let mut file = FileBuilder::new("foo/v1/foo.p.j5s.proto", "foo.v1");
        file.attach_enum(EnumBuilder::new("Color", &at(10), None));
        file.attach_message(outer);
        let descriptor = file.finish();

        let info = descriptor.source_code_info.unwrap();
        let paths: Vec<Vec<i32>> = info.location.iter().map(|l| l.path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                vec![5, 0],
                vec![4, 0],
                vec![4, 0, 2, 0],
                vec![4, 0, 3, 0],
                vec![4, 0, 3, 1],
                vec![4, 0, 3, 1, 2, 0],
            ]
        );
        let field_comment = &info.location[5];
        assert_eq!(field_comment.leading_comments.as_deref(), Some(" A field\n"));
        assert_eq!(field_comment.span, vec![6, 2, 20]);
    }

    #[test]
    fn test_dependencies_sorted_without_self() {
        let mut file = FileBuilder::new("a/v1/a.p.j5s.proto", "a.v1");
        file.add_dependencies([
            "google/protobuf/timestamp.proto".to_string(),
            "a/v1/a.p.j5s.proto".to_string(),
            "b/v1/b.proto".to_string(),
            "b/v1/b.proto".to_string(),
        ]);
        let descriptor = file.finish();
        assert_eq!(
            descriptor.dependency,
            vec!["b/v1/b.proto", "google/protobuf/timestamp.proto"]
        );
        assert!(descriptor.source_code_info.is_none());
    }
}
