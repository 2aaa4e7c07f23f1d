//! Descriptor Model
//!
//! Wire-compatible subset of `google/protobuf/descriptor.proto`. The options
//! messages declare the extensions this crate emits as ordinary fields at
//! their extension numbers, so an encoded `FileDescriptorSet` carries them
//! exactly as a reflective protobuf runtime would.

pub mod ext;

use prost::Message;

pub use ext::{
    FieldConstraints, HttpRule, J5FieldOptions, J5MessageOptions, J5MethodOptions,
    J5ServiceOptions, ListFieldRules, ListRequestQuery,
};

/// Builtin files that declare the extensions used by converted output.
pub const J5_EXT_FILE: &str = "j5/ext/v1/annotations.proto";
pub const J5_LIST_EXT_FILE: &str = "j5/list/v1/annotations.proto";
pub const VALIDATE_FILE: &str = "buf/validate/validate.proto";
pub const HTTP_FILE: &str = "google/api/annotations.proto";

#[derive(Clone, PartialEq, Message)]
pub struct FileDescriptorSet {
    #[prost(message, repeated, tag = "1")]
    pub file: Vec<FileDescriptorProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct FileDescriptorProto {
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub package: Option<String>,
    #[prost(string, repeated, tag = "3")]
    pub dependency: Vec<String>,
    #[prost(message, repeated, tag = "4")]
    pub message_type: Vec<DescriptorProto>,
    #[prost(message, repeated, tag = "5")]
    pub enum_type: Vec<EnumDescriptorProto>,
    #[prost(message, repeated, tag = "6")]
    pub service: Vec<ServiceDescriptorProto>,
    #[prost(message, repeated, tag = "7")]
    pub extension: Vec<FieldDescriptorProto>,
    #[prost(message, optional, tag = "8")]
    pub options: Option<FileOptions>,
    #[prost(message, optional, tag = "9")]
    pub source_code_info: Option<SourceCodeInfo>,
    #[prost(string, optional, tag = "12")]
    pub syntax: Option<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct DescriptorProto {
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    #[prost(message, repeated, tag = "2")]
    pub field: Vec<FieldDescriptorProto>,
    #[prost(message, repeated, tag = "3")]
    pub nested_type: Vec<DescriptorProto>,
    #[prost(message, repeated, tag = "4")]
    pub enum_type: Vec<EnumDescriptorProto>,
    #[prost(message, repeated, tag = "6")]
    pub extension: Vec<FieldDescriptorProto>,
    #[prost(message, optional, tag = "7")]
    pub options: Option<MessageOptions>,
    #[prost(message, repeated, tag = "8")]
    pub oneof_decl: Vec<OneofDescriptorProto>,
    #[prost(message, repeated, tag = "9")]
    pub reserved_range: Vec<ReservedRange>,
    #[prost(string, repeated, tag = "10")]
    pub reserved_name: Vec<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ReservedRange {
    #[prost(int32, optional, tag = "1")]
    pub start: Option<i32>,
    #[prost(int32, optional, tag = "2")]
    pub end: Option<i32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct FieldDescriptorProto {
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub extendee: Option<String>,
    #[prost(int32, optional, tag = "3")]
    pub number: Option<i32>,
    #[prost(enumeration = "FieldLabel", optional, tag = "4")]
    pub label: Option<i32>,
    #[prost(enumeration = "FieldType", optional, tag = "5")]
    pub r#type: Option<i32>,
    #[prost(string, optional, tag = "6")]
    pub type_name: Option<String>,
    #[prost(string, optional, tag = "7")]
    pub default_value: Option<String>,
    #[prost(message, optional, tag = "8")]
    pub options: Option<FieldOptions>,
    #[prost(int32, optional, tag = "9")]
    pub oneof_index: Option<i32>,
    #[prost(string, optional, tag = "10")]
    pub json_name: Option<String>,
    #[prost(bool, optional, tag = "17")]
    pub proto3_optional: Option<bool>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum FieldType {
    Double = 1,
    Float = 2,
    Int64 = 3,
    Uint64 = 4,
    Int32 = 5,
    Fixed64 = 6,
    Fixed32 = 7,
    Bool = 8,
    String = 9,
    Group = 10,
    Message = 11,
    Bytes = 12,
    Uint32 = 13,
    Enum = 14,
    Sfixed32 = 15,
    Sfixed64 = 16,
    Sint32 = 17,
    Sint64 = 18,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum FieldLabel {
    Optional = 1,
    Required = 2,
    Repeated = 3,
}

#[derive(Clone, PartialEq, Message)]
pub struct OneofDescriptorProto {
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct EnumDescriptorProto {
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    #[prost(message, repeated, tag = "2")]
    pub value: Vec<EnumValueDescriptorProto>,
    #[prost(string, repeated, tag = "5")]
    pub reserved_name: Vec<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct EnumValueDescriptorProto {
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    #[prost(int32, optional, tag = "2")]
    pub number: Option<i32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ServiceDescriptorProto {
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    #[prost(message, repeated, tag = "2")]
    pub method: Vec<MethodDescriptorProto>,
    #[prost(message, optional, tag = "3")]
    pub options: Option<ServiceOptions>,
}

#[derive(Clone, PartialEq, Message)]
pub struct MethodDescriptorProto {
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub input_type: Option<String>,
    #[prost(string, optional, tag = "3")]
    pub output_type: Option<String>,
    #[prost(message, optional, tag = "4")]
    pub options: Option<MethodOptions>,
    #[prost(bool, optional, tag = "5")]
    pub client_streaming: Option<bool>,
    #[prost(bool, optional, tag = "6")]
    pub server_streaming: Option<bool>,
}

// =============================================================================
// Options (with extensions)
// =============================================================================

#[derive(Clone, PartialEq, Message)]
pub struct FileOptions {
    #[prost(string, optional, tag = "1")]
    pub java_package: Option<String>,
    #[prost(string, optional, tag = "11")]
    pub go_package: Option<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct MessageOptions {
    #[prost(bool, optional, tag = "3")]
    pub deprecated: Option<bool>,
    #[prost(bool, optional, tag = "7")]
    pub map_entry: Option<bool>,
    /// `(j5.ext.v1.message)`
    #[prost(message, optional, tag = "90443001")]
    pub j5_message: Option<J5MessageOptions>,
}

#[derive(Clone, PartialEq, Message)]
pub struct FieldOptions {
    #[prost(bool, optional, tag = "3")]
    pub deprecated: Option<bool>,
    /// `(buf.validate.field)`
    #[prost(message, optional, tag = "1159")]
    pub validate: Option<FieldConstraints>,
    /// `(j5.ext.v1.field)`
    #[prost(message, optional, tag = "90443002")]
    pub j5_field: Option<J5FieldOptions>,
    /// `(j5.list.v1.field)`
    #[prost(message, optional, tag = "90443010")]
    pub list: Option<ListFieldRules>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ServiceOptions {
    #[prost(bool, optional, tag = "33")]
    pub deprecated: Option<bool>,
    /// `(j5.ext.v1.service)`
    #[prost(message, optional, tag = "90443003")]
    pub j5_service: Option<J5ServiceOptions>,
}

#[derive(Clone, PartialEq, Message)]
pub struct MethodOptions {
    #[prost(bool, optional, tag = "33")]
    pub deprecated: Option<bool>,
    /// `(google.api.http)`
    #[prost(message, optional, tag = "72295728")]
    pub http: Option<HttpRule>,
    /// `(j5.ext.v1.method)`
    #[prost(message, optional, tag = "90443004")]
    pub j5_method: Option<J5MethodOptions>,
    /// `(j5.list.v1.list_request)`
    #[prost(message, optional, tag = "90443011")]
    pub list_request: Option<ListRequestQuery>,
}

// =============================================================================
// Source Code Info
// =============================================================================

#[derive(Clone, PartialEq, Message)]
pub struct SourceCodeInfo {
    #[prost(message, repeated, tag = "1")]
    pub location: Vec<Location>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Location {
    #[prost(int32, repeated, tag = "1")]
    pub path: Vec<i32>,
    #[prost(int32, repeated, tag = "2")]
    pub span: Vec<i32>,
    #[prost(string, optional, tag = "3")]
    pub leading_comments: Option<String>,
    #[prost(string, optional, tag = "4")]
    pub trailing_comments: Option<String>,
    #[prost(string, repeated, tag = "6")]
    pub leading_detached_comments: Vec<String>,
}

// =============================================================================
// Conversions
// =============================================================================

/// Re-decode a `prost_types` descriptor (as produced by `protox-parse`)
/// into this crate's model. Both share the descriptor wire format.
pub fn from_prost_types(
    file: &prost_types::FileDescriptorProto,
) -> Result<FileDescriptorProto, prost::DecodeError> {
    FileDescriptorProto::decode(file.encode_to_vec().as_slice())
}

/// Encode files as a binary `google.protobuf.FileDescriptorSet`.
pub fn encode_descriptor_set(files: &[FileDescriptorProto]) -> Vec<u8> {
    FileDescriptorSet { file: files.to_vec() }.encode_to_vec()
}

impl FileDescriptorProto {
    pub fn find_message(&self, name: &str) -> Option<&DescriptorProto> {
        let mut parts = name.split('.');
        let first = parts.next()?;
        let mut current = self.message_type.iter().find(|m| m.name() == first)?;
        for part in parts {
            current = current.nested_type.iter().find(|m| m.name() == part)?;
        }
        Some(current)
    }

    pub fn find_enum(&self, name: &str) -> Option<&EnumDescriptorProto> {
        match name.rsplit_once('.') {
            None => self.enum_type.iter().find(|e| e.name() == name),
            Some((parent, leaf)) => self
                .find_message(parent)?
                .enum_type
                .iter()
                .find(|e| e.name() == leaf),
        }
    }

    pub fn find_service(&self, name: &str) -> Option<&ServiceDescriptorProto> {
        self.service.iter().find(|s| s.name() == name)
    }
}

impl DescriptorProto {
    pub fn find_field(&self, name: &str) -> Option<&FieldDescriptorProto> {
        self.field.iter().find(|f| f.name() == name)
    }

    pub fn is_map_entry(&self) -> bool {
        self.options
            .as_ref()
            .and_then(|o| o.map_entry)
            .unwrap_or(false)
    }
}

impl FieldDescriptorProto {
    pub fn constraints(&self) -> Option<&FieldConstraints> {
        self.options.as_ref()?.validate.as_ref()
    }

    pub fn is_required(&self) -> bool {
        self.constraints()
            .and_then(|c| c.required)
            .unwrap_or(false)
    }
}

impl ServiceDescriptorProto {
    pub fn find_method(&self, name: &str) -> Option<&MethodDescriptorProto> {
        self.method.iter().find(|m| m.name() == name)
    }
}
