//! Builtin Files
//!
//! Well-known descriptor files every build can depend on without a local
//! or external lookup.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::descriptor::{HTTP_FILE, J5_EXT_FILE, J5_LIST_EXT_FILE, VALIDATE_FILE};
use crate::j5convert::Exports;
use crate::typeref::{EnumRef, TypeRef};

pub const TIMESTAMP_FILE: &str = "google/protobuf/timestamp.proto";
pub const EMPTY_FILE: &str = "google/protobuf/empty.proto";
pub const DATE_FILE: &str = "j5/types/date/v1/date.proto";
pub const DECIMAL_FILE: &str = "j5/types/decimal/v1/decimal.proto";
pub const ANY_FILE: &str = "j5/types/any/v1/any.proto";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinEnum {
    pub name: &'static str,
    pub prefix: &'static str,
    pub values: &'static [(&'static str, i32)],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinFile {
    pub filename: &'static str,
    pub package: &'static str,
    pub messages: &'static [&'static str],
    pub enums: &'static [BuiltinEnum],
}

const fn messages(
    filename: &'static str,
    package: &'static str,
    messages: &'static [&'static str],
) -> BuiltinFile {
    BuiltinFile {
        filename,
        package,
        messages,
        enums: &[],
    }
}

pub const BUILTIN_FILES: &[BuiltinFile] = &[
    messages(TIMESTAMP_FILE, "google.protobuf", &["Timestamp"]),
    messages("google/protobuf/duration.proto", "google.protobuf", &["Duration"]),
    messages(EMPTY_FILE, "google.protobuf", &["Empty"]),
    messages("google/protobuf/any.proto", "google.protobuf", &["Any"]),
    messages(
        "google/protobuf/wrappers.proto",
        "google.protobuf",
        &[
            "BoolValue",
            "BytesValue",
            "DoubleValue",
            "FloatValue",
            "Int32Value",
            "Int64Value",
            "StringValue",
            "UInt32Value",
            "UInt64Value",
        ],
    ),
    BuiltinFile {
        filename: "google/protobuf/struct.proto",
        package: "google.protobuf",
        messages: &["Struct", "Value", "ListValue"],
        enums: &[BuiltinEnum {
            name: "NullValue",
            prefix: "",
            values: &[("NULL_VALUE", 0)],
        }],
    },
    messages(
        "google/protobuf/descriptor.proto",
        "google.protobuf",
        &[
            "FileDescriptorSet",
            "FileDescriptorProto",
            "DescriptorProto",
            "FieldDescriptorProto",
            "FieldOptions",
            "MessageOptions",
            "MethodOptions",
            "ServiceOptions",
        ],
    ),
    messages(HTTP_FILE, "google.api", &[]),
    messages("google/api/http.proto", "google.api", &["Http", "HttpRule"]),
    messages(
        VALIDATE_FILE,
        "buf.validate",
        &["FieldConstraints", "MessageConstraints", "OneofConstraints"],
    ),
    messages(J5_EXT_FILE, "j5.ext.v1", &[]),
    messages(J5_LIST_EXT_FILE, "j5.list.v1", &[]),
    messages("j5/list/v1/page.proto", "j5.list.v1", &["PageRequest", "PageResponse"]),
    messages("j5/list/v1/query.proto", "j5.list.v1", &["QueryRequest"]),
    messages(
        "j5/state/v1/metadata.proto",
        "j5.state.v1",
        &["StateMetadata", "EventMetadata"],
    ),
    messages(DATE_FILE, "j5.types.date.v1", &["Date"]),
    messages(DECIMAL_FILE, "j5.types.decimal.v1", &["Decimal"]),
    messages(ANY_FILE, "j5.types.any.v1", &["Any"]),
];

pub fn builtin_file(filename: &str) -> Option<&'static BuiltinFile> {
    BUILTIN_FILES.iter().find(|f| f.filename == filename)
}

pub fn is_builtin_file(filename: &str) -> bool {
    builtin_file(filename).is_some()
}

pub fn is_builtin_package(package: &str) -> bool {
    BUILTIN_FILES.iter().any(|f| f.package == package)
}

/// Exports of every builtin file in `package`.
pub fn package_exports(package: &str) -> Exports {
    let mut exports = Exports::new();
    for file in BUILTIN_FILES.iter().filter(|f| f.package == package) {
        for name in file.messages {
            let type_ref = TypeRef::message(package, *name, file.filename, false);
            exports.insert(name.to_string(), Arc::new(type_ref));
        }
        for e in file.enums {
            let enum_ref = EnumRef {
                prefix: e.prefix.to_string(),
                values: e
                    .values
                    .iter()
                    .map(|(name, number)| (name.to_string(), *number))
                    .collect::<BTreeMap<_, _>>(),
            };
            let type_ref = TypeRef::enumeration(package, e.name, file.filename, enum_ref);
            exports.insert(e.name.to_string(), Arc::new(type_ref));
        }
    }
    exports
}
