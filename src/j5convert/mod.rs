//! Conversion Engine
//!
//! Walks a normalised [`FileNode`] and emits its descriptor files: the main
//! file with every schema, plus the service and topic files in their
//! `.service` / `.topic` sub-packages when the source declares them.
//!
//! Conversion is best-effort: each problem is recorded in the caller's
//! [`Diagnostics`] and the offending field or method is skipped, so one pass
//! reports every defect in a file.

pub mod builder;
mod fields;
pub mod resolve;
mod services;
pub mod summary;

use std::collections::BTreeSet;

use tracing::debug;

use crate::descriptor::FileDescriptorProto;
use crate::diagnostics::Diagnostics;
use crate::error::SchemaError;
use crate::sourcewalk::{FileNode, SourceNode};

pub use builder::{CommentSet, EnumBuilder, FileBuilder, MessageBuilder, ServiceBuilder};
pub use fields::ID62_PATTERN;
pub use resolve::{Exports, ImportTable, TypeLookup, TypeResolver};
pub use summary::{summarize, FileSummary, TypeDependency, GENERATED_SUFFIX};

use fields::SchemaBuilder;
use summary::{local_exports, main_filename, service_filename, topic_filename};

/// Convert one file against `resolver`'s export universe.
pub fn convert_file(
    file: &FileNode,
    resolver: &mut TypeResolver<'_>,
    diagnostics: &mut Diagnostics,
) -> Vec<FileDescriptorProto> {
    let mut converter = Converter::new(resolver, diagnostics, file.package.clone());
    let mut out = Vec::with_capacity(3);

    let mut main = FileBuilder::new(main_filename(&file.filename), &file.package);
    for schema in &file.schemas {
        match converter.schema(schema) {
            SchemaBuilder::Message(message) => main.attach_message(message),
            SchemaBuilder::Enum(enumeration) => main.attach_enum(enumeration),
        }
    }
    main.add_dependencies(converter.take_dependencies());
    out.push(main.finish());

    if let Some(services) = &file.service_file {
        let package = format!("{}.service", file.package);
        let filename = service_filename(&file.filename);
        converter.inline = local_exports(
            &package,
            &filename,
            services
                .services
                .iter()
                .flat_map(|s| &s.methods)
                .flat_map(|m| [&m.request, &m.response]),
        );
        converter.package = package.clone();
        let mut builder = FileBuilder::new(filename, package);
        for service in &services.services {
            converter.service(&mut builder, service);
        }
        builder.add_dependencies(converter.take_dependencies());
        out.push(builder.finish());
    }

    if let Some(topics) = &file.topic_file {
        let package = format!("{}.topic", file.package);
        let filename = topic_filename(&file.filename);
        converter.inline = local_exports(
            &package,
            &filename,
            topics.topics.iter().flat_map(|t| &t.messages),
        );
        converter.package = package.clone();
        let mut builder = FileBuilder::new(filename, package);
        for topic in &topics.topics {
            converter.topic(&mut builder, topic);
        }
        builder.add_dependencies(converter.take_dependencies());
        out.push(builder.finish());
    }

    debug!(
        file = %file.filename,
        outputs = out.len(),
        "converted schema file"
    );
    out
}

/// Per-file conversion state shared by the schema and service passes.
pub(crate) struct Converter<'r, 'a> {
    resolver: &'r mut TypeResolver<'a>,
    diagnostics: &'r mut Diagnostics,
    /// Package of the output file being built
    package: String,
    /// Hoisted schemas that belong to the output file rather than the
    /// source package
    inline: Exports,
    dependencies: BTreeSet<String>,
}

impl<'r, 'a> Converter<'r, 'a> {
    fn new(
        resolver: &'r mut TypeResolver<'a>,
        diagnostics: &'r mut Diagnostics,
        package: String,
    ) -> Self {
        Self {
            resolver,
            diagnostics,
            package,
            inline: Exports::new(),
            dependencies: BTreeSet::new(),
        }
    }

    fn use_file(&mut self, file: &str) {
        self.dependencies.insert(file.to_string());
    }

    fn error(&mut self, source: &SourceNode, error: SchemaError) {
        self.diagnostics.error(source.position(), error);
    }

    fn take_dependencies(&mut self) -> BTreeSet<String> {
        std::mem::take(&mut self.dependencies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ext::{
        field_constraints, j5_field_options, j5_message_options, j5_service_options,
        string_rules, EntityPart, StateQueryPart,
    };
    use crate::descriptor::{FieldLabel, FieldType};
    use crate::sourcedef::SourceFile;
    use crate::sourcewalk::walk_file;
    use crate::typeref::TypeRef;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    /// Exports of the builtin packages entity expansion refers to.
    fn builtin_exports() -> BTreeMap<String, Exports> {
        let message = |package: &str, name: &str, file: &str| {
            (name.to_string(), Arc::new(TypeRef::message(package, name, file, false)))
        };
        let mut deps = BTreeMap::new();
        deps.insert(
            "j5.state.v1".to_string(),
            [
                message("j5.state.v1", "StateMetadata", "j5/state/v1/metadata.proto"),
                message("j5.state.v1", "EventMetadata", "j5/state/v1/metadata.proto"),
            ]
            .into_iter()
            .collect(),
        );
        deps.insert(
            "j5.list.v1".to_string(),
            [
                message("j5.list.v1", "PageRequest", "j5/list/v1/page.proto"),
                message("j5.list.v1", "PageResponse", "j5/list/v1/page.proto"),
                message("j5.list.v1", "QueryRequest", "j5/list/v1/query.proto"),
            ]
            .into_iter()
            .collect(),
        );
        deps
    }

    fn convert(value: serde_json::Value) -> (Vec<FileDescriptorProto>, Diagnostics) {
        let source: SourceFile = serde_json::from_value(value).unwrap();
        let mut diagnostics = Diagnostics::new();
        let node = walk_file("foo.v1", "foo/v1/foo.j5s", &source, &mut diagnostics);
        let summary = summarize(&node, &[], &mut diagnostics);
        let deps = builtin_exports();
        let mut resolver = TypeResolver::new(
            "foo.v1",
            &summary.exports,
            &deps,
            ImportTable::new(&node.imports),
        );
        let files = convert_file(&node, &mut resolver, &mut diagnostics);
        (files, diagnostics)
    }

    fn object_with(properties: serde_json::Value) -> serde_json::Value {
        json!({ "elements": [{ "object": { "name": "Foo", "properties": properties } }] })
    }

    #[test]
    fn test_required_sets_constraint_for_every_kind() {
        let kinds = [
            json!({ "string": {} }),
            json!({ "bytes": {} }),
            json!({ "bool": {} }),
            json!({ "integer": { "format": "int64" } }),
            json!({ "float": {} }),
            json!({ "date": {} }),
            json!({ "decimal": {} }),
            json!({ "timestamp": {} }),
            json!({ "key": {} }),
            json!({ "any": {} }),
            json!({ "array": { "items": { "string": {} } } }),
            json!({ "map": { "items": { "string": {} } } }),
            json!({ "enum": { "enum": { "options": [{ "name": "A" }] } } }),
            json!({ "object": { "object": {} } }),
            json!({ "oneof": { "ref": { "schema": "Choice" } } }),
            json!({ "oneof": { "oneof": { "properties": [{ "name": "b", "schema": { "bool": {} } }] } } }),
        ];
        let properties: Vec<serde_json::Value> = kinds
            .iter()
            .enumerate()
            .map(|(i, schema)| json!({ "name": format!("f{i}"), "required": true, "schema": schema }))
            .collect();
        let (files, diagnostics) = convert(json!({ "elements": [
            { "object": { "name": "Foo", "properties": properties } },
            { "oneof": { "name": "Choice", "properties": [{ "name": "a", "schema": { "string": {} } }] } },
        ] }));
        assert!(!diagnostics.has_errors(), "{}", diagnostics);

        let foo = files[0].find_message("Foo").unwrap();
        assert_eq!(foo.field.len(), kinds.len());
        for field in &foo.field {
            assert!(field.is_required(), "{} is not required", field.name());
        }
    }

    #[test]
    fn test_map_field_entry_message() {
        let (files, diagnostics) = convert(object_with(json!([
            { "name": "labels", "schema": { "map": { "items": { "string": {} } } } }
        ])));
        assert!(diagnostics.is_empty(), "{}", diagnostics);

        let foo = files[0].find_message("Foo").unwrap();
        let entry = foo.nested_type.iter().find(|m| m.name() == "LabelsEntry").unwrap();
        assert!(entry.is_map_entry());
        let key = entry.find_field("key").unwrap();
        let value = entry.find_field("value").unwrap();
        assert_eq!((key.number(), key.r#type()), (1, FieldType::String));
        assert_eq!((value.number(), value.r#type()), (2, FieldType::String));

        let labels = foo.find_field("labels").unwrap();
        assert_eq!(labels.label(), FieldLabel::Repeated);
        assert_eq!(labels.type_name(), ".foo.v1.Foo.LabelsEntry");
    }

    #[test]
    fn test_field_names_and_kinds() {
        let (files, _) = convert(object_with(json!([
            { "name": "createdAt", "schema": { "timestamp": {} } },
            { "name": "count", "explicitly_optional": true, "schema": { "integer": { "format": "uint32" } } },
            { "name": "email", "schema": { "string": { "format": "email" } } },
        ])));
        let file = &files[0];
        let foo = file.find_message("Foo").unwrap();

        let created = foo.find_field("created_at").unwrap();
        assert_eq!(created.json_name(), "createdAt");
        assert_eq!(created.type_name(), ".google.protobuf.Timestamp");
        let j5 = created.options.as_ref().unwrap().j5_field.as_ref().unwrap();
        assert_eq!(j5.kind_name(), Some("timestamp"));
        assert!(file.dependency.contains(&"google/protobuf/timestamp.proto".to_string()));

        let count = foo.find_field("count").unwrap();
        assert_eq!(count.r#type(), FieldType::Uint32);
        assert_eq!(count.proto3_optional, Some(true));
        assert_eq!(foo.oneof_decl[count.oneof_index() as usize].name(), "_count");

        let email = foo.find_field("email").unwrap();
        match &email.constraints().unwrap().r#type {
            Some(field_constraints::Type::String(rules)) => {
                assert_eq!(rules.well_known, Some(string_rules::WellKnown::Email(true)))
            }
            other => panic!("Expected string rules, got {:?}", other.is_some()),
        }
    }

    #[test]
    fn test_field_errors_are_collected() {
        let (files, diagnostics) = convert(object_with(json!([
            { "name": "both", "required": true, "explicitly_optional": true, "schema": { "bool": {} } },
            { "name": "fmt", "schema": { "string": { "format": "colour" } } },
            { "name": "grid", "schema": { "array": { "items": { "array": { "items": { "bool": {} } } } } } },
            { "name": "missing", "schema": { "object": { "ref": { "schema": "Nope" } } } },
            { "name": "other", "schema": { "object": { "ref": { "package": "elsewhere", "schema": "Nope" } } } },
            { "name": "bad", "schema": { "key": { "format": { "custom": { "pattern": "([" } } } } },
            { "name": "dup", "number": 1, "schema": { "bool": {} } },
        ])));
        let codes: Vec<&str> = diagnostics.all().iter().map(|d| d.code()).collect();
        let errors: Vec<&SchemaError> = diagnostics.errors().collect();
        assert!(errors.contains(&&SchemaError::RequiredAndOptional { field: "both".into() }));
        assert!(errors.contains(&&SchemaError::UnknownFormat {
            field: "fmt".into(),
            format: "colour".into()
        }));
        assert!(errors.contains(&&SchemaError::NestedCollection {
            field: "grid".into(),
            outer: "array",
            inner: "array"
        }));
        assert!(errors.contains(&&SchemaError::TypeNotFound {
            package: None,
            name: "Nope".into()
        }));
        assert!(errors.contains(&&SchemaError::PackageNotFound {
            package: "elsewhere".into(),
            name: "Nope".into()
        }));
        assert!(errors.iter().any(|e| matches!(e, SchemaError::InvalidPattern { field, .. } if field == "bad")));
        assert!(errors.iter().any(|e| matches!(e, SchemaError::DuplicateFieldNumber { number: 1, .. })));
        assert_eq!(codes.len(), 7);

        // The message is still emitted with the fields that converted
        let foo = files[0].find_message("Foo").unwrap();
        assert!(foo.find_field("both").is_some());
        assert!(foo.find_field("grid").is_none());
    }

    #[test]
    fn test_oneof_schema_uses_single_type_oneof() {
        let (files, _) = convert(json!({ "elements": [{ "oneof": { "name": "Choice", "properties": [
            { "name": "a", "schema": { "string": {} } },
            { "name": "b", "schema": { "bool": {} } },
        ] } }] }));
        let choice = files[0].find_message("Choice").unwrap();
        assert_eq!(choice.oneof_decl.len(), 1);
        assert_eq!(choice.oneof_decl[0].name(), "type");
        assert!(choice.field.iter().all(|f| f.oneof_index == Some(0)));
        let options = choice.options.as_ref().unwrap().j5_message.as_ref().unwrap();
        assert!(matches!(options.r#type, Some(j5_message_options::Type::Oneof(_))));
    }

    #[test]
    fn test_enum_rules_resolve_names() {
        let (files, diagnostics) = convert(json!({ "elements": [
            { "enum": { "name": "Color", "options": [{ "name": "RED" }, { "name": "BLUE" }] } },
            { "object": { "name": "Paint", "properties": [
                { "name": "color", "schema": { "enum": {
                    "ref": { "schema": "Color" },
                    "rules": { "only": ["COLOR_BLUE"], "not": ["PURPLE"] }
                } } }
            ] } }
        ] }));
        assert_eq!(
            diagnostics.errors().collect::<Vec<_>>(),
            vec![&SchemaError::UnknownEnumOption {
                field: "color".into(),
                enum_name: "foo.v1.Color".into(),
                option: "PURPLE".into()
            }]
        );
        let color = files[0].find_enum("Color").unwrap();
        let values: Vec<(&str, i32)> = color.value.iter().map(|v| (v.name(), v.number())).collect();
        assert_eq!(values, vec![("COLOR_UNSPECIFIED", 0), ("COLOR_RED", 1), ("COLOR_BLUE", 2)]);

        let field = files[0].find_message("Paint").unwrap().find_field("color").unwrap();
        match &field.constraints().unwrap().r#type {
            Some(field_constraints::Type::Enum(rules)) => assert_eq!(rules.r#in, vec![2]),
            _ => panic!("Expected enum rules"),
        }
    }

    #[test]
    fn test_entity_conversion() {
        let (files, diagnostics) = convert(json!({ "elements": [{ "entity": {
            "name": "foo",
            "base_url_path": "/foo/v1",
            "keys": [{ "name": "fooId", "entity_key": { "primary_key": true },
                       "schema": { "key": { "format": "uuid" } } }],
            "data": [{ "name": "name", "schema": { "string": {} } }],
            "status": [{ "name": "ACTIVE" }],
            "events": [{ "name": "created" }]
        } }] }));
        assert!(!diagnostics.has_errors(), "{}", diagnostics);
        assert_eq!(files.len(), 2);

        let main = &files[0];
        for name in ["FooKeys", "FooData", "FooState", "FooEventType", "FooEvent"] {
            assert!(main.find_message(name).is_some(), "{name} missing");
        }
        assert!(main.find_enum("FooStatus").is_some());

        let state = main.find_message("FooState").unwrap();
        let fields: Vec<(&str, i32)> = state.field.iter().map(|f| (f.name(), f.number())).collect();
        assert_eq!(fields, vec![("metadata", 1), ("keys", 2), ("data", 3), ("status", 4)]);
        assert_eq!(state.field[0].type_name(), ".j5.state.v1.StateMetadata");
        match &state.options.as_ref().unwrap().j5_message.as_ref().unwrap().r#type {
            Some(j5_message_options::Type::Object(o)) => {
                assert_eq!(o.entity.as_ref().unwrap().part, EntityPart::State as i32)
            }
            _ => panic!("Expected object options"),
        }

        let key = main.find_message("FooKeys").unwrap().find_field("foo_id").unwrap();
        assert!(key.is_required());
        match &key.options.as_ref().unwrap().j5_field.as_ref().unwrap().r#type {
            Some(j5_field_options::Type::Key(k)) => assert!(k.primary_key),
            _ => panic!("Expected key options"),
        }

        let service_file = &files[1];
        assert_eq!(service_file.name(), "foo/v1/service/foo.p.j5s.proto");
        assert_eq!(service_file.package(), "foo.v1.service");
        assert!(service_file.dependency.contains(&"foo/v1/foo.p.j5s.proto".to_string()));

        let query = service_file.find_service("FooQuery").unwrap();
        let get = query.find_method("FooGet").unwrap();
        let http = get.options.as_ref().unwrap().http.as_ref().unwrap();
        assert_eq!(http.path(), Some("/foo/v1/q/{foo_id}"));
        assert_eq!(http.body, "");
        assert_eq!(get.input_type(), ".foo.v1.service.FooGetRequest");
        assert_eq!(
            get.options.as_ref().unwrap().j5_method.as_ref().unwrap().state_query.as_ref().unwrap().part,
            StateQueryPart::Get as i32
        );
        match &query.options.as_ref().unwrap().j5_service.as_ref().unwrap().r#type {
            Some(j5_service_options::Type::StateQuery(b)) => assert_eq!(b.entity, "foo"),
            _ => panic!("Expected state query binding"),
        }
        let list = query.find_method("FooList").unwrap();
        assert!(list.options.as_ref().unwrap().list_request.is_some());
    }

    #[test]
    fn test_path_parameter_must_match_request() {
        let (files, diagnostics) = convert(json!({ "elements": [{ "service": {
            "name": "FooService",
            "methods": [{
                "name": "Update",
                "http_method": "POST",
                "http_path": "/foo/:fooId/:other",
                "request": { "properties": [{ "name": "fooId", "schema": { "string": {} } }] }
            }]
        } }] }));
        assert_eq!(
            diagnostics.errors().collect::<Vec<_>>(),
            vec![&SchemaError::PathParameterMissing {
                method: "Update".into(),
                param: "other".into()
            }]
        );
        let method = files[1].find_service("FooService").unwrap().find_method("Update").unwrap();
        let http = method.options.as_ref().unwrap().http.as_ref().unwrap();
        assert_eq!(http.body, "*");
        assert_eq!(http.path(), Some("/foo/{foo_id}/{other}"));
    }

    #[test]
    fn test_topic_conversion() {
        let (files, _) = convert(json!({ "elements": [{ "topic": {
            "name": "fooEvents",
            "messages": [{ "name": "changed", "properties": [
                { "name": "id", "schema": { "string": {} } }
            ] }]
        } }] }));
        let topic_file = files.iter().find(|f| f.package() == "foo.v1.topic").unwrap();
        let service = topic_file.find_service("FooEventsTopic").unwrap();
        let method = service.find_method("Changed").unwrap();
        assert_eq!(method.input_type(), ".foo.v1.topic.ChangedMessage");
        assert_eq!(method.output_type(), ".google.protobuf.Empty");
        assert!(topic_file.find_message("ChangedMessage").is_some());
    }

    #[test]
    fn test_inline_schemas_in_request_and_response() {
        let (files, diagnostics) = convert(json!({ "elements": [{ "service": {
            "name": "FooService",
            "methods": [{
                "name": "Create",
                "http_method": "POST",
                "http_path": "/create",
                "request": { "properties": [
                    { "name": "spec", "schema": { "object": { "object": { "properties": [
                        { "name": "x", "schema": { "string": {} } }
                    ] } } } },
                    { "name": "mode", "schema": { "enum": { "enum": { "options": [{ "name": "FAST" }] } } } }
                ] },
                "response": { "properties": [
                    { "name": "result", "schema": { "oneof": { "oneof": { "properties": [
                        { "name": "ok", "schema": { "bool": {} } }
                    ] } } } }
                ] }
            }]
        } }] }));
        assert!(!diagnostics.has_errors(), "{}", diagnostics);

        let service_file = &files[1];
        let request = service_file.find_message("CreateRequest").unwrap();
        assert_eq!(
            request.find_field("spec").unwrap().type_name(),
            ".foo.v1.service.CreateRequest.Spec"
        );
        assert_eq!(
            request.find_field("mode").unwrap().type_name(),
            ".foo.v1.service.CreateRequest.Mode"
        );
        assert!(service_file.find_message("CreateRequest.Spec").is_some());
        assert!(service_file.find_enum("CreateRequest.Mode").is_some());

        let response = service_file.find_message("CreateResponse").unwrap();
        assert_eq!(
            response.find_field("result").unwrap().type_name(),
            ".foo.v1.service.CreateResponse.Result"
        );
        assert!(!service_file.dependency.contains(&"foo/v1/foo.p.j5s.proto".to_string()));
    }

    #[test]
    fn test_inline_schema_in_topic_message() {
        let (files, diagnostics) = convert(json!({ "elements": [{ "topic": {
            "name": "fooEvents",
            "messages": [{ "name": "changed", "properties": [
                { "name": "detail", "schema": { "object": { "object": { "properties": [
                    { "name": "reason", "schema": { "string": {} } }
                ] } } } }
            ] }]
        } }] }));
        assert!(!diagnostics.has_errors(), "{}", diagnostics);

        let topic_file = files.iter().find(|f| f.package() == "foo.v1.topic").unwrap();
        let message = topic_file.find_message("ChangedMessage").unwrap();
        assert_eq!(
            message.find_field("detail").unwrap().type_name(),
            ".foo.v1.topic.ChangedMessage.Detail"
        );
        assert!(topic_file.find_message("ChangedMessage.Detail").is_some());
    }
}
