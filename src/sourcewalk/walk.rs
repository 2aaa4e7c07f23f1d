//! Syntax tree → node tree
//!
//! Hoists inline definitions into nested schemas named by their nesting
//! path and numbers fields and enum values.

use std::collections::HashSet;

use tracing::debug;

use crate::diagnostics::Diagnostics;
use crate::error::SchemaError;
use crate::names::{to_pascal_case, to_screaming_snake_case};
use crate::sourcedef::{
    self, Enum, Field, Method, NestedSchema, Object, Oneof, Property, RootElement, Service,
    SourceFile, Topic,
};

use super::entity;
use super::location::{SourceNode, SourceTree};
use super::nodes::*;

/// Normalise one parsed schema file. Recoverable problems are recorded in
/// `diagnostics`; the returned tree omits the offending fields.
pub fn walk_file(
    package: &str,
    filename: &str,
    file: &SourceFile,
    diagnostics: &mut Diagnostics,
) -> FileNode {
    let tree = SourceTree::new(filename, file.source_locations.as_ref());
    let root = tree.root_node();
    let mut walker = Walker::new(tree, diagnostics);

    let imports = file
        .imports
        .iter()
        .enumerate()
        .map(|(i, import)| ImportNode {
            path: import.path.clone(),
            alias: import.alias.clone(),
            source: root.child(&tree, "imports").child(&tree, i),
        })
        .collect();

    let elements = root.child(&tree, "elements");
    for (i, element) in file.elements.iter().enumerate() {
        let at = elements.child(&tree, i);
        match element {
            RootElement::Object(o) => {
                let node = walker.object(&o.name, o, None, at.child(&tree, "object"));
                walker.schemas.push(SchemaNode::Object(node));
            }
            RootElement::Oneof(o) => {
                let node = walker.oneof(&o.name, o, None, at.child(&tree, "oneof"));
                walker.schemas.push(SchemaNode::Oneof(node));
            }
            RootElement::Enum(e) => {
                let node = walker.enumeration(&e.name, e, None, at.child(&tree, "enum"));
                walker.schemas.push(SchemaNode::Enum(node));
            }
            RootElement::Entity(e) => entity::expand(&mut walker, e, at.child(&tree, "entity")),
            RootElement::Service(s) => {
                let node = walker.service(s, None, None, at.child(&tree, "service"));
                walker.services.push(node);
            }
            RootElement::Topic(t) => {
                let node = walker.topic(t, at.child(&tree, "topic"));
                walker.topics.push(node);
            }
        }
    }

    walker.finish(package, filename, imports)
}

pub(super) struct Walker<'a, 'd> {
    pub(super) tree: SourceTree<'a>,
    diagnostics: &'d mut Diagnostics,
    pub(super) schemas: Vec<SchemaNode>,
    pub(super) services: Vec<ServiceNode>,
    pub(super) topics: Vec<TopicNode>,
}

impl<'a, 'd> Walker<'a, 'd> {
    fn new(tree: SourceTree<'a>, diagnostics: &'d mut Diagnostics) -> Self {
        Self {
            tree,
            diagnostics,
            schemas: Vec::new(),
            services: Vec::new(),
            topics: Vec::new(),
        }
    }

    fn finish(mut self, package: &str, filename: &str, imports: Vec<ImportNode>) -> FileNode {
        let schemas = std::mem::take(&mut self.schemas);
        self.check_unique(schemas.iter().map(|s| (s.full_name(), s.source())));

        let request_names: Vec<(&str, &SourceNode)> = self
            .services
            .iter()
            .flat_map(|s| s.methods.iter())
            .flat_map(|m| [&m.request, &m.response])
            .map(|o| (o.full_name.as_str(), &o.source))
            .collect();
        let mut seen = HashSet::new();
        let duplicates: Vec<_> = request_names
            .into_iter()
            .filter(|(name, _)| !seen.insert(*name))
            .map(|(name, source)| (name.to_string(), source.position()))
            .collect();
        for (name, position) in duplicates {
            self.diagnostics
                .error(position, SchemaError::DuplicateSchema { name });
        }

        debug!(
            file = filename,
            schemas = schemas.len(),
            services = self.services.len(),
            topics = self.topics.len(),
            "walked schema file"
        );

        FileNode {
            package: package.to_string(),
            filename: filename.to_string(),
            imports,
            schemas,
            service_file: (!self.services.is_empty()).then(|| ServiceFileNode {
                services: std::mem::take(&mut self.services),
            }),
            topic_file: (!self.topics.is_empty()).then(|| TopicFileNode {
                topics: std::mem::take(&mut self.topics),
            }),
        }
    }

    pub(super) fn error(&mut self, source: &SourceNode, error: SchemaError) {
        self.diagnostics.error(source.position(), error);
    }

    pub(super) fn check_unique<'n>(&mut self, schemas: impl Iterator<Item = (&'n str, &'n SourceNode)>) {
        let mut seen = HashSet::new();
        for (name, source) in schemas {
            if !seen.insert(name) {
                self.diagnostics.error(
                    source.position(),
                    SchemaError::DuplicateSchema {
                        name: name.to_string(),
                    },
                );
            }
        }
    }

    // =========================================================================
    // Schemas
    // =========================================================================

    pub(super) fn object(
        &mut self,
        name: &str,
        object: &Object,
        parent: Option<&str>,
        source: SourceNode,
    ) -> ObjectNode {
        let full_name = join_name(parent, name);
        let mut nested = self.nested_schemas(&object.schemas, &full_name, &source);
        let properties_at = source.child(&self.tree, "properties");
        let properties = self.properties(&object.properties, &full_name, &mut nested, &properties_at);
        self.check_unique(nested.iter().map(|s| (s.full_name(), s.source())));

        ObjectNode {
            name: name.to_string(),
            full_name,
            description: object.description.clone(),
            entity: None,
            properties,
            nested,
            source,
        }
    }

    pub(super) fn oneof(
        &mut self,
        name: &str,
        oneof: &Oneof,
        parent: Option<&str>,
        source: SourceNode,
    ) -> OneofNode {
        let full_name = join_name(parent, name);
        let mut nested = self.nested_schemas(&oneof.schemas, &full_name, &source);
        let properties_at = source.child(&self.tree, "properties");
        let properties = self.properties(&oneof.properties, &full_name, &mut nested, &properties_at);
        self.check_unique(nested.iter().map(|s| (s.full_name(), s.source())));

        OneofNode {
            name: name.to_string(),
            full_name,
            description: oneof.description.clone(),
            properties,
            nested,
            source,
        }
    }

    pub(super) fn enumeration(
        &mut self,
        name: &str,
        definition: &Enum,
        parent: Option<&str>,
        source: SourceNode,
    ) -> EnumNode {
        let mut prefix = definition
            .prefix
            .clone()
            .unwrap_or_else(|| to_screaming_snake_case(name));
        if !prefix.ends_with('_') {
            prefix.push('_');
        }

        let short_name = |n: &str| n.strip_prefix(prefix.as_str()).unwrap_or(n).to_string();
        let has_zero = definition
            .options
            .iter()
            .any(|o| o.number == Some(0) || short_name(&o.name) == "UNSPECIFIED");

        let mut options = Vec::with_capacity(definition.options.len() + 1);
        if !has_zero {
            options.push(EnumOptionNode {
                name: "UNSPECIFIED".to_string(),
                number: 0,
                description: None,
                source: source.synthetic_child("options"),
            });
        }

        let options_at = source.child(&self.tree, "options");
        let mut next = 1;
        for (i, option) in definition.options.iter().enumerate() {
            let name = short_name(&option.name);
            let number = if name == "UNSPECIFIED" {
                0
            } else {
                option.number.unwrap_or(next)
            };
            if number > 0 {
                next = number + 1;
            }
            options.push(EnumOptionNode {
                name,
                number,
                description: option.description.clone(),
                source: options_at.child(&self.tree, i),
            });
        }

        EnumNode {
            name: name.to_string(),
            full_name: join_name(parent, name),
            description: definition.description.clone(),
            prefix,
            options,
            source,
        }
    }

    fn nested_schemas(
        &mut self,
        schemas: &[NestedSchema],
        parent: &str,
        source: &SourceNode,
    ) -> Vec<SchemaNode> {
        let at = source.child(&self.tree, "schemas");
        schemas
            .iter()
            .enumerate()
            .map(|(i, schema)| {
                let item = at.child(&self.tree, i);
                match schema {
                    NestedSchema::Object(o) => SchemaNode::Object(self.object(
                        &o.name,
                        o,
                        Some(parent),
                        item.child(&self.tree, "object"),
                    )),
                    NestedSchema::Oneof(o) => SchemaNode::Oneof(self.oneof(
                        &o.name,
                        o,
                        Some(parent),
                        item.child(&self.tree, "oneof"),
                    )),
                    NestedSchema::Enum(e) => SchemaNode::Enum(self.enumeration(
                        &e.name,
                        e,
                        Some(parent),
                        item.child(&self.tree, "enum"),
                    )),
                }
            })
            .collect()
    }

    // =========================================================================
    // Properties & Fields
    // =========================================================================

    pub(super) fn properties(
        &mut self,
        properties: &[Property],
        parent: &str,
        nested: &mut Vec<SchemaNode>,
        source: &SourceNode,
    ) -> Vec<PropertyNode> {
        let mut out = Vec::with_capacity(properties.len());
        for (i, property) in properties.iter().enumerate() {
            let at = source.child(&self.tree, i);
            let schema_at = at.child(&self.tree, "schema");
            let Some(field) = self.field(&property.schema, &property.name, parent, nested, schema_at)
            else {
                continue;
            };
            out.push(PropertyNode {
                name: property.name.clone(),
                description: property.description.clone(),
                number: property.number.unwrap_or(i as i32 + 1),
                required: property.required,
                explicitly_optional: property.explicitly_optional,
                primary_key: property.entity_key.map(|k| k.primary_key).unwrap_or(false),
                field,
                source: at,
            });
        }
        out
    }

    fn field(
        &mut self,
        field: &Field,
        property: &str,
        parent: &str,
        nested: &mut Vec<SchemaNode>,
        source: SourceNode,
    ) -> Option<FieldNode> {
        let hoisted_name = to_pascal_case(property);
        let node = match field {
            Field::Object(f) => {
                let at = source.child(&self.tree, "object");
                let reference = if let Some(r) = &f.reference {
                    written_ref(r, at.child(&self.tree, "ref"))
                } else if let Some(inline) = &f.object {
                    let name = non_empty_or(&inline.name, &hoisted_name);
                    let node = self.object(name, inline, Some(parent), at.child(&self.tree, "object"));
                    let reference = hoisted_ref(&node.full_name, &at);
                    nested.push(SchemaNode::Object(node));
                    reference
                } else {
                    self.missing(property, "object", &at);
                    return None;
                };
                FieldNode::Object {
                    reference,
                    flatten: f.flatten,
                }
            }
            Field::Oneof(f) => {
                let at = source.child(&self.tree, "oneof");
                let reference = if let Some(r) = &f.reference {
                    written_ref(r, at.child(&self.tree, "ref"))
                } else if let Some(inline) = &f.oneof {
                    let name = non_empty_or(&inline.name, &hoisted_name);
                    let node = self.oneof(name, inline, Some(parent), at.child(&self.tree, "oneof"));
                    let reference = hoisted_ref(&node.full_name, &at);
                    nested.push(SchemaNode::Oneof(node));
                    reference
                } else {
                    self.missing(property, "oneof", &at);
                    return None;
                };
                FieldNode::Oneof { reference }
            }
            Field::Enum(f) => {
                let at = source.child(&self.tree, "enum");
                let reference = if let Some(r) = &f.reference {
                    written_ref(r, at.child(&self.tree, "ref"))
                } else if let Some(inline) = &f.definition {
                    let name = non_empty_or(&inline.name, &hoisted_name);
                    let node =
                        self.enumeration(name, inline, Some(parent), at.child(&self.tree, "enum"));
                    let reference = hoisted_ref(&node.full_name, &at);
                    nested.push(SchemaNode::Enum(node));
                    reference
                } else {
                    self.missing(property, "enum", &at);
                    return None;
                };
                FieldNode::Enum {
                    reference,
                    rules: f.rules.clone(),
                    list_rules: f.list_rules.clone(),
                }
            }
            Field::Array(f) => {
                let at = source.child(&self.tree, "array");
                let items_at = at.child(&self.tree, "items");
                let items = self.field(&f.items, property, parent, nested, items_at)?;
                FieldNode::Array {
                    items: Box::new(items),
                    rules: f.rules.clone(),
                }
            }
            Field::Map(f) => {
                let at = source.child(&self.tree, "map");
                let items_at = at.child(&self.tree, "items");
                let items = self.field(&f.items, property, parent, nested, items_at)?;
                let keys = match &f.keys {
                    Some(keys) => {
                        let keys_at = at.child(&self.tree, "keys");
                        Some(Box::new(self.field(keys, property, parent, nested, keys_at)?))
                    }
                    None => None,
                };
                FieldNode::Map {
                    items: Box::new(items),
                    keys,
                    rules: f.rules.clone(),
                }
            }
            Field::String(f) => FieldNode::String(f.clone()),
            Field::Bytes(f) => FieldNode::Bytes(f.clone()),
            Field::Bool(f) => FieldNode::Bool(f.clone()),
            Field::Integer(f) => FieldNode::Integer(f.clone()),
            Field::Float(f) => FieldNode::Float(f.clone()),
            Field::Date(f) => FieldNode::Date(f.clone()),
            Field::Decimal(f) => FieldNode::Decimal(f.clone()),
            Field::Timestamp(f) => FieldNode::Timestamp(f.clone()),
            Field::Key(f) => FieldNode::Key(f.clone()),
            Field::Any(_) => FieldNode::Any,
        };
        Some(node)
    }

    fn missing(&mut self, property: &str, kind: &str, source: &SourceNode) {
        self.error(
            source,
            SchemaError::MissingSubSchema {
                field: property.to_string(),
                reason: format!("{kind} field needs a ref or an inline {kind}"),
            },
        );
    }

    // =========================================================================
    // Services & Topics
    // =========================================================================

    pub(super) fn service(
        &mut self,
        service: &Service,
        binding: Option<ServiceBinding>,
        default_base: Option<String>,
        source: SourceNode,
    ) -> ServiceNode {
        let base = service.base_path.clone().or(default_base).unwrap_or_default();
        let methods_at = source.child(&self.tree, "methods");
        let methods = service
            .methods
            .iter()
            .enumerate()
            .map(|(i, method)| {
                let at = methods_at.child(&self.tree, i);
                self.method(method, &base, at)
            })
            .collect();

        ServiceNode {
            name: service.name.clone(),
            description: service.description.clone(),
            binding,
            methods,
            source,
        }
    }

    fn method(&mut self, method: &Method, base: &str, source: SourceNode) -> MethodNode {
        let request = self.anonymous_object(
            &format!("{}Request", method.name),
            &method.request.properties,
            source.child(&self.tree, "request"),
        );
        let response = self.anonymous_object(
            &format!("{}Response", method.name),
            &method.response.properties,
            source.child(&self.tree, "response"),
        );
        MethodNode {
            name: method.name.clone(),
            description: method.description.clone(),
            http_method: method.http_method,
            http_path: join_path(base, &method.http_path),
            request,
            response,
            state_query: None,
            list_query: None,
            source,
        }
    }

    pub(super) fn anonymous_object(
        &mut self,
        name: &str,
        properties: &[Property],
        source: SourceNode,
    ) -> ObjectNode {
        let object = Object {
            name: name.to_string(),
            description: None,
            properties: properties.to_vec(),
            schemas: Vec::new(),
        };
        self.object(name, &object, None, source)
    }

    fn topic(&mut self, topic: &Topic, source: SourceNode) -> TopicNode {
        let messages_at = source.child(&self.tree, "messages");
        let messages = topic
            .messages
            .iter()
            .enumerate()
            .map(|(i, message)| {
                let at = messages_at.child(&self.tree, i);
                let name = format!("{}Message", to_pascal_case(&message.name));
                let mut node = self.anonymous_object(&name, &message.properties, at);
                node.description = message.description.clone();
                node
            })
            .collect();
        TopicNode {
            name: to_pascal_case(&topic.name),
            description: topic.description.clone(),
            messages,
            source,
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn join_name(parent: Option<&str>, name: &str) -> String {
    match parent {
        Some(parent) => format!("{parent}.{name}"),
        None => name.to_string(),
    }
}

fn non_empty_or<'s>(name: &'s str, fallback: &'s str) -> &'s str {
    if name.is_empty() {
        fallback
    } else {
        name
    }
}

fn written_ref(reference: &sourcedef::Ref, source: SourceNode) -> RefNode {
    RefNode {
        package_alias: reference.package.clone().filter(|p| !p.is_empty()),
        schema: reference.schema.clone(),
        inline: false,
        source,
    }
}

fn hoisted_ref(full_name: &str, source: &SourceNode) -> RefNode {
    RefNode {
        package_alias: None,
        schema: full_name.to_string(),
        inline: true,
        source: source.clone(),
    }
}

/// `/foo/v1` + `/bar` → `/foo/v1/bar`
pub(super) fn join_path(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    match (base.is_empty(), path.is_empty()) {
        (_, true) => base.to_string(),
        (true, false) => format!("/{path}"),
        (false, false) => format!("{base}/{path}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn walk(value: serde_json::Value) -> (FileNode, Diagnostics) {
        let file: SourceFile = serde_json::from_value(value).unwrap();
        let mut diagnostics = Diagnostics::new();
        let node = walk_file("test.v1", "test/v1/test.j5s", &file, &mut diagnostics);
        (node, diagnostics)
    }

    fn object<'n>(schemas: &'n [SchemaNode], name: &str) -> &'n ObjectNode {
        schemas
            .iter()
            .find_map(|s| match s {
                SchemaNode::Object(o) if o.name == name => Some(o),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_inline_object_hoisted_under_each_parent() {
        let inline = json!({ "object": { "object": { "properties": [
            { "name": "x", "schema": { "string": {} } }
        ] } } });
        let (file, diagnostics) = walk(json!({ "elements": [
            { "object": { "name": "A", "properties": [{ "name": "child", "schema": inline }] } },
            { "object": { "name": "B", "properties": [{ "name": "child", "schema": inline }] } },
        ] }));
        assert!(diagnostics.is_empty(), "{}", diagnostics);

        let a = object(&file.schemas, "A");
        let b = object(&file.schemas, "B");
        assert_eq!(a.nested[0].full_name(), "A.Child");
        assert_eq!(b.nested[0].full_name(), "B.Child");

        let a_ref = a.properties[0].field.reference().unwrap();
        assert!(a_ref.inline);
        assert_eq!(a_ref.schema, "A.Child");
        assert_eq!(b.properties[0].field.reference().unwrap().schema, "B.Child");
    }

    #[test]
    fn test_field_numbers_default_to_position() {
        let (file, _) = walk(json!({ "elements": [{ "object": { "name": "A", "properties": [
            { "name": "one", "schema": { "string": {} } },
            { "name": "seven", "number": 7, "schema": { "bool": {} } },
            { "name": "three", "schema": { "bool": {} } },
        ] } }] }));
        let numbers: Vec<i32> = object(&file.schemas, "A")
            .properties
            .iter()
            .map(|p| p.number)
            .collect();
        assert_eq!(numbers, vec![1, 7, 3]);
    }

    #[test]
    fn test_enum_gets_unspecified_zero() {
        let (file, _) = walk(json!({ "elements": [{ "enum": { "name": "Color", "options": [
            { "name": "RED" },
            { "name": "COLOR_GREEN" },
            { "name": "BLUE", "number": 10 },
            { "name": "PINK" },
        ] } }] }));
        let SchemaNode::Enum(color) = &file.schemas[0] else {
            panic!("Expected enum");
        };
        assert_eq!(color.prefix, "COLOR_");
        let options: Vec<(&str, i32)> = color
            .options
            .iter()
            .map(|o| (o.name.as_str(), o.number))
            .collect();
        assert_eq!(
            options,
            vec![("UNSPECIFIED", 0), ("RED", 1), ("GREEN", 2), ("BLUE", 10), ("PINK", 11)]
        );
    }

    #[test]
    fn test_duplicate_nested_names_rejected() {
        let (_, diagnostics) = walk(json!({ "elements": [{ "object": {
            "name": "A",
            "schemas": [{ "object": { "name": "Child" } }],
            "properties": [{ "name": "child", "schema": { "object": { "object": {} } } }]
        } }] }));
        assert_eq!(diagnostics.error_count(), 1);
        assert_eq!(
            diagnostics.errors().next(),
            Some(&SchemaError::DuplicateSchema { name: "A.Child".into() })
        );
    }

    #[test]
    fn test_object_field_without_schema_is_reported() {
        let (file, diagnostics) = walk(json!({ "elements": [{ "object": { "name": "A", "properties": [
            { "name": "broken", "schema": { "object": {} } },
            { "name": "fine", "schema": { "string": {} } },
        ] } }] }));
        assert!(diagnostics.has_errors());
        assert_eq!(object(&file.schemas, "A").properties.len(), 1);
    }

    #[test]
    fn test_service_paths_and_messages() {
        let (file, _) = walk(json!({ "elements": [{ "service": {
            "name": "FooService",
            "base_path": "/foo/v1/",
            "methods": [{
                "name": "GetFoo",
                "http_method": "GET",
                "http_path": "/foo/:id",
                "request": { "properties": [{ "name": "id", "schema": { "string": {} } }] }
            }]
        } }] }));
        let services = file.service_file.unwrap();
        let method = &services.services[0].methods[0];
        assert_eq!(method.http_path, "/foo/v1/foo/:id");
        assert_eq!(method.request.full_name, "GetFooRequest");
        assert_eq!(method.response.full_name, "GetFooResponse");
        assert!(file.topic_file.is_none());
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("/a/", "/b"), "/a/b");
        assert_eq!(join_path("/a", ""), "/a");
        assert_eq!(join_path("", "b"), "/b");
    }
}
