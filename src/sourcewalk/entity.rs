//! Entity Expansion
//!
//! An entity is a state machine declared once and expanded into its keys,
//! data, status, state, event type and event schemas, its command services,
//! and a query service. Everything produced here re-enters the ordinary
//! schema and service streams.

use crate::descriptor::ext::{EntityPart, StateQueryPart};
use crate::names::{to_lower_camel_case, to_pascal_case, to_screaming_snake_case};
use crate::sourcedef::{self, Entity, Enum, HttpMethod, NestedSchema};

use super::location::SourceNode;
use super::nodes::*;
use super::walk::{join_path, Walker};

pub const STATE_PACKAGE: &str = "j5.state.v1";
pub const LIST_PACKAGE: &str = "j5.list.v1";

pub(super) fn expand(walker: &mut Walker<'_, '_>, entity: &Entity, source: SourceNode) {
    let tree = walker.tree;
    let name = to_pascal_case(&entity.name);
    let keys_name = format!("{name}Keys");
    let data_name = format!("{name}Data");
    let status_name = format!("{name}Status");
    let state_name = format!("{name}State");
    let event_type_name = format!("{name}EventType");
    let event_name = format!("{name}Event");

    let binding = |part| {
        Some(EntityBinding {
            entity: entity.name.clone(),
            part,
        })
    };

    // Keys & Data
    let keys = entity_part(walker, &keys_name, &entity.keys, source.child(&tree, "keys"));
    let keys = ObjectNode {
        entity: binding(EntityPart::Keys),
        ..keys
    };
    let data = entity_part(walker, &data_name, &entity.data, source.child(&tree, "data"));
    let data = ObjectNode {
        entity: binding(EntityPart::Data),
        ..data
    };

    // Status
    let status_definition = Enum {
        name: status_name.clone(),
        description: None,
        prefix: Some(format!("{}_STATUS_", to_screaming_snake_case(&entity.name))),
        options: entity.status.clone(),
    };
    let status = walker.enumeration(
        &status_name,
        &status_definition,
        None,
        source.child(&tree, "status"),
    );

    // State
    let state_at = source.synthetic_child("state");
    let state = ObjectNode {
        name: state_name.clone(),
        full_name: state_name.clone(),
        description: entity.description.clone(),
        entity: binding(EntityPart::State),
        properties: vec![
            object_property("metadata", 1, foreign(STATE_PACKAGE, "StateMetadata", &state_at), false),
            object_property("keys", 2, local(&keys_name, &state_at), true),
            object_property("data", 3, local(&data_name, &state_at), false),
            enum_property("status", 4, local(&status_name, &state_at)),
        ],
        nested: Vec::new(),
        source: state_at,
    };

    // Event type & Event
    let events_at = source.child(&tree, "events");
    let mut event_type_properties = Vec::with_capacity(entity.events.len());
    let mut event_type_nested = Vec::with_capacity(entity.events.len());
    for (i, event) in entity.events.iter().enumerate() {
        let at = events_at.child(&tree, i);
        let event_local = to_pascal_case(&event.name);
        let node = walker.object(&event_local, event, Some(&event_type_name), at.clone());
        let reference = RefNode {
            package_alias: None,
            schema: node.full_name.clone(),
            inline: true,
            source: at.clone(),
        };
        event_type_properties.push(PropertyNode {
            source: at,
            description: event.description.clone(),
            ..object_property(&to_lower_camel_case(&event.name), i as i32 + 1, reference, false)
        });
        event_type_nested.push(SchemaNode::Object(node));
    }
    let event_type_at = source.synthetic_child("event_type");
    let event_type = OneofNode {
        name: event_type_name.clone(),
        full_name: event_type_name.clone(),
        description: None,
        properties: event_type_properties,
        nested: event_type_nested,
        source: event_type_at,
    };

    let event_at = source.synthetic_child("event");
    let event = ObjectNode {
        name: event_name.clone(),
        full_name: event_name.clone(),
        description: None,
        entity: binding(EntityPart::Event),
        properties: vec![
            object_property("metadata", 1, foreign(STATE_PACKAGE, "EventMetadata", &event_at), false),
            object_property("keys", 2, local(&keys_name, &event_at), true),
            oneof_property("event", 3, local(&event_type_name, &event_at)),
        ],
        nested: Vec::new(),
        source: event_at,
    };

    let list_query = list_query(&keys, &data);
    let primary_keys: Vec<PropertyNode> = keys
        .properties
        .iter()
        .filter(|p| p.primary_key)
        .cloned()
        .collect();

    walker.schemas.push(SchemaNode::Object(keys));
    walker.schemas.push(SchemaNode::Object(data));
    walker.schemas.push(SchemaNode::Enum(status));
    walker.schemas.push(SchemaNode::Object(state));
    walker.schemas.push(SchemaNode::Oneof(event_type));
    walker.schemas.push(SchemaNode::Object(event));

    let schemas_at = source.child(&tree, "schemas");
    for (i, schema) in entity.schemas.iter().enumerate() {
        let at = schemas_at.child(&tree, i);
        let node = match schema {
            NestedSchema::Object(o) => {
                SchemaNode::Object(walker.object(&o.name, o, None, at.child(&tree, "object")))
            }
            NestedSchema::Oneof(o) => {
                SchemaNode::Oneof(walker.oneof(&o.name, o, None, at.child(&tree, "oneof")))
            }
            NestedSchema::Enum(e) => {
                SchemaNode::Enum(walker.enumeration(&e.name, e, None, at.child(&tree, "enum")))
            }
        };
        walker.schemas.push(node);
    }

    // Command services
    let base = entity.base_url_path.trim_end_matches('/').to_string();
    let commands_at = source.child(&tree, "commands");
    for (i, command) in entity.commands.iter().enumerate() {
        let service = walker.service(
            command,
            Some(ServiceBinding::StateCommand {
                entity: entity.name.clone(),
            }),
            Some(format!("{base}/c")),
            commands_at.child(&tree, i),
        );
        walker.services.push(service);
    }

    // Query service
    let query = QueryBuilder {
        entity: &entity.name,
        name: &name,
        base: join_path(&base, "q"),
        source: source.synthetic_child("query"),
        primary_keys,
    };
    let query_service = query.build(&state_name, &event_name, list_query);
    walker.services.push(query_service);
}

/// Keys and data are bare property lists, anchored at `keys.N`/`data.N`.
fn entity_part(
    walker: &mut Walker<'_, '_>,
    name: &str,
    properties: &[sourcedef::Property],
    source: SourceNode,
) -> ObjectNode {
    let mut nested = Vec::new();
    let properties = walker.properties(properties, name, &mut nested, &source);
    walker.check_unique(nested.iter().map(|s| (s.full_name(), s.source())));
    ObjectNode {
        name: name.to_string(),
        full_name: name.to_string(),
        description: None,
        entity: None,
        properties,
        nested,
        source,
    }
}

// =============================================================================
// Query Service
// =============================================================================

struct QueryBuilder<'e> {
    entity: &'e str,
    name: &'e str,
    base: String,
    source: SourceNode,
    primary_keys: Vec<PropertyNode>,
}

impl QueryBuilder<'_> {
    fn build(&self, state_name: &str, event_name: &str, list_query: ListQuery) -> ServiceNode {
        let key_path: String = self
            .primary_keys
            .iter()
            .map(|p| format!("/:{}", p.name))
            .collect();
        let singular = to_lower_camel_case(self.entity);

        let get = self.method(
            StateQueryPart::Get,
            format!("{}Get", self.name),
            format!("{}{}", self.base, key_path),
            self.key_properties(),
            vec![object_property(&singular, 1, local(state_name, &self.source), false)],
            None,
        );

        let list = self.method(
            StateQueryPart::List,
            format!("{}List", self.name),
            self.base.clone(),
            self.page_and_query(1),
            vec![
                array_property(&format!("{singular}s"), 1, local(state_name, &self.source)),
                object_property("page", 2, foreign(LIST_PACKAGE, "PageResponse", &self.source), false),
            ],
            Some(list_query.clone()),
        );

        let mut events_request = self.key_properties();
        let next = events_request.len() as i32 + 1;
        events_request.extend(self.page_and_query(next));
        let events = self.method(
            StateQueryPart::ListEvents,
            format!("{}Events", self.name),
            format!("{}{}/events", self.base, key_path),
            events_request,
            vec![
                array_property("events", 1, local(event_name, &self.source)),
                object_property("page", 2, foreign(LIST_PACKAGE, "PageResponse", &self.source), false),
            ],
            Some(list_query),
        );

        ServiceNode {
            name: format!("{}Query", self.name),
            description: None,
            binding: Some(ServiceBinding::StateQuery {
                entity: self.entity.to_string(),
            }),
            methods: vec![get, list, events],
            source: self.source.clone(),
        }
    }

    fn key_properties(&self) -> Vec<PropertyNode> {
        self.primary_keys
            .iter()
            .enumerate()
            .map(|(i, p)| PropertyNode {
                number: i as i32 + 1,
                ..p.clone()
            })
            .collect()
    }

    fn page_and_query(&self, first: i32) -> Vec<PropertyNode> {
        vec![
            object_property("page", first, foreign(LIST_PACKAGE, "PageRequest", &self.source), false),
            object_property(
                "query",
                first + 1,
                foreign(LIST_PACKAGE, "QueryRequest", &self.source),
                false,
            ),
        ]
    }

    fn method(
        &self,
        part: StateQueryPart,
        name: String,
        http_path: String,
        request: Vec<PropertyNode>,
        response: Vec<PropertyNode>,
        list_query: Option<ListQuery>,
    ) -> MethodNode {
        let source = self.source.synthetic_child(&name);
        MethodNode {
            request: synthetic_object(format!("{name}Request"), request, &source),
            response: synthetic_object(format!("{name}Response"), response, &source),
            name,
            description: None,
            http_method: HttpMethod::Get,
            http_path,
            state_query: Some(StateQueryBinding {
                entity: self.entity.to_string(),
                part,
            }),
            list_query,
            source,
        }
    }
}

fn list_query(keys: &ObjectNode, data: &ObjectNode) -> ListQuery {
    let mut query = ListQuery {
        filterable: vec!["status".to_string()],
        ..Default::default()
    };
    collect_list_fields(&mut query, "keys", keys);
    collect_list_fields(&mut query, "data", data);
    query
}

/// Dotted paths through inline objects; flattened objects add no step.
fn collect_list_fields(query: &mut ListQuery, prefix: &str, object: &ObjectNode) {
    for property in &object.properties {
        let path = format!("{prefix}.{}", property.name);
        if let FieldNode::Object { reference, flatten } = &property.field {
            if let Some(child) = inline_object(object, reference) {
                let child_prefix = if *flatten { prefix } else { path.as_str() };
                collect_list_fields(query, child_prefix, child);
            }
            continue;
        }
        let Some(rules) = property.field.list_rules() else {
            continue;
        };
        if rules.is_filterable() {
            query.filterable.push(path.clone());
        }
        if rules.is_sortable() {
            query.sortable.push(path.clone());
        }
        if rules.is_searchable() {
            query.searchable.push(path);
        }
    }
}

fn inline_object<'o>(parent: &'o ObjectNode, reference: &RefNode) -> Option<&'o ObjectNode> {
    if !reference.inline {
        return None;
    }
    parent.nested.iter().find_map(|schema| match schema {
        SchemaNode::Object(o) if o.full_name == reference.schema => Some(o),
        _ => None,
    })
}

// =============================================================================
// Synthetic Nodes
// =============================================================================

fn synthetic_object(name: String, properties: Vec<PropertyNode>, source: &SourceNode) -> ObjectNode {
    ObjectNode {
        full_name: name.clone(),
        name,
        description: None,
        entity: None,
        properties,
        nested: Vec::new(),
        source: source.clone(),
    }
}

fn local(schema: &str, source: &SourceNode) -> RefNode {
    RefNode {
        package_alias: None,
        schema: schema.to_string(),
        inline: false,
        source: source.clone(),
    }
}

fn foreign(package: &str, schema: &str, source: &SourceNode) -> RefNode {
    RefNode {
        package_alias: Some(package.to_string()),
        schema: schema.to_string(),
        inline: false,
        source: source.clone(),
    }
}

fn bare_property(name: &str, number: i32, field: FieldNode, source: &SourceNode) -> PropertyNode {
    PropertyNode {
        name: name.to_string(),
        description: None,
        number,
        required: false,
        explicitly_optional: false,
        primary_key: false,
        field,
        source: source.clone(),
    }
}

fn object_property(name: &str, number: i32, reference: RefNode, flatten: bool) -> PropertyNode {
    let source = reference.source.clone();
    bare_property(name, number, FieldNode::Object { reference, flatten }, &source)
}

fn oneof_property(name: &str, number: i32, reference: RefNode) -> PropertyNode {
    let source = reference.source.clone();
    bare_property(name, number, FieldNode::Oneof { reference }, &source)
}

fn enum_property(name: &str, number: i32, reference: RefNode) -> PropertyNode {
    let source = reference.source.clone();
    let field = FieldNode::Enum {
        reference,
        rules: sourcedef::EnumRules::default(),
        list_rules: None,
    };
    bare_property(name, number, field, &source)
}

fn array_property(name: &str, number: i32, reference: RefNode) -> PropertyNode {
    let source = reference.source.clone();
    let field = FieldNode::Array {
        items: Box::new(FieldNode::Object {
            reference,
            flatten: false,
        }),
        rules: sourcedef::ArrayRules::default(),
    };
    bare_property(name, number, field, &source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::sourcedef::SourceFile;
    use crate::sourcewalk::walk_file;
    use serde_json::json;

    fn foo_entity() -> FileNode {
        let file: SourceFile = serde_json::from_value(json!({ "elements": [{ "entity": {
            "name": "foo",
            "base_url_path": "/foo/v1",
            "keys": [
                { "name": "fooId", "entity_key": { "primary_key": true },
                  "schema": { "key": { "format": "uuid" } } },
                { "name": "tenantId",
                  "schema": { "key": { "list_rules": { "filtering": { "filterable": true } } } } }
            ],
            "data": [
                { "name": "name", "schema": { "string": {
                    "list_rules": { "searching": { "searchable": true } } } } }
            ],
            "status": [{ "name": "ACTIVE" }, { "name": "DELETED" }],
            "events": [
                { "name": "created", "properties": [{ "name": "name", "schema": { "string": {} } }] },
                { "name": "deleted" }
            ],
            "commands": [{ "name": "FooCommand", "methods": [{
                "name": "CreateFoo", "http_method": "POST", "http_path": "/create",
                "request": { "properties": [] }
            }] }]
        } }] }))
        .unwrap();
        let mut diagnostics = Diagnostics::new();
        let node = walk_file("foo.v1", "foo/v1/foo.j5s", &file, &mut diagnostics);
        assert!(diagnostics.is_empty(), "{}", diagnostics);
        node
    }

    #[test]
    fn test_entity_expands_to_named_schemas() {
        let file = foo_entity();
        let names: Vec<&str> = file.schemas.iter().map(|s| s.full_name()).collect();
        assert_eq!(
            names,
            vec!["FooKeys", "FooData", "FooStatus", "FooState", "FooEventType", "FooEvent"]
        );

        let SchemaNode::Enum(status) = &file.schemas[2] else {
            panic!("Expected status enum");
        };
        assert_eq!(status.prefix, "FOO_STATUS_");
        assert_eq!(status.options.len(), 3);
    }

    #[test]
    fn test_state_has_four_ordered_properties() {
        let file = foo_entity();
        let SchemaNode::Object(state) = &file.schemas[3] else {
            panic!("Expected state object");
        };
        let props: Vec<(&str, i32)> = state
            .properties
            .iter()
            .map(|p| (p.name.as_str(), p.number))
            .collect();
        assert_eq!(
            props,
            vec![("metadata", 1), ("keys", 2), ("data", 3), ("status", 4)]
        );
        assert!(matches!(
            state.properties[1].field,
            FieldNode::Object { flatten: true, .. }
        ));
        assert_eq!(
            state.entity,
            Some(EntityBinding { entity: "foo".into(), part: EntityPart::State })
        );
    }

    #[test]
    fn test_event_type_nests_events() {
        let file = foo_entity();
        let SchemaNode::Oneof(event_type) = &file.schemas[4] else {
            panic!("Expected event type oneof");
        };
        assert_eq!(event_type.properties[0].name, "created");
        assert_eq!(event_type.nested[0].full_name(), "FooEventType.Created");
        assert_eq!(event_type.nested[1].full_name(), "FooEventType.Deleted");
    }

    #[test]
    fn test_query_service_paths() {
        let file = foo_entity();
        let services = &file.service_file.as_ref().unwrap().services;
        assert_eq!(services.len(), 2);

        let command = &services[0];
        assert_eq!(command.methods[0].http_path, "/foo/v1/c/create");
        assert_eq!(
            command.binding,
            Some(ServiceBinding::StateCommand { entity: "foo".into() })
        );

        let query = &services[1];
        assert_eq!(query.name, "FooQuery");
        let get = &query.methods[0];
        assert_eq!(get.name, "FooGet");
        assert_eq!(get.http_path, "/foo/v1/q/:fooId");
        assert_eq!(get.request.properties.len(), 1);
        assert_eq!(get.request.properties[0].name, "fooId");

        let list = &query.methods[1];
        assert_eq!(list.http_path, "/foo/v1/q");
        let list_query = list.list_query.as_ref().unwrap();
        assert_eq!(list_query.filterable, vec!["status", "keys.tenantId"]);
        assert_eq!(list_query.searchable, vec!["data.name"]);

        let events = &query.methods[2];
        assert_eq!(events.http_path, "/foo/v1/q/:fooId/events");
        let request: Vec<&str> = events.request.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(request, vec!["fooId", "page", "query"]);
        assert_eq!(
            events.state_query.as_ref().map(|s| s.part),
            Some(StateQueryPart::ListEvents)
        );
    }

    #[test]
    fn test_list_query_follows_inline_objects() {
        let file: SourceFile = serde_json::from_value(json!({ "elements": [{ "entity": {
            "name": "foo",
            "base_url_path": "/foo/v1",
            "keys": [{ "name": "fooId", "entity_key": { "primary_key": true },
                       "schema": { "key": { "format": "uuid" } } }],
            "data": [
                { "name": "address", "schema": { "object": { "object": { "properties": [
                    { "name": "city", "schema": { "string": {
                        "list_rules": { "filtering": { "filterable": true } } } } },
                    { "name": "geo", "schema": { "object": { "object": { "properties": [
                        { "name": "lat", "schema": { "float": {
                            "list_rules": { "sorting": { "sortable": true } } } } }
                    ] } } } }
                ] } } } },
                { "name": "extra", "schema": { "object": { "flatten": true, "object": { "properties": [
                    { "name": "note", "schema": { "string": {
                        "list_rules": { "searching": { "searchable": true } } } } }
                ] } } } }
            ],
            "status": [{ "name": "ACTIVE" }]
        } }] }))
        .unwrap();
        let mut diagnostics = Diagnostics::new();
        let node = walk_file("foo.v1", "foo/v1/foo.j5s", &file, &mut diagnostics);
        assert!(!diagnostics.has_errors(), "{}", diagnostics);

        let services = &node.service_file.as_ref().unwrap().services;
        let query = services.iter().find(|s| s.name == "FooQuery").unwrap();
        let list_query = query.methods[1].list_query.as_ref().unwrap();
        assert_eq!(list_query.filterable, vec!["status", "data.address.city"]);
        assert_eq!(list_query.sortable, vec!["data.address.geo.lat"]);
        assert_eq!(list_query.searchable, vec!["data.note"]);
    }
}
