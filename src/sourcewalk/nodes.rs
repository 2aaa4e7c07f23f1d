//! Normalised Schema Nodes
//!
//! The flattened view the converter consumes. Every inline definition has
//! been hoisted into a named nested schema, every entity expanded, and every
//! field number and enum value number assigned.

use crate::descriptor::ext::{EntityPart, StateQueryPart};
use crate::sourcedef::{
    self, ArrayRules, EnumRules, HttpMethod, ListRules, MapRules,
};

use super::location::SourceNode;

// =============================================================================
// File
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct FileNode {
    pub package: String,
    /// Source filename (`foo/v1/foo.j5s`)
    pub filename: String,
    pub imports: Vec<ImportNode>,
    pub schemas: Vec<SchemaNode>,
    pub service_file: Option<ServiceFileNode>,
    pub topic_file: Option<TopicFileNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportNode {
    pub path: String,
    pub alias: Option<String>,
    pub source: SourceNode,
}

impl ImportNode {
    /// File imports name a path, package imports a dotted package.
    pub fn is_file(&self) -> bool {
        self.path.ends_with(".proto") || self.path.ends_with(".j5s")
    }
}

// =============================================================================
// Schemas
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Object(ObjectNode),
    Oneof(OneofNode),
    Enum(EnumNode),
}

impl SchemaNode {
    pub fn name(&self) -> &str {
        match self {
            SchemaNode::Object(o) => &o.name,
            SchemaNode::Oneof(o) => &o.name,
            SchemaNode::Enum(e) => &e.name,
        }
    }

    pub fn full_name(&self) -> &str {
        match self {
            SchemaNode::Object(o) => &o.full_name,
            SchemaNode::Oneof(o) => &o.full_name,
            SchemaNode::Enum(e) => &e.full_name,
        }
    }

    pub fn source(&self) -> &SourceNode {
        match self {
            SchemaNode::Object(o) => &o.source,
            SchemaNode::Oneof(o) => &o.source,
            SchemaNode::Enum(e) => &e.source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityBinding {
    pub entity: String,
    pub part: EntityPart,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectNode {
    /// Local name
    pub name: String,
    /// Dotted name within the package (`Parent.Child`)
    pub full_name: String,
    pub description: Option<String>,
    pub entity: Option<EntityBinding>,
    pub properties: Vec<PropertyNode>,
    pub nested: Vec<SchemaNode>,
    pub source: SourceNode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OneofNode {
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub properties: Vec<PropertyNode>,
    pub nested: Vec<SchemaNode>,
    pub source: SourceNode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumNode {
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub prefix: String,
    /// Value 0 first, names without the prefix
    pub options: Vec<EnumOptionNode>,
    pub source: SourceNode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumOptionNode {
    pub name: String,
    pub number: i32,
    pub description: Option<String>,
    pub source: SourceNode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyNode {
    pub name: String,
    pub description: Option<String>,
    pub number: i32,
    pub required: bool,
    pub explicitly_optional: bool,
    pub primary_key: bool,
    pub field: FieldNode,
    pub source: SourceNode,
}

// =============================================================================
// Fields
// =============================================================================

/// A type reference, either written in source or left behind by hoisting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefNode {
    pub package_alias: Option<String>,
    pub schema: String,
    /// Points at a schema hoisted out of this file
    pub inline: bool,
    pub source: SourceNode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldNode {
    Object { reference: RefNode, flatten: bool },
    Oneof { reference: RefNode },
    Enum {
        reference: RefNode,
        rules: EnumRules,
        list_rules: Option<ListRules>,
    },
    Array { items: Box<FieldNode>, rules: ArrayRules },
    Map {
        items: Box<FieldNode>,
        keys: Option<Box<FieldNode>>,
        rules: MapRules,
    },
    String(sourcedef::StringField),
    Bytes(sourcedef::BytesField),
    Bool(sourcedef::BoolField),
    Integer(sourcedef::IntegerField),
    Float(sourcedef::FloatField),
    Date(sourcedef::DateField),
    Decimal(sourcedef::DecimalField),
    Timestamp(sourcedef::TimestampField),
    Key(sourcedef::KeyField),
    Any,
}

impl FieldNode {
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldNode::Object { .. } => "object",
            FieldNode::Oneof { .. } => "oneof",
            FieldNode::Enum { .. } => "enum",
            FieldNode::Array { .. } => "array",
            FieldNode::Map { .. } => "map",
            FieldNode::String(_) => "string",
            FieldNode::Bytes(_) => "bytes",
            FieldNode::Bool(_) => "bool",
            FieldNode::Integer(_) => "integer",
            FieldNode::Float(_) => "float",
            FieldNode::Date(_) => "date",
            FieldNode::Decimal(_) => "decimal",
            FieldNode::Timestamp(_) => "timestamp",
            FieldNode::Key(_) => "key",
            FieldNode::Any => "any",
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, FieldNode::Array { .. } | FieldNode::Map { .. })
    }

    pub fn reference(&self) -> Option<&RefNode> {
        match self {
            FieldNode::Object { reference, .. }
            | FieldNode::Oneof { reference }
            | FieldNode::Enum { reference, .. } => Some(reference),
            _ => None,
        }
    }

    /// List metadata for scalar and enum fields.
    pub fn list_rules(&self) -> Option<&ListRules> {
        match self {
            FieldNode::Enum { list_rules, .. } => list_rules.as_ref(),
            FieldNode::String(f) => f.list_rules.as_ref(),
            FieldNode::Bool(f) => f.list_rules.as_ref(),
            FieldNode::Integer(f) => f.list_rules.as_ref(),
            FieldNode::Float(f) => f.list_rules.as_ref(),
            FieldNode::Date(f) => f.list_rules.as_ref(),
            FieldNode::Decimal(f) => f.list_rules.as_ref(),
            FieldNode::Timestamp(f) => f.list_rules.as_ref(),
            FieldNode::Key(f) => f.list_rules.as_ref(),
            _ => None,
        }
    }
}

// =============================================================================
// Services and Topics
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceFileNode {
    pub services: Vec<ServiceNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceBinding {
    StateCommand { entity: String },
    StateQuery { entity: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceNode {
    pub name: String,
    pub description: Option<String>,
    pub binding: Option<ServiceBinding>,
    pub methods: Vec<MethodNode>,
    pub source: SourceNode,
}

/// Dotted field paths a list method may filter, sort or search on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub filterable: Vec<String>,
    pub sortable: Vec<String>,
    pub searchable: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateQueryBinding {
    pub entity: String,
    pub part: StateQueryPart,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodNode {
    pub name: String,
    pub description: Option<String>,
    pub http_method: HttpMethod,
    /// Full path with the service base prepended, `:param` segments intact
    pub http_path: String,
    /// `<Method>Request`, top level in the service file
    pub request: ObjectNode,
    /// `<Method>Response`
    pub response: ObjectNode,
    pub state_query: Option<StateQueryBinding>,
    pub list_query: Option<ListQuery>,
    pub source: SourceNode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopicFileNode {
    pub topics: Vec<TopicNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopicNode {
    pub name: String,
    pub description: Option<String>,
    /// `<Message>Message` objects, one publish method each
    pub messages: Vec<ObjectNode>,
    pub source: SourceNode,
}

// =============================================================================
// Visitor
// =============================================================================

/// Callbacks for a depth-first walk over a [`FileNode`]. Nested schemas are
/// visited after their parent.
pub trait SchemaVisitor {
    fn visit_object(&mut self, _node: &ObjectNode) {}
    fn visit_oneof(&mut self, _node: &OneofNode) {}
    fn visit_enum(&mut self, _node: &EnumNode) {}
    fn visit_ref(&mut self, _node: &RefNode) {}
}

impl FileNode {
    /// Walk the main schemas only.
    pub fn visit_schemas(&self, visitor: &mut dyn SchemaVisitor) {
        for schema in &self.schemas {
            visit_schema(schema, visitor);
        }
    }

    /// Walk everything, including service request/response and topic
    /// message objects.
    pub fn visit(&self, visitor: &mut dyn SchemaVisitor) {
        self.visit_schemas(visitor);
        if let Some(services) = &self.service_file {
            for service in &services.services {
                for method in &service.methods {
                    visit_object(&method.request, visitor);
                    visit_object(&method.response, visitor);
                }
            }
        }
        if let Some(topics) = &self.topic_file {
            for topic in &topics.topics {
                for message in &topic.messages {
                    visit_object(message, visitor);
                }
            }
        }
    }
}

impl ObjectNode {
    /// Walk this object, its fields and its nested schemas.
    pub fn visit(&self, visitor: &mut dyn SchemaVisitor) {
        visit_object(self, visitor);
    }
}

fn visit_schema(schema: &SchemaNode, visitor: &mut dyn SchemaVisitor) {
    match schema {
        SchemaNode::Object(o) => visit_object(o, visitor),
        SchemaNode::Oneof(o) => {
            visitor.visit_oneof(o);
            visit_properties(&o.properties, visitor);
            for nested in &o.nested {
                visit_schema(nested, visitor);
            }
        }
        SchemaNode::Enum(e) => visitor.visit_enum(e),
    }
}

fn visit_object(object: &ObjectNode, visitor: &mut dyn SchemaVisitor) {
    visitor.visit_object(object);
    visit_properties(&object.properties, visitor);
    for nested in &object.nested {
        visit_schema(nested, visitor);
    }
}

fn visit_properties(properties: &[PropertyNode], visitor: &mut dyn SchemaVisitor) {
    for property in properties {
        visit_field(&property.field, visitor);
    }
}

fn visit_field(field: &FieldNode, visitor: &mut dyn SchemaVisitor) {
    match field {
        FieldNode::Array { items, .. } => visit_field(items, visitor),
        FieldNode::Map { items, keys, .. } => {
            if let Some(keys) = keys {
                visit_field(keys, visitor);
            }
            visit_field(items, visitor);
        }
        other => {
            if let Some(reference) = other.reference() {
                visitor.visit_ref(reference);
            }
        }
    }
}
