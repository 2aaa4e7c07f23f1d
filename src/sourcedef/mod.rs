//! Schema Source Definitions
//!
//! The syntax tree of a J5 schema file, as handed over by the surface
//! parser. Field and variant names double as the structural keys of the
//! attached [`SourceLocation`] tree.

pub mod location;

use serde::{Deserialize, Serialize};

pub use location::{SourceLocation, Span};

use crate::diagnostics::Position;
use crate::error::{BuildError, Result};

// =============================================================================
// Parser Collaborator
// =============================================================================

/// Turns raw schema-language bytes into a syntax tree.
pub trait SchemaParser {
    fn parse(&self, filename: &str, data: &[u8]) -> Result<SourceFile>;
}

/// Reads the syntax tree serialised as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSchemaParser;

impl SchemaParser for JsonSchemaParser {
    fn parse(&self, filename: &str, data: &[u8]) -> Result<SourceFile> {
        serde_json::from_slice(data).map_err(|e| BuildError::Parse {
            position: Position::new(filename, e.line() as u32, e.column() as u32),
            message: e.to_string(),
        })
    }
}

// =============================================================================
// File
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    #[serde(default)]
    pub imports: Vec<Import>,
    #[serde(default)]
    pub elements: Vec<RootElement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_locations: Option<SourceLocation>,
}

/// `import foo.v1` (package) or `import "foo/v1/bar.proto"` (file).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootElement {
    Object(Object),
    Oneof(Oneof),
    Enum(Enum),
    Entity(Entity),
    Service(Service),
    Topic(Topic),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NestedSchema {
    Object(Object),
    Oneof(Oneof),
    Enum(Enum),
}

// =============================================================================
// Schemas
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Object {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schemas: Vec<NestedSchema>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Oneof {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schemas: Vec<NestedSchema>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Enum {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Defaults to `SCREAMING_SNAKE(name) + "_"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default)]
    pub options: Vec<EnumOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumOption {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<i32>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub explicitly_optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_key: Option<EntityKey>,
    pub schema: Field,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityKey {
    #[serde(default)]
    pub primary_key: bool,
}

/// Reference to a named schema, optionally in an imported package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ref {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    pub schema: String,
}

// =============================================================================
// Fields
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Object(ObjectField),
    Oneof(OneofField),
    Enum(EnumField),
    Array(ArrayField),
    Map(MapField),
    String(StringField),
    Bytes(BytesField),
    Bool(BoolField),
    Integer(IntegerField),
    Float(FloatField),
    Date(DateField),
    Decimal(DecimalField),
    Timestamp(TimestampField),
    Key(KeyField),
    Any(AnyField),
}

impl Field {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Field::Object(_) => "object",
            Field::Oneof(_) => "oneof",
            Field::Enum(_) => "enum",
            Field::Array(_) => "array",
            Field::Map(_) => "map",
            Field::String(_) => "string",
            Field::Bytes(_) => "bytes",
            Field::Bool(_) => "bool",
            Field::Integer(_) => "integer",
            Field::Float(_) => "float",
            Field::Date(_) => "date",
            Field::Decimal(_) => "decimal",
            Field::Timestamp(_) => "timestamp",
            Field::Key(_) => "key",
            Field::Any(_) => "any",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectField {
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<Ref>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<Object>,
    #[serde(default)]
    pub flatten: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OneofField {
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<Ref>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oneof: Option<Oneof>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnumField {
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<Ref>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<Enum>,
    #[serde(default)]
    pub rules: EnumRules,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_rules: Option<ListRules>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumRules {
    /// Only these options are valid
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub only: Vec<String>,
    /// These options are rejected
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayField {
    pub items: Box<Field>,
    #[serde(default)]
    pub rules: ArrayRules,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    #[serde(default)]
    pub unique_items: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapField {
    /// Value schema
    pub items: Box<Field>,
    /// Key schema; string when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<Box<Field>>,
    #[serde(default)]
    pub rules: MapRules,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_pairs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pairs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringField {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default)]
    pub rules: StringRules,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_rules: Option<ListRules>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BytesField {
    #[serde(default)]
    pub rules: BytesRules,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BytesRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoolField {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_rules: Option<ListRules>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegerFormat {
    #[default]
    Int32,
    Int64,
    Uint32,
    Uint64,
}

impl IntegerFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegerField {
    #[serde(default)]
    pub format: IntegerFormat,
    #[serde(default)]
    pub rules: IntegerRules,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_rules: Option<ListRules>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegerRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<i64>,
    #[serde(default)]
    pub exclusive_minimum: bool,
    #[serde(default)]
    pub exclusive_maximum: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloatFormat {
    Float32,
    #[default]
    Float64,
}

impl FloatFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FloatField {
    #[serde(default)]
    pub format: FloatFormat,
    #[serde(default)]
    pub rules: FloatRules,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_rules: Option<ListRules>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FloatRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(default)]
    pub exclusive_minimum: bool,
    #[serde(default)]
    pub exclusive_maximum: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateField {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_rules: Option<ListRules>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecimalField {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_rules: Option<ListRules>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampField {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_rules: Option<ListRules>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyField {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<KeyFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_rules: Option<ListRules>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyFormat {
    Uuid,
    Id62,
    Informal,
    Custom { pattern: String },
}

impl KeyFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uuid => "uuid",
            Self::Id62 => "id62",
            Self::Informal => "informal",
            Self::Custom { .. } => "custom",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnyField {}

/// Filter/sort/search metadata for list queries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filtering: Option<FilteringRules>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sorting: Option<SortingRules>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub searching: Option<SearchingRules>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilteringRules {
    #[serde(default)]
    pub filterable: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub default_filters: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortingRules {
    #[serde(default)]
    pub sortable: bool,
    #[serde(default)]
    pub default_sort: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchingRules {
    #[serde(default)]
    pub searchable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_identifier: Option<String>,
}

impl ListRules {
    pub fn is_filterable(&self) -> bool {
        self.filtering.as_ref().map(|f| f.filterable).unwrap_or(false)
    }

    pub fn is_sortable(&self) -> bool {
        self.sorting.as_ref().map(|s| s.sortable).unwrap_or(false)
    }

    pub fn is_searchable(&self) -> bool {
        self.searching.as_ref().map(|s| s.searchable).unwrap_or(false)
    }
}

// =============================================================================
// Entities, Services, Topics
// =============================================================================

/// State-machine macro, expanded by sourcewalk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub base_url_path: String,
    #[serde(default)]
    pub keys: Vec<Property>,
    #[serde(default)]
    pub data: Vec<Property>,
    #[serde(default)]
    pub status: Vec<EnumOption>,
    #[serde(default)]
    pub events: Vec<Object>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<Service>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schemas: Vec<NestedSchema>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
    #[serde(default)]
    pub methods: Vec<Method>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Method {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub http_method: HttpMethod,
    #[serde(default)]
    pub http_path: String,
    #[serde(default)]
    pub request: AnonymousObject,
    #[serde(default)]
    pub response: AnonymousObject,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnonymousObject {
    #[serde(default)]
    pub properties: Vec<Property>,
}

/// Publish-only message topic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub messages: Vec<TopicMessage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopicMessage {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub properties: Vec<Property>,
}
