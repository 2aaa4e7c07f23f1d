//! Extension payloads
//!
//! `buf.validate` rules, `google.api.http`, and the J5 field-kind, message,
//! service, method and list annotations.

use prost::Message;

// =============================================================================
// buf.validate
// =============================================================================

#[derive(Clone, PartialEq, Message)]
pub struct FieldConstraints {
    #[prost(bool, optional, tag = "25")]
    pub required: Option<bool>,
    #[prost(
        oneof = "field_constraints::Type",
        tags = "1, 2, 3, 4, 5, 6, 14, 15, 16, 18, 19"
    )]
    pub r#type: Option<field_constraints::Type>,
}

pub mod field_constraints {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Type {
        #[prost(message, tag = "1")]
        Float(super::FloatRules),
        #[prost(message, tag = "2")]
        Double(super::DoubleRules),
        #[prost(message, tag = "3")]
        Int32(super::Int32Rules),
        #[prost(message, tag = "4")]
        Int64(super::Int64Rules),
        #[prost(message, tag = "5")]
        Uint32(super::UInt32Rules),
        #[prost(message, tag = "6")]
        Uint64(super::UInt64Rules),
        #[prost(message, tag = "14")]
        String(super::StringRules),
        #[prost(message, tag = "15")]
        Bytes(super::BytesRules),
        #[prost(message, tag = "16")]
        Enum(super::EnumRules),
        #[prost(message, tag = "18")]
        Repeated(super::RepeatedRules),
        #[prost(message, tag = "19")]
        Map(super::MapRules),
    }
}

impl FieldConstraints {
    pub fn is_empty(&self) -> bool {
        self.required.is_none() && self.r#type.is_none()
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct StringRules {
    #[prost(uint64, optional, tag = "2")]
    pub min_len: Option<u64>,
    #[prost(uint64, optional, tag = "3")]
    pub max_len: Option<u64>,
    #[prost(string, optional, tag = "6")]
    pub pattern: Option<String>,
    #[prost(oneof = "string_rules::WellKnown", tags = "12, 13, 17, 22")]
    pub well_known: Option<string_rules::WellKnown>,
}

pub mod string_rules {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum WellKnown {
        #[prost(bool, tag = "12")]
        Email(bool),
        #[prost(bool, tag = "13")]
        Hostname(bool),
        #[prost(bool, tag = "17")]
        Uri(bool),
        #[prost(bool, tag = "22")]
        Uuid(bool),
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct BytesRules {
    #[prost(uint64, optional, tag = "2")]
    pub min_len: Option<u64>,
    #[prost(uint64, optional, tag = "3")]
    pub max_len: Option<u64>,
}

macro_rules! numeric_rules {
    ($name:ident, $kind:ident, $rust:ty) => {
        #[derive(Clone, PartialEq, Message)]
        pub struct $name {
            #[prost($kind, optional, tag = "2")]
            pub lt: Option<$rust>,
            #[prost($kind, optional, tag = "3")]
            pub lte: Option<$rust>,
            #[prost($kind, optional, tag = "4")]
            pub gt: Option<$rust>,
            #[prost($kind, optional, tag = "5")]
            pub gte: Option<$rust>,
        }
    };
}

numeric_rules!(Int32Rules, int32, i32);
numeric_rules!(Int64Rules, int64, i64);
numeric_rules!(UInt32Rules, uint32, u32);
numeric_rules!(UInt64Rules, uint64, u64);
numeric_rules!(FloatRules, float, f32);
numeric_rules!(DoubleRules, double, f64);

#[derive(Clone, PartialEq, Message)]
pub struct EnumRules {
    #[prost(bool, optional, tag = "2")]
    pub defined_only: Option<bool>,
    #[prost(int32, repeated, tag = "3")]
    pub r#in: Vec<i32>,
    #[prost(int32, repeated, tag = "4")]
    pub not_in: Vec<i32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct RepeatedRules {
    #[prost(uint64, optional, tag = "1")]
    pub min_items: Option<u64>,
    #[prost(uint64, optional, tag = "2")]
    pub max_items: Option<u64>,
    #[prost(bool, optional, tag = "3")]
    pub unique: Option<bool>,
    #[prost(message, optional, boxed, tag = "4")]
    pub items: Option<Box<FieldConstraints>>,
}

#[derive(Clone, PartialEq, Message)]
pub struct MapRules {
    #[prost(uint64, optional, tag = "1")]
    pub min_pairs: Option<u64>,
    #[prost(uint64, optional, tag = "2")]
    pub max_pairs: Option<u64>,
    #[prost(message, optional, boxed, tag = "4")]
    pub keys: Option<Box<FieldConstraints>>,
    #[prost(message, optional, boxed, tag = "5")]
    pub values: Option<Box<FieldConstraints>>,
}

// =============================================================================
// google.api.http
// =============================================================================

#[derive(Clone, PartialEq, Message)]
pub struct HttpRule {
    #[prost(string, tag = "1")]
    pub selector: String,
    #[prost(oneof = "http_rule::Pattern", tags = "2, 3, 4, 5, 6")]
    pub pattern: Option<http_rule::Pattern>,
    #[prost(string, tag = "7")]
    pub body: String,
}

pub mod http_rule {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Pattern {
        #[prost(string, tag = "2")]
        Get(String),
        #[prost(string, tag = "3")]
        Put(String),
        #[prost(string, tag = "4")]
        Post(String),
        #[prost(string, tag = "5")]
        Delete(String),
        #[prost(string, tag = "6")]
        Patch(String),
    }
}

impl HttpRule {
    pub fn path(&self) -> Option<&str> {
        use http_rule::Pattern;
        match self.pattern.as_ref()? {
            Pattern::Get(p) | Pattern::Put(p) | Pattern::Post(p) | Pattern::Delete(p)
            | Pattern::Patch(p) => Some(p),
        }
    }
}

// =============================================================================
// j5.ext.v1
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum EntityPart {
    Unspecified = 0,
    Keys = 1,
    State = 2,
    Event = 3,
    Data = 4,
}

#[derive(Clone, PartialEq, Message)]
pub struct J5MessageOptions {
    #[prost(oneof = "j5_message_options::Type", tags = "1, 2")]
    pub r#type: Option<j5_message_options::Type>,
}

pub mod j5_message_options {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Type {
        #[prost(message, tag = "1")]
        Object(super::ObjectMessageOptions),
        #[prost(message, tag = "2")]
        Oneof(super::OneofMessageOptions),
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct ObjectMessageOptions {
    #[prost(message, optional, tag = "1")]
    pub entity: Option<EntityObject>,
}

#[derive(Clone, PartialEq, Message)]
pub struct EntityObject {
    #[prost(string, tag = "1")]
    pub entity: String,
    #[prost(enumeration = "EntityPart", tag = "2")]
    pub part: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct OneofMessageOptions {}

/// `(j5.ext.v1.field)`: the J5 field kind, set for every converted field.
#[derive(Clone, PartialEq, Message)]
pub struct J5FieldOptions {
    #[prost(
        oneof = "j5_field_options::Type",
        tags = "1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15"
    )]
    pub r#type: Option<j5_field_options::Type>,
}

pub mod j5_field_options {
    use super::*;

    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Type {
        #[prost(message, tag = "1")]
        String(StringFieldOptions),
        #[prost(message, tag = "2")]
        Bytes(EmptyFieldOptions),
        #[prost(message, tag = "3")]
        Bool(EmptyFieldOptions),
        #[prost(message, tag = "4")]
        Integer(NumberFieldOptions),
        #[prost(message, tag = "5")]
        Float(NumberFieldOptions),
        #[prost(message, tag = "6")]
        Date(EmptyFieldOptions),
        #[prost(message, tag = "7")]
        Decimal(EmptyFieldOptions),
        #[prost(message, tag = "8")]
        Timestamp(EmptyFieldOptions),
        #[prost(message, tag = "9")]
        Key(KeyFieldOptions),
        #[prost(message, tag = "10")]
        Any(EmptyFieldOptions),
        #[prost(message, tag = "11")]
        Object(ObjectFieldOptions),
        #[prost(message, tag = "12")]
        Oneof(EmptyFieldOptions),
        #[prost(message, tag = "13")]
        Enum(EmptyFieldOptions),
        #[prost(message, tag = "14")]
        Array(EmptyFieldOptions),
        #[prost(message, tag = "15")]
        Map(EmptyFieldOptions),
    }
}

impl J5FieldOptions {
    pub fn kind_name(&self) -> Option<&'static str> {
        use j5_field_options::Type;
        Some(match self.r#type.as_ref()? {
            Type::String(_) => "string",
            Type::Bytes(_) => "bytes",
            Type::Bool(_) => "bool",
            Type::Integer(_) => "integer",
            Type::Float(_) => "float",
            Type::Date(_) => "date",
            Type::Decimal(_) => "decimal",
            Type::Timestamp(_) => "timestamp",
            Type::Key(_) => "key",
            Type::Any(_) => "any",
            Type::Object(_) => "object",
            Type::Oneof(_) => "oneof",
            Type::Enum(_) => "enum",
            Type::Array(_) => "array",
            Type::Map(_) => "map",
        })
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct EmptyFieldOptions {}

#[derive(Clone, PartialEq, Message)]
pub struct StringFieldOptions {
    #[prost(string, optional, tag = "1")]
    pub format: Option<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct NumberFieldOptions {
    #[prost(string, tag = "1")]
    pub format: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct KeyFieldOptions {
    #[prost(string, optional, tag = "1")]
    pub format: Option<String>,
    #[prost(bool, tag = "2")]
    pub primary_key: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct ObjectFieldOptions {
    #[prost(bool, tag = "1")]
    pub flatten: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct J5ServiceOptions {
    #[prost(oneof = "j5_service_options::Type", tags = "1, 2, 3")]
    pub r#type: Option<j5_service_options::Type>,
}

pub mod j5_service_options {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Type {
        #[prost(message, tag = "1")]
        StateCommand(super::StateEntityBinding),
        #[prost(message, tag = "2")]
        StateQuery(super::StateEntityBinding),
        #[prost(message, tag = "3")]
        Topic(super::TopicBinding),
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct StateEntityBinding {
    #[prost(string, tag = "1")]
    pub entity: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct TopicBinding {
    #[prost(string, tag = "1")]
    pub name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum StateQueryPart {
    Unspecified = 0,
    Get = 1,
    List = 2,
    ListEvents = 3,
}

#[derive(Clone, PartialEq, Message)]
pub struct J5MethodOptions {
    #[prost(message, optional, tag = "1")]
    pub state_query: Option<StateQueryMethod>,
}

#[derive(Clone, PartialEq, Message)]
pub struct StateQueryMethod {
    #[prost(string, tag = "1")]
    pub entity: String,
    #[prost(enumeration = "StateQueryPart", tag = "2")]
    pub part: i32,
}

// =============================================================================
// j5.list.v1
// =============================================================================

#[derive(Clone, PartialEq, Message)]
pub struct ListFieldRules {
    #[prost(message, optional, tag = "1")]
    pub filtering: Option<FilteringRules>,
    #[prost(message, optional, tag = "2")]
    pub sorting: Option<SortingRules>,
    #[prost(message, optional, tag = "3")]
    pub searching: Option<SearchingRules>,
}

#[derive(Clone, PartialEq, Message)]
pub struct FilteringRules {
    #[prost(bool, tag = "1")]
    pub filterable: bool,
    #[prost(string, repeated, tag = "2")]
    pub default_filters: Vec<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SortingRules {
    #[prost(bool, tag = "1")]
    pub sortable: bool,
    #[prost(bool, tag = "2")]
    pub default_sort: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct SearchingRules {
    #[prost(bool, tag = "1")]
    pub searchable: bool,
    #[prost(string, optional, tag = "2")]
    pub field_identifier: Option<String>,
}

/// Method-level summary of which request paths accept filter, sort and search.
#[derive(Clone, PartialEq, Message)]
pub struct ListRequestQuery {
    #[prost(string, repeated, tag = "1")]
    pub filterable_fields: Vec<String>,
    #[prost(string, repeated, tag = "2")]
    pub sortable_fields: Vec<String>,
    #[prost(string, repeated, tag = "3")]
    pub searchable_fields: Vec<String>,
}
