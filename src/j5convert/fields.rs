//! Schemas & Fields
//!
//! Object, oneof and enum nodes to descriptor messages and enums, with the
//! field-kind, validation and list extensions attached.

use std::collections::BTreeMap;
use std::sync::Arc;

use regex::Regex;

use crate::descriptor::ext::{
    field_constraints, j5_field_options, j5_message_options, string_rules, BytesRules,
    DoubleRules, EmptyFieldOptions, EntityObject, EnumRules, FieldConstraints, FilteringRules,
    FloatRules, Int32Rules, Int64Rules, KeyFieldOptions, ListFieldRules, MapRules,
    NumberFieldOptions, ObjectFieldOptions, ObjectMessageOptions, OneofMessageOptions,
    RepeatedRules, SearchingRules, SortingRules, StringFieldOptions, StringRules, UInt32Rules,
    UInt64Rules,
};
use crate::descriptor::{
    FieldDescriptorProto, FieldLabel, FieldOptions, FieldType,
    J5FieldOptions, J5MessageOptions, MessageOptions, J5_EXT_FILE, J5_LIST_EXT_FILE,
    VALIDATE_FILE,
};
use crate::error::SchemaError;
use crate::names::{map_entry_name, to_snake_case};
use crate::protobuild::builtin::{ANY_FILE, DATE_FILE, DECIMAL_FILE, TIMESTAMP_FILE};
use crate::sourcedef::{
    self, FloatFormat, IntegerFormat, KeyFormat, ListRules,
};
use crate::sourcewalk::{
    EnumNode, FieldNode, ObjectNode, OneofNode, PropertyNode, RefNode, SchemaNode,
};
use crate::typeref::TypeRefHandle;

use super::builder::{EnumBuilder, MessageBuilder};
use super::Converter;

/// Pattern enforced on `id62` keys.
pub const ID62_PATTERN: &str = "^[0-9A-Za-z]{22}$";

/// Type half of a field, before label, name and number are applied.
struct FieldShape {
    kind: FieldType,
    type_name: Option<String>,
    rules: Option<field_constraints::Type>,
    j5: j5_field_options::Type,
    list: Option<ListFieldRules>,
}

impl FieldShape {
    fn scalar(kind: FieldType, j5: j5_field_options::Type) -> Self {
        Self {
            kind,
            type_name: None,
            rules: None,
            j5,
            list: None,
        }
    }

    fn message(type_name: String, j5: j5_field_options::Type) -> Self {
        Self {
            kind: FieldType::Message,
            type_name: Some(type_name),
            rules: None,
            j5,
            list: None,
        }
    }

    fn with_list(mut self, rules: Option<&ListRules>) -> Self {
        self.list = rules.map(list_field_rules);
        self
    }
}

impl Converter<'_, '_> {
    // =========================================================================
    // Schemas
    // =========================================================================

    pub(super) fn schema(&mut self, schema: &SchemaNode) -> SchemaBuilder {
        match schema {
            SchemaNode::Object(o) => SchemaBuilder::Message(self.object(o)),
            SchemaNode::Oneof(o) => SchemaBuilder::Message(self.oneof(o)),
            SchemaNode::Enum(e) => SchemaBuilder::Enum(self.enumeration(e)),
        }
    }

    pub(super) fn object(&mut self, node: &ObjectNode) -> MessageBuilder {
        let mut message = MessageBuilder::new(&node.name, &node.source, node.description.as_deref());
        message.descriptor.options = Some(MessageOptions {
            j5_message: Some(J5MessageOptions {
                r#type: Some(j5_message_options::Type::Object(ObjectMessageOptions {
                    entity: node.entity.as_ref().map(|binding| EntityObject {
                        entity: binding.entity.clone(),
                        part: binding.part as i32,
                    }),
                })),
            }),
            ..Default::default()
        });
        self.use_file(J5_EXT_FILE);

        self.nested(&mut message, &node.nested);
        self.properties(&mut message, &node.full_name, &node.properties, None);
        message
    }

    pub(super) fn oneof(&mut self, node: &OneofNode) -> MessageBuilder {
        let mut message = MessageBuilder::new(&node.name, &node.source, node.description.as_deref());
        message.descriptor.options = Some(MessageOptions {
            j5_message: Some(J5MessageOptions {
                r#type: Some(j5_message_options::Type::Oneof(OneofMessageOptions {})),
            }),
            ..Default::default()
        });
        self.use_file(J5_EXT_FILE);

        let index = message.add_oneof("type", &node.source);
        self.nested(&mut message, &node.nested);
        self.properties(&mut message, &node.full_name, &node.properties, Some(index));
        message
    }

    pub(super) fn enumeration(&mut self, node: &EnumNode) -> EnumBuilder {
        let mut builder = EnumBuilder::new(&node.name, &node.source, node.description.as_deref());
        for option in &node.options {
            builder.add_value(
                format!("{}{}", node.prefix, option.name),
                option.number,
                &option.source,
                option.description.as_deref(),
            );
        }
        builder
    }

    fn nested(&mut self, message: &mut MessageBuilder, nested: &[SchemaNode]) {
        for schema in nested {
            match self.schema(schema) {
                SchemaBuilder::Message(child) => message.attach_message(child),
                SchemaBuilder::Enum(child) => message.attach_enum(child),
            }
        }
    }

    // =========================================================================
    // Properties
    // =========================================================================

    fn properties(
        &mut self,
        message: &mut MessageBuilder,
        full_name: &str,
        properties: &[PropertyNode],
        oneof_index: Option<i32>,
    ) {
        let mut numbers: BTreeMap<i32, &str> = BTreeMap::new();
        for property in properties {
            if let Some(first) = numbers.insert(property.number, &property.name) {
                self.error(
                    &property.source,
                    SchemaError::DuplicateFieldNumber {
                        schema: full_name.to_string(),
                        number: property.number,
                        first: first.to_string(),
                        second: property.name.clone(),
                    },
                );
                continue;
            }
            if let Some(field) = self.property(message, full_name, property, oneof_index) {
                message.add_field(field, &property.source, property.description.as_deref());
            }
        }
    }

    fn property(
        &mut self,
        message: &mut MessageBuilder,
        full_name: &str,
        property: &PropertyNode,
        oneof_index: Option<i32>,
    ) -> Option<FieldDescriptorProto> {
        let name = to_snake_case(&property.name);
        if property.required && property.explicitly_optional {
            self.error(
                &property.source,
                SchemaError::RequiredAndOptional {
                    field: property.name.clone(),
                },
            );
        }

        let mut field = FieldDescriptorProto {
            name: Some(name.clone()),
            number: Some(property.number),
            json_name: Some(property.name.clone()),
            ..Default::default()
        };
        field.set_label(FieldLabel::Optional);

        let (shape, label, validate) = match &property.field {
            FieldNode::Array { items, rules } => {
                if oneof_index.is_some() || items.is_collection() {
                    let outer = if oneof_index.is_some() { "oneof" } else { "array" };
                    let inner = if oneof_index.is_some() { "array" } else { items.kind_name() };
                    self.error(
                        &property.source,
                        SchemaError::NestedCollection {
                            field: property.name.clone(),
                            outer,
                            inner,
                        },
                    );
                    return None;
                }
                let item = self.shape(items, property, false)?;
                let repeated = RepeatedRules {
                    min_items: rules.min_items,
                    max_items: rules.max_items,
                    unique: rules.unique_items.then_some(true),
                    items: item.rules.clone().map(|r| {
                        Box::new(FieldConstraints {
                            required: None,
                            r#type: Some(r),
                        })
                    }),
                };
                let has_rules = repeated.min_items.is_some()
                    || repeated.max_items.is_some()
                    || repeated.unique.is_some()
                    || repeated.items.is_some();
                let shape = FieldShape {
                    j5: j5_field_options::Type::Array(EmptyFieldOptions {}),
                    list: item.list.clone(),
                    ..item
                };
                let validate = has_rules.then_some(field_constraints::Type::Repeated(repeated));
                (shape, FieldLabel::Repeated, validate)
            }
            FieldNode::Map { items, keys, rules } => {
                if oneof_index.is_some() || items.is_collection() {
                    let inner = if oneof_index.is_some() { "map" } else { items.kind_name() };
                    let outer = if oneof_index.is_some() { "oneof" } else { "map" };
                    self.error(
                        &property.source,
                        SchemaError::NestedCollection {
                            field: property.name.clone(),
                            outer,
                            inner,
                        },
                    );
                    return None;
                }
                if let Some(keys) = keys {
                    if !matches!(keys.as_ref(), FieldNode::String(_) | FieldNode::Key(_)) {
                        self.error(
                            &property.source,
                            SchemaError::InvalidMapKey {
                                field: property.name.clone(),
                            },
                        );
                        return None;
                    }
                }
                let value = self.shape(items, property, false)?;
                let entry_name = map_entry_name(&name);
                message.attach_message(map_entry(&entry_name, value.clone_without_list(), property));

                let map = MapRules {
                    min_pairs: rules.min_pairs,
                    max_pairs: rules.max_pairs,
                    keys: None,
                    values: value.rules.map(|r| {
                        Box::new(FieldConstraints {
                            required: None,
                            r#type: Some(r),
                        })
                    }),
                };
                let has_rules =
                    map.min_pairs.is_some() || map.max_pairs.is_some() || map.values.is_some();
                let shape = FieldShape::message(
                    format!(".{}.{}.{}", self.package, full_name, entry_name),
                    j5_field_options::Type::Map(EmptyFieldOptions {}),
                );
                let validate = has_rules.then_some(field_constraints::Type::Map(map));
                (shape, FieldLabel::Repeated, validate)
            }
            other => {
                let mut shape = self.shape(other, property, property.primary_key)?;
                let validate = shape.rules.take();
                (shape, FieldLabel::Optional, validate)
            }
        };

        field.set_label(label);
        field.set_type(shape.kind);
        field.type_name = shape.type_name;

        let required = property.required || property.primary_key;
        let constraints = FieldConstraints {
            required: required.then_some(true),
            r#type: validate,
        };
        if !constraints.is_empty() {
            self.use_file(VALIDATE_FILE);
        }
        if shape.list.is_some() {
            self.use_file(J5_LIST_EXT_FILE);
        }
        self.use_file(J5_EXT_FILE);
        field.options = Some(FieldOptions {
            validate: (!constraints.is_empty()).then_some(constraints),
            j5_field: Some(J5FieldOptions {
                r#type: Some(shape.j5),
            }),
            list: shape.list,
            ..Default::default()
        });

        if let Some(index) = oneof_index {
            field.oneof_index = Some(index);
        } else if property.explicitly_optional && label != FieldLabel::Repeated {
            let index = message.add_oneof(format!("_{name}"), &property.source);
            field.oneof_index = Some(index);
            field.proto3_optional = Some(true);
        }

        Some(field)
    }

    // =========================================================================
    // Field Shapes
    // =========================================================================

    fn shape(&mut self, field: &FieldNode, property: &PropertyNode, primary_key: bool) -> Option<FieldShape> {
        use j5_field_options::Type as J5;

        let shape = match field {
            FieldNode::Object { reference, flatten } => {
                let found = self.resolve_kind(reference, "object")?;
                FieldShape::message(
                    found.type_name(),
                    J5::Object(ObjectFieldOptions { flatten: *flatten }),
                )
            }
            FieldNode::Oneof { reference } => {
                let found = self.resolve_kind(reference, "oneof")?;
                FieldShape::message(found.type_name(), J5::Oneof(EmptyFieldOptions {}))
            }
            FieldNode::Enum {
                reference,
                rules,
                list_rules,
            } => {
                let found = self.resolve_kind(reference, "enum")?;
                let mut shape = FieldShape {
                    kind: FieldType::Enum,
                    type_name: Some(found.type_name()),
                    rules: None,
                    j5: J5::Enum(EmptyFieldOptions {}),
                    list: None,
                }
                .with_list(list_rules.as_ref());
                shape.rules = self
                    .enum_rules(&found, rules, property)
                    .map(field_constraints::Type::Enum);
                shape
            }
            FieldNode::String(f) => {
                let mut rules = StringRules {
                    min_len: f.rules.min_length,
                    max_len: f.rules.max_length,
                    pattern: None,
                    well_known: None,
                };
                if let Some(pattern) = &f.rules.pattern {
                    rules.pattern = self.checked_pattern(pattern, property);
                }
                if let Some(format) = &f.format {
                    rules.well_known = match format.as_str() {
                        "email" => Some(string_rules::WellKnown::Email(true)),
                        "hostname" => Some(string_rules::WellKnown::Hostname(true)),
                        "uri" => Some(string_rules::WellKnown::Uri(true)),
                        "uuid" => Some(string_rules::WellKnown::Uuid(true)),
                        other => {
                            self.error(
                                &property.source,
                                SchemaError::UnknownFormat {
                                    field: property.name.clone(),
                                    format: other.to_string(),
                                },
                            );
                            None
                        }
                    };
                }
                let mut shape = FieldShape::scalar(
                    FieldType::String,
                    J5::String(StringFieldOptions {
                        format: f.format.clone(),
                    }),
                )
                .with_list(f.list_rules.as_ref());
                shape.rules = string_rules_if_any(rules);
                shape
            }
            FieldNode::Key(f) => {
                let mut rules = StringRules::default();
                match &f.format {
                    Some(KeyFormat::Uuid) => {
                        rules.well_known = Some(string_rules::WellKnown::Uuid(true));
                    }
                    Some(KeyFormat::Id62) => rules.pattern = Some(ID62_PATTERN.to_string()),
                    Some(KeyFormat::Custom { pattern }) => {
                        rules.pattern = self.checked_pattern(pattern, property);
                    }
                    Some(KeyFormat::Informal) | None => {}
                }
                let mut shape = FieldShape::scalar(
                    FieldType::String,
                    J5::Key(KeyFieldOptions {
                        format: f.format.as_ref().map(|k| k.as_str().to_string()),
                        primary_key,
                    }),
                )
                .with_list(f.list_rules.as_ref());
                shape.rules = string_rules_if_any(rules);
                shape
            }
            FieldNode::Bytes(f) => {
                let mut shape = FieldShape::scalar(FieldType::Bytes, J5::Bytes(EmptyFieldOptions {}));
                if f.rules.min_length.is_some() || f.rules.max_length.is_some() {
                    shape.rules = Some(field_constraints::Type::Bytes(BytesRules {
                        min_len: f.rules.min_length,
                        max_len: f.rules.max_length,
                    }));
                }
                shape
            }
            FieldNode::Bool(f) => FieldShape::scalar(FieldType::Bool, J5::Bool(EmptyFieldOptions {}))
                .with_list(f.list_rules.as_ref()),
            FieldNode::Integer(f) => {
                let kind = match f.format {
                    IntegerFormat::Int32 => FieldType::Int32,
                    IntegerFormat::Int64 => FieldType::Int64,
                    IntegerFormat::Uint32 => FieldType::Uint32,
                    IntegerFormat::Uint64 => FieldType::Uint64,
                };
                let mut shape = FieldShape::scalar(
                    kind,
                    J5::Integer(NumberFieldOptions {
                        format: f.format.as_str().to_string(),
                    }),
                )
                .with_list(f.list_rules.as_ref());
                shape.rules = self.integer_rules(f, property);
                shape
            }
            FieldNode::Float(f) => {
                let kind = match f.format {
                    FloatFormat::Float32 => FieldType::Float,
                    FloatFormat::Float64 => FieldType::Double,
                };
                let mut shape = FieldShape::scalar(
                    kind,
                    J5::Float(NumberFieldOptions {
                        format: f.format.as_str().to_string(),
                    }),
                )
                .with_list(f.list_rules.as_ref());
                shape.rules = float_rules(f);
                shape
            }
            FieldNode::Date(f) => {
                self.use_file(DATE_FILE);
                FieldShape::message(".j5.types.date.v1.Date".into(), J5::Date(EmptyFieldOptions {}))
                    .with_list(f.list_rules.as_ref())
            }
            FieldNode::Decimal(f) => {
                self.use_file(DECIMAL_FILE);
                FieldShape::message(
                    ".j5.types.decimal.v1.Decimal".into(),
                    J5::Decimal(EmptyFieldOptions {}),
                )
                .with_list(f.list_rules.as_ref())
            }
            FieldNode::Timestamp(f) => {
                self.use_file(TIMESTAMP_FILE);
                FieldShape::message(
                    ".google.protobuf.Timestamp".into(),
                    J5::Timestamp(EmptyFieldOptions {}),
                )
                .with_list(f.list_rules.as_ref())
            }
            FieldNode::Any => {
                self.use_file(ANY_FILE);
                FieldShape::message(".j5.types.any.v1.Any".into(), J5::Any(EmptyFieldOptions {}))
            }
            FieldNode::Array { .. } | FieldNode::Map { .. } => {
                // Only reachable as an array item or map value
                self.error(
                    &property.source,
                    SchemaError::NestedCollection {
                        field: property.name.clone(),
                        outer: "array",
                        inner: field.kind_name(),
                    },
                );
                return None;
            }
        };
        Some(shape)
    }

    /// Resolve a reference and check it names the expected kind of schema.
    fn resolve_kind(&mut self, reference: &RefNode, expected: &'static str) -> Option<TypeRefHandle> {
        let found = self.resolve(reference)?;
        let matches = match expected {
            "enum" => found.is_enum(),
            "oneof" => found.is_oneof(),
            _ => !found.is_enum(),
        };
        if !matches {
            self.error(
                &reference.source,
                SchemaError::WrongKind {
                    name: found.full_name(),
                    expected,
                    found: found.kind_name(),
                },
            );
            return None;
        }
        Some(found)
    }

    fn checked_pattern(&mut self, pattern: &str, property: &PropertyNode) -> Option<String> {
        match Regex::new(pattern) {
            Ok(_) => Some(pattern.to_string()),
            Err(e) => {
                self.error(
                    &property.source,
                    SchemaError::InvalidPattern {
                        field: property.name.clone(),
                        pattern: pattern.to_string(),
                        message: e.to_string(),
                    },
                );
                None
            }
        }
    }

    fn enum_rules(
        &mut self,
        found: &TypeRefHandle,
        rules: &sourcedef::EnumRules,
        property: &PropertyNode,
    ) -> Option<EnumRules> {
        if rules.only.is_empty() && rules.not.is_empty() {
            return None;
        }
        let enum_ref = found.as_enum()?;
        let lookup = |names: &[String], this: &mut Self| -> Vec<i32> {
            names
                .iter()
                .filter_map(|option| match enum_ref.value(option) {
                    Some(number) => Some(number),
                    None => {
                        this.error(
                            &property.source,
                            SchemaError::UnknownEnumOption {
                                field: property.name.clone(),
                                enum_name: found.full_name(),
                                option: option.clone(),
                            },
                        );
                        None
                    }
                })
                .collect()
        };
        let r#in = lookup(&rules.only, self);
        let not_in = lookup(&rules.not, self);
        Some(EnumRules {
            defined_only: Some(true),
            r#in,
            not_in,
        })
    }

    fn integer_rules(
        &mut self,
        field: &sourcedef::IntegerField,
        property: &PropertyNode,
    ) -> Option<field_constraints::Type> {
        let rules = &field.rules;
        if rules.minimum.is_none() && rules.maximum.is_none() {
            return None;
        }
        let format = field.format.as_str();
        let (lower, upper) = match field.format {
            IntegerFormat::Int32 => (i32::MIN as i64, i32::MAX as i64),
            IntegerFormat::Uint32 => (0, u32::MAX as i64),
            IntegerFormat::Int64 => (i64::MIN, i64::MAX),
            IntegerFormat::Uint64 => (0, i64::MAX),
        };
        for value in [rules.minimum, rules.maximum].into_iter().flatten() {
            if value < lower || value > upper {
                self.error(
                    &property.source,
                    SchemaError::RuleOutOfRange {
                        field: property.name.clone(),
                        value: value.to_string(),
                        format,
                    },
                );
                return None;
            }
        }

        macro_rules! bounds {
            ($rules:ident, $variant:ident, $t:ty) => {{
                let mut out = $rules::default();
                if let Some(min) = rules.minimum {
                    if rules.exclusive_minimum {
                        out.gt = Some(min as $t);
                    } else {
                        out.gte = Some(min as $t);
                    }
                }
                if let Some(max) = rules.maximum {
                    if rules.exclusive_maximum {
                        out.lt = Some(max as $t);
                    } else {
                        out.lte = Some(max as $t);
                    }
                }
                field_constraints::Type::$variant(out)
            }};
        }

        Some(match field.format {
            IntegerFormat::Int32 => bounds!(Int32Rules, Int32, i32),
            IntegerFormat::Int64 => bounds!(Int64Rules, Int64, i64),
            IntegerFormat::Uint32 => bounds!(UInt32Rules, Uint32, u32),
            IntegerFormat::Uint64 => bounds!(UInt64Rules, Uint64, u64),
        })
    }

    fn resolve(&mut self, reference: &RefNode) -> Option<TypeRefHandle> {
        if reference.inline {
            if let Some(found) = self.inline.get(&reference.schema) {
                return Some(Arc::clone(found));
            }
        }
        match self
            .resolver
            .resolve(reference.package_alias.as_deref(), &reference.schema)
        {
            Ok(found) => {
                self.dependencies.insert(found.defining_file.clone());
                Some(found)
            }
            Err(e) => {
                self.error(&reference.source, e);
                None
            }
        }
    }
}

impl FieldShape {
    fn clone_without_list(&self) -> FieldShape {
        FieldShape {
            kind: self.kind,
            type_name: self.type_name.clone(),
            rules: None,
            j5: self.j5.clone(),
            list: None,
        }
    }
}

/// A converted schema, message or enum.
pub(super) enum SchemaBuilder {
    Message(MessageBuilder),
    Enum(EnumBuilder),
}

/// `<Field>Entry { key = 1; value = 2; }` with `map_entry` set.
fn map_entry(name: &str, value: FieldShape, property: &PropertyNode) -> MessageBuilder {
    let mut entry = MessageBuilder::new(name, &property.source, None);
    entry.descriptor.options = Some(MessageOptions {
        map_entry: Some(true),
        ..Default::default()
    });

    let mut key = FieldDescriptorProto {
        name: Some("key".to_string()),
        number: Some(1),
        json_name: Some("key".to_string()),
        ..Default::default()
    };
    key.set_label(FieldLabel::Optional);
    key.set_type(FieldType::String);

    let mut field = FieldDescriptorProto {
        name: Some("value".to_string()),
        number: Some(2),
        json_name: Some("value".to_string()),
        type_name: value.type_name,
        options: Some(FieldOptions {
            j5_field: Some(J5FieldOptions {
                r#type: Some(value.j5),
            }),
            ..Default::default()
        }),
        ..Default::default()
    };
    field.set_label(FieldLabel::Optional);
    field.set_type(value.kind);

    let source = &property.source;
    entry.add_field(key, source, None);
    entry.add_field(field, source, None);
    entry
}

fn string_rules_if_any(rules: StringRules) -> Option<field_constraints::Type> {
    let empty = rules.min_len.is_none()
        && rules.max_len.is_none()
        && rules.pattern.is_none()
        && rules.well_known.is_none();
    (!empty).then_some(field_constraints::Type::String(rules))
}

fn float_rules(field: &sourcedef::FloatField) -> Option<field_constraints::Type> {
    let rules = &field.rules;
    if rules.minimum.is_none() && rules.maximum.is_none() {
        return None;
    }
    macro_rules! bounds {
        ($rules:ident, $variant:ident, $t:ty) => {{
            let mut out = $rules::default();
            if let Some(min) = rules.minimum {
                if rules.exclusive_minimum {
                    out.gt = Some(min as $t);
                } else {
                    out.gte = Some(min as $t);
                }
            }
            if let Some(max) = rules.maximum {
                if rules.exclusive_maximum {
                    out.lt = Some(max as $t);
                } else {
                    out.lte = Some(max as $t);
                }
            }
            field_constraints::Type::$variant(out)
        }};
    }
    Some(match field.format {
        FloatFormat::Float32 => bounds!(FloatRules, Float, f32),
        FloatFormat::Float64 => bounds!(DoubleRules, Double, f64),
    })
}

pub(super) fn list_field_rules(rules: &ListRules) -> ListFieldRules {
    ListFieldRules {
        filtering: rules.filtering.as_ref().map(|f| FilteringRules {
            filterable: f.filterable,
            default_filters: f.default_filters.clone(),
        }),
        sorting: rules.sorting.as_ref().map(|s| SortingRules {
            sortable: s.sortable,
            default_sort: s.default_sort,
        }),
        searching: rules.searching.as_ref().map(|s| SearchingRules {
            searchable: s.searchable,
            field_identifier: s.field_identifier.clone(),
        }),
    }
}
