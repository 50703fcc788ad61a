//! Descriptor adapter: compiled descriptor → schema model + wire tables.
//!
//! The adapter consumes a binary `FileDescriptorSet` (the output of
//! `protoc --descriptor_set_out`), resolves it through prost-reflect's
//! [`DescriptorPool`], and produces everything the rest of the system
//! needs:
//!
//! - an algebraic [`Schema`] mirroring every message/enum reachable from
//!   the root type (deduplicated by fully qualified name),
//! - per-message wire layout tables (field number → declared kind),
//! - per-enum `numeric value -> name` tables,
//! - the list of message type names available for type switching,
//! - an [`AnnotationSet`] carrying descriptor names as display names.
//!
//! Oneof groups become synthetic [`Type::Sum`] definitions whose variants
//! are the member fields, tagged by field number. Proto3 optional fields
//! arrive wrapped in a synthetic oneof whose name starts with `_`; those
//! are treated as plain optional fields, not sums.

use crate::error::{Error, Result};
use crate::schema::annotate::{Annotation, AnnotationSet};
use crate::schema::{Field, PrimitiveKind, Schema, Type, Variant};
use indexmap::IndexMap;
use prost_reflect::{DescriptorPool, FieldDescriptor, Kind, MessageDescriptor, OneofDescriptor};
use std::collections::{HashSet, VecDeque};
use tracing::debug;

/// Declared kind of a wire field, from the decoder's point of view
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// A scalar of the given kind
    Scalar(PrimitiveKind),
    /// An embedded message of the named type
    Message(String),
    /// An enum of the named type
    Enum(String),
}

/// Wire-level description of one field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldLayout {
    /// Field name from the descriptor
    pub name: String,
    /// Wire field number
    pub number: u32,
    /// Declared kind
    pub kind: FieldKind,
    /// Declared `repeated` (includes map fields)
    pub repeated: bool,
    /// Name of the containing oneof, if any (synthetic proto3-optional
    /// oneofs excluded)
    pub oneof: Option<String>,
}

/// Wire-level description of one message type
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageLayout {
    fields: IndexMap<u32, FieldLayout>,
    oneofs: IndexMap<String, Vec<u32>>,
}

impl MessageLayout {
    /// Looks up a field by wire number
    pub fn field(&self, number: u32) -> Option<&FieldLayout> {
        self.fields.get(&number)
    }

    /// Iterates fields in declaration order
    pub fn fields(&self) -> impl Iterator<Item = &FieldLayout> {
        self.fields.values()
    }

    /// Member field numbers of a oneof group
    pub fn oneof_members(&self, name: &str) -> &[u32] {
        self.oneofs.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterates oneof groups as `(name, member field numbers)`
    pub fn oneofs(&self) -> impl Iterator<Item = (&str, &[u32])> {
        self.oneofs.iter().map(|(n, m)| (n.as_str(), m.as_slice()))
    }
}

/// Enum value lookup table for one enum type
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnumTable {
    values: IndexMap<i32, String>,
}

impl EnumTable {
    /// Name for a numeric value; first declaration wins for aliases
    pub fn name(&self, number: i32) -> Option<&str> {
        self.values.get(&number).map(String::as_str)
    }
}

/// Everything extracted from one compiled descriptor.
///
/// Owned by the editor instance that loaded it; there is no process-wide
/// registry.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    schema: Schema,
    annotations: AnnotationSet,
    messages: IndexMap<String, MessageLayout>,
    enums: IndexMap<String, EnumTable>,
    message_names: Vec<String>,
    default_root: String,
}

impl TypeRegistry {
    /// Builds a registry from a binary `FileDescriptorSet`.
    ///
    /// `root_type` selects the default decoding root; when absent, the
    /// last message type declared in the descriptor set is used. A named
    /// root missing from the descriptor fails with a schema error.
    pub fn from_descriptor(descriptor: &[u8], root_type: Option<&str>) -> Result<Self> {
        let pool = DescriptorPool::decode(descriptor)
            .map_err(|e| Error::schema(format!("failed to build descriptor pool: {}", e)))?;

        let message_names: Vec<String> = pool
            .all_messages()
            .filter(|m| !m.is_map_entry())
            .map(|m| m.full_name().to_string())
            .collect();

        if message_names.is_empty() {
            return Err(Error::schema("descriptor contains no message types"));
        }

        let root = match root_type {
            Some(name) => {
                if !message_names.iter().any(|n| n == name) {
                    return Err(Error::schema(format!(
                        "root type '{}' not found in descriptor",
                        name
                    )));
                }
                name.to_string()
            }
            None => message_names.last().expect("checked non-empty").clone(),
        };

        debug!(root = %root, messages = message_names.len(), "building type registry");

        // Wire layouts and enum tables cover the whole pool so any message
        // type can become a decoding root later.
        let mut messages = IndexMap::new();
        for message in pool.all_messages() {
            messages.insert(message.full_name().to_string(), Self::layout_of(&message));
        }

        let mut enums = IndexMap::new();
        for enum_type in pool.all_enums() {
            let mut table = EnumTable::default();
            for value in enum_type.values() {
                table
                    .values
                    .entry(value.number())
                    .or_insert_with(|| value.name().to_string());
            }
            enums.insert(enum_type.full_name().to_string(), table);
        }

        let (schema, annotations) = Self::build_schema(&pool, &root)?;

        Ok(Self {
            schema,
            annotations,
            messages,
            enums,
            message_names,
            default_root: root,
        })
    }

    /// The algebraic schema mirroring types reachable from the root
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Display annotations extracted from descriptor names
    pub fn annotations(&self) -> &AnnotationSet {
        &self.annotations
    }

    /// Wire layout for a message type
    pub fn message(&self, full_name: &str) -> Option<&MessageLayout> {
        self.messages.get(full_name)
    }

    /// True if the named message type exists in the descriptor
    pub fn contains_message(&self, full_name: &str) -> bool {
        self.messages.contains_key(full_name)
    }

    /// Enum value name lookup by enum type name and numeric value
    pub fn enum_name(&self, enum_type: &str, number: i32) -> Option<&str> {
        self.enums.get(enum_type).and_then(|t| t.name(number))
    }

    /// Every message type name in the descriptor (map entries excluded)
    pub fn message_names(&self) -> &[String] {
        &self.message_names
    }

    /// The default decoding root chosen at build time
    pub fn default_root(&self) -> &str {
        &self.default_root
    }

    fn layout_of(message: &MessageDescriptor) -> MessageLayout {
        let mut layout = MessageLayout::default();

        for field in message.fields() {
            let oneof = field
                .containing_oneof()
                .filter(|o| !is_synthetic_oneof(o))
                .map(|o| o.name().to_string());

            if let Some(oneof_name) = &oneof {
                layout
                    .oneofs
                    .entry(oneof_name.clone())
                    .or_default()
                    .push(field.number());
            }

            layout.fields.insert(
                field.number(),
                FieldLayout {
                    name: field.name().to_string(),
                    number: field.number(),
                    kind: field_kind(&field),
                    repeated: field.is_list() || field.is_map(),
                    oneof,
                },
            );
        }

        layout
    }

    /// Walk message/enum types reachable from the root, producing schema
    /// definitions and name annotations.
    fn build_schema(pool: &DescriptorPool, root: &str) -> Result<(Schema, AnnotationSet)> {
        let mut schema = Schema::new();
        let mut annotations = AnnotationSet::new();
        let mut queue: VecDeque<MessageDescriptor> = VecDeque::new();
        let mut seen: HashSet<String> = HashSet::new();

        let root_desc = pool
            .get_message_by_name(root)
            .ok_or_else(|| Error::schema(format!("root type '{}' not found in descriptor", root)))?;

        queue.push_back(root_desc);
        seen.insert(root.to_string());

        while let Some(message) = queue.pop_front() {
            let full_name = message.full_name().to_string();
            annotations.insert(full_name.clone(), Annotation::named(message.name()));

            let mut fields: IndexMap<String, Field> = IndexMap::new();
            let mut oneof_sums: IndexMap<String, IndexMap<String, Variant>> = IndexMap::new();

            for field in message.fields() {
                let field_id = format!("{}.{}", full_name, field.name());
                annotations.insert(field_id, Annotation::named(field.name()));

                Self::enqueue_referenced(&field, &mut queue, &mut seen, &mut schema, &mut annotations);

                match field.containing_oneof().filter(|o| !is_synthetic_oneof(o)) {
                    Some(oneof) => {
                        oneof_sums.entry(oneof.name().to_string()).or_default().insert(
                            field.name().to_string(),
                            Variant {
                                payload: Some(schema_field_type(&field)),
                                wire_number: Some(field.number() as i32),
                            },
                        );
                    }
                    None => {
                        fields.insert(
                            field.name().to_string(),
                            Field {
                                ty: wrapped_field_type(&field),
                                wire_number: Some(field.number()),
                                deprecated: is_deprecated(&field),
                            },
                        );
                    }
                }
            }

            // Each oneof becomes a synthetic sum definition plus an optional
            // field of that sum on the product.
            for (oneof_name, variants) in oneof_sums {
                let sum_name = format!("{}.{}", full_name, oneof_name);
                schema
                    .definitions
                    .insert(sum_name.clone(), Type::Sum { variants });
                annotations.insert(sum_name.clone(), Annotation::named(&oneof_name));
                fields.insert(
                    oneof_name,
                    Field {
                        ty: Type::Optional(Box::new(Type::Ref(sum_name))),
                        wire_number: None,
                        deprecated: false,
                    },
                );
            }

            schema.definitions.insert(full_name, Type::Product { fields });
        }

        schema.root = Some(root.to_string());

        let problems = schema.validate();
        if !problems.is_empty() {
            return Err(Error::schema(format!(
                "descriptor produced an invalid schema: {}",
                problems.join("; ")
            )));
        }

        Ok((schema, annotations))
    }

    /// Queue message types referenced by a field; enums have no fields to
    /// chase, so their sum definitions are recorded on the spot.
    fn enqueue_referenced(
        field: &FieldDescriptor,
        queue: &mut VecDeque<MessageDescriptor>,
        seen: &mut HashSet<String>,
        schema: &mut Schema,
        annotations: &mut AnnotationSet,
    ) {
        let kinds = if field.is_map() {
            match field.kind() {
                Kind::Message(entry) => vec![
                    entry.map_entry_key_field().kind(),
                    entry.map_entry_value_field().kind(),
                ],
                _ => Vec::new(),
            }
        } else {
            vec![field.kind()]
        };

        for kind in kinds {
            match kind {
                Kind::Message(m) if !m.is_map_entry() => {
                    if seen.insert(m.full_name().to_string()) {
                        queue.push_back(m);
                    }
                }
                Kind::Enum(e) => {
                    let full_name = e.full_name().to_string();
                    if schema.definitions.contains_key(&full_name) {
                        continue;
                    }
                    annotations.insert(full_name.clone(), Annotation::named(e.name()));
                    for value in e.values() {
                        annotations.insert(
                            format!("{}.{}", full_name, value.name()),
                            Annotation::named(value.name()),
                        );
                    }
                    schema.definitions.insert(
                        full_name,
                        enum_sum(e.values().map(|v| (v.name().to_string(), v.number()))),
                    );
                }
                _ => {}
            }
        }
    }
}

/// Map a descriptor field to the wire-table kind
fn field_kind(field: &FieldDescriptor) -> FieldKind {
    match field.kind() {
        Kind::Double => FieldKind::Scalar(PrimitiveKind::Double),
        Kind::Float => FieldKind::Scalar(PrimitiveKind::Float),
        Kind::Int32 => FieldKind::Scalar(PrimitiveKind::Int32),
        Kind::Int64 => FieldKind::Scalar(PrimitiveKind::Int64),
        Kind::Uint32 => FieldKind::Scalar(PrimitiveKind::Uint32),
        Kind::Uint64 => FieldKind::Scalar(PrimitiveKind::Uint64),
        Kind::Sint32 => FieldKind::Scalar(PrimitiveKind::Sint32),
        Kind::Sint64 => FieldKind::Scalar(PrimitiveKind::Sint64),
        Kind::Fixed32 => FieldKind::Scalar(PrimitiveKind::Fixed32),
        Kind::Fixed64 => FieldKind::Scalar(PrimitiveKind::Fixed64),
        Kind::Sfixed32 => FieldKind::Scalar(PrimitiveKind::Sfixed32),
        Kind::Sfixed64 => FieldKind::Scalar(PrimitiveKind::Sfixed64),
        Kind::Bool => FieldKind::Scalar(PrimitiveKind::Bool),
        Kind::String => FieldKind::Scalar(PrimitiveKind::String),
        Kind::Bytes => FieldKind::Scalar(PrimitiveKind::Bytes),
        Kind::Message(m) => FieldKind::Message(m.full_name().to_string()),
        Kind::Enum(e) => FieldKind::Enum(e.full_name().to_string()),
    }
}

/// The bare algebraic type of a field, before cardinality wrapping
fn schema_field_type(field: &FieldDescriptor) -> Type {
    match field.kind() {
        Kind::Double => Type::Primitive(PrimitiveKind::Double),
        Kind::Float => Type::Primitive(PrimitiveKind::Float),
        Kind::Int32 => Type::Primitive(PrimitiveKind::Int32),
        Kind::Int64 => Type::Primitive(PrimitiveKind::Int64),
        Kind::Uint32 => Type::Primitive(PrimitiveKind::Uint32),
        Kind::Uint64 => Type::Primitive(PrimitiveKind::Uint64),
        Kind::Sint32 => Type::Primitive(PrimitiveKind::Sint32),
        Kind::Sint64 => Type::Primitive(PrimitiveKind::Sint64),
        Kind::Fixed32 => Type::Primitive(PrimitiveKind::Fixed32),
        Kind::Fixed64 => Type::Primitive(PrimitiveKind::Fixed64),
        Kind::Sfixed32 => Type::Primitive(PrimitiveKind::Sfixed32),
        Kind::Sfixed64 => Type::Primitive(PrimitiveKind::Sfixed64),
        Kind::Bool => Type::Primitive(PrimitiveKind::Bool),
        Kind::String => Type::Primitive(PrimitiveKind::String),
        Kind::Bytes => Type::Primitive(PrimitiveKind::Bytes),
        Kind::Message(m) => Type::Ref(m.full_name().to_string()),
        Kind::Enum(e) => Type::Ref(e.full_name().to_string()),
    }
}

/// The algebraic type of a field with list/map/optional wrapping applied
fn wrapped_field_type(field: &FieldDescriptor) -> Type {
    if field.is_map() {
        if let Kind::Message(entry) = field.kind() {
            let key = schema_field_type(&entry.map_entry_key_field());
            let value = schema_field_type(&entry.map_entry_value_field());
            return Type::Map {
                key: Box::new(key),
                value: Box::new(value),
            };
        }
    }
    if field.is_list() {
        return Type::List(Box::new(schema_field_type(field)));
    }

    let base = schema_field_type(field);
    match field.kind() {
        // Message fields always track presence; scalar/enum fields do when
        // the descriptor says so (proto2 optional, proto3 `optional`).
        Kind::Message(_) => Type::Optional(Box::new(base)),
        _ if field.supports_presence() => Type::Optional(Box::new(base)),
        _ => base,
    }
}

/// Proto3 `optional` is modeled as a single-field oneof named `_field`
fn is_synthetic_oneof(oneof: &OneofDescriptor) -> bool {
    oneof.name().starts_with('_')
}

fn is_deprecated(field: &FieldDescriptor) -> bool {
    field
        .field_descriptor_proto()
        .options
        .as_ref()
        .map(|o| o.deprecated())
        .unwrap_or(false)
}

/// Build a sum type of plain enumerators from enum value declarations
fn enum_sum(values: impl Iterator<Item = (String, i32)>) -> Type {
    Type::Sum {
        variants: values
            .map(|(name, number)| {
                (
                    name,
                    Variant {
                        payload: None,
                        wire_number: Some(number),
                    },
                )
            })
            .collect(),
    }
}
