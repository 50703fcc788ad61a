//! Format-agnostic algebraic type model.
//!
//! A [`Schema`] is an arena of named type definitions. Types reference each
//! other by name through [`Type::Ref`] rather than by pointer, which keeps
//! recursive message types representable without ownership cycles.
//!
//! All maps are [`IndexMap`] so that iteration over definitions, fields and
//! variants is deterministic in insertion order.

pub mod annotate;

use indexmap::IndexMap;
use std::collections::HashSet;

/// Opaque identifier for a named type definition
pub type TypeId = String;

/// Scalar kinds understood by the model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    /// 64-bit IEEE float
    Double,
    /// 32-bit IEEE float
    Float,
    /// Varint-encoded signed 32-bit integer
    Int32,
    /// Varint-encoded signed 64-bit integer
    Int64,
    /// Varint-encoded unsigned 32-bit integer
    Uint32,
    /// Varint-encoded unsigned 64-bit integer
    Uint64,
    /// Zigzag-encoded signed 32-bit integer
    Sint32,
    /// Zigzag-encoded signed 64-bit integer
    Sint64,
    /// Fixed-width unsigned 32-bit integer
    Fixed32,
    /// Fixed-width unsigned 64-bit integer
    Fixed64,
    /// Fixed-width signed 32-bit integer
    Sfixed32,
    /// Fixed-width signed 64-bit integer
    Sfixed64,
    /// Boolean
    Bool,
    /// UTF-8 string
    String,
    /// Raw byte string
    Bytes,
}

/// A field of a product type
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// The field's type
    pub ty: Type,
    /// Wire field number; required when the field participates in a binary
    /// wire format
    pub wire_number: Option<u32>,
    /// Marked deprecated in the source schema
    pub deprecated: bool,
}

impl Field {
    /// Creates a field with a wire number
    pub fn new(ty: Type, wire_number: u32) -> Self {
        Self {
            ty,
            wire_number: Some(wire_number),
            deprecated: false,
        }
    }
}

/// A variant of a sum type; absent payload = plain enumerator
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    /// Payload carried by the variant, if any
    pub payload: Option<Type>,
    /// Wire tag for the variant (enum value number or oneof field number)
    pub wire_number: Option<i32>,
}

/// The closed set of type shapes
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    /// A scalar
    Primitive(PrimitiveKind),
    /// A record with named fields
    Product {
        /// Fields in declaration order
        fields: IndexMap<String, Field>,
    },
    /// A tagged union
    Sum {
        /// Variants in declaration order
        variants: IndexMap<String, Variant>,
    },
    /// Homogeneous sequence
    List(Box<Type>),
    /// Key/value association
    Map {
        /// Key type
        key: Box<Type>,
        /// Value type
        value: Box<Type>,
    },
    /// Possibly-absent value
    Optional(Box<Type>),
    /// Reference to a named definition
    Ref(TypeId),
}

/// A set of named type definitions with an optional root
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    /// Named definitions in insertion order
    pub definitions: IndexMap<TypeId, Type>,
    /// The default decoding root, if declared
    pub root: Option<TypeId>,
}

impl Schema {
    /// Creates an empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a definition by name
    pub fn resolve_ref(&self, name: &str) -> Option<&Type> {
        self.definitions.get(name)
    }

    /// Follows `Ref` chains until a non-ref type is reached.
    ///
    /// Returns `None` on a dangling ref or when the chain revisits a name
    /// it already passed through (a pure ref cycle).
    pub fn resolve_type<'a>(&'a self, ty: &'a Type) -> Option<&'a Type> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut current = ty;

        while let Type::Ref(name) = current {
            if !visited.insert(name.as_str()) {
                return None;
            }
            current = self.resolve_ref(name)?;
        }

        Some(current)
    }

    /// Validates the schema, returning one message per problem.
    ///
    /// Reported problems:
    /// - a `Ref` to a name with no definition
    /// - a root naming an undefined type
    /// - a definition that reaches itself without passing through
    ///   `Optional`, `List` or `Map` indirection
    ///
    /// An empty result means the schema is safe to decode against.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (name, ty) in &self.definitions {
            self.check_refs(name, ty, &mut errors);
        }

        for name in self.definitions.keys() {
            let mut chain = Vec::new();
            if self.reaches_unguarded(name, name, &mut chain) {
                errors.push(format!(
                    "type '{}' contains itself without optional/list/map indirection",
                    name
                ));
            }
        }

        match &self.root {
            Some(root) if !self.definitions.contains_key(root) => {
                errors.push(format!("root type '{}' is not defined", root));
            }
            _ => {}
        }

        errors
    }

    /// Walk a type structurally, collecting dangling-ref messages
    fn check_refs(&self, owner: &str, ty: &Type, errors: &mut Vec<String>) {
        match ty {
            Type::Primitive(_) => {}
            Type::Product { fields } => {
                for field in fields.values() {
                    self.check_refs(owner, &field.ty, errors);
                }
            }
            Type::Sum { variants } => {
                for variant in variants.values() {
                    if let Some(payload) = &variant.payload {
                        self.check_refs(owner, payload, errors);
                    }
                }
            }
            Type::List(element) => self.check_refs(owner, element, errors),
            Type::Map { key, value } => {
                self.check_refs(owner, key, errors);
                self.check_refs(owner, value, errors);
            }
            Type::Optional(inner) => self.check_refs(owner, inner, errors),
            Type::Ref(name) => {
                if !self.definitions.contains_key(name) {
                    errors.push(format!("type '{}' references undefined type '{}'", owner, name));
                }
            }
        }
    }

    /// True if `target` is reachable from the definition of `from` without
    /// crossing an Optional/List/Map boundary
    fn reaches_unguarded<'a>(
        &'a self,
        from: &'a str,
        target: &str,
        chain: &mut Vec<&'a str>,
    ) -> bool {
        if chain.contains(&from) {
            return false;
        }
        chain.push(from);

        let Some(ty) = self.definitions.get(from) else {
            return false;
        };
        self.type_reaches_unguarded(ty, target, chain)
    }

    fn type_reaches_unguarded<'a>(
        &'a self,
        ty: &'a Type,
        target: &str,
        chain: &mut Vec<&'a str>,
    ) -> bool {
        match ty {
            Type::Primitive(_) => false,
            // Indirection guards the cycle
            Type::Optional(_) | Type::List(_) | Type::Map { .. } => false,
            Type::Product { fields } => fields
                .values()
                .any(|f| self.type_reaches_unguarded(&f.ty, target, chain)),
            Type::Sum { variants } => variants.values().any(|v| {
                v.payload
                    .as_ref()
                    .is_some_and(|p| self.type_reaches_unguarded(p, target, chain))
            }),
            Type::Ref(name) => {
                if name == target {
                    return true;
                }
                self.reaches_unguarded(name, target, chain)
            }
        }
    }
}
