//! # rezbar-core
//!
//! A library for decoding, editing and re-encoding Protocol Buffer wire
//! data against a compiled descriptor, without generated bindings.
//!
//! This crate provides the core functionality for:
//! - Turning an arbitrary wire-format buffer into an editable value tree
//! - Re-encoding that tree byte-exactly when nothing changed, including
//!   unknown fields, field interleavings and non-minimal varints
//! - Reinterpreting the same bytes under a different root message type
//! - Addressing tree nodes by field-number/index paths and attaching
//!   comments to them
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`schema`]: Format-agnostic algebraic type model and annotations
//! - [`descriptor`]: Compiled descriptor → schema model + wire tables
//! - [`wire`]: Wire format parsing and serialization
//! - [`value`]: The decoded structural value tree
//! - [`path`]: Path addressing and the comment store
//! - [`editor`]: The editor state machine tying it all together
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use rezbar_core::{Editor, LoadRequest};
//! use std::fs;
//!
//! let data = fs::read("./capture.bin")?;
//! let descriptor = fs::read("./api.desc")?;
//!
//! let mut editor = Editor::new();
//! editor.initialize(LoadRequest::new(&data, &descriptor).type_name("api.Envelope"))?;
//!
//! for (number, values) in editor.decoded_data().unwrap().fields() {
//!     println!("field {}: {} value(s)", number, values.len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod descriptor;
pub mod editor;
pub mod error;
pub mod path;
pub mod schema;
pub mod value;
pub mod wire;

// Re-export primary types for convenience
pub use descriptor::TypeRegistry;
pub use editor::{BufferOrigin, Editor, EditorEvent, EditorState, LoadRequest};
pub use error::{Error, Result};
pub use path::{Comment, CommentStore, FieldPath, PathSegment};
pub use schema::{Schema, Type};
pub use value::{MessageValue, Scalar, StructuralValue};
pub use wire::{decode_message, encode_message, MAX_FIELD_NUMBER};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared descriptor fixture for the crate's tests.
///
/// Equivalent proto source:
///
/// ```proto
/// syntax = "proto3";
/// package test;
///
/// enum Color {
///   COLOR_UNSPECIFIED = 0;
///   RED = 1;
///   BLUE = 2;
/// }
///
/// message Person {
///   string name = 1;
///   int32 id = 2;
///   repeated int64 scores = 3;
///   Person friend = 4;
///   Color color = 5;
///   oneof contact {
///     string email = 6;
///     uint64 phone = 7;
///   }
/// }
///
/// message Probe {
///   string name = 1;
///   int32 id = 2;
/// }
/// ```
#[cfg(test)]
pub(crate) mod testdata {
    use prost::Message;
    use prost_types::field_descriptor_proto::{Label, Type};
    use prost_types::{
        DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
        FileDescriptorProto, FileDescriptorSet, OneofDescriptorProto,
    };

    fn scalar_field(name: &str, number: i32, ty: Type, label: Label) -> FieldDescriptorProto {
        FieldDescriptorProto {
            name: Some(name.to_string()),
            number: Some(number),
            label: Some(label as i32),
            r#type: Some(ty as i32),
            ..Default::default()
        }
    }

    fn named_field(name: &str, number: i32, ty: Type, type_name: &str) -> FieldDescriptorProto {
        FieldDescriptorProto {
            type_name: Some(type_name.to_string()),
            ..scalar_field(name, number, ty, Label::Optional)
        }
    }

    pub(crate) fn descriptor_set() -> Vec<u8> {
        let person = DescriptorProto {
            name: Some("Person".into()),
            field: vec![
                scalar_field("name", 1, Type::String, Label::Optional),
                scalar_field("id", 2, Type::Int32, Label::Optional),
                scalar_field("scores", 3, Type::Int64, Label::Repeated),
                named_field("friend", 4, Type::Message, ".test.Person"),
                named_field("color", 5, Type::Enum, ".test.Color"),
                FieldDescriptorProto {
                    oneof_index: Some(0),
                    ..scalar_field("email", 6, Type::String, Label::Optional)
                },
                FieldDescriptorProto {
                    oneof_index: Some(0),
                    ..scalar_field("phone", 7, Type::Uint64, Label::Optional)
                },
            ],
            oneof_decl: vec![OneofDescriptorProto {
                name: Some("contact".into()),
                ..Default::default()
            }],
            ..Default::default()
        };

        let probe = DescriptorProto {
            name: Some("Probe".into()),
            field: vec![
                scalar_field("name", 1, Type::String, Label::Optional),
                scalar_field("id", 2, Type::Int32, Label::Optional),
            ],
            ..Default::default()
        };

        let color = EnumDescriptorProto {
            name: Some("Color".into()),
            value: vec![
                EnumValueDescriptorProto {
                    name: Some("COLOR_UNSPECIFIED".into()),
                    number: Some(0),
                    ..Default::default()
                },
                EnumValueDescriptorProto {
                    name: Some("RED".into()),
                    number: Some(1),
                    ..Default::default()
                },
                EnumValueDescriptorProto {
                    name: Some("BLUE".into()),
                    number: Some(2),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let file = FileDescriptorProto {
            name: Some("test.proto".into()),
            package: Some("test".into()),
            syntax: Some("proto3".into()),
            message_type: vec![person, probe],
            enum_type: vec![color],
            ..Default::default()
        };

        FileDescriptorSet { file: vec![file] }.encode_to_vec()
    }
}
