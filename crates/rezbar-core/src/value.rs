//! The structural value tree produced by decoding.
//!
//! [`StructuralValue`] is a closed tagged variant: a node is exactly one of
//! primitive, message, enum, bytes, or unknown. Exhaustive matching over it
//! is what keeps the codec honest when the schema and the bytes disagree.
//!
//! Two pieces of bookkeeping make unmodified trees re-encode byte-exactly:
//!
//! - every [`MessageValue`] remembers its original wire record layout
//!   (ordering and packed groupings), replayed by the encoder;
//! - varint-family scalars and enums keep their original wire bytes, so
//!   non-minimal varint encodings survive a round trip. Mutating a value
//!   drops the retained bytes and the encoder falls back to the minimal
//!   form.

use crate::error::{Error, Result};
use crate::wire::WireType;
use bytes::Bytes;
use indexmap::IndexMap;
use std::fmt;

/// A decoded scalar, self-describing for re-encoding
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// 64-bit IEEE float (wire: I64)
    Double(f64),
    /// 32-bit IEEE float (wire: I32)
    Float(f32),
    /// Signed varint (wire: Varint)
    Int32(i32),
    /// Signed varint (wire: Varint)
    Int64(i64),
    /// Unsigned varint (wire: Varint)
    Uint32(u32),
    /// Unsigned varint (wire: Varint)
    Uint64(u64),
    /// Zigzag varint (wire: Varint)
    Sint32(i32),
    /// Zigzag varint (wire: Varint)
    Sint64(i64),
    /// Fixed-width unsigned (wire: I32)
    Fixed32(u32),
    /// Fixed-width unsigned (wire: I64)
    Fixed64(u64),
    /// Fixed-width signed (wire: I32)
    Sfixed32(i32),
    /// Fixed-width signed (wire: I64)
    Sfixed64(i64),
    /// Boolean varint (wire: Varint)
    Bool(bool),
    /// UTF-8 string (wire: Len)
    String(String),
}

impl Scalar {
    /// The wire type this scalar serializes to
    pub fn wire_type(&self) -> WireType {
        match self {
            Scalar::Double(_) | Scalar::Fixed64(_) | Scalar::Sfixed64(_) => WireType::I64,
            Scalar::Float(_) | Scalar::Fixed32(_) | Scalar::Sfixed32(_) => WireType::I32,
            Scalar::Int32(_)
            | Scalar::Int64(_)
            | Scalar::Uint32(_)
            | Scalar::Uint64(_)
            | Scalar::Sint32(_)
            | Scalar::Sint64(_)
            | Scalar::Bool(_) => WireType::Varint,
            Scalar::String(_) => WireType::Len,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Double(v) => write!(f, "{}", v),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Int32(v) => write!(f, "{}", v),
            Scalar::Int64(v) => write!(f, "{}", v),
            Scalar::Uint32(v) => write!(f, "{}", v),
            Scalar::Uint64(v) => write!(f, "{}", v),
            Scalar::Sint32(v) => write!(f, "{}", v),
            Scalar::Sint64(v) => write!(f, "{}", v),
            Scalar::Fixed32(v) => write!(f, "{}", v),
            Scalar::Fixed64(v) => write!(f, "{}", v),
            Scalar::Sfixed32(v) => write!(f, "{}", v),
            Scalar::Sfixed64(v) => write!(f, "{}", v),
            Scalar::Bool(v) => write!(f, "{}", v),
            Scalar::String(v) => write!(f, "{:?}", v),
        }
    }
}

/// A scalar leaf, optionally carrying its original wire bytes
#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveValue {
    /// The decoded scalar
    pub scalar: Scalar,
    /// Original wire bytes of the value (varint family only); `None` after
    /// mutation or for synthesized values
    pub(crate) raw: Option<Bytes>,
}

impl PrimitiveValue {
    /// Creates a synthesized primitive (no retained wire bytes)
    pub fn new(scalar: Scalar) -> Self {
        Self { scalar, raw: None }
    }

    /// Creates a primitive retaining its original wire bytes
    pub(crate) fn with_raw(scalar: Scalar, raw: Bytes) -> Self {
        Self {
            scalar,
            raw: Some(raw),
        }
    }

    /// Replaces the scalar, dropping retained wire bytes
    pub fn set(&mut self, scalar: Scalar) {
        self.scalar = scalar;
        self.raw = None;
    }
}

/// A decoded enum leaf: the numeric value plus its enum type name
#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    /// Numeric value from the wire
    pub number: i32,
    /// Fully qualified enum type name
    pub type_name: String,
    pub(crate) raw: Option<Bytes>,
}

impl EnumValue {
    /// Creates a synthesized enum value
    pub fn new(number: i32, type_name: impl Into<String>) -> Self {
        Self {
            number,
            type_name: type_name.into(),
            raw: None,
        }
    }
}

/// A raw byte-string leaf (`bytes` fields)
#[derive(Debug, Clone, PartialEq)]
pub struct BytesValue {
    /// Field payload
    pub data: Bytes,
}

/// A field present on the wire but absent from (or contradicting) the
/// schema. Retained verbatim and re-emitted byte-for-byte.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownValue {
    /// Field number from the wire
    pub field_number: u32,
    /// Wire type from the tag
    pub wire_type: WireType,
    /// Raw value bytes exactly as read (for `Len` records this includes the
    /// length prefix; for groups, everything through the end-group tag)
    pub raw: Bytes,
}

/// One node of the decoded tree
#[derive(Debug, Clone, PartialEq)]
pub enum StructuralValue {
    /// Scalar leaf
    Primitive(PrimitiveValue),
    /// Nested message
    Message(MessageValue),
    /// Enum leaf
    Enum(EnumValue),
    /// Byte-string leaf
    Bytes(BytesValue),
    /// Schema-less leaf
    Unknown(UnknownValue),
}

impl StructuralValue {
    /// Convenience constructor for a synthesized scalar
    pub fn scalar(scalar: Scalar) -> Self {
        StructuralValue::Primitive(PrimitiveValue::new(scalar))
    }

    /// Returns the nested message, if this node is one
    pub fn as_message(&self) -> Option<&MessageValue> {
        match self {
            StructuralValue::Message(m) => Some(m),
            _ => None,
        }
    }

    /// Mutable variant of [`Self::as_message`]
    pub fn as_message_mut(&mut self) -> Option<&mut MessageValue> {
        match self {
            StructuralValue::Message(m) => Some(m),
            _ => None,
        }
    }
}

/// Shape of one original wire record
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum RecordKind {
    /// One tagged record, one value
    Single,
    /// One length-delimited record packing `count` scalar values
    Packed {
        /// Number of packed elements
        count: usize,
    },
}

/// A wire record as it appeared in the original buffer
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Record {
    pub(crate) field_number: u32,
    pub(crate) kind: RecordKind,
}

/// A decoded message: field lists keyed by field number, in
/// first-occurrence wire order, plus the original record layout.
///
/// A field number maps to a non-empty list of values; absence of the key
/// means the field is unset, which is distinct from an explicitly empty
/// repeated field after an edit cleared it.
///
/// A non-repeated field that appeared more than once on the wire keeps
/// every occurrence; [`MessageValue::get`] exposes the last one as the
/// effective value.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageValue {
    /// Fully qualified message type name this tree was decoded as
    pub type_name: String,
    fields: IndexMap<u32, Vec<StructuralValue>>,
    records: Vec<Record>,
}

impl MessageValue {
    /// Creates an empty message of the given type
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: IndexMap::new(),
            records: Vec::new(),
        }
    }

    /// Iterates field lists in first-occurrence wire order
    pub fn fields(&self) -> impl Iterator<Item = (u32, &[StructuralValue])> {
        self.fields.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    /// Number of distinct field numbers present
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// True if no field is present
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// All occurrences of a field, in wire order
    pub fn get_all(&self, field_number: u32) -> &[StructuralValue] {
        self.fields
            .get(&field_number)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The effective value of a field: its last occurrence
    pub fn get(&self, field_number: u32) -> Option<&StructuralValue> {
        self.fields.get(&field_number).and_then(|v| v.last())
    }

    /// One occurrence by index
    pub fn get_index(&self, field_number: u32, index: usize) -> Option<&StructuralValue> {
        self.fields.get(&field_number).and_then(|v| v.get(index))
    }

    /// Mutable access to one occurrence
    pub fn get_index_mut(
        &mut self,
        field_number: u32,
        index: usize,
    ) -> Option<&mut StructuralValue> {
        self.fields
            .get_mut(&field_number)
            .and_then(|v| v.get_mut(index))
    }

    /// Replaces every occurrence of a field.
    ///
    /// The field keeps its position in the record layout (the new values
    /// occupy the slot of the field's first original record); an empty
    /// `values` removes the field entirely. Packed groupings of the
    /// replaced field are not preserved.
    pub fn set_field(&mut self, field_number: u32, values: Vec<StructuralValue>) {
        let insert_at = self
            .records
            .iter()
            .position(|r| r.field_number == field_number);
        self.records.retain(|r| r.field_number != field_number);

        if values.is_empty() {
            self.fields.shift_remove(&field_number);
            return;
        }

        let new_records = values.iter().map(|_| Record {
            field_number,
            kind: RecordKind::Single,
        });
        match insert_at {
            Some(at) => {
                let tail: Vec<Record> = self.records.split_off(at);
                self.records.extend(new_records);
                self.records.extend(tail);
            }
            None => self.records.extend(new_records),
        }

        self.fields.insert(field_number, values);
    }

    /// Appends one occurrence of a field
    pub fn push_value(&mut self, field_number: u32, value: StructuralValue) {
        self.fields.entry(field_number).or_default().push(value);
        self.records.push(Record {
            field_number,
            kind: RecordKind::Single,
        });
    }

    /// Removes every occurrence of a field
    pub fn clear_field(&mut self, field_number: u32) {
        self.fields.shift_remove(&field_number);
        self.records.retain(|r| r.field_number != field_number);
    }

    /// Removes one occurrence of a repeated field by index.
    ///
    /// Fails with a path error when the field is absent or the index is out
    /// of range.
    pub fn remove_value(&mut self, field_number: u32, index: usize) -> Result<StructuralValue> {
        let values = self
            .fields
            .get_mut(&field_number)
            .ok_or_else(|| Error::path(format!("field {} is not present", field_number)))?;
        if index >= values.len() {
            return Err(Error::path(format!(
                "index {} out of range for field {} (len {})",
                index,
                field_number,
                values.len()
            )));
        }

        let removed = values.remove(index);
        if values.is_empty() {
            self.fields.shift_remove(&field_number);
        }
        self.drop_record_slot(field_number, index);
        Ok(removed)
    }

    /// Remove the record-layout slot covering occurrence `index` of a field
    fn drop_record_slot(&mut self, field_number: u32, index: usize) {
        let mut seen = 0usize;
        // (record position, Some(shrunk packed count) or None to drop it)
        let mut target: Option<(usize, Option<usize>)> = None;

        for (i, record) in self.records.iter().enumerate() {
            if record.field_number != field_number {
                continue;
            }
            match record.kind {
                RecordKind::Single => {
                    if seen == index {
                        target = Some((i, None));
                        break;
                    }
                    seen += 1;
                }
                RecordKind::Packed { count } => {
                    if index < seen + count {
                        target = Some((i, (count > 1).then(|| count - 1)));
                        break;
                    }
                    seen += count;
                }
            }
        }

        match target {
            Some((i, Some(count))) => {
                self.records[i].kind = RecordKind::Packed { count };
            }
            Some((i, None)) => {
                self.records.remove(i);
            }
            None => {}
        }
    }

    /// Decoder entry point: append one value with its record shape
    pub(crate) fn push_decoded(&mut self, field_number: u32, value: StructuralValue) {
        self.push_value(field_number, value);
    }

    /// Decoder entry point: append a packed run of scalar values as one record
    pub(crate) fn push_packed(&mut self, field_number: u32, values: Vec<StructuralValue>) {
        if values.is_empty() {
            // A zero-length packed record still occupies a wire record
            self.records.push(Record {
                field_number,
                kind: RecordKind::Packed { count: 0 },
            });
            self.fields.entry(field_number).or_default();
            return;
        }
        let count = values.len();
        self.fields.entry(field_number).or_default().extend(values);
        self.records.push(Record {
            field_number,
            kind: RecordKind::Packed { count },
        });
    }

    /// The original record layout, replayed by the encoder
    pub(crate) fn records(&self) -> &[Record] {
        &self.records
    }

    /// Mutable iteration over field lists, for in-place normalization
    pub(crate) fn fields_mut(&mut self) -> impl Iterator<Item = (u32, &mut Vec<StructuralValue>)> {
        self.fields.iter_mut().map(|(k, v)| (*k, v))
    }

    /// Position of a field's last record in the layout
    pub(crate) fn last_record_position(&self, field_number: u32) -> Option<usize> {
        self.records
            .iter()
            .rposition(|r| r.field_number == field_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn int32(v: i32) -> StructuralValue {
        StructuralValue::scalar(Scalar::Int32(v))
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut msg = MessageValue::new("test.Msg");
        msg.push_value(5, int32(1));
        msg.push_value(2, int32(2));
        msg.push_value(5, int32(3));

        let order: Vec<u32> = msg.fields().map(|(n, _)| n).collect();
        assert_eq!(order, vec![5, 2]);
        assert_eq!(msg.get_all(5).len(), 2);
    }

    #[test]
    fn test_last_occurrence_wins_for_scalar_access() {
        let mut msg = MessageValue::new("test.Msg");
        msg.push_value(1, int32(10));
        msg.push_value(1, int32(20));

        assert_eq!(msg.get(1), Some(&int32(20)));
        // but both occurrences stay in the tree
        assert_eq!(msg.get_all(1), &[int32(10), int32(20)]);
    }

    #[test]
    fn test_set_field_keeps_layout_position() {
        let mut msg = MessageValue::new("test.Msg");
        msg.push_value(1, int32(1));
        msg.push_value(2, int32(2));
        msg.push_value(3, int32(3));

        msg.set_field(2, vec![int32(20), int32(21)]);

        let layout: Vec<u32> = msg.records().iter().map(|r| r.field_number).collect();
        assert_eq!(layout, vec![1, 2, 2, 3]);
        assert_eq!(msg.get_all(2).len(), 2);
    }

    #[test]
    fn test_set_field_empty_removes() {
        let mut msg = MessageValue::new("test.Msg");
        msg.push_value(1, int32(1));
        msg.set_field(1, vec![]);

        assert!(msg.is_empty());
        assert!(msg.records().is_empty());
        assert_eq!(msg.get(1), None);
    }

    #[test]
    fn test_remove_value_out_of_range() {
        let mut msg = MessageValue::new("test.Msg");
        msg.push_value(1, int32(1));

        assert!(msg.remove_value(1, 3).is_err());
        assert!(msg.remove_value(9, 0).is_err());
        assert!(msg.remove_value(1, 0).is_ok());
        assert!(msg.is_empty());
    }

    #[test]
    fn test_remove_from_packed_run_shrinks_record() {
        let mut msg = MessageValue::new("test.Msg");
        msg.push_packed(4, vec![int32(1), int32(2), int32(3)]);

        msg.remove_value(4, 1).unwrap();
        assert_eq!(msg.get_all(4), &[int32(1), int32(3)]);
        assert_eq!(
            msg.records(),
            &[Record {
                field_number: 4,
                kind: RecordKind::Packed { count: 2 }
            }]
        );
    }

    #[test]
    fn test_unset_field_distinct_from_empty() {
        let msg = MessageValue::new("test.Msg");
        assert!(msg.get(7).is_none());
        assert!(msg.get_all(7).is_empty());
        assert_eq!(msg.field_count(), 0);
    }
}
