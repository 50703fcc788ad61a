//! Tree re-serialization.
//!
//! Encoding replays each message's original record layout with a cursor per
//! field: records that survived unmodified re-emit their retained wire
//! bytes, packed runs re-pack, and values appended by edits follow in field
//! insertion order. For an unmodified tree the output is byte-identical to
//! the buffer the tree was decoded from.

use super::{encode_varint, join_tag, zigzag_encode, WireType};
use crate::error::{Error, Result};
use crate::value::{MessageValue, RecordKind, Scalar, StructuralValue};
use std::collections::HashMap;

/// Serialize a message tree to wire bytes.
///
/// Fails with an encode error when the tree holds an unencodable shape
/// (a string value inside a packed run, a message value recorded as
/// packed). Nothing is written on failure paths the caller can observe;
/// the returned buffer is built fresh.
pub fn encode_message(msg: &MessageValue) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    encode_into(msg, &mut out)?;
    Ok(out)
}

fn encode_into(msg: &MessageValue, out: &mut Vec<u8>) -> Result<()> {
    let mut cursors: HashMap<u32, usize> = HashMap::new();

    for record in msg.records() {
        let values = msg.get_all(record.field_number);
        let cursor = cursors.entry(record.field_number).or_insert(0);

        match record.kind {
            RecordKind::Single => {
                // A record whose value was removed by an edit leaves no output
                if *cursor < values.len() {
                    encode_value(record.field_number, &values[*cursor], out)?;
                    *cursor += 1;
                }
            }
            RecordKind::Packed { count } => {
                let available = values.len().saturating_sub(*cursor);
                let take = count.min(available);
                encode_packed(record.field_number, &values[*cursor..*cursor + take], out)?;
                *cursor += take;
            }
        }
    }

    // Values appended after decode, grouped in field insertion order
    for (number, values) in msg.fields() {
        let cursor = cursors.get(&number).copied().unwrap_or(0);
        for value in values.iter().skip(cursor) {
            encode_value(number, value, out)?;
        }
    }

    Ok(())
}

fn encode_value(number: u32, value: &StructuralValue, out: &mut Vec<u8>) -> Result<()> {
    match value {
        StructuralValue::Primitive(p) => {
            let wire_type = p.scalar.wire_type();
            encode_varint(join_tag(number, wire_type), out);
            match (&p.raw, wire_type) {
                // Retained wire bytes win: non-minimal varints survive
                (Some(raw), WireType::Varint) => out.extend_from_slice(raw),
                _ => encode_scalar(&p.scalar, out),
            }
        }
        StructuralValue::Enum(e) => {
            encode_varint(join_tag(number, WireType::Varint), out);
            match &e.raw {
                Some(raw) => out.extend_from_slice(raw),
                None => encode_varint(e.number as i64 as u64, out),
            }
        }
        StructuralValue::Bytes(b) => {
            encode_varint(join_tag(number, WireType::Len), out);
            encode_varint(b.data.len() as u64, out);
            out.extend_from_slice(&b.data);
        }
        StructuralValue::Message(m) => {
            let mut payload = Vec::new();
            encode_into(m, &mut payload)?;
            encode_varint(join_tag(number, WireType::Len), out);
            encode_varint(payload.len() as u64, out);
            out.extend_from_slice(&payload);
        }
        StructuralValue::Unknown(u) => {
            // Raw bytes carry everything after the tag (length prefixes,
            // group bodies), so tag + raw reproduces the record verbatim
            encode_varint(join_tag(number, u.wire_type), out);
            out.extend_from_slice(&u.raw);
        }
    }
    Ok(())
}

/// Emit one packed run as a single length-delimited record
fn encode_packed(number: u32, values: &[StructuralValue], out: &mut Vec<u8>) -> Result<()> {
    let mut payload = Vec::new();

    for value in values {
        match value {
            StructuralValue::Primitive(p) => match (&p.raw, p.scalar.wire_type()) {
                (Some(raw), WireType::Varint) => payload.extend_from_slice(raw),
                (_, WireType::Len) => {
                    return Err(Error::encode(
                        "length-delimited values cannot appear in a packed run",
                    ));
                }
                _ => encode_scalar(&p.scalar, &mut payload),
            },
            StructuralValue::Enum(e) => match &e.raw {
                Some(raw) => payload.extend_from_slice(raw),
                None => encode_varint(e.number as i64 as u64, &mut payload),
            },
            _ => {
                return Err(Error::encode(
                    "only scalar and enum values can appear in a packed run",
                ));
            }
        }
    }

    encode_varint(join_tag(number, WireType::Len), out);
    encode_varint(payload.len() as u64, out);
    out.extend_from_slice(&payload);
    Ok(())
}

/// Canonical (minimal) scalar encoding, without the field tag
fn encode_scalar(scalar: &Scalar, out: &mut Vec<u8>) {
    match scalar {
        Scalar::Double(v) => out.extend_from_slice(&v.to_le_bytes()),
        Scalar::Float(v) => out.extend_from_slice(&v.to_le_bytes()),
        // int32/int64 sign-extend to 64 bits on the wire
        Scalar::Int32(v) => encode_varint(*v as i64 as u64, out),
        Scalar::Int64(v) => encode_varint(*v as u64, out),
        Scalar::Uint32(v) => encode_varint(*v as u64, out),
        Scalar::Uint64(v) => encode_varint(*v, out),
        Scalar::Sint32(v) => encode_varint(zigzag_encode(*v as i64), out),
        Scalar::Sint64(v) => encode_varint(zigzag_encode(*v), out),
        Scalar::Fixed32(v) => out.extend_from_slice(&v.to_le_bytes()),
        Scalar::Fixed64(v) => out.extend_from_slice(&v.to_le_bytes()),
        Scalar::Sfixed32(v) => out.extend_from_slice(&v.to_le_bytes()),
        Scalar::Sfixed64(v) => out.extend_from_slice(&v.to_le_bytes()),
        Scalar::Bool(v) => encode_varint(u64::from(*v), out),
        Scalar::String(v) => {
            encode_varint(v.len() as u64, out);
            out.extend_from_slice(v.as_bytes());
        }
    }
}
