//! Schema-driven wire decoder.
//!
//! Decoding walks the standard record grammar against the registry's wire
//! layout for the chosen root type. Known fields decode per their declared
//! kind; everything else — unknown field numbers, wire types contradicting
//! the declared kind — is retained verbatim as [`UnknownValue`] so no byte
//! the producer wrote is lost.
//!
//! Errors carry the absolute byte offset into the outermost buffer, also
//! for failures deep inside nested messages.

use super::{decode_varint, split_tag, zigzag_decode, WireType};
use crate::descriptor::{FieldKind, FieldLayout, TypeRegistry};
use crate::error::{Error, Result};
use crate::schema::PrimitiveKind;
use crate::value::{
    BytesValue, EnumValue, MessageValue, PrimitiveValue, Scalar, StructuralValue, UnknownValue,
};
use bytes::Bytes;
use tracing::trace;

/// Decode a byte buffer as a message of the named root type.
///
/// The decoder never partially mutates externally visible state: on any
/// malformed input it returns a decode error and the caller keeps whatever
/// tree it had before.
pub fn decode_message(data: &[u8], registry: &TypeRegistry, root: &str) -> Result<MessageValue> {
    if !registry.contains_message(root) {
        return Err(Error::schema(format!(
            "message type '{}' not found in descriptor",
            root
        )));
    }
    trace!(root = %root, len = data.len(), "decoding buffer");
    decode_fields(data, 0, registry, root)
}

/// Decode the record sequence of one message body
fn decode_fields(
    data: &[u8],
    base: usize,
    registry: &TypeRegistry,
    type_name: &str,
) -> Result<MessageValue> {
    let layout = registry
        .message(type_name)
        .ok_or_else(|| Error::schema(format!("message type '{}' not found", type_name)))?;

    let mut msg = MessageValue::new(type_name);
    let mut pos = 0usize;

    while pos < data.len() {
        let (tag, tag_len) = decode_varint(&data[pos..]).map_err(|e| rebase(e, base + pos))?;
        let (field_number, wire_type) = split_tag(tag).map_err(|e| rebase(e, base + pos))?;
        pos += tag_len;

        match layout.field(field_number) {
            Some(field) if decodes_as_known(field, wire_type) => {
                pos += decode_known(&mut msg, field, wire_type, &data[pos..], base + pos, registry)?;
            }
            _ => {
                pos += decode_unknown(&mut msg, field_number, wire_type, &data[pos..], base + pos)?;
            }
        }
    }

    Ok(msg)
}

/// True when the wire type is consistent with the field's declared kind.
/// Anything else is retained as unknown instead of failing the decode.
fn decodes_as_known(field: &FieldLayout, wire_type: WireType) -> bool {
    match (&field.kind, wire_type) {
        (FieldKind::Scalar(kind), WireType::Varint) => is_varint_kind(*kind),
        (FieldKind::Scalar(kind), WireType::I32) => is_i32_kind(*kind),
        (FieldKind::Scalar(kind), WireType::I64) => is_i64_kind(*kind),
        (FieldKind::Scalar(PrimitiveKind::String), WireType::Len) => true,
        (FieldKind::Scalar(PrimitiveKind::Bytes), WireType::Len) => true,
        // Packed repeated scalars arrive length-delimited
        (FieldKind::Scalar(kind), WireType::Len) => field.repeated && is_packable(*kind),
        (FieldKind::Message(_), WireType::Len) => true,
        (FieldKind::Enum(_), WireType::Varint) => true,
        (FieldKind::Enum(_), WireType::Len) => field.repeated,
        _ => false,
    }
}

fn decode_known(
    msg: &mut MessageValue,
    field: &FieldLayout,
    wire_type: WireType,
    data: &[u8],
    base: usize,
    registry: &TypeRegistry,
) -> Result<usize> {
    match (&field.kind, wire_type) {
        (FieldKind::Scalar(kind), WireType::Varint) => {
            let (value, len) = decode_varint(data).map_err(|e| rebase(e, base))?;
            let scalar = varint_scalar(*kind, value)
                .ok_or_else(|| Error::decode(base, "varint value for non-varint kind"))?;
            msg.push_decoded(
                field.number,
                StructuralValue::Primitive(PrimitiveValue::with_raw(
                    scalar,
                    Bytes::copy_from_slice(&data[..len]),
                )),
            );
            Ok(len)
        }
        (FieldKind::Scalar(kind), WireType::I32) => {
            let bytes = take::<4>(data, base, "I32 value")?;
            msg.push_decoded(
                field.number,
                StructuralValue::Primitive(PrimitiveValue::new(i32_scalar(*kind, bytes))),
            );
            Ok(4)
        }
        (FieldKind::Scalar(kind), WireType::I64) => {
            let bytes = take::<8>(data, base, "I64 value")?;
            msg.push_decoded(
                field.number,
                StructuralValue::Primitive(PrimitiveValue::new(i64_scalar(*kind, bytes))),
            );
            Ok(8)
        }
        (FieldKind::Scalar(PrimitiveKind::String), WireType::Len) => {
            let (payload, consumed) = take_len(data, base)?;
            let text = std::str::from_utf8(payload)
                .map_err(|e| Error::decode(base, format!("invalid UTF-8 in string field: {}", e)))?;
            msg.push_decoded(
                field.number,
                StructuralValue::scalar(Scalar::String(text.to_string())),
            );
            Ok(consumed)
        }
        (FieldKind::Scalar(PrimitiveKind::Bytes), WireType::Len) => {
            let (payload, consumed) = take_len(data, base)?;
            msg.push_decoded(
                field.number,
                StructuralValue::Bytes(BytesValue {
                    data: Bytes::copy_from_slice(payload),
                }),
            );
            Ok(consumed)
        }
        (FieldKind::Scalar(kind), WireType::Len) => {
            // Packed repeated scalars
            let (payload, consumed) = take_len(data, base)?;
            let offset = base + (consumed - payload.len());
            let values = decode_packed_scalars(*kind, payload, offset)?;
            msg.push_packed(field.number, values);
            Ok(consumed)
        }
        (FieldKind::Message(nested), WireType::Len) => {
            let (payload, consumed) = take_len(data, base)?;
            let offset = base + (consumed - payload.len());
            let nested_msg = decode_fields(payload, offset, registry, nested)?;
            msg.push_decoded(field.number, StructuralValue::Message(nested_msg));
            Ok(consumed)
        }
        (FieldKind::Enum(enum_type), WireType::Varint) => {
            let (value, len) = decode_varint(data).map_err(|e| rebase(e, base))?;
            msg.push_decoded(
                field.number,
                StructuralValue::Enum(EnumValue {
                    number: value as i32,
                    type_name: enum_type.clone(),
                    raw: Some(Bytes::copy_from_slice(&data[..len])),
                }),
            );
            Ok(len)
        }
        (FieldKind::Enum(enum_type), WireType::Len) => {
            let (payload, consumed) = take_len(data, base)?;
            let offset = base + (consumed - payload.len());
            let mut values = Vec::new();
            let mut pos = 0;
            while pos < payload.len() {
                let (value, len) =
                    decode_varint(&payload[pos..]).map_err(|e| rebase(e, offset + pos))?;
                values.push(StructuralValue::Enum(EnumValue {
                    number: value as i32,
                    type_name: enum_type.clone(),
                    raw: Some(Bytes::copy_from_slice(&payload[pos..pos + len])),
                }));
                pos += len;
            }
            msg.push_packed(field.number, values);
            Ok(consumed)
        }
        _ => unreachable!("decodes_as_known filtered this combination"),
    }
}

/// Capture one record verbatim as an unknown value
fn decode_unknown(
    msg: &mut MessageValue,
    field_number: u32,
    wire_type: WireType,
    data: &[u8],
    base: usize,
) -> Result<usize> {
    let consumed = match wire_type {
        WireType::Varint => {
            let (_, len) = decode_varint(data).map_err(|e| rebase(e, base))?;
            len
        }
        WireType::I32 => {
            take::<4>(data, base, "I32 value")?;
            4
        }
        WireType::I64 => {
            take::<8>(data, base, "I64 value")?;
            8
        }
        WireType::Len => take_len(data, base)?.1,
        WireType::StartGroup => skip_group(data, base, field_number)?,
        WireType::EndGroup => {
            return Err(Error::decode(base, "end-group tag without matching start"));
        }
    };

    msg.push_decoded(
        field_number,
        StructuralValue::Unknown(UnknownValue {
            field_number,
            wire_type,
            raw: Bytes::copy_from_slice(&data[..consumed]),
        }),
    );
    Ok(consumed)
}

/// Scan past a (deprecated) group record, balancing nested groups.
/// Returns the bytes consumed, including the matching end-group tag.
fn skip_group(data: &[u8], base: usize, field_number: u32) -> Result<usize> {
    let mut pos = 0usize;

    loop {
        if pos >= data.len() {
            return Err(Error::decode(base + pos, "unterminated group"));
        }
        let (tag, tag_len) = decode_varint(&data[pos..]).map_err(|e| rebase(e, base + pos))?;
        let (number, wire_type) = split_tag(tag).map_err(|e| rebase(e, base + pos))?;
        pos += tag_len;

        match wire_type {
            WireType::EndGroup => {
                if number != field_number {
                    return Err(Error::decode(
                        base + pos,
                        format!(
                            "end-group tag for field {} inside group of field {}",
                            number, field_number
                        ),
                    ));
                }
                return Ok(pos);
            }
            WireType::StartGroup => {
                pos += skip_group(&data[pos..], base + pos, number)?;
            }
            WireType::Varint => {
                let (_, len) = decode_varint(&data[pos..]).map_err(|e| rebase(e, base + pos))?;
                pos += len;
            }
            WireType::I32 => {
                take::<4>(&data[pos..], base + pos, "I32 value")?;
                pos += 4;
            }
            WireType::I64 => {
                take::<8>(&data[pos..], base + pos, "I64 value")?;
                pos += 8;
            }
            WireType::Len => {
                pos += take_len(&data[pos..], base + pos)?.1;
            }
        }
    }
}

/// Decode the elements of a packed scalar run
fn decode_packed_scalars(
    kind: PrimitiveKind,
    payload: &[u8],
    base: usize,
) -> Result<Vec<StructuralValue>> {
    let mut values = Vec::new();
    let mut pos = 0usize;

    while pos < payload.len() {
        if is_varint_kind(kind) {
            let (value, len) = decode_varint(&payload[pos..]).map_err(|e| rebase(e, base + pos))?;
            let scalar = varint_scalar(kind, value)
                .ok_or_else(|| Error::decode(base + pos, "varint value for non-varint kind"))?;
            values.push(StructuralValue::Primitive(PrimitiveValue::with_raw(
                scalar,
                Bytes::copy_from_slice(&payload[pos..pos + len]),
            )));
            pos += len;
        } else if is_i32_kind(kind) {
            let bytes = take::<4>(&payload[pos..], base + pos, "packed I32 element")?;
            values.push(StructuralValue::Primitive(PrimitiveValue::new(i32_scalar(
                kind, bytes,
            ))));
            pos += 4;
        } else if is_i64_kind(kind) {
            let bytes = take::<8>(&payload[pos..], base + pos, "packed I64 element")?;
            values.push(StructuralValue::Primitive(PrimitiveValue::new(i64_scalar(
                kind, bytes,
            ))));
            pos += 8;
        } else {
            return Err(Error::decode(base + pos, "length-delimited kind cannot be packed"));
        }
    }

    Ok(values)
}

fn is_varint_kind(kind: PrimitiveKind) -> bool {
    matches!(
        kind,
        PrimitiveKind::Int32
            | PrimitiveKind::Int64
            | PrimitiveKind::Uint32
            | PrimitiveKind::Uint64
            | PrimitiveKind::Sint32
            | PrimitiveKind::Sint64
            | PrimitiveKind::Bool
    )
}

fn is_i32_kind(kind: PrimitiveKind) -> bool {
    matches!(
        kind,
        PrimitiveKind::Fixed32 | PrimitiveKind::Sfixed32 | PrimitiveKind::Float
    )
}

fn is_i64_kind(kind: PrimitiveKind) -> bool {
    matches!(
        kind,
        PrimitiveKind::Fixed64 | PrimitiveKind::Sfixed64 | PrimitiveKind::Double
    )
}

fn is_packable(kind: PrimitiveKind) -> bool {
    is_varint_kind(kind) || is_i32_kind(kind) || is_i64_kind(kind)
}

fn varint_scalar(kind: PrimitiveKind, value: u64) -> Option<Scalar> {
    Some(match kind {
        PrimitiveKind::Int32 => Scalar::Int32(value as i32),
        PrimitiveKind::Int64 => Scalar::Int64(value as i64),
        PrimitiveKind::Uint32 => Scalar::Uint32(value as u32),
        PrimitiveKind::Uint64 => Scalar::Uint64(value),
        PrimitiveKind::Sint32 => Scalar::Sint32(zigzag_decode(value) as i32),
        PrimitiveKind::Sint64 => Scalar::Sint64(zigzag_decode(value)),
        PrimitiveKind::Bool => Scalar::Bool(value != 0),
        _ => return None,
    })
}

fn i32_scalar(kind: PrimitiveKind, bytes: [u8; 4]) -> Scalar {
    match kind {
        PrimitiveKind::Float => Scalar::Float(f32::from_le_bytes(bytes)),
        PrimitiveKind::Sfixed32 => Scalar::Sfixed32(i32::from_le_bytes(bytes)),
        _ => Scalar::Fixed32(u32::from_le_bytes(bytes)),
    }
}

fn i64_scalar(kind: PrimitiveKind, bytes: [u8; 8]) -> Scalar {
    match kind {
        PrimitiveKind::Double => Scalar::Double(f64::from_le_bytes(bytes)),
        PrimitiveKind::Sfixed64 => Scalar::Sfixed64(i64::from_le_bytes(bytes)),
        _ => Scalar::Fixed64(u64::from_le_bytes(bytes)),
    }
}

/// Read exactly `N` bytes into a fixed array
fn take<const N: usize>(data: &[u8], base: usize, what: &str) -> Result<[u8; N]> {
    if data.len() < N {
        return Err(Error::decode(
            base,
            format!("not enough bytes for {} (need {}, have {})", what, N, data.len()),
        ));
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&data[..N]);
    Ok(out)
}

/// Read a length prefix and its payload.
/// Returns the payload slice and total bytes consumed (prefix + payload).
fn take_len<'a>(data: &'a [u8], base: usize) -> Result<(&'a [u8], usize)> {
    let (length, prefix_len) = decode_varint(data).map_err(|e| rebase(e, base))?;
    let length = length as usize;
    if data.len() < prefix_len.saturating_add(length) {
        return Err(Error::decode(
            base,
            format!(
                "length-delimited field overruns buffer (need {}, have {})",
                length,
                data.len() - prefix_len
            ),
        ));
    }
    Ok((&data[prefix_len..prefix_len + length], prefix_len + length))
}

/// Rebase a decode error's relative offset onto an absolute one
fn rebase(err: Error, base: usize) -> Error {
    match err {
        Error::Decode { offset, reason } => Error::Decode {
            offset: base + offset,
            reason,
        },
        other => other,
    }
}
