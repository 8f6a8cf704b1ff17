//! Per-type decoders and the decode dispatcher.
//!
//! # Discussion
//!
//! Mirrors `original_source/colf/colf_unmarshall.py`'s `ColferUnmarshallerMixin`, flattened into
//! free functions the same way `crate::marshal` flattens the marshaller. Each decoder first peeks
//! the tag byte's low 7 bits against the field's expected wire index (spec.md §4.4); on a
//! mismatch the field is left at its current value and the offset does not advance, exactly as
//! the Python `unmarshallX` methods return `(None, offset)` unchanged.

use crate::error::{Cause, Error, Result};
use crate::numeric::{
    decode_utf8, f32_from_be_bytes, f64_from_be_bytes, zigzag_decode_i32, zigzag_decode_i64,
};
use crate::record::{FieldValue, Record};
use crate::types::{epoch_plus, FieldKind};
use crate::wire::{self, peek, read_fixed, read_varint, FLAG_BIT, INDEX_MASK};
use log::trace;

/// Decode into `rec`'s declared fields, starting at `offset`. Walks fields in declaration order,
/// consuming one wire element per field whose tag matches its expected index, and returns the
/// offset just past the record's end-of-record marker.
pub fn unmarshal(rec: &mut Record, buf: &[u8], offset: usize) -> Result<usize> {
    let mut off = offset;
    let field_count = rec.len();
    for i in 0..field_count {
        let expected = i as u8;
        match peek(buf, off) {
            Some(tag) if (tag & INDEX_MASK) == expected => {
                trace!("decoding field at index {expected}");
                let field = rec
                    .field_at_mut(i)
                    .expect("index within rec.len() is always present");
                let kind = field.kind();
                let sub_kind = field.sub_kind();
                off = decode_value(kind, sub_kind, field, buf, off)?;
            }
            _ => {
                trace!("field at index {expected} absent, leaving at current value");
            }
        }
    }
    let marker = peek(buf, off).ok_or_else(|| Error::new(Cause::BufferOverrun))?;
    if marker != wire::END_OF_RECORD {
        return Err(Error::new(Cause::Malformed(format!(
            "expected end-of-record marker at offset {off}, found {marker:#04x}"
        ))));
    }
    Ok(off + 1)
}

fn decode_value(
    kind: FieldKind,
    sub_kind: Option<FieldKind>,
    field: &mut crate::record::Field,
    buf: &[u8],
    offset: usize,
) -> Result<usize> {
    let tag = *buf.get(offset).ok_or_else(|| Error::new(Cause::BufferOverrun))?;
    let flagged = tag & FLAG_BIT != 0;
    let mut off = offset + 1;

    let value = match kind {
        FieldKind::Bool => FieldValue::Bool(true),
        FieldKind::Uint8 => {
            let b = *buf.get(off).ok_or_else(|| Error::new(Cause::BufferOverrun))?;
            off += 1;
            FieldValue::Uint8(b)
        }
        FieldKind::Uint16 => {
            let v = if flagged {
                *buf.get(off).ok_or_else(|| Error::new(Cause::BufferOverrun))? as u64
            } else {
                read_fixed(buf, &mut off, 2)?
            };
            if flagged {
                off += 1;
            }
            FieldValue::Uint16(v as u16)
        }
        FieldKind::Int32 => {
            let magnitude = read_varint(buf, &mut off, usize::MAX)?;
            let v = magnitude as i64;
            FieldValue::Int32(if flagged { -v } else { v } as i32)
        }
        FieldKind::Uint32 => {
            let v = if flagged {
                read_fixed(buf, &mut off, 4)?
            } else {
                read_varint(buf, &mut off, usize::MAX)?
            };
            FieldValue::Uint32(v as u32)
        }
        FieldKind::Int64 => {
            let magnitude = read_varint(buf, &mut off, wire::INT64_VARINT_MAX_BYTES)?;
            let v = magnitude as i64;
            FieldValue::Int64(if flagged { v.wrapping_neg() } else { v })
        }
        FieldKind::Uint64 => {
            let v = if flagged {
                read_fixed(buf, &mut off, 8)?
            } else {
                read_varint(buf, &mut off, usize::MAX)?
            };
            FieldValue::Uint64(v)
        }
        FieldKind::Float32 => {
            let bytes = read_n(buf, &mut off, 4)?;
            FieldValue::Float32(f32_from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        }
        FieldKind::Float64 => {
            let bytes = read_n(buf, &mut off, 8)?;
            let mut arr = [0u8; 8];
            arr.copy_from_slice(&bytes);
            FieldValue::Float64(f64_from_be_bytes(arr))
        }
        FieldKind::Datetime => {
            let seconds = if flagged {
                read_fixed(buf, &mut off, 8)?
            } else {
                read_fixed(buf, &mut off, 4)?
            };
            let nanos = read_fixed(buf, &mut off, 4)? as u32;
            FieldValue::Datetime(epoch_plus(seconds, nanos))
        }
        FieldKind::Bytes => {
            let bytes = decode_length_prefixed(buf, &mut off)?;
            FieldValue::Bytes(bytes)
        }
        FieldKind::Str => {
            let bytes = decode_length_prefixed(buf, &mut off)?;
            FieldValue::Str(decode_utf8(bytes)?)
        }
        FieldKind::Object => {
            let nested = match field.value() {
                FieldValue::Object(Some(template)) => (**template).clone(),
                _ => {
                    return Err(Error::new(Cause::BadType(format!(
                        "field {:?} has no pre-declared nested schema to decode into",
                        field.name()
                    ))))
                }
            };
            let mut nested = nested;
            off = unmarshal(&mut nested, buf, off)?;
            FieldValue::Object(Some(Box::new(nested)))
        }
        FieldKind::List => {
            let sub_kind = sub_kind.ok_or_else(|| {
                Error::new(Cause::BadType(String::from("list field missing sub-type")))
            })?;
            let (items, new_off) = decode_list(sub_kind, field, buf, off)?;
            off = new_off;
            FieldValue::List(items)
        }
    };

    *field.value_mut() = value;
    Ok(off)
}

fn read_n(buf: &[u8], offset: &mut usize, n: usize) -> Result<Vec<u8>> {
    if *offset + n > buf.len() {
        return Err(Error::new(Cause::BufferOverrun));
    }
    let out = buf[*offset..*offset + n].to_vec();
    *offset += n;
    Ok(out)
}

fn decode_length_prefixed(buf: &[u8], offset: &mut usize) -> Result<Vec<u8>> {
    let len = read_varint(buf, offset, usize::MAX)? as usize;
    if len > wire::MAX_SIZE {
        return Err(Error::new(Cause::Malformed(format!(
            "length {len} exceeds the {}-byte size cap",
            wire::MAX_SIZE
        ))));
    }
    read_n(buf, offset, len)
}

fn decode_list(
    elem: FieldKind,
    field: &crate::record::Field,
    buf: &[u8],
    offset: usize,
) -> Result<(Vec<FieldValue>, usize)> {
    let mut off = offset;
    let len = read_varint(buf, &mut off, usize::MAX)? as usize;
    if len > wire::LIST_MAX {
        return Err(Error::new(Cause::Malformed(format!(
            "list of length {len} exceeds the {}-element cap",
            wire::LIST_MAX
        ))));
    }
    let template: Option<Record> = match (elem, field.value()) {
        (FieldKind::Object, FieldValue::List(items)) => match items.first() {
            Some(FieldValue::Object(Some(r))) => Some((**r).clone()),
            _ => None,
        },
        _ => None,
    };

    let mut items = Vec::with_capacity(len);
    for _ in 0..len {
        items.push(decode_list_element(elem, &template, buf, &mut off)?);
    }
    Ok((items, off))
}

fn decode_list_element(
    elem: FieldKind,
    template: &Option<Record>,
    buf: &[u8],
    offset: &mut usize,
) -> Result<FieldValue> {
    Ok(match elem {
        FieldKind::Int32 => {
            let v = read_varint(buf, offset, usize::MAX)? as u32;
            FieldValue::Int32(zigzag_decode_i32(v))
        }
        FieldKind::Int64 => {
            let v = read_varint(buf, offset, wire::INT64_VARINT_MAX_BYTES)?;
            FieldValue::Int64(zigzag_decode_i64(v))
        }
        FieldKind::Float32 => {
            let bytes = read_n(buf, offset, 4)?;
            FieldValue::Float32(f32_from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        }
        FieldKind::Float64 => {
            let bytes = read_n(buf, offset, 8)?;
            let mut arr = [0u8; 8];
            arr.copy_from_slice(&bytes);
            FieldValue::Float64(f64_from_be_bytes(arr))
        }
        FieldKind::Bytes => FieldValue::Bytes(decode_length_prefixed(buf, offset)?),
        FieldKind::Str => FieldValue::Str(decode_utf8(decode_length_prefixed(buf, offset)?)?),
        FieldKind::Object => {
            let mut nested = template.clone().ok_or_else(|| {
                Error::new(Cause::BadType(String::from(
                    "list<object> field has no pre-declared element schema to decode into",
                )))
            })?;
            *offset = unmarshal(&mut nested, buf, *offset)?;
            FieldValue::Object(Some(Box::new(nested)))
        }
        FieldKind::Bool
        | FieldKind::Uint8
        | FieldKind::Uint16
        | FieldKind::Uint32
        | FieldKind::Uint64
        | FieldKind::Datetime
        | FieldKind::List => {
            return Err(Error::new(Cause::BadType(format!(
                "{} is not a valid list element type",
                elem.canonical_name()
            ))))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshal::marshal;
    use crate::types::FieldKind;

    fn roundtrip(kind: FieldKind, sub: Option<FieldKind>, value: FieldValue) -> FieldValue {
        let mut rec = Record::new();
        rec.declare("f0", kind, sub, Some(value)).unwrap();
        let mut buf = Vec::new();
        marshal(&rec, &mut buf).unwrap();

        let mut decoded = Record::new();
        decoded.declare("f0", kind, sub, None).unwrap();
        let consumed = unmarshal(&mut decoded, &buf, 0).unwrap();
        assert_eq!(consumed, buf.len());
        decoded.get("f0").unwrap().clone()
    }

    #[test]
    fn bool_roundtrip() {
        assert_eq!(
            roundtrip(FieldKind::Bool, None, FieldValue::Bool(true)),
            FieldValue::Bool(true)
        );
    }

    #[test]
    fn int32_roundtrip_negative_and_positive() {
        assert_eq!(
            roundtrip(FieldKind::Int32, None, FieldValue::Int32(-12345)),
            FieldValue::Int32(-12345)
        );
        assert_eq!(
            roundtrip(FieldKind::Int32, None, FieldValue::Int32(300)),
            FieldValue::Int32(300)
        );
    }

    #[test]
    fn int64_roundtrip_extremes() {
        assert_eq!(
            roundtrip(FieldKind::Int64, None, FieldValue::Int64(i64::MIN)),
            FieldValue::Int64(i64::MIN)
        );
        assert_eq!(
            roundtrip(FieldKind::Int64, None, FieldValue::Int64(i64::MAX)),
            FieldValue::Int64(i64::MAX)
        );
    }

    #[test]
    fn uint16_roundtrip_both_paths() {
        assert_eq!(
            roundtrip(FieldKind::Uint16, None, FieldValue::Uint16(10)),
            FieldValue::Uint16(10)
        );
        assert_eq!(
            roundtrip(FieldKind::Uint16, None, FieldValue::Uint16(40_000)),
            FieldValue::Uint16(40_000)
        );
    }

    #[test]
    fn uint32_roundtrip_both_paths() {
        assert_eq!(
            roundtrip(FieldKind::Uint32, None, FieldValue::Uint32(5)),
            FieldValue::Uint32(5)
        );
        assert_eq!(
            roundtrip(FieldKind::Uint32, None, FieldValue::Uint32(u32::MAX)),
            FieldValue::Uint32(u32::MAX)
        );
    }

    #[test]
    fn uint64_roundtrip_both_paths() {
        assert_eq!(
            roundtrip(FieldKind::Uint64, None, FieldValue::Uint64(5)),
            FieldValue::Uint64(5)
        );
        assert_eq!(
            roundtrip(FieldKind::Uint64, None, FieldValue::Uint64(u64::MAX)),
            FieldValue::Uint64(u64::MAX)
        );
    }

    #[test]
    fn float_roundtrip() {
        assert_eq!(
            roundtrip(FieldKind::Float32, None, FieldValue::Float32(-3.5)),
            FieldValue::Float32(-3.5)
        );
        assert_eq!(
            roundtrip(FieldKind::Float64, None, FieldValue::Float64(1.0e100)),
            FieldValue::Float64(1.0e100)
        );
    }

    #[test]
    fn bytes_and_str_roundtrip() {
        assert_eq!(
            roundtrip(
                FieldKind::Bytes,
                None,
                FieldValue::Bytes(vec![1, 2, 3, 4])
            ),
            FieldValue::Bytes(vec![1, 2, 3, 4])
        );
        assert_eq!(
            roundtrip(FieldKind::Str, None, FieldValue::Str(String::from("hello"))),
            FieldValue::Str(String::from("hello"))
        );
    }

    #[test]
    fn datetime_roundtrip_microsecond_exact() {
        use std::time::{Duration, SystemTime};
        let t = SystemTime::UNIX_EPOCH + Duration::new(70_000_000_000, 123_000);
        assert_eq!(
            roundtrip(FieldKind::Datetime, None, FieldValue::Datetime(t)),
            FieldValue::Datetime(t)
        );
    }

    #[test]
    fn list_int32_roundtrip() {
        let v = FieldValue::List(vec![
            FieldValue::Int32(1),
            FieldValue::Int32(-1),
            FieldValue::Int32(300),
        ]);
        assert_eq!(roundtrip(FieldKind::List, Some(FieldKind::Int32), v.clone()), v);
    }

    #[test]
    fn absent_field_keeps_zero_value() {
        // Encode a record with only field "b" present; decode into a record that declares "a"
        // before "b" so "a"'s tag byte (0) never appears on the wire.
        let mut rec = Record::new();
        rec.declare("a", FieldKind::Int32, None, None).unwrap();
        rec.set("b", FieldValue::Bool(true)).unwrap();
        let mut buf = Vec::new();
        marshal(&rec, &mut buf).unwrap();

        let mut decoded = Record::new();
        decoded.declare("a", FieldKind::Int32, None, None).unwrap();
        decoded.declare("b", FieldKind::Bool, None, None).unwrap();
        unmarshal(&mut decoded, &buf, 0).unwrap();
        assert_eq!(*decoded.get("a").unwrap(), FieldValue::Int32(0));
        assert_eq!(*decoded.get("b").unwrap(), FieldValue::Bool(true));
    }

    #[test]
    fn list_length_cap_rejected_on_decode() {
        let mut buf = Vec::new();
        buf.push(0x00);
        crate::wire::write_varint(&mut buf, (wire::LIST_MAX + 1) as u64);
        let mut decoded = Record::new();
        decoded
            .declare("xs", FieldKind::List, Some(FieldKind::Int32), None)
            .unwrap();
        let err = unmarshal(&mut decoded, &buf, 0).unwrap_err();
        match err.cause() {
            Cause::Malformed(_) => (),
            other => panic!("expected Malformed, got {:?}", other),
        }
    }

    #[test]
    fn object_requires_predeclared_schema() {
        let mut buf = Vec::new();
        buf.push(0x00);
        buf.push(0x7F); // nested record: empty
        buf.push(0x7F); // outer terminator
        let mut decoded = Record::new();
        decoded.declare("o", FieldKind::Object, None, None).unwrap();
        let err = unmarshal(&mut decoded, &buf, 0).unwrap_err();
        match err.cause() {
            Cause::BadType(_) => (),
            other => panic!("expected BadType, got {:?}", other),
        }
    }

    #[test]
    fn missing_terminator_is_malformed() {
        let buf = vec![0x00]; // bool field present, no terminator follows
        let mut decoded = Record::new();
        decoded.declare("a", FieldKind::Bool, None, None).unwrap();
        let err = unmarshal(&mut decoded, &buf, 0).unwrap_err();
        assert_eq!(*err.cause(), Cause::BufferOverrun);
    }
}
