//! Per-type encoders and the encode dispatcher.
//!
//! # Discussion
//!
//! `original_source/colf/colf_marshall.py`'s `ColferMarshallerMixin` is one class with a
//! `marshallX` method per type plus a `marshallType`/`marshallList` pair that dispatch by string
//! name. Per DESIGN NOTES §9 ("flatten mixins into free functions"), this module keeps one
//! function per type but drops the string dispatch in favor of a `match` over [`FieldKind`], and
//! drops the per-field `marshallHeader` call (Open Question #1): the Python source writes `0x7F`
//! after *every* field and relies on the next field's tag to overwrite it on an append-only
//! buffer that trick doesn't apply, so `marshal` appends the end-of-record byte exactly once,
//! after the loop.

use crate::error::{Cause, Error, Result};
use crate::numeric::{f32_to_be_bytes, f64_to_be_bytes, zigzag_encode_i32, zigzag_encode_i64};
use crate::record::{FieldValue, Record};
use crate::types::FieldKind;
use crate::wire::{
    self, read_fixed, write_fixed, write_varint, write_varint_capped, END_OF_RECORD, FLAG_BIT,
};
use log::trace;

/// Encode `rec` into `buf`, appending to whatever `buf` already holds.
///
/// Visits fields in declaration order (their wire index), emitting a present field's tag and
/// payload only when its value differs from its kind's zero, then appends the single
/// end-of-record marker `0x7F`.
pub fn marshal(rec: &Record, buf: &mut Vec<u8>) -> Result<()> {
    for (i, field) in rec.iter().enumerate() {
        let idx = i as u8;
        trace!("encoding field {:?} at index {idx}", field.name());
        encode_value(idx, field.kind(), field.sub_kind(), field.value(), buf)?;
    }
    buf.push(END_OF_RECORD);
    Ok(())
}

fn encode_value(
    idx: u8,
    kind: FieldKind,
    sub_kind: Option<FieldKind>,
    value: &FieldValue,
    buf: &mut Vec<u8>,
) -> Result<()> {
    match (kind, value) {
        (FieldKind::Bool, FieldValue::Bool(v)) => encode_bool(idx, *v, buf),
        (FieldKind::Uint8, FieldValue::Uint8(v)) => encode_uint8(idx, *v, buf),
        (FieldKind::Uint16, FieldValue::Uint16(v)) => encode_uint16(idx, *v, buf),
        (FieldKind::Int32, FieldValue::Int32(v)) => encode_int32(idx, *v, buf),
        (FieldKind::Uint32, FieldValue::Uint32(v)) => encode_uint32(idx, *v, buf)?,
        (FieldKind::Int64, FieldValue::Int64(v)) => encode_int64(idx, *v, buf),
        (FieldKind::Uint64, FieldValue::Uint64(v)) => encode_uint64(idx, *v, buf)?,
        (FieldKind::Float32, FieldValue::Float32(v)) => encode_float32(idx, *v, buf),
        (FieldKind::Float64, FieldValue::Float64(v)) => encode_float64(idx, *v, buf),
        (FieldKind::Datetime, FieldValue::Datetime(v)) => encode_datetime(idx, *v, buf)?,
        (FieldKind::Bytes, FieldValue::Bytes(v)) => encode_bytes(idx, v, buf)?,
        (FieldKind::Str, FieldValue::Str(v)) => encode_str(idx, v, buf)?,
        (FieldKind::Object, FieldValue::Object(v)) => encode_object(idx, v.as_deref(), buf)?,
        (FieldKind::List, FieldValue::List(v)) => {
            let sub_kind = sub_kind.ok_or_else(|| {
                Error::new(Cause::BadType(String::from("list field missing sub-type")))
            })?;
            encode_list(idx, sub_kind, v, buf)?
        }
        _ => {
            return Err(Error::new(Cause::TypeMismatch(format!(
                "value does not match declared kind {}",
                kind.canonical_name()
            ))))
        }
    }
    Ok(())
}

pub fn encode_bool(idx: u8, v: bool, buf: &mut Vec<u8>) {
    if v {
        buf.push(idx);
    }
}

pub fn encode_uint8(idx: u8, v: u8, buf: &mut Vec<u8>) {
    if v != 0 {
        buf.push(idx);
        buf.push(v);
    }
}

pub fn encode_uint16(idx: u8, v: u16, buf: &mut Vec<u8>) {
    if v == 0 {
        return;
    }
    if v < 256 {
        buf.push(idx | FLAG_BIT);
        buf.push(v as u8);
    } else {
        buf.push(idx);
        write_fixed(buf, v as u64, 2);
    }
}

pub fn encode_int32(idx: u8, v: i32, buf: &mut Vec<u8>) {
    if v == 0 {
        return;
    }
    if v < 0 {
        buf.push(idx | FLAG_BIT);
        write_varint(buf, (-(v as i64)) as u64);
    } else {
        buf.push(idx);
        write_varint(buf, v as u64);
    }
}

pub fn encode_int64(idx: u8, v: i64, buf: &mut Vec<u8>) {
    if v == 0 {
        return;
    }
    if v < 0 {
        buf.push(idx | FLAG_BIT);
        write_varint_capped(buf, v.unsigned_abs(), wire::INT64_VARINT_MAX_BYTES);
    } else {
        buf.push(idx);
        write_varint_capped(buf, v as u64, wire::INT64_VARINT_MAX_BYTES);
    }
}

pub fn encode_uint32(idx: u8, v: u32, buf: &mut Vec<u8>) -> Result<()> {
    if v == 0 {
        return Ok(());
    }
    let mask = crate::numeric::complementary_mask(21, 32)?;
    if (v as u64) & mask != 0 {
        buf.push(idx | FLAG_BIT);
        write_fixed(buf, v as u64, 4);
    } else {
        buf.push(idx);
        write_varint(buf, v as u64);
    }
    Ok(())
}

pub fn encode_uint64(idx: u8, v: u64, buf: &mut Vec<u8>) -> Result<()> {
    if v == 0 {
        return Ok(());
    }
    let mask = crate::numeric::complementary_mask(49, 64)?;
    if v & mask != 0 {
        buf.push(idx | FLAG_BIT);
        write_fixed(buf, v, 8);
    } else {
        buf.push(idx);
        write_varint(buf, v);
    }
    Ok(())
}

pub fn encode_float32(idx: u8, v: f32, buf: &mut Vec<u8>) {
    if v != 0.0 {
        buf.push(idx);
        buf.extend_from_slice(&f32_to_be_bytes(v));
    }
}

pub fn encode_float64(idx: u8, v: f64, buf: &mut Vec<u8>) {
    if v != 0.0 {
        buf.push(idx);
        buf.extend_from_slice(&f64_to_be_bytes(v));
    }
}

/// Split a `SystemTime` into `(seconds, nanos)` relative to the Unix epoch. Times before the
/// epoch are rejected by `FieldKind::fits`, so `duration_since` never sees a negative duration
/// here.
fn split_datetime(v: std::time::SystemTime) -> Result<(u64, u32)> {
    let d = v
        .duration_since(std::time::UNIX_EPOCH)
        .map_err(|_| Error::new(Cause::TypeMismatch(String::from("datetime before epoch"))))?;
    Ok((d.as_secs(), d.subsec_nanos()))
}

pub fn encode_datetime(idx: u8, v: std::time::SystemTime, buf: &mut Vec<u8>) -> Result<()> {
    let (seconds, nanos) = split_datetime(v)?;
    // Absent iff both are zero (Open Question #3: the source's `AND` predicate is a bug; this
    // implements the correct `OR`-negation, i.e. `seconds == 0 && nanos == 0`).
    if seconds == 0 && nanos == 0 {
        return Ok(());
    }
    if seconds <= u32::MAX as u64 {
        buf.push(idx);
        write_fixed(buf, seconds, 4);
    } else {
        buf.push(idx | FLAG_BIT);
        write_fixed(buf, seconds, 8);
    }
    write_fixed(buf, nanos as u64, 4);
    Ok(())
}

fn check_size(len: usize) -> Result<()> {
    if len > wire::MAX_SIZE {
        return Err(Error::new(Cause::Malformed(format!(
            "length {len} exceeds the {}-byte size cap",
            wire::MAX_SIZE
        ))));
    }
    Ok(())
}

fn check_list_len(len: usize) -> Result<()> {
    if len > wire::LIST_MAX {
        return Err(Error::new(Cause::Malformed(format!(
            "list of length {len} exceeds the {}-element cap",
            wire::LIST_MAX
        ))));
    }
    Ok(())
}

pub fn encode_bytes(idx: u8, v: &[u8], buf: &mut Vec<u8>) -> Result<()> {
    if v.is_empty() {
        return Ok(());
    }
    check_size(v.len())?;
    buf.push(idx);
    write_varint(buf, v.len() as u64);
    buf.extend_from_slice(v);
    Ok(())
}

pub fn encode_str(idx: u8, v: &str, buf: &mut Vec<u8>) -> Result<()> {
    encode_bytes(idx, v.as_bytes(), buf)
}

pub fn encode_object(idx: u8, v: Option<&Record>, buf: &mut Vec<u8>) -> Result<()> {
    if let Some(nested) = v {
        buf.push(idx);
        marshal(nested, buf)?;
    }
    Ok(())
}

fn encode_list(idx: u8, elem: FieldKind, items: &[FieldValue], buf: &mut Vec<u8>) -> Result<()> {
    if items.is_empty() {
        return Ok(());
    }
    check_list_len(items.len())?;
    buf.push(idx);
    write_varint(buf, items.len() as u64);
    for item in items {
        encode_list_element(elem, item, buf)?;
    }
    Ok(())
}

fn encode_list_element(elem: FieldKind, item: &FieldValue, buf: &mut Vec<u8>) -> Result<()> {
    match (elem, item) {
        (FieldKind::Int32, FieldValue::Int32(v)) => {
            write_varint(buf, zigzag_encode_i32(*v) as u64)
        }
        (FieldKind::Int64, FieldValue::Int64(v)) => {
            write_varint_capped(buf, zigzag_encode_i64(*v), wire::INT64_VARINT_MAX_BYTES)
        }
        (FieldKind::Float32, FieldValue::Float32(v)) => {
            buf.extend_from_slice(&f32_to_be_bytes(*v))
        }
        (FieldKind::Float64, FieldValue::Float64(v)) => {
            buf.extend_from_slice(&f64_to_be_bytes(*v))
        }
        (FieldKind::Bytes, FieldValue::Bytes(v)) => {
            check_size(v.len())?;
            write_varint(buf, v.len() as u64);
            buf.extend_from_slice(v);
        }
        (FieldKind::Str, FieldValue::Str(v)) => {
            let bytes = v.as_bytes();
            check_size(bytes.len())?;
            write_varint(buf, bytes.len() as u64);
            buf.extend_from_slice(bytes);
        }
        (FieldKind::Object, FieldValue::Object(v)) => match v {
            Some(nested) => marshal(nested, buf)?,
            None => {
                return Err(Error::new(Cause::TypeMismatch(String::from(
                    "list<object> element is null",
                ))))
            }
        },
        _ => {
            return Err(Error::new(Cause::TypeMismatch(format!(
                "list element does not match declared sub-type {}",
                elem.canonical_name()
            ))))
        }
    }
    Ok(())
}

/// Read back `width` fixed bytes for tests that want to assert on a known encoding without
/// reaching into `crate::unmarshal`.
#[cfg(test)]
fn peek_fixed(buf: &[u8], offset: usize, width: usize) -> u64 {
    let mut off = offset;
    read_fixed(buf, &mut off, width).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use crate::types::FieldKind;
    use std::time::{Duration, SystemTime};

    fn marshal_one(kind: FieldKind, sub: Option<FieldKind>, value: FieldValue) -> Vec<u8> {
        let mut rec = Record::new();
        rec.declare("f0", kind, sub, Some(value)).unwrap();
        let mut buf = Vec::new();
        marshal(&rec, &mut buf).unwrap();
        buf
    }

    #[test]
    fn empty_record_is_just_the_terminator() {
        let rec = Record::new();
        let mut buf = Vec::new();
        marshal(&rec, &mut buf).unwrap();
        assert_eq!(buf, vec![0x7F]);
    }

    #[test]
    fn all_zero_record_is_just_the_terminator() {
        let mut rec = Record::new();
        rec.declare("a", FieldKind::Bool, None, None).unwrap();
        rec.declare("b", FieldKind::Int32, None, None).unwrap();
        let mut buf = Vec::new();
        marshal(&rec, &mut buf).unwrap();
        assert_eq!(buf, vec![0x7F]);
    }

    #[test]
    fn bool_true() {
        let buf = marshal_one(FieldKind::Bool, None, FieldValue::Bool(true));
        assert_eq!(buf, vec![0x00, 0x7F]);
    }

    #[test]
    fn uint8_value() {
        let buf = marshal_one(FieldKind::Uint8, None, FieldValue::Uint8(0x42));
        assert_eq!(buf, vec![0x00, 0x42, 0x7F]);
    }

    #[test]
    fn uint16_compressed_and_flat() {
        let buf = marshal_one(FieldKind::Uint16, None, FieldValue::Uint16(0x00FF));
        assert_eq!(buf, vec![0x80, 0xFF, 0x7F]);
        let buf = marshal_one(FieldKind::Uint16, None, FieldValue::Uint16(0x0100));
        assert_eq!(buf, vec![0x00, 0x01, 0x00, 0x7F]);
    }

    #[test]
    fn int32_negative_and_varint() {
        let buf = marshal_one(FieldKind::Int32, None, FieldValue::Int32(-1));
        assert_eq!(buf, vec![0x80, 0x01, 0x7F]);
        let buf = marshal_one(FieldKind::Int32, None, FieldValue::Int32(300));
        assert_eq!(buf, vec![0x00, 0xAC, 0x02, 0x7F]);
    }

    #[test]
    fn str_value() {
        let buf = marshal_one(FieldKind::Str, None, FieldValue::Str(String::from("A")));
        assert_eq!(buf, vec![0x00, 0x01, 0x41, 0x7F]);
    }

    #[test]
    fn list_int32_zigzags_elements() {
        let buf = marshal_one(
            FieldKind::List,
            Some(FieldKind::Int32),
            FieldValue::List(vec![
                FieldValue::Int32(1),
                FieldValue::Int32(-1),
                FieldValue::Int32(300),
            ]),
        );
        assert_eq!(buf, vec![0x00, 0x03, 0x02, 0x01, 0xD8, 0x04, 0x7F]);
    }

    #[test]
    fn declaration_order_changes_wire_bytes() {
        let mut a = Record::new();
        a.declare("a", FieldKind::Bool, None, Some(FieldValue::Bool(true)))
            .unwrap();
        a.declare("b", FieldKind::Uint8, None, Some(FieldValue::Uint8(1)))
            .unwrap();
        let mut b = Record::new();
        b.declare("b", FieldKind::Uint8, None, Some(FieldValue::Uint8(1)))
            .unwrap();
        b.declare("a", FieldKind::Bool, None, Some(FieldValue::Bool(true)))
            .unwrap();

        let mut buf_a = Vec::new();
        marshal(&a, &mut buf_a).unwrap();
        let mut buf_b = Vec::new();
        marshal(&b, &mut buf_b).unwrap();
        assert_ne!(buf_a, buf_b);
    }

    #[test]
    fn list_length_cap_is_enforced() {
        let oversized: Vec<FieldValue> = (0..wire::LIST_MAX + 1)
            .map(|i| FieldValue::Int32(i as i32))
            .collect();
        let mut buf = Vec::new();
        let err = encode_list(0, FieldKind::Int32, &oversized, &mut buf).unwrap_err();
        match err.cause() {
            Cause::Malformed(_) => (),
            other => panic!("expected Malformed, got {:?}", other),
        }
    }

    #[test]
    fn size_cap_is_enforced() {
        let oversized = vec![0u8; wire::MAX_SIZE + 1];
        let mut buf = Vec::new();
        let err = encode_bytes(0, &oversized, &mut buf).unwrap_err();
        match err.cause() {
            Cause::Malformed(_) => (),
            other => panic!("expected Malformed, got {:?}", other),
        }
    }

    #[test]
    fn datetime_compressed_path() {
        let t = SystemTime::UNIX_EPOCH + Duration::new(10, 0);
        let buf = marshal_one(FieldKind::Datetime, None, FieldValue::Datetime(t));
        assert_eq!(buf[0], 0x00);
        assert_eq!(peek_fixed(&buf, 1, 4), 10);
        assert_eq!(peek_fixed(&buf, 5, 4), 0);
        assert_eq!(buf[9], 0x7F);
    }

    #[test]
    fn datetime_epoch_is_absent() {
        let buf = marshal_one(
            FieldKind::Datetime,
            None,
            FieldValue::Datetime(SystemTime::UNIX_EPOCH),
        );
        assert_eq!(buf, vec![0x7F]);
    }
}
