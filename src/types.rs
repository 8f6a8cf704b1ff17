//! The Colfer type registry: a closed set of field kinds, alias normalization, range/kind
//! predicates and canonical zero values.
//!
//! # Discussion
//!
//! `colf_base.py`'s `TypeCheckMixin`/`TypeDeriveValueMixin` dispatch on type *names* through a
//! `STRING_TYPES_MAP` built at call time. Per DESIGN NOTES §9 ("tagged variants"), this becomes a
//! closed `FieldKind` enum with one `match` arm per kind instead of a hash lookup; alias
//! normalization (`int` → `int32`, &c.) is still string-keyed since schema authors keep naming
//! types by string, but it resolves once, at `declare` time, rather than on every `fits`/`zero`
//! call.

use crate::record::FieldValue;
use std::time::{Duration, SystemTime};

/// A field's wire-level type. `List` and `Object` carry no data themselves; a `list`'s element
/// kind is tracked alongside the field, not inside this enum, per spec.md §3 ("sub_type_name").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Bool,
    Uint8,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Float32,
    Float64,
    Datetime,
    Bytes,
    Str,
    List,
    Object,
}

impl FieldKind {
    /// Element kinds a `list` field is permitted to carry, per spec.md §3.
    pub fn valid_list_element(self) -> bool {
        matches!(
            self,
            FieldKind::Int32
                | FieldKind::Int64
                | FieldKind::Float32
                | FieldKind::Float64
                | FieldKind::Bytes
                | FieldKind::Str
                | FieldKind::Object
        )
    }

    /// Normalize a schema-author-facing type name to its canonical `FieldKind`, applying the
    /// alias table from spec.md §3 (`int`→`int32`, `long`→`int64`, `float`→`float32`,
    /// `double`→`float64`, `binary`→`bytes`, `text`→`str`, `timestamp`→`datetime`).
    ///
    /// Grounded in `TypeCheckMixin.remapTypes` plus the `STRING_TYPES_MAP` keys it feeds.
    pub fn from_name(name: &str) -> Option<FieldKind> {
        Some(match name {
            "bool" => FieldKind::Bool,
            "uint8" => FieldKind::Uint8,
            "uint16" => FieldKind::Uint16,
            "int32" | "int" => FieldKind::Int32,
            "uint32" => FieldKind::Uint32,
            "int64" | "long" => FieldKind::Int64,
            "uint64" => FieldKind::Uint64,
            "float32" | "float" => FieldKind::Float32,
            "float64" | "double" => FieldKind::Float64,
            "datetime" | "timestamp" => FieldKind::Datetime,
            "bytes" | "binary" => FieldKind::Bytes,
            "str" | "text" => FieldKind::Str,
            "list" | "tuple" => FieldKind::List,
            "object" => FieldKind::Object,
            _ => return None,
        })
    }

    /// The canonical type name used when a kind is reported back to the caller (e.g. in error
    /// messages or `Record::iter`).
    pub fn canonical_name(self) -> &'static str {
        match self {
            FieldKind::Bool => "bool",
            FieldKind::Uint8 => "uint8",
            FieldKind::Uint16 => "uint16",
            FieldKind::Int32 => "int32",
            FieldKind::Uint32 => "uint32",
            FieldKind::Int64 => "int64",
            FieldKind::Uint64 => "uint64",
            FieldKind::Float32 => "float32",
            FieldKind::Float64 => "float64",
            FieldKind::Datetime => "datetime",
            FieldKind::Bytes => "bytes",
            FieldKind::Str => "str",
            FieldKind::List => "list",
            FieldKind::Object => "object",
        }
    }

    /// The canonical zero value for this kind, per the table in spec.md §4.1. A `list` or
    /// `object` zero is independent of any sub-type, since both are simply empty/absent.
    pub fn zero(self) -> FieldValue {
        match self {
            FieldKind::Bool => FieldValue::Bool(false),
            FieldKind::Uint8 => FieldValue::Uint8(0),
            FieldKind::Uint16 => FieldValue::Uint16(0),
            FieldKind::Int32 => FieldValue::Int32(0),
            FieldKind::Uint32 => FieldValue::Uint32(0),
            FieldKind::Int64 => FieldValue::Int64(0),
            FieldKind::Uint64 => FieldValue::Uint64(0),
            FieldKind::Float32 => FieldValue::Float32(0.0),
            FieldKind::Float64 => FieldValue::Float64(0.0),
            FieldKind::Datetime => FieldValue::Datetime(SystemTime::UNIX_EPOCH),
            FieldKind::Bytes => FieldValue::Bytes(Vec::new()),
            FieldKind::Str => FieldValue::Str(String::new()),
            FieldKind::List => FieldValue::List(Vec::new()),
            FieldKind::Object => FieldValue::Object(None),
        }
    }

    /// Range/kind check for a value against this `FieldKind`; for `list`, every element must
    /// additionally satisfy `elem` (the declared sub-type).
    ///
    /// Grounded in `TypeCheckMixin.isType` and its per-type `is*` predicates.
    pub fn fits(self, value: &FieldValue, elem: Option<FieldKind>) -> bool {
        match (self, value) {
            (FieldKind::Bool, FieldValue::Bool(_)) => true,
            (FieldKind::Uint8, FieldValue::Uint8(_)) => true,
            (FieldKind::Uint16, FieldValue::Uint16(_)) => true,
            (FieldKind::Int32, FieldValue::Int32(_)) => true,
            (FieldKind::Uint32, FieldValue::Uint32(_)) => true,
            (FieldKind::Int64, FieldValue::Int64(_)) => true,
            (FieldKind::Uint64, FieldValue::Uint64(_)) => true,
            (FieldKind::Float32, FieldValue::Float32(v)) => v.is_finite(),
            (FieldKind::Float64, FieldValue::Float64(v)) => v.is_finite(),
            (FieldKind::Datetime, FieldValue::Datetime(t)) => *t >= SystemTime::UNIX_EPOCH,
            (FieldKind::Bytes, FieldValue::Bytes(b)) => b.len() <= crate::wire::MAX_SIZE,
            (FieldKind::Str, FieldValue::Str(s)) => s.as_bytes().len() <= crate::wire::MAX_SIZE,
            (FieldKind::Object, FieldValue::Object(_)) => true,
            (FieldKind::List, FieldValue::List(items)) => {
                let Some(elem) = elem else { return false };
                if items.len() > crate::wire::LIST_MAX {
                    return false;
                }
                items.iter().all(|item| elem.fits(item, None))
            }
            _ => false,
        }
    }
}

/// Convert a `(seconds, nanos)` pair, both relative to the Unix epoch, into a `SystemTime`.
/// Used by the datetime codec and by `fits`'s zero-check.
pub fn epoch_plus(seconds: u64, nanos: u32) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::new(seconds, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_normalization() {
        assert_eq!(FieldKind::from_name("int"), Some(FieldKind::Int32));
        assert_eq!(FieldKind::from_name("long"), Some(FieldKind::Int64));
        assert_eq!(FieldKind::from_name("float"), Some(FieldKind::Float32));
        assert_eq!(FieldKind::from_name("double"), Some(FieldKind::Float64));
        assert_eq!(FieldKind::from_name("binary"), Some(FieldKind::Bytes));
        assert_eq!(FieldKind::from_name("text"), Some(FieldKind::Str));
        assert_eq!(FieldKind::from_name("timestamp"), Some(FieldKind::Datetime));
        assert_eq!(FieldKind::from_name("bogus"), None);
    }

    #[test]
    fn zero_values() {
        assert_eq!(FieldKind::Bool.zero(), FieldValue::Bool(false));
        assert_eq!(FieldKind::Str.zero(), FieldValue::Str(String::new()));
        assert_eq!(
            FieldKind::Datetime.zero(),
            FieldValue::Datetime(SystemTime::UNIX_EPOCH)
        );
    }

    #[test]
    fn fits_checks_range_and_kind() {
        assert!(FieldKind::Uint16.fits(&FieldValue::Uint16(65_535), None));
        assert!(!FieldKind::Uint16.fits(&FieldValue::Int32(1), None));
        assert!(!FieldKind::Float32.fits(&FieldValue::Float32(f32::NAN), None));
    }

    #[test]
    fn list_fits_checks_element_kind_and_length() {
        let ok = FieldValue::List(vec![FieldValue::Int32(1), FieldValue::Int32(-1)]);
        assert!(FieldKind::List.fits(&ok, Some(FieldKind::Int32)));

        let bad_elem = FieldValue::List(vec![FieldValue::Str(String::from("x"))]);
        assert!(!FieldKind::List.fits(&bad_elem, Some(FieldKind::Int32)));

        assert!(!FieldKind::List.fits(&ok, None));
    }
}
