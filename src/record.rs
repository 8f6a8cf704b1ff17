//! The Colfer record container: an insertion-ordered mapping from field name to a typed
//! descriptor, driving both the wire index assignment and the marshal/unmarshal dispatch.
//!
//! # Discussion
//!
//! `original_source/colf/colf_base.py`'s `DictMixIn` backs a record with an `OrderedDict` so that
//! Python's `dir()`-based iteration in `marshall`/`unmarshall` visits fields in declaration order.
//! Rust has no ordered-map-by-default in the standard library, so this keeps an explicit `Vec<Field>`
//! for order (mirroring the `OrderedDict`) plus a `HashMap<String, usize>` side index for
//! `O(1)` name lookup in `get`/`set` — the same "ordered map" shape DESIGN NOTES §9 calls for,
//! built the way `xnde::tracks::ColumnMap` pairs a `HashMap` lookup with positional data.

use crate::error::{Cause, Error, Result};
use crate::types::FieldKind;
use log::{debug, trace};
use std::collections::HashMap;
use std::time::SystemTime;

/// A field's value. `List`'s sub-type and `Object`'s nested schema are tracked by [`Field`], not
/// by this enum, since a given `FieldKind` implies a single Rust representation.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Uint8(u8),
    Uint16(u16),
    Int32(i32),
    Uint32(u32),
    Int64(i64),
    Uint64(u64),
    Float32(f32),
    Float64(f64),
    Datetime(SystemTime),
    Bytes(Vec<u8>),
    Str(String),
    List(Vec<FieldValue>),
    Object(Option<Box<Record>>),
}

impl FieldValue {
    /// The `(FieldKind, sub_kind)` this value's runtime shape implies, used by `Record::set`'s
    /// auto-declaration path (spec.md §3 invariant 4). For `list`, the element kind is inferred
    /// from the first item and left `None` for an empty list — `declare` then rejects a `None`
    /// sub-type for `list` on its own, the same way it would for an explicit caller-supplied
    /// `declare` call.
    ///
    /// Grounded in `colf_base.py`'s `DictMixIn.__setattr__`: `variableSubType =
    /// self.remapTypes(str(type(value[0]).__name__)) if value else None`.
    fn inferred_kind(&self) -> (FieldKind, Option<FieldKind>) {
        match self {
            FieldValue::Bool(_) => (FieldKind::Bool, None),
            FieldValue::Uint8(_) => (FieldKind::Uint8, None),
            FieldValue::Uint16(_) => (FieldKind::Uint16, None),
            FieldValue::Int32(_) => (FieldKind::Int32, None),
            FieldValue::Uint32(_) => (FieldKind::Uint32, None),
            FieldValue::Int64(_) => (FieldKind::Int64, None),
            FieldValue::Uint64(_) => (FieldKind::Uint64, None),
            FieldValue::Float32(_) => (FieldKind::Float32, None),
            FieldValue::Float64(_) => (FieldKind::Float64, None),
            FieldValue::Datetime(_) => (FieldKind::Datetime, None),
            FieldValue::Bytes(_) => (FieldKind::Bytes, None),
            FieldValue::Str(_) => (FieldKind::Str, None),
            FieldValue::Object(_) => (FieldKind::Object, None),
            FieldValue::List(items) => {
                let elem = items.first().map(|v| v.inferred_kind().0);
                (FieldKind::List, elem)
            }
        }
    }
}

/// One declared field: its name, wire type, optional list-element sub-type, and current value.
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    kind: FieldKind,
    sub_kind: Option<FieldKind>,
    value: FieldValue,
}

impl Field {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn kind(&self) -> FieldKind {
        self.kind
    }
    pub fn sub_kind(&self) -> Option<FieldKind> {
        self.sub_kind
    }
    pub fn value(&self) -> &FieldValue {
        &self.value
    }

    /// Mutable access to this field's value, used by the unmarshaller to overwrite it in place
    /// without going through `Record::set`'s type re-check (the wire already guarantees the
    /// decoded value matches the field's declared kind).
    pub(crate) fn value_mut(&mut self) -> &mut FieldValue {
        &mut self.value
    }
}

/// An ordered sequence of declared fields. Declaration order is the wire index order (spec.md §3
/// invariant 2); names are unique (invariant 1); every field always holds a value (invariant 5);
/// deletion is unsupported (invariant 6).
#[derive(Debug, Clone, Default)]
pub struct Record {
    fields: Vec<Field>,
    index: HashMap<String, usize>,
}

impl Record {
    pub fn new() -> Record {
        Record {
            fields: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Declare a new field at the next wire index. Fails [`Cause::AlreadyDeclared`] on a
    /// duplicate name, and [`Cause::BadType`] if `kind` is `list` without a `sub_kind`.
    ///
    /// `init` seeds the field's value; `None` leaves it at `kind`'s canonical zero (spec.md §3
    /// invariant 5).
    pub fn declare(
        &mut self,
        name: &str,
        kind: FieldKind,
        sub_kind: Option<FieldKind>,
        init: Option<FieldValue>,
    ) -> Result<()> {
        if self.index.contains_key(name) {
            return Err(Error::new(Cause::AlreadyDeclared(name.to_string())));
        }
        if self.fields.len() >= crate::wire::MAX_INDEX as usize + 1 {
            return Err(Error::new(Cause::BadType(format!(
                "too many fields declared: wire index would exceed {}",
                crate::wire::MAX_INDEX
            ))));
        }
        match (kind, sub_kind) {
            (FieldKind::List, None) => {
                return Err(Error::new(Cause::BadType(String::from(
                    "list fields require a sub-type",
                ))));
            }
            (FieldKind::List, Some(s)) if !s.valid_list_element() => {
                return Err(Error::new(Cause::BadType(format!(
                    "{} is not a valid list element type",
                    s.canonical_name()
                ))));
            }
            (k, Some(_)) if k != FieldKind::List => {
                return Err(Error::new(Cause::BadType(String::from(
                    "only list fields take a sub-type",
                ))));
            }
            _ => (),
        }

        let value = match init {
            Some(v) => {
                if !kind.fits(&v, sub_kind) {
                    return Err(Error::new(Cause::TypeMismatch(name.to_string())));
                }
                v
            }
            None => kind.zero(),
        };

        debug!(
            "declaring field {name:?} as {} at index {}",
            kind.canonical_name(),
            self.fields.len()
        );
        self.index.insert(name.to_string(), self.fields.len());
        self.fields.push(Field {
            name: name.to_string(),
            kind,
            sub_kind,
            value,
        });
        Ok(())
    }

    /// Assign `value` to `name`. If `name` is undeclared, it is auto-declared with the kind (and,
    /// for a `list`, the element kind inferred from its first item) inferred from `value`
    /// (spec.md §3 invariant 4); otherwise the value is checked against the field's declared type
    /// and, on mismatch, the field is left unchanged ([`Cause::TypeMismatch`]).
    pub fn set(&mut self, name: &str, value: FieldValue) -> Result<()> {
        match self.index.get(name).copied() {
            Some(idx) => {
                let field = &self.fields[idx];
                if !field.kind.fits(&value, field.sub_kind) {
                    return Err(Error::new(Cause::TypeMismatch(name.to_string())));
                }
                trace!("setting field {name:?}");
                self.fields[idx].value = value;
                Ok(())
            }
            None => {
                let (kind, sub_kind) = value.inferred_kind();
                self.declare(name, kind, sub_kind, Some(value))
            }
        }
    }

    /// Look up a declared field's current value. Fails [`Cause::Unknown`] if `name` was never
    /// declared.
    pub fn get(&self, name: &str) -> Result<&FieldValue> {
        self.index
            .get(name)
            .map(|&idx| &self.fields[idx].value)
            .ok_or_else(|| Error::new(Cause::Unknown(name.to_string())))
    }

    /// Iterate declared fields in wire-index order.
    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    /// Number of declared fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Always fails: field deletion is not supported (spec.md §3 invariant 6).
    pub fn delete(&mut self, name: &str) -> Result<()> {
        Err(Error::new(Cause::Unsupported(name.to_string())))
    }

    /// Field at wire index `i`, used by the unmarshaller to overwrite a value in place without
    /// touching its declared type.
    pub(crate) fn field_at_mut(&mut self, i: usize) -> Option<&mut Field> {
        self.fields.get_mut(i)
    }
}

impl PartialEq for Record {
    /// Two records are equal iff they declare the same fields, in the same order, with the same
    /// values — schema and state both, matching spec.md §3's equality requirement.
    fn eq(&self, other: &Self) -> bool {
        self.fields.len() == other.fields.len()
            && self.fields.iter().zip(other.fields.iter()).all(|(a, b)| {
                a.name == b.name
                    && a.kind == b.kind
                    && a.sub_kind == b.sub_kind
                    && a.value == b.value
            })
    }
}
