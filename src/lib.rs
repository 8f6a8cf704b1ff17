//! colfer-rt
//!
//! # Introduction
//!
//! A runtime codec and dynamic record container for the [Colfer](https://colfer.github.io/)
//! binary wire format. Colfer schemas are normally compiled ahead of time into language-specific
//! structs; this crate instead lets a record's shape be declared at runtime, so the same binary
//! can marshal/unmarshal records whose field set isn't known until the schema itself is read from
//! some other source (a `.colf` file, a network handshake, a config blob).
//!
//! # Discussion
//!
//! ## Wire format
//!
//! A Colfer record is a run of present fields, each introduced by a one-byte tag, followed by a
//! single `0x7F` end-of-record marker. The tag's low 7 bits give the field's wire index (its
//! position among the fields declared on the record); the high bit is a per-type flag selecting
//! between a fixed-width and a variable-width ("compressed") payload encoding, or a sign flag for
//! the signed integer types. A field whose value equals its type's zero value is omitted from the
//! wire entirely — there is no explicit "null" marker. See [`wire`] for the shared varint/fixed
//! primitives, [`marshal`] and [`unmarshal`] for the per-type codecs, and [`numeric`] for the
//! zig-zag and IEEE-754 helpers those codecs build on.
//!
//! ## Records
//!
//! [`Record`] holds an ordered set of [`Field`]s; declaration order is wire index order, and
//! a [`FieldKind`] plus, for `list` fields, an element [`FieldKind`] fixes what a field will
//! accept. See [`record`] for the declare/set/get API and its invariants.
//!
//! # Errors
//!
//! All fallible operations return [`error::Result`]; [`error::Error`] wraps a [`error::Cause`]
//! enumerating what went wrong, an optional underlying `source`, and a captured backtrace.

pub mod error;
pub mod marshal;
pub mod numeric;
pub mod record;
pub mod types;
pub mod unmarshal;
pub mod wire;

pub use error::{Cause, Error, Result};
pub use marshal::marshal;
pub use record::{Field, FieldValue, Record};
pub use types::FieldKind;
pub use unmarshal::unmarshal;
