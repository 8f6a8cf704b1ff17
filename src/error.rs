//! Crate-wide error type
//!
//! # Discussion
//!
//! One `Cause`/`Error` pair for the whole crate: the record container and the codec are so
//! tightly coupled (the container drives the codec's field order; the codec enforces the
//! container's types) that splitting the error type per module the way `xnde` does for `fields`
//! and the top-level crate would just mean converting one `Error` into another at every call
//! site. `Cause` is the enumerated, programmatically-matchable status; `Error` adds an optional
//! chained `source` and an optional captured `Backtrace`.

use parse_display::Display;

#[derive(Debug, Display, PartialEq, Eq, Clone)]
pub enum Cause {
    /// Reference to an undeclared field.
    #[display("unknown field {0:?}")]
    Unknown(String),
    /// A field name was declared more than once.
    #[display("field {0:?} already declared")]
    AlreadyDeclared(String),
    /// An unknown type name, or a `list` declared without a sub-type.
    #[display("bad type: {0}")]
    BadType(String),
    /// A value does not satisfy its field's declared type predicate.
    #[display("value does not match the declared type of field {0:?}")]
    TypeMismatch(String),
    /// Deletion of a declared field was attempted.
    #[display("field {0:?} cannot be deleted")]
    Unsupported(String),
    /// Encode would exceed buffer capacity, or decode would read past the end.
    #[display("buffer overrun")]
    BufferOverrun,
    /// Malformed wire data: bad varint, oversized length, invalid UTF-8.
    #[display("malformed wire data: {0}")]
    Malformed(String),
    /// Non-integral or negative power-of-two argument to a numeric helper.
    #[display("arithmetic error: {0}")]
    Arithmetic(String),
}

#[derive(Debug, Display)]
#[display("{cause} source (if any): {source:?}")]
pub struct Error {
    cause: Cause,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
    trace: Option<backtrace::Backtrace>,
}

impl Error {
    pub fn new(cause: Cause) -> Error {
        Error {
            cause,
            source: None,
            trace: Some(backtrace::Backtrace::new()),
        }
    }

    pub fn cause(&self) -> &Cause {
        &self.cause
    }

    pub fn backtrace(&self) -> Option<&backtrace::Backtrace> {
        self.trace.as_ref()
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.source {
            Some(bx) => Some(bx.as_ref()),
            None => None,
        }
    }
}

impl std::convert::From<std::string::FromUtf8Error> for Error {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Error {
            cause: Cause::Malformed(String::from("invalid UTF-8")),
            source: Some(Box::new(err)),
            trace: Some(backtrace::Backtrace::new()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_smoke() {
        let e = Error::new(Cause::Unknown(String::from("foo")));
        let s = format!("{}", e);
        assert!(s.contains("unknown field"));
    }

    #[test]
    fn cause_roundtrip() {
        let e = Error::new(Cause::BufferOverrun);
        assert_eq!(*e.cause(), Cause::BufferOverrun);
    }
}
