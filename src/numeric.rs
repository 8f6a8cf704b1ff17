//! Numeric helpers: power-of-two masks, zig-zag signed-integer codecs, IEEE-754 float↔byte
//! conversion, and UTF-8 encode/decode.
//!
//! Grounded in `original_source/colf/colf_base.py`'s `EntropyUtils`, `IntegerEncodeUtils`,
//! `RawFloatConvertUtils` and `UTFUtils` mixins; Rust's `f32`/`f64::to_be_bytes` and
//! `str::as_bytes`/`String::from_utf8` make the float and UTF-8 halves of those mixins
//! unnecessary ceremony, but the zig-zag bijection and the mask arithmetic carry over as-is.

use crate::error::{Cause, Error, Result};

/// `2^power - 1`: the largest unsigned value representable in `power` bits.
///
/// Mirrors `EntropyUtils.getMaximumUnsigned`; `power` must be in `1..=64`.
pub fn max_unsigned(power: u32) -> Result<u64> {
    if power == 0 || power > 64 {
        return Err(Error::new(Cause::Arithmetic(format!(
            "power of two out of range: {power}"
        ))));
    }
    Ok(if power == 64 {
        u64::MAX
    } else {
        (1u64 << power) - 1
    })
}

/// A mask selecting every bit at or above position `power` within a `width`-bit value.
///
/// Mirrors `EntropyUtils.getComplementaryMaskUnsigned(power, width)`: used to ask "does this
/// value need more than `power` bits to represent?"
pub fn complementary_mask(power: u32, width: u32) -> Result<u64> {
    Ok(max_unsigned(width)? - max_unsigned(power)?)
}

/// Zig-zag encode a signed 32-bit integer: small-magnitude values (positive or negative) map to
/// small unsigned values, shortening their varint encoding.
pub fn zigzag_encode_i32(v: i32) -> u32 {
    ((v << 1) ^ (v >> 31)) as u32
}

/// Inverse of [`zigzag_encode_i32`].
pub fn zigzag_decode_i32(v: u32) -> i32 {
    ((v >> 1) as i32) ^ -((v & 1) as i32)
}

/// Zig-zag encode a signed 64-bit integer.
pub fn zigzag_encode_i64(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

/// Inverse of [`zigzag_encode_i64`].
pub fn zigzag_decode_i64(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

/// Big-endian IEEE-754 binary32 bytes for `v`.
pub fn f32_to_be_bytes(v: f32) -> [u8; 4] {
    v.to_be_bytes()
}

/// Reconstitute an `f32` from big-endian IEEE-754 binary32 bytes.
pub fn f32_from_be_bytes(b: [u8; 4]) -> f32 {
    f32::from_be_bytes(b)
}

/// Big-endian IEEE-754 binary64 bytes for `v`.
pub fn f64_to_be_bytes(v: f64) -> [u8; 8] {
    v.to_be_bytes()
}

/// Reconstitute an `f64` from big-endian IEEE-754 binary64 bytes.
pub fn f64_from_be_bytes(b: [u8; 8]) -> f64 {
    f64::from_be_bytes(b)
}

/// UTF-8 encode a string to its wire bytes. Colfer measures `str` length in encoded bytes, not
/// characters, so this is a thin wrapper documenting that intent at call sites.
pub fn encode_utf8(s: &str) -> &[u8] {
    s.as_bytes()
}

/// Decode UTF-8 wire bytes into a `String`, failing `Malformed` on invalid sequences.
pub fn decode_utf8(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(Error::from)
}
