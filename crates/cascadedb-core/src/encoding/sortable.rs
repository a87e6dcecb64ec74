//! Sort-order preserving encoding for register values.
//!
//! This module provides a binary encoding for [`Value`] types that preserves
//! the [`Value::compare`] ordering when comparing the encoded bytes
//! lexicographically. The external sort backend relies on this to delegate
//! ordering to a byte-ordered persistent store.
//!
//! # Encoding Design
//!
//! ## Type Ordering
//!
//! Different types are ordered by their type tag (lowest to highest):
//! - `Null` (0x00) - sorts first
//! - `Bool` (0x01) - false before true
//! - `Int`/`Float` (0x02) - one shared numeric tag, negative to positive
//! - `String` (0x03) - lexicographic UTF-8 order
//! - `Bytes` (0x04) - lexicographic byte order
//! - `Array` (0x05) - elementwise, shorter prefix first
//!
//! Ints and floats share a tag so that cross-type numeric comparisons match
//! `Value::compare`; both are widened to the same `f64`-derived bit pattern.
//!
//! ## Numeric Encoding
//!
//! Numbers use the IEEE 754 bit representation with transformations:
//! - Positive values: flip the sign bit (XOR with `0x8000_0000_0000_0000`)
//! - Negative values: flip all bits
//! - NaN is encoded as the maximum pattern so it sorts last
//! - Negative zero is collapsed into positive zero
//!
//! The widened pattern is followed by an eight-byte disambiguator. Ints
//! append their exact bits (the widening rounds above 2^53); a float that
//! is an exact `i64` appends those same bits, so `Int(2)` and `Float(2.0)`
//! produce identical keys and tie-breaking falls through to whatever
//! follows the key. Fractional and out-of-range floats repeat their own
//! pattern instead.
//!
//! ## String, Bytes, and Array Encoding
//!
//! Variable-length payloads are null-terminated with escape sequences:
//! - `0x00` in the data is escaped to `0x00 0x01`
//! - The sequence ends with `0x00 0x00` (double null terminator)
//!
//! This preserves lexicographic ordering (`"a" < "aa" < "b"`). Arrays encode
//! each element recursively and escape the concatenation as one payload.
//!
//! ## Descending Keys
//!
//! [`encode_sortable_desc`] complements every byte of the ascending
//! encoding, so a byte-ordered store iterating forward yields descending
//! value order. No custom store comparator is required.

use crate::error::CoreError;
use crate::types::Value;

/// Type tags for sortable encoding.
///
/// These tags define the sort order of different types.
pub mod tags {
    /// Null values sort first.
    pub const NULL: u8 = 0x00;
    /// Boolean values (false=0x00, true=0x01).
    pub const BOOL: u8 = 0x01;
    /// Numbers (ints and floats share one tag).
    pub const NUMBER: u8 = 0x02;
    /// UTF-8 strings.
    pub const STRING: u8 = 0x03;
    /// Raw bytes.
    pub const BYTES: u8 = 0x04;
    /// Arrays of values.
    pub const ARRAY: u8 = 0x05;
}

/// Constant for flipping the sign bit.
const SIGN_FLIP: u64 = 0x8000_0000_0000_0000;

/// Escape byte: when we see 0x00 in data, we output 0x00 0x01.
const ESCAPE_BYTE: u8 = 0x01;
/// Terminator: end of a variable-length payload is marked by 0x00 0x00.
const TERMINATOR: u8 = 0x00;

/// Encode bytes with null-escape encoding.
///
/// This encoding preserves lexicographic order:
/// - Each 0x00 in input becomes 0x00 0x01
/// - Sequence ends with 0x00 0x00
fn encode_bytes_escaped(data: &[u8], buf: &mut Vec<u8>) {
    for &byte in data {
        if byte == 0x00 {
            buf.push(0x00);
            buf.push(ESCAPE_BYTE);
        } else {
            buf.push(byte);
        }
    }
    buf.push(TERMINATOR);
    buf.push(TERMINATOR);
}

/// Encode the numeric payload shared by ints and floats.
///
/// Negative zero is collapsed into positive zero first; the comparator
/// treats them as equal, so their encodings must match.
fn encode_number(f: f64, buf: &mut Vec<u8>) {
    let f = if f == 0.0 { 0.0 } else { f };
    let bits = f.to_bits();
    let encoded = if f.is_nan() {
        // NaN sorts after every other number
        u64::MAX
    } else if bits & SIGN_FLIP == 0 {
        // Positive (including +0): flip sign bit
        bits ^ SIGN_FLIP
    } else {
        // Negative: flip all bits
        !bits
    };
    buf.extend_from_slice(&encoded.to_be_bytes());
}

/// Exact-integer disambiguator appended after the widened pattern.
fn encode_exact_int(i: i64, buf: &mut Vec<u8>) {
    buf.extend_from_slice(&((i as u64) ^ SIGN_FLIP).to_be_bytes());
}

/// Upper bound (exclusive) of the `f64` values that fit an `i64`: 2^63.
const I64_WIDENED_END: f64 = 9_223_372_036_854_775_808.0;

/// The exact `i64` a float stands for, when it stands for one.
fn float_as_exact_int(f: f64) -> Option<i64> {
    let f = if f == 0.0 { 0.0 } else { f };
    if f.fract() == 0.0 && f >= -I64_WIDENED_END && f < I64_WIDENED_END {
        Some(f as i64)
    } else {
        None
    }
}

fn encode_into(value: &Value, buf: &mut Vec<u8>) -> Result<(), CoreError> {
    match value {
        Value::Null => buf.push(tags::NULL),

        Value::Bool(b) => {
            buf.push(tags::BOOL);
            buf.push(u8::from(*b));
        }

        Value::Int(i) => {
            buf.push(tags::NUMBER);
            // i64 -> f64 may round for |i| > 2^53; disambiguate with the
            // exact integer bits appended after the widened pattern
            encode_number(*i as f64, buf);
            encode_exact_int(*i, buf);
        }

        Value::Float(f) => {
            buf.push(tags::NUMBER);
            encode_number(*f, buf);
            // An integral float in i64 range gets the same disambiguator
            // as the equal int, so comparator ties encode to equal bytes.
            // Everything else (fractional, non-finite, beyond 2^63)
            // repeats its pattern to keep the key length uniform.
            match float_as_exact_int(*f) {
                Some(i) => encode_exact_int(i, buf),
                None => encode_number(*f, buf),
            }
        }

        Value::String(s) => {
            buf.push(tags::STRING);
            encode_bytes_escaped(s.as_bytes(), buf);
        }

        Value::Bytes(b) => {
            buf.push(tags::BYTES);
            encode_bytes_escaped(b, buf);
        }

        Value::Array(items) => {
            buf.push(tags::ARRAY);
            let mut inner = Vec::new();
            for item in items {
                encode_into(item, &mut inner)?;
            }
            encode_bytes_escaped(&inner, buf);
        }
    }
    Ok(())
}

/// Encode a value into a sort-order preserving byte representation.
///
/// Comparing the encoded bytes lexicographically yields the same ordering
/// as [`Value::compare`] on the original values, and values the comparator
/// calls equal encode to equal bytes. The one exception is an int and a
/// float above 2^53 in magnitude whose widened patterns collide: the
/// comparator calls them equal (it only sees the widening) while the
/// encodings stay distinct adjacent keys.
///
/// # Errors
///
/// Returns [`CoreError::Encoding`] if a nested value cannot be encoded.
///
/// # Example
///
/// ```
/// use cascadedb_core::encoding::sortable::encode_sortable;
/// use cascadedb_core::Value;
///
/// let neg = encode_sortable(&Value::Int(-5)).unwrap();
/// let pos = encode_sortable(&Value::Int(5)).unwrap();
///
/// // Negative numbers sort before positive numbers
/// assert!(neg < pos);
/// ```
pub fn encode_sortable(value: &Value) -> Result<Vec<u8>, CoreError> {
    let mut buf = Vec::with_capacity(16);
    encode_into(value, &mut buf)?;
    Ok(buf)
}

/// Encode a value for descending byte order.
///
/// Every byte of the ascending encoding is complemented, so forward
/// iteration of a byte-ordered store visits values from largest to
/// smallest.
///
/// # Errors
///
/// Returns [`CoreError::Encoding`] if the value cannot be encoded.
pub fn encode_sortable_desc(value: &Value) -> Result<Vec<u8>, CoreError> {
    let mut buf = encode_sortable(value)?;
    for byte in &mut buf {
        *byte = !*byte;
    }
    Ok(buf)
}
