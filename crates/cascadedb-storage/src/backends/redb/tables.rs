//! Redb table definitions and key encoding utilities.
//!
//! Redb requires static table names, so logical table names are mapped onto
//! a single physical table by prefixing them to the key. Because the prefix
//! compares first, each logical table occupies one contiguous, ordered key
//! range of the physical table.

use redb::TableDefinition;

/// The physical table that stores all key-value pairs.
/// Logical table names are prefixed to keys.
pub const DATA_TABLE: TableDefinition<'static, &[u8], &[u8]> =
    TableDefinition::new("cascade_data");

/// Separator byte between table name and key in the encoded key.
pub const KEY_SEPARATOR: u8 = 0x00;

/// Encode a logical table name and key into a physical key.
///
/// The format is: `<table_name><separator><key>`
#[must_use]
pub fn encode_key(table: &str, key: &[u8]) -> Vec<u8> {
    let mut encoded = Vec::with_capacity(table.len() + 1 + key.len());
    encoded.extend_from_slice(table.as_bytes());
    encoded.push(KEY_SEPARATOR);
    encoded.extend_from_slice(key);
    encoded
}

/// Decode a physical key into its logical table name and original key.
///
/// Returns `None` if the key is malformed (missing separator).
#[must_use]
pub fn decode_key(encoded: &[u8]) -> Option<(&str, &[u8])> {
    let sep_pos = encoded.iter().position(|&b| b == KEY_SEPARATOR)?;
    let table = std::str::from_utf8(&encoded[..sep_pos]).ok()?;
    let key = &encoded[sep_pos + 1..];
    Some((table, key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let encoded = encode_key("spill", b"row:1");
        let (table, key) = decode_key(&encoded).expect("well-formed key");
        assert_eq!(table, "spill");
        assert_eq!(key, b"row:1");
    }

    #[test]
    fn prefixing_preserves_per_table_order() {
        let a = encode_key("spill", b"a");
        let b = encode_key("spill", b"b");
        assert!(a < b);
    }
}
