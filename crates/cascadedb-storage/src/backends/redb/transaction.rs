//! Redb transaction and cursor implementations.

use std::collections::VecDeque;
use std::ops::Bound;

use redb::{ReadOnlyTable, ReadTransaction, ReadableTable, TableError, WriteTransaction};

use crate::engine::{Cursor, CursorResult, KeyValue, StorageError, Transaction};

use super::tables::{encode_key, DATA_TABLE};

/// Number of key-value pairs a cursor fetches from the store per refill.
const CURSOR_CHUNK: usize = 256;

type ByteTable = ReadOnlyTable<&'static [u8], &'static [u8]>;

fn table_error(e: TableError) -> StorageError {
    StorageError::Table(e.to_string())
}

fn storage_error(e: redb::StorageError) -> StorageError {
    StorageError::Corruption(e.to_string())
}

/// A transaction over a Redb database.
///
/// Read transactions see a consistent snapshot; write transactions buffer
/// changes until [`Transaction::commit`].
pub enum RedbTransaction {
    /// A read-only snapshot transaction.
    Read(ReadTransaction),
    /// A read-write transaction.
    Write(WriteTransaction),
}

impl RedbTransaction {
    pub(super) fn read(tx: ReadTransaction) -> Self {
        Self::Read(tx)
    }

    pub(super) fn write(tx: WriteTransaction) -> Self {
        Self::Write(tx)
    }

    /// Opens the physical table of a read transaction, treating a
    /// not-yet-created table as absent rather than an error.
    fn read_table(tx: &ReadTransaction) -> Result<Option<ByteTable>, StorageError> {
        match tx.open_table(DATA_TABLE) {
            Ok(table) => Ok(Some(table)),
            Err(TableError::TableDoesNotExist(_)) => Ok(None),
            Err(e) => Err(table_error(e)),
        }
    }
}

impl Transaction for RedbTransaction {
    type Cursor = RedbCursor;

    fn get(&self, table: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let physical = encode_key(table, key);
        match self {
            Self::Read(tx) => match Self::read_table(tx)? {
                Some(t) => Ok(t
                    .get(&physical[..])
                    .map_err(storage_error)?
                    .map(|guard| guard.value().to_vec())),
                None => Ok(None),
            },
            Self::Write(tx) => {
                let t = tx.open_table(DATA_TABLE).map_err(table_error)?;
                // The access guard borrows the table; drop it before `t`
                // by binding the extracted value first.
                let value = t
                    .get(&physical[..])
                    .map_err(storage_error)?
                    .map(|guard| guard.value().to_vec());
                Ok(value)
            }
        }
    }

    fn put(&mut self, table: &str, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        let Self::Write(tx) = self else {
            return Err(StorageError::ReadOnly);
        };
        let physical = encode_key(table, key);
        let mut t = tx.open_table(DATA_TABLE).map_err(table_error)?;
        t.insert(&physical[..], value).map_err(storage_error)?;
        Ok(())
    }

    fn delete_range(
        &mut self,
        table: &str,
        start: &[u8],
        end: &[u8],
    ) -> Result<u64, StorageError> {
        let Self::Write(tx) = self else {
            return Err(StorageError::ReadOnly);
        };
        let start_key = encode_key(table, start);
        let end_key = encode_key(table, end);
        let mut t = tx.open_table(DATA_TABLE).map_err(table_error)?;

        let keys: Vec<Vec<u8>> = {
            let range = t
                .range::<&[u8]>((Bound::Included(&start_key[..]), Bound::Excluded(&end_key[..])))
                .map_err(storage_error)?;
            let mut keys = Vec::new();
            for entry in range {
                let (key, _) = entry.map_err(storage_error)?;
                keys.push(key.value().to_vec());
            }
            keys
        };

        for key in &keys {
            t.remove(&key[..]).map_err(storage_error)?;
        }
        Ok(keys.len() as u64)
    }

    fn range(&self, table: &str, start: &[u8], end: &[u8]) -> Result<Self::Cursor, StorageError> {
        let start_key = encode_key(table, start);
        let end_key = encode_key(table, end);
        let prefix_len = table.len() + 1;

        match self {
            Self::Read(tx) => {
                let Some(t) = Self::read_table(tx)? else {
                    return Ok(RedbCursor::empty(prefix_len));
                };
                Ok(RedbCursor::streaming(t, start_key, end_key, prefix_len))
            }
            // Write transactions snapshot the range eagerly; the sort spill
            // path only scans through committed read transactions.
            Self::Write(tx) => {
                let t = tx.open_table(DATA_TABLE).map_err(table_error)?;
                let range = t
                    .range::<&[u8]>((Bound::Included(&start_key[..]), Bound::Excluded(&end_key[..])))
                    .map_err(storage_error)?;
                let mut buf = VecDeque::new();
                for entry in range {
                    let (key, value) = entry.map_err(storage_error)?;
                    buf.push_back((key.value()[prefix_len..].to_vec(), value.value().to_vec()));
                }
                Ok(RedbCursor::buffered(buf, prefix_len))
            }
        }
    }

    fn commit(self) -> Result<(), StorageError> {
        match self {
            Self::Read(_) => Ok(()),
            Self::Write(tx) => tx.commit().map_err(|e| StorageError::Transaction(e.to_string())),
        }
    }
}

/// A cursor over one logical table's key range.
///
/// Streaming cursors hold the snapshot table and refill an internal buffer
/// in chunks, so iterating a large spilled partition never materializes the
/// whole range at once.
pub struct RedbCursor {
    /// Snapshot table for chunked refills; `None` for buffered cursors.
    table: Option<ByteTable>,
    /// Physical key to resume the next refill from (inclusive).
    next_start: Option<Vec<u8>>,
    /// Physical end key (exclusive).
    end: Vec<u8>,
    /// Length of the logical-table prefix to strip from returned keys.
    prefix_len: usize,
    /// Pairs fetched but not yet returned, with logical keys.
    buf: VecDeque<KeyValue>,
}

impl RedbCursor {
    fn empty(prefix_len: usize) -> Self {
        Self { table: None, next_start: None, end: Vec::new(), prefix_len, buf: VecDeque::new() }
    }

    fn buffered(buf: VecDeque<KeyValue>, prefix_len: usize) -> Self {
        Self { table: None, next_start: None, end: Vec::new(), prefix_len, buf }
    }

    fn streaming(table: ByteTable, start: Vec<u8>, end: Vec<u8>, prefix_len: usize) -> Self {
        Self {
            table: Some(table),
            next_start: Some(start),
            end,
            prefix_len,
            buf: VecDeque::new(),
        }
    }

    fn refill(&mut self) -> Result<(), StorageError> {
        let (Some(table), Some(start)) = (&self.table, self.next_start.take()) else {
            return Ok(());
        };
        let range = table
            .range::<&[u8]>((Bound::Included(&start[..]), Bound::Excluded(&self.end[..])))
            .map_err(storage_error)?;

        let mut last_key: Option<Vec<u8>> = None;
        let mut fetched = 0usize;
        for entry in range {
            let (key, value) = entry.map_err(storage_error)?;
            let physical = key.value().to_vec();
            self.buf.push_back((physical[self.prefix_len..].to_vec(), value.value().to_vec()));
            last_key = Some(physical);
            fetched += 1;
            if fetched >= CURSOR_CHUNK {
                break;
            }
        }

        // Resume strictly after the last returned key on the next refill
        if fetched >= CURSOR_CHUNK {
            if let Some(mut key) = last_key {
                key.push(0x00);
                self.next_start = Some(key);
            }
        }
        Ok(())
    }
}

impl Cursor for RedbCursor {
    fn next(&mut self) -> CursorResult {
        if self.buf.is_empty() {
            self.refill()?;
        }
        Ok(self.buf.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::RedbEngine;
    use crate::engine::StorageEngine;

    fn engine_with_rows(rows: &[(&[u8], &[u8])]) -> RedbEngine {
        let engine = RedbEngine::in_memory().expect("create");
        let mut tx = engine.begin_write().expect("begin");
        for (k, v) in rows {
            tx.put("t", k, v).expect("put");
        }
        tx.commit().expect("commit");
        engine
    }

    #[test]
    fn range_iterates_in_key_order() {
        let engine = engine_with_rows(&[(b"b", b"2"), (b"a", b"1"), (b"c", b"3")]);

        let tx = engine.begin_read().expect("begin");
        let mut cursor = tx.range("t", b"", b"\xff").expect("range");

        let mut keys = Vec::new();
        while let Some((key, _)) = cursor.next().expect("cursor") {
            keys.push(key);
        }
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn range_bounds_are_half_open() {
        let engine = engine_with_rows(&[(b"a", b"1"), (b"b", b"2"), (b"c", b"3")]);

        let tx = engine.begin_read().expect("begin");
        let mut cursor = tx.range("t", b"a", b"c").expect("range");

        let mut keys = Vec::new();
        while let Some((key, _)) = cursor.next().expect("cursor") {
            keys.push(key);
        }
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec()]);
    }

    #[test]
    fn streaming_cursor_crosses_chunk_boundaries() {
        let engine = RedbEngine::in_memory().expect("create");
        let mut tx = engine.begin_write().expect("begin");
        let total = CURSOR_CHUNK * 2 + 17;
        for i in 0..total {
            let key = format!("{i:08}");
            tx.put("t", key.as_bytes(), b"v").expect("put");
        }
        tx.commit().expect("commit");

        let tx = engine.begin_read().expect("begin");
        let mut cursor = tx.range("t", b"", b"\xff").expect("range");
        let mut count = 0;
        let mut prev: Option<Vec<u8>> = None;
        while let Some((key, _)) = cursor.next().expect("cursor") {
            if let Some(p) = &prev {
                assert!(p < &key, "cursor must not repeat or reorder keys");
            }
            prev = Some(key);
            count += 1;
        }
        assert_eq!(count, total);
    }

    #[test]
    fn delete_range_removes_half_open_interval() {
        let engine = engine_with_rows(&[(b"a", b"1"), (b"b", b"2"), (b"c", b"3")]);

        let mut tx = engine.begin_write().expect("begin");
        let removed = tx.delete_range("t", b"a", b"c").expect("delete_range");
        assert_eq!(removed, 2);
        tx.commit().expect("commit");

        let tx = engine.begin_read().expect("begin");
        assert_eq!(tx.get("t", b"a").expect("get"), None);
        assert_eq!(tx.get("t", b"c").expect("get"), Some(b"3".to_vec()));
    }

    #[test]
    fn tables_are_isolated_by_prefix() {
        let engine = RedbEngine::in_memory().expect("create");
        let mut tx = engine.begin_write().expect("begin");
        tx.put("t1", b"k", b"one").expect("put");
        tx.put("t2", b"k", b"two").expect("put");
        tx.commit().expect("commit");

        let tx = engine.begin_read().expect("begin");
        assert_eq!(tx.get("t1", b"k").expect("get"), Some(b"one".to_vec()));
        assert_eq!(tx.get("t2", b"k").expect("get"), Some(b"two".to_vec()));

        let mut cursor = tx.range("t1", b"", b"\xff").expect("range");
        let mut count = 0;
        while cursor.next().expect("cursor").is_some() {
            count += 1;
        }
        assert_eq!(count, 1);
    }

    #[test]
    fn write_transaction_reads_its_own_writes() {
        let engine = RedbEngine::in_memory().expect("create");
        let mut tx = engine.begin_write().expect("begin");
        tx.put("t", b"k", b"v").expect("put");
        assert_eq!(tx.get("t", b"k").expect("get"), Some(b"v".to_vec()));
        assert_eq!(tx.get("t", b"missing").expect("get"), None);
    }

    #[test]
    fn write_on_read_transaction_fails() {
        let engine = RedbEngine::in_memory().expect("create");
        let mut tx = engine.begin_read().expect("begin");
        assert!(matches!(tx.put("t", b"k", b"v"), Err(StorageError::ReadOnly)));
    }
}
