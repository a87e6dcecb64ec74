//! Disk-backed sorted-row storage over an ordered key-value store.
//!
//! Rows are written under keys whose byte-lexicographic order equals the
//! declared sort order, so the store's native iteration drains them
//! sorted. Each backend instance owns a key partition and cleans it up on
//! drop.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use cascadedb_core::encoding::{encode_sortable, encode_sortable_desc};
use cascadedb_core::Value;
use cascadedb_storage::{Cursor, StorageEngine, StorageError, Transaction};

use crate::block::{InputRange, InputRow, ItemBatch, OutputRow};
use crate::error::ExecResult;
use crate::executor::ExecutorState;
use crate::sort::{SortRegister, SortedRowsBackend};

/// Table holding spilled sort runs, shared by all partitions.
const SPILL_TABLE: &str = "sort_spill";

/// Order tag appended after each encoded column.
const TAG_ASCENDING: u8 = b'1';
const TAG_DESCENDING: u8 = b'0';

static NEXT_PARTITION: AtomicU64 = AtomicU64::new(0);

/// Tuning knobs for the external backend.
#[derive(Debug, Clone)]
pub struct ExternalSortConfig {
    /// Pending writes are flushed once they exceed this many bytes.
    pub flush_threshold_bytes: usize,
    /// Total bytes the backend may spill; 0 means unlimited.
    pub max_spilled_bytes: usize,
}

impl Default for ExternalSortConfig {
    fn default() -> Self {
        Self { flush_threshold_bytes: 4 * 1024 * 1024, max_spilled_bytes: 0 }
    }
}

/// Sorted-row storage that spills to a [`StorageEngine`].
///
/// Keys are `[partition][col bytes + order tag]*[insertion seq]`; the
/// descending encoding complements the column bytes so one ascending scan
/// honors every direction, and the trailing sequence makes equal sort keys
/// drain in insertion order.
pub struct ExternalSortedRowsBackend<E: StorageEngine> {
    engine: E,
    partition: u64,
    keys: Vec<SortRegister>,
    config: ExternalSortConfig,
    next_seq: u64,
    pending: Vec<(Vec<u8>, Vec<u8>)>,
    pending_bytes: usize,
    bytes_flushed: usize,
    sealed: bool,
    drain_keys: Vec<Vec<u8>>,
    cursor: usize,
}

impl<E: StorageEngine> ExternalSortedRowsBackend<E> {
    #[must_use]
    pub fn new(engine: E, keys: Vec<SortRegister>, config: ExternalSortConfig) -> Self {
        Self {
            engine,
            partition: NEXT_PARTITION.fetch_add(1, Ordering::Relaxed),
            keys,
            config,
            next_seq: 0,
            pending: Vec::new(),
            pending_bytes: 0,
            bytes_flushed: 0,
            sealed: false,
            drain_keys: Vec::new(),
            cursor: 0,
        }
    }

    fn partition_bounds(&self) -> ([u8; 8], [u8; 8]) {
        (self.partition.to_be_bytes(), (self.partition + 1).to_be_bytes())
    }

    fn encode_row_key(&self, values: &[Value], seq: u64) -> ExecResult<Vec<u8>> {
        let mut key = Vec::with_capacity(16 + self.keys.len() * 12);
        key.extend_from_slice(&self.partition.to_be_bytes());
        for sort_key in &self.keys {
            let column = &values[sort_key.register];
            if sort_key.ascending {
                key.extend_from_slice(&encode_sortable(column)?);
                key.push(TAG_ASCENDING);
            } else {
                key.extend_from_slice(&encode_sortable_desc(column)?);
                key.push(TAG_DESCENDING);
            }
        }
        key.extend_from_slice(&seq.to_be_bytes());
        Ok(key)
    }

    fn ingest_values(&mut self, values: &[Value]) -> ExecResult<()> {
        debug_assert!(!self.sealed, "ingestion after seal");
        let key = self.encode_row_key(values, self.next_seq)?;
        self.next_seq += 1;
        // bincode round-trips every float bit pattern; a textual format
        // would fold NaN and the infinities into null.
        let payload = bincode::serialize(values)
            .map_err(|e| StorageError::Corruption(format!("row serialization failed: {e}")))?;
        self.pending_bytes += key.len() + payload.len();
        self.pending.push((key, payload));
        if self.pending_bytes >= self.config.flush_threshold_bytes {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> ExecResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut tx = self.engine.begin_write()?;
        for (key, payload) in self.pending.drain(..) {
            tx.put(SPILL_TABLE, &key, &payload)?;
        }
        tx.commit()?;
        self.bytes_flushed += self.pending_bytes;
        self.pending_bytes = 0;
        Ok(())
    }

    fn fetch_row(&self, key: &[u8]) -> ExecResult<Vec<Value>> {
        let tx = self.engine.begin_read()?;
        let payload = tx
            .get(SPILL_TABLE, key)?
            .ok_or_else(|| StorageError::Corruption("spilled row vanished from the store".into()))?;
        let values: Vec<Value> = bincode::deserialize(&payload)
            .map_err(|e| StorageError::Corruption(format!("row deserialization failed: {e}")))?;
        Ok(values)
    }

    /// Total bytes accepted so far, flushed or pending.
    #[must_use]
    pub fn bytes_spilled(&self) -> usize {
        self.bytes_flushed + self.pending_bytes
    }
}

impl<E: StorageEngine> SortedRowsBackend for ExternalSortedRowsBackend<E> {
    fn consume_input_range(&mut self, input: &mut InputRange) -> ExecResult<ExecutorState> {
        while let Some(row) = input.next_data_row() {
            let values = row.values();
            drop(row);
            self.ingest_values(&values)?;
        }
        Ok(if input.more_data_rows_upstream() { ExecutorState::HasMore } else { ExecutorState::Done })
    }

    fn ingest_row(&mut self, row: &InputRow<'_>) -> ExecResult<()> {
        self.ingest_values(&row.values())
    }

    fn has_reached_capacity_limit(&self) -> bool {
        self.config.max_spilled_bytes > 0 && self.bytes_spilled() >= self.config.max_spilled_bytes
    }

    fn seal(&mut self) -> ExecResult<()> {
        debug_assert!(!self.sealed, "seal called twice");
        self.flush()?;
        self.sealed = true;
        let (start, end) = self.partition_bounds();
        let tx = self.engine.begin_read()?;
        let mut cursor = tx.range(SPILL_TABLE, &start, &end)?;
        while let Some((key, _)) = cursor.next()? {
            self.drain_keys.push(key);
        }
        debug!(
            rows = self.drain_keys.len(),
            bytes = self.bytes_flushed,
            "sealed external sort partition"
        );
        Ok(())
    }

    fn has_more(&self) -> bool {
        debug_assert!(self.sealed, "drain before seal");
        self.cursor < self.drain_keys.len()
    }

    fn produce_output_row(&mut self, output: &mut OutputRow) -> ExecResult<()> {
        debug_assert!(self.sealed, "drain before seal");
        debug_assert!(self.cursor < self.drain_keys.len(), "drain past the end");
        let key = self.drain_keys[self.cursor].clone();
        self.cursor += 1;
        let values = self.fetch_row(&key)?;
        output.write_full_row(values);
        Ok(())
    }

    fn skip_output_row(&mut self) -> ExecResult<usize> {
        debug_assert!(self.sealed, "drain before seal");
        if self.cursor < self.drain_keys.len() {
            self.cursor += 1;
            Ok(1)
        } else {
            Ok(0)
        }
    }

    fn spill_over(&mut self, other: &mut dyn SortedRowsBackend) -> ExecResult<()> {
        debug_assert!(!self.sealed, "spill after seal");
        self.flush()?;
        let (start, end) = self.partition_bounds();
        // Replay in insertion order: the sequence trails the key, so the
        // store order has to be re-sorted by it.
        let mut rows = Vec::new();
        {
            let tx = self.engine.begin_read()?;
            let mut cursor = tx.range(SPILL_TABLE, &start, &end)?;
            while let Some((key, payload)) = cursor.next()? {
                let seq_bytes: [u8; 8] = key[key.len() - 8..]
                    .try_into()
                    .map_err(|_| StorageError::Corruption("truncated spill key".into()))?;
                rows.push((u64::from_be_bytes(seq_bytes), payload));
            }
        }
        rows.sort_unstable_by_key(|(seq, _)| *seq);
        for (_, payload) in rows {
            let values: Vec<Value> = bincode::deserialize(&payload)
                .map_err(|e| StorageError::Corruption(format!("row deserialization failed: {e}")))?;
            let batch = ItemBatch::from_rows(values.len(), vec![values]);
            let batch = std::sync::Arc::new(batch);
            other.ingest_row(&InputRow::new(&batch, 0))?;
        }
        let mut tx = self.engine.begin_write()?;
        tx.delete_range(SPILL_TABLE, &start, &end)?;
        tx.commit()?;
        self.next_seq = 0;
        self.bytes_flushed = 0;
        Ok(())
    }
}

impl<E: StorageEngine> Drop for ExternalSortedRowsBackend<E> {
    fn drop(&mut self) {
        let (start, end) = self.partition_bounds();
        let cleanup = self
            .engine
            .begin_write()
            .and_then(|mut tx| tx.delete_range(SPILL_TABLE, &start, &end).map(|_| tx))
            .and_then(|tx| tx.commit());
        if let Err(e) = cleanup {
            warn!(partition = self.partition, error = %e, "failed to clean up spill partition");
        }
    }
}
