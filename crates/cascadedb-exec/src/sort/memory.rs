//! In-memory sorted-row storage.

use std::sync::Arc;

use crate::block::{InputRange, InputRow, ItemBatch, OutputRow, SharedItemBatch};
use crate::error::ExecResult;
use crate::executor::ExecutorState;
use crate::resource::ResourceMonitor;
use crate::sort::{SortComparator, SortedRowsBackend};

/// Locates one buffered row without copying it out of its batch.
#[derive(Debug, Clone, Copy)]
struct RowIndex {
    batch: u32,
    row: u32,
}

/// Buffers shared batches and sorts an index over them.
///
/// Rows are never copied at ingestion; the backend keeps the batches alive
/// and sorts compact `(batch, row)` pairs at seal time.
pub struct MemorySortedRowsBackend {
    comparator: Arc<SortComparator>,
    stable: bool,
    batches: Vec<SharedItemBatch>,
    rows: Vec<RowIndex>,
    monitor: Arc<ResourceMonitor>,
    tracked_bytes: usize,
    /// 0 means unlimited.
    max_buffered_rows: usize,
    /// 0 means unlimited.
    max_buffered_bytes: usize,
    sealed: bool,
    cursor: usize,
}

impl MemorySortedRowsBackend {
    #[must_use]
    pub fn new(comparator: Arc<SortComparator>, stable: bool, monitor: Arc<ResourceMonitor>) -> Self {
        Self {
            comparator,
            stable,
            batches: Vec::new(),
            rows: Vec::new(),
            monitor,
            tracked_bytes: 0,
            max_buffered_rows: 0,
            max_buffered_bytes: 0,
            sealed: false,
            cursor: 0,
        }
    }

    /// Caps the buffer at `rows` rows and `bytes` tracked bytes; zero
    /// disables the respective cap.
    #[must_use]
    pub fn with_capacity_limits(mut self, rows: usize, bytes: usize) -> Self {
        self.max_buffered_rows = rows;
        self.max_buffered_bytes = bytes;
        self
    }

    /// Number of buffered rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no rows are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Buffers one row of an already shared batch.
    pub fn push_row(&mut self, batch: &SharedItemBatch, row: usize) -> ExecResult<()> {
        debug_assert!(!self.sealed, "ingestion after seal");
        let batch_idx = match self.batches.last() {
            Some(last) if Arc::ptr_eq(last, batch) => self.batches.len() - 1,
            _ => {
                let bytes = batch.memory_usage();
                self.monitor.increase_memory_usage(bytes)?;
                self.tracked_bytes += bytes;
                self.batches.push(Arc::clone(batch));
                self.batches.len() - 1
            }
        };
        self.rows.push(RowIndex { batch: batch_idx as u32, row: row as u32 });
        Ok(())
    }
}

impl SortedRowsBackend for MemorySortedRowsBackend {
    fn consume_input_range(&mut self, input: &mut InputRange) -> ExecResult<ExecutorState> {
        debug_assert!(!self.sealed, "ingestion after seal");
        if input.has_data_row() {
            let batch = input
                .current_batch()
                .cloned()
                .ok_or_else(|| crate::error::ExecError::Expression("data row without a batch".into()))?;
            while let Some(row) = input.next_data_row() {
                let index = row.row_index();
                drop(row);
                self.push_row(&batch, index)?;
            }
        }
        Ok(if input.more_data_rows_upstream() { ExecutorState::HasMore } else { ExecutorState::Done })
    }

    fn ingest_row(&mut self, row: &InputRow<'_>) -> ExecResult<()> {
        let batch = Arc::new(ItemBatch::from_rows(row.batch().num_registers(), vec![row.values()]));
        self.push_row(&batch, 0)
    }

    fn has_reached_capacity_limit(&self) -> bool {
        (self.max_buffered_rows > 0 && self.rows.len() >= self.max_buffered_rows)
            || (self.max_buffered_bytes > 0 && self.tracked_bytes >= self.max_buffered_bytes)
    }

    fn seal(&mut self) -> ExecResult<()> {
        debug_assert!(!self.sealed, "seal called twice");
        self.sealed = true;
        let batches = &self.batches;
        let comparator = &self.comparator;
        let compare = |a: &RowIndex, b: &RowIndex| {
            comparator.compare_rows(
                &batches[a.batch as usize],
                a.row as usize,
                &batches[b.batch as usize],
                b.row as usize,
            )
        };
        if self.stable {
            self.rows.sort_by(compare);
        } else {
            self.rows.sort_unstable_by(compare);
        }
        Ok(())
    }

    fn has_more(&self) -> bool {
        debug_assert!(self.sealed, "drain before seal");
        self.cursor < self.rows.len()
    }

    fn produce_output_row(&mut self, output: &mut OutputRow) -> ExecResult<()> {
        debug_assert!(self.sealed, "drain before seal");
        debug_assert!(self.cursor < self.rows.len(), "drain past the end");
        let index = self.rows[self.cursor];
        self.cursor += 1;
        let batch = &self.batches[index.batch as usize];
        let row = InputRow::new(batch, index.row as usize);
        output.copy_row(&row);
        output.advance_row();
        Ok(())
    }

    fn skip_output_row(&mut self) -> ExecResult<usize> {
        debug_assert!(self.sealed, "drain before seal");
        if self.cursor < self.rows.len() {
            self.cursor += 1;
            Ok(1)
        } else {
            Ok(0)
        }
    }

    fn spill_over(&mut self, other: &mut dyn SortedRowsBackend) -> ExecResult<()> {
        debug_assert!(!self.sealed, "spill after seal");
        for index in &self.rows {
            let batch = &self.batches[index.batch as usize];
            let row = InputRow::new(batch, index.row as usize);
            other.ingest_row(&row)?;
        }
        self.rows.clear();
        self.batches.clear();
        self.monitor.decrease_memory_usage(self.tracked_bytes);
        self.tracked_bytes = 0;
        Ok(())
    }
}

impl Drop for MemorySortedRowsBackend {
    fn drop(&mut self) {
        self.monitor.decrease_memory_usage(self.tracked_bytes);
        self.tracked_bytes = 0;
    }
}
