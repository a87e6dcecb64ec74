//! Sorted-row storage backends.
//!
//! A sort executor never holds rows itself; it feeds them into a
//! [`SortedRowsBackend`] and later drains them back in order. Backends
//! follow a strict lifecycle: rows go in while *consuming*, [`seal`]
//! switches to *draining*, and no ingestion is allowed afterwards.
//!
//! [`seal`]: SortedRowsBackend::seal

mod external;
mod memory;
mod staged;

pub use external::{ExternalSortConfig, ExternalSortedRowsBackend};
pub use memory::MemorySortedRowsBackend;
pub use staged::StagedSortedRowsBackend;

use std::cmp::Ordering;

use cascadedb_core::Value;

use crate::block::{InputRange, InputRow, ItemBatch, OutputRow, RegisterId};
use crate::error::ExecResult;
use crate::executor::ExecutorState;

/// One sort key: a register and a direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortRegister {
    pub register: RegisterId,
    pub ascending: bool,
}

impl SortRegister {
    #[must_use]
    pub const fn asc(register: RegisterId) -> Self {
        Self { register, ascending: true }
    }

    #[must_use]
    pub const fn desc(register: RegisterId) -> Self {
        Self { register, ascending: false }
    }
}

/// A full sort specification: keys in significance order plus stability.
#[derive(Debug, Clone)]
pub struct SortSpec {
    pub keys: Vec<SortRegister>,
    pub stable: bool,
}

impl SortSpec {
    #[must_use]
    pub fn new(keys: Vec<SortRegister>) -> Self {
        Self { keys, stable: false }
    }

    #[must_use]
    pub fn stable(keys: Vec<SortRegister>) -> Self {
        Self { keys, stable: true }
    }
}

/// Multi-key row comparator over [`Value::compare`].
#[derive(Debug, Clone)]
pub struct SortComparator {
    keys: Vec<SortRegister>,
}

impl SortComparator {
    #[must_use]
    pub fn new(keys: Vec<SortRegister>) -> Self {
        Self { keys }
    }

    /// Compares two rows given as full value slices.
    #[must_use]
    pub fn compare_values(&self, a: &[Value], b: &[Value]) -> Ordering {
        for key in &self.keys {
            let ord = a[key.register].compare(&b[key.register]);
            let ord = if key.ascending { ord } else { ord.reverse() };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// Compares two rows in place inside their batches.
    #[must_use]
    pub fn compare_rows(
        &self,
        a_batch: &ItemBatch,
        a_row: usize,
        b_batch: &ItemBatch,
        b_row: usize,
    ) -> Ordering {
        for key in &self.keys {
            let ord = a_batch.value(a_row, key.register).compare(b_batch.value(b_row, key.register));
            let ord = if key.ascending { ord } else { ord.reverse() };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// The keys this comparator orders by.
    #[must_use]
    pub fn keys(&self) -> &[SortRegister] {
        &self.keys
    }
}

/// Storage for rows awaiting a sorted drain.
pub trait SortedRowsBackend {
    /// Ingests all data rows of the current run from `input`, returning
    /// whether more input for the run may follow.
    fn consume_input_range(&mut self, input: &mut InputRange) -> ExecResult<ExecutorState>;

    /// Ingests one row. Used by spill transfers and grouped sorting.
    fn ingest_row(&mut self, row: &InputRow<'_>) -> ExecResult<()>;

    /// Whether this backend is at its configured capacity and further
    /// rows should go elsewhere.
    fn has_reached_capacity_limit(&self) -> bool;

    /// Ends ingestion and orders the stored rows. Called exactly once.
    fn seal(&mut self) -> ExecResult<()>;

    /// Whether sealed rows remain to be drained.
    fn has_more(&self) -> bool;

    /// Writes the next row in sort order into `output`.
    fn produce_output_row(&mut self, output: &mut OutputRow) -> ExecResult<()>;

    /// Discards the next row in sort order, returning 1 if a row was
    /// discarded and 0 if the backend is exhausted.
    fn skip_output_row(&mut self) -> ExecResult<usize>;

    /// Moves every stored row into `other`, in insertion order, leaving
    /// this backend empty. Only valid before [`seal`](Self::seal).
    fn spill_over(&mut self, other: &mut dyn SortedRowsBackend) -> ExecResult<()>;
}
