//! Read and write views over single rows of an item batch.

use cascadedb_core::Value;

use super::batch::{ItemBatch, RegisterId, RegisterSet, SharedItemBatch};
use std::sync::Arc;

/// A borrowed, read-only view of one row in an input batch.
#[derive(Debug, Clone, Copy)]
pub struct InputRow<'a> {
    batch: &'a ItemBatch,
    row: usize,
}

impl<'a> InputRow<'a> {
    pub(crate) fn new(batch: &'a ItemBatch, row: usize) -> Self {
        debug_assert!(row < batch.num_rows());
        Self { batch, row }
    }

    /// The value in register `reg`.
    #[must_use]
    pub fn value(&self, reg: RegisterId) -> &'a Value {
        self.batch.value(self.row, reg)
    }

    /// Whether this row is a subquery boundary marker.
    #[must_use]
    pub fn is_shadow(&self) -> bool {
        self.batch.is_shadow_row(self.row)
    }

    /// Nesting depth if this is a shadow row.
    #[must_use]
    pub fn depth(&self) -> Option<u64> {
        self.batch.shadow_depth(self.row)
    }

    /// Index of this row within its batch.
    #[must_use]
    pub fn row_index(&self) -> usize {
        self.row
    }

    /// The batch this row belongs to.
    #[must_use]
    pub(crate) fn batch(&self) -> &'a ItemBatch {
        self.batch
    }

    /// Clones all register values of the row.
    #[must_use]
    pub fn values(&self) -> Vec<Value> {
        self.batch.row_values(self.row)
    }
}

/// A write cursor over an output batch under construction.
///
/// Each row slot accepts exactly one write per output register, plus one
/// copy of the carried-through registers of an input row. A slot only
/// counts as produced once both have happened and the cursor advanced.
#[derive(Debug)]
pub struct OutputRow {
    batch: ItemBatch,
    registers_to_write: RegisterSet,
    registers_to_keep: RegisterSet,
    /// One flag per output register of the current row slot.
    written: Vec<bool>,
    input_copied: bool,
    /// Batch identity and row of the last copied source, for repeated-copy
    /// reuse when one input row fans out to several output rows.
    last_source: Option<(*const ItemBatch, usize)>,
}

impl OutputRow {
    /// Creates a write cursor over a freshly allocated batch.
    #[must_use]
    pub fn new(batch: ItemBatch, registers_to_write: RegisterSet, registers_to_keep: RegisterSet) -> Self {
        let written = vec![false; registers_to_write.len()];
        Self {
            batch,
            registers_to_write,
            registers_to_keep,
            written,
            input_copied: false,
            last_source: None,
        }
    }

    /// Writes `value` into output register `reg` of the current row slot.
    ///
    /// Each output register may be written at most once per row slot.
    pub fn set_value(&mut self, reg: RegisterId, value: Value) {
        let pos = self
            .registers_to_write
            .iter()
            .position(|r| r == reg)
            .unwrap_or_else(|| panic!("register {reg} is not an output register"));
        debug_assert!(!self.written[pos], "register {reg} written twice in one row");
        self.written[pos] = true;
        let row = self.batch.num_rows();
        self.batch.set_value(row, reg, value);
    }

    /// Copies the carried-through registers of `input` into the current
    /// row slot.
    pub fn copy_row(&mut self, input: &InputRow<'_>) {
        debug_assert!(!self.input_copied, "input row copied twice into one slot");
        let source = (input.batch() as *const ItemBatch, input.row_index());
        let row = self.batch.num_rows();
        if self.last_source != Some(source) {
            for reg in self.registers_to_keep.iter() {
                let value = input.value(reg).clone();
                self.batch.set_value(row, reg, value);
            }
        } else {
            // Same source row as the previous slot; the kept registers of
            // the previous row already hold the right values.
            for reg in self.registers_to_keep.iter() {
                let value = self.batch.value(row - 1, reg).clone();
                self.batch.set_value(row, reg, value);
            }
        }
        self.last_source = Some(source);
        self.input_copied = true;
    }

    /// Copies `input`, which must be a shadow row, into the current slot
    /// and commits the slot in one step.
    pub fn copy_shadow_row(&mut self, input: &InputRow<'_>) {
        debug_assert!(input.is_shadow(), "copy_shadow_row on a data row");
        let row = self.batch.num_rows();
        for reg in self.registers_to_keep.iter() {
            let value = input.value(reg).clone();
            self.batch.set_value(row, reg, value);
        }
        let depth = input.depth().unwrap_or(0);
        self.batch.make_shadow_row(row, depth);
        self.last_source = Some((input.batch() as *const ItemBatch, input.row_index()));
        self.input_copied = true;
        // Shadow rows carry no fresh registers; the slot counts as written.
        for flag in &mut self.written {
            *flag = true;
        }
        self.advance_row();
    }

    /// Writes an entire row of register values and commits the slot.
    ///
    /// Used when rows re-enter the pipeline from outside any batch, e.g.
    /// when draining a spill store.
    ///
    /// # Panics
    ///
    /// Panics if `values` does not match the batch's register count.
    pub fn write_full_row(&mut self, values: Vec<Value>) {
        assert_eq!(values.len(), self.batch.num_registers(), "row width mismatch");
        let row = self.batch.num_rows();
        for (reg, value) in values.into_iter().enumerate() {
            self.batch.set_value(row, reg, value);
        }
        for flag in &mut self.written {
            *flag = true;
        }
        self.input_copied = true;
        self.last_source = None;
        self.advance_row();
    }

    /// Whether the current row slot has received all its writes.
    #[must_use]
    pub fn produced(&self) -> bool {
        self.input_copied && self.written.iter().all(|w| *w)
    }

    /// Asserts (in debug builds) that the current slot is fully produced.
    pub fn ensure_produced(&self) {
        debug_assert!(self.produced(), "output row advanced before all registers were written");
    }

    /// Commits the current row slot and moves the cursor to the next one.
    pub fn advance_row(&mut self) {
        self.ensure_produced();
        self.batch.commit_row();
        for flag in &mut self.written {
            *flag = false;
        }
        self.input_copied = false;
    }

    /// Whether every row slot of the batch has been committed.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.batch.num_rows() == self.batch.capacity()
    }

    /// Number of committed rows so far.
    #[must_use]
    pub fn num_rows_written(&self) -> usize {
        self.batch.num_rows()
    }

    /// Remaining uncommitted row slots.
    #[must_use]
    pub fn slots_remaining(&self) -> usize {
        self.batch.capacity() - self.batch.num_rows()
    }

    /// Consumes the cursor, returning the committed batch; `None` when no
    /// row was produced.
    #[must_use]
    pub fn finalize(self) -> Option<SharedItemBatch> {
        if self.batch.is_empty() {
            None
        } else {
            Some(Arc::new(self.batch))
        }
    }
}
