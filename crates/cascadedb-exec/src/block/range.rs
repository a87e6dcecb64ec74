//! The input range: a consuming cursor over the current upstream batch.

use super::batch::SharedItemBatch;
use super::rows::InputRow;
use crate::executor::ExecutorState;

/// A cursor over the rows an executor has been handed so far.
///
/// Holds at most one batch at a time together with the upstream's state,
/// so an executor can tell "no rows right now" apart from "no rows ever
/// again". Data rows and shadow rows are consumed through separate
/// accessors; a shadow row acts as a fence that `next_data_row` never
/// crosses.
#[derive(Debug)]
pub struct InputRange {
    batch: Option<SharedItemBatch>,
    offset: usize,
    upstream: ExecutorState,
}

impl InputRange {
    /// An empty range whose upstream may still deliver more batches.
    #[must_use]
    pub fn empty() -> Self {
        Self { batch: None, offset: 0, upstream: ExecutorState::HasMore }
    }

    /// A range positioned at the start of `batch`.
    #[must_use]
    pub fn with_batch(batch: SharedItemBatch, upstream: ExecutorState) -> Self {
        Self { batch: Some(batch), offset: 0, upstream }
    }

    /// Replaces the current batch, resetting the cursor to its first row.
    pub fn replace_batch(&mut self, batch: SharedItemBatch, upstream: ExecutorState) {
        self.batch = Some(batch);
        self.offset = 0;
        self.upstream = upstream;
    }

    /// The upstream's last reported state.
    #[must_use]
    pub fn upstream_state(&self) -> ExecutorState {
        self.upstream
    }

    /// Overrides the upstream state, e.g. when the upstream reports `Done`
    /// without a final batch.
    pub fn set_upstream_state(&mut self, state: ExecutorState) {
        self.upstream = state;
    }

    /// The batch currently under the cursor, if any.
    #[must_use]
    pub fn current_batch(&self) -> Option<&SharedItemBatch> {
        self.batch.as_ref()
    }

    fn row_at_cursor(&self) -> Option<InputRow<'_>> {
        let batch = self.batch.as_deref()?;
        if self.offset < batch.num_rows() {
            Some(InputRow::new(batch, self.offset))
        } else {
            None
        }
    }

    /// Whether a data row is available at the cursor.
    #[must_use]
    pub fn has_data_row(&self) -> bool {
        self.row_at_cursor().is_some_and(|row| !row.is_shadow())
    }

    /// The data row at the cursor without consuming it.
    #[must_use]
    pub fn peek_data_row(&self) -> Option<InputRow<'_>> {
        self.row_at_cursor().filter(|row| !row.is_shadow())
    }

    /// Consumes and returns the data row at the cursor.
    pub fn next_data_row(&mut self) -> Option<InputRow<'_>> {
        if !self.has_data_row() {
            return None;
        }
        let offset = self.offset;
        self.offset += 1;
        let batch = self.batch.as_deref()?;
        Some(InputRow::new(batch, offset))
    }

    /// Advances past the row at the cursor without inspecting it.
    pub fn advance(&mut self) {
        if self.row_at_cursor().is_some() {
            self.offset += 1;
        }
    }

    /// Number of data rows from the cursor up to the next shadow row or
    /// the batch end.
    #[must_use]
    pub fn count_data_rows(&self) -> usize {
        let Some(batch) = self.batch.as_deref() else { return 0 };
        let mut count = 0;
        for row in self.offset..batch.num_rows() {
            if batch.is_shadow_row(row) {
                break;
            }
            count += 1;
        }
        count
    }

    /// Skips all data rows up to the next shadow row or the batch end,
    /// returning how many were skipped.
    pub fn skip_all_remaining_data_rows(&mut self) -> usize {
        let skipped = self.count_data_rows();
        self.offset += skipped;
        skipped
    }

    /// Whether a shadow row is available at the cursor.
    #[must_use]
    pub fn has_shadow_row(&self) -> bool {
        self.row_at_cursor().is_some_and(|row| row.is_shadow())
    }

    /// The shadow row at the cursor without consuming it.
    #[must_use]
    pub fn peek_shadow_row(&self) -> Option<InputRow<'_>> {
        self.row_at_cursor().filter(InputRow::is_shadow)
    }

    /// Consumes and returns the shadow row at the cursor.
    pub fn next_shadow_row(&mut self) -> Option<InputRow<'_>> {
        if !self.has_shadow_row() {
            return None;
        }
        let offset = self.offset;
        self.offset += 1;
        let batch = self.batch.as_deref()?;
        Some(InputRow::new(batch, offset))
    }

    /// Whether the cursor has consumed everything in the current batch.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.row_at_cursor().is_none()
    }

    /// Whether more data rows belonging to the current run can still
    /// arrive from upstream.
    ///
    /// A pending shadow row fences the current run, so nothing upstream
    /// can belong to it.
    #[must_use]
    pub fn more_data_rows_upstream(&self) -> bool {
        self.upstream == ExecutorState::HasMore && !self.has_shadow_row()
    }
}

impl Default for InputRange {
    fn default() -> Self {
        Self::empty()
    }
}
