//! Chaining of sort backends with overflow between stages.

use tracing::debug;

use crate::block::{InputRange, InputRow, OutputRow};
use crate::error::{ExecError, ExecResult};
use crate::executor::ExecutorState;
use crate::sort::SortedRowsBackend;

/// An ordered chain of backends, e.g. memory first, disk second.
///
/// Rows go to the current stage; when it reaches its capacity its contents
/// spill into the next stage exactly once and ingestion moves there.
/// Overflowing the final stage fails the query.
pub struct StagedSortedRowsBackend {
    stages: Vec<Box<dyn SortedRowsBackend>>,
    current: usize,
}

impl StagedSortedRowsBackend {
    /// # Panics
    ///
    /// Panics if `stages` is empty.
    #[must_use]
    pub fn new(stages: Vec<Box<dyn SortedRowsBackend>>) -> Self {
        assert!(!stages.is_empty(), "a staged backend needs at least one stage");
        Self { stages, current: 0 }
    }

    fn maybe_spill(&mut self) -> ExecResult<()> {
        while self.stages[self.current].has_reached_capacity_limit() {
            if self.current + 1 >= self.stages.len() {
                return Err(ExecError::resource_limit("sort buffer"));
            }
            debug!(stage = self.current, "sort buffer at capacity, spilling to next stage");
            let (head, tail) = self.stages.split_at_mut(self.current + 1);
            head[self.current].spill_over(tail[0].as_mut())?;
            self.current += 1;
        }
        Ok(())
    }

    fn current_stage(&mut self) -> &mut dyn SortedRowsBackend {
        self.stages[self.current].as_mut()
    }
}

impl SortedRowsBackend for StagedSortedRowsBackend {
    fn consume_input_range(&mut self, input: &mut InputRange) -> ExecResult<ExecutorState> {
        let state = self.current_stage().consume_input_range(input)?;
        self.maybe_spill()?;
        Ok(state)
    }

    fn ingest_row(&mut self, row: &InputRow<'_>) -> ExecResult<()> {
        self.current_stage().ingest_row(row)?;
        self.maybe_spill()
    }

    fn has_reached_capacity_limit(&self) -> bool {
        // Intermediate overflow is handled internally; only the final
        // stage's capacity is visible to callers.
        self.current + 1 == self.stages.len() && self.stages[self.current].has_reached_capacity_limit()
    }

    fn seal(&mut self) -> ExecResult<()> {
        self.current_stage().seal()
    }

    fn has_more(&self) -> bool {
        self.stages[self.current].has_more()
    }

    fn produce_output_row(&mut self, output: &mut OutputRow) -> ExecResult<()> {
        self.current_stage().produce_output_row(output)
    }

    fn skip_output_row(&mut self) -> ExecResult<usize> {
        self.current_stage().skip_output_row()
    }

    fn spill_over(&mut self, other: &mut dyn SortedRowsBackend) -> ExecResult<()> {
        self.current_stage().spill_over(other)
    }
}
