//! Predicate filtering over data rows.

use crate::block::{InputRange, OutputRow};
use crate::call::Call;
use crate::error::ExecResult;
use crate::executor::{Executor, ExecutorState, ExecutorStats, RowExpression};

/// Passes through the rows whose predicate evaluates truthy; drops the
/// rest and counts them in `rows_filtered`.
pub struct FilterExecutor {
    predicate: Box<dyn RowExpression>,
}

impl FilterExecutor {
    #[must_use]
    pub fn new(predicate: Box<dyn RowExpression>) -> Self {
        Self { predicate }
    }

    fn run_state(input: &InputRange) -> ExecutorState {
        if input.more_data_rows_upstream() {
            ExecutorState::HasMore
        } else {
            ExecutorState::Done
        }
    }
}

impl Executor for FilterExecutor {
    fn produce_rows(
        &mut self,
        input: &mut InputRange,
        output: &mut OutputRow,
    ) -> ExecResult<(ExecutorState, ExecutorStats, Call)> {
        let mut stats = ExecutorStats::default();
        while !output.is_full() {
            let Some(row) = input.next_data_row() else { break };
            if self.predicate.evaluate(&row)?.is_truthy() {
                output.copy_row(&row);
                output.advance_row();
            } else {
                stats.rows_filtered += 1;
            }
        }
        Ok((Self::run_state(input), stats, Call::unbounded()))
    }

    fn skip_rows_range(
        &mut self,
        input: &mut InputRange,
        call: &mut Call,
    ) -> ExecResult<(ExecutorState, ExecutorStats, usize, Call)> {
        let mut stats = ExecutorStats::default();
        let mut skipped = 0;
        while call.should_skip() {
            let Some(row) = input.next_data_row() else { break };
            if self.predicate.evaluate(&row)?.is_truthy() {
                call.did_skip(1);
                skipped += 1;
            } else {
                stats.rows_filtered += 1;
            }
        }
        let state = if call.should_skip() { Self::run_state(input) } else { ExecutorState::HasMore };
        Ok((state, stats, skipped, Call::unbounded()))
    }

    fn name(&self) -> &'static str {
        "FilterExecutor"
    }
}
