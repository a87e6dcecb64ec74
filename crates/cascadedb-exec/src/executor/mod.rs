//! The executor contract and the block driver around it.
//!
//! An [`Executor`] implements one stage of a pipeline as a pair of
//! operations over an [`InputRange`]: `produce_rows` writes output rows,
//! `skip_rows_range` discards them while still counting. Executors never
//! fetch their own input; the surrounding [`ExecutionBlock`] pulls batches
//! from upstream and hands them over as ranges.

mod block;
mod calculation;
mod constrained_sort;
mod enumerate;
mod filter;
mod sort;
mod source;

pub use block::{ExecutionBlock, RegisterPlan};
pub use calculation::{Calculation, CalculationExecutor};
pub use constrained_sort::ConstrainedSortExecutor;
pub use enumerate::EnumerateListExecutor;
pub use filter::FilterExecutor;
pub use sort::{GroupedSortExecutor, SortExecutor};
pub use source::{BatchSource, BlockSource, SourceEvent};

use std::ops::AddAssign;

use cascadedb_core::Value;

use crate::block::{InputRange, InputRow, OutputRow};
use crate::call::Call;
use crate::context::ExecutionContext;
use crate::error::ExecResult;

/// How often row-loop code polls for cancellation, in rows.
pub const CANCELLATION_CHECK_INTERVAL: usize = 1024;

/// Counts `rows` against `counter` and polls the cancellation flag once
/// the interval is reached.
///
/// # Errors
///
/// Returns [`ExecError::Cancelled`](crate::error::ExecError::Cancelled)
/// once the flag has been observed.
pub(crate) fn poll_cancellation(
    ctx: &ExecutionContext,
    counter: &mut usize,
    rows: usize,
) -> ExecResult<()> {
    *counter += rows;
    if *counter >= CANCELLATION_CHECK_INTERVAL {
        *counter = 0;
        ctx.check_cancelled()?;
    }
    Ok(())
}

/// Progress state of an executor or upstream stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    /// More output may follow for the current call.
    HasMore,
    /// The stage has produced everything it ever will for this run.
    Done,
}

/// Progress state reported by a block to its downstream consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    /// No rows are available right now; calling again later may succeed.
    /// No progress is lost by the early return.
    Waiting,
    /// Rows were delivered and more may follow.
    HasMore,
    /// The final rows have been delivered.
    Done,
}

/// Per-call execution statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutorStats {
    /// Rows written to the output.
    pub rows_produced: u64,
    /// Rows dropped by a predicate.
    pub rows_filtered: u64,
}

impl AddAssign for ExecutorStats {
    fn add_assign(&mut self, rhs: Self) {
        self.rows_produced += rhs.rows_produced;
        self.rows_filtered += rhs.rows_filtered;
    }
}

/// A row-level expression, evaluated against the registers of one row.
pub trait RowExpression: Send {
    fn evaluate(&self, row: &InputRow<'_>) -> ExecResult<Value>;
}

impl<F> RowExpression for F
where
    F: Fn(&InputRow<'_>) -> ExecResult<Value> + Send,
{
    fn evaluate(&self, row: &InputRow<'_>) -> ExecResult<Value> {
        self(row)
    }
}

/// One stage of a pipeline.
///
/// Both operations consume from `input` and return, besides their own
/// state, the call describing what they want from upstream next. Returning
/// `HasMore` with rows still wanted makes the block fetch another batch
/// and call again; state carried in `self` bridges the calls.
pub trait Executor {
    /// Produces rows into `output` until the output is full, the input is
    /// exhausted, or the stage finishes.
    fn produce_rows(
        &mut self,
        input: &mut InputRange,
        output: &mut OutputRow,
    ) -> ExecResult<(ExecutorState, ExecutorStats, Call)>;

    /// Skips rows the downstream asked to discard, returning how many
    /// were skipped.
    fn skip_rows_range(
        &mut self,
        input: &mut InputRange,
        call: &mut Call,
    ) -> ExecResult<(ExecutorState, ExecutorStats, usize, Call)>;

    /// Resets per-run state between subquery invocations.
    ///
    /// Called when a shadow row closes the current run; the next data rows
    /// belong to a fresh run of the same stage.
    fn reset(&mut self) -> ExecResult<()> {
        Ok(())
    }

    /// Stage name for logs and diagnostics.
    fn name(&self) -> &'static str;
}
