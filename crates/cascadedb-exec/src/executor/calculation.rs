//! Per-row calculation of one output register.

use cascadedb_core::Value;

use crate::block::{InputRange, InputRow, OutputRow, RegisterId};
use crate::call::Call;
use crate::error::ExecResult;
use crate::executor::{Executor, ExecutorState, ExecutorStats, RowExpression};

/// How a calculation obtains its value.
pub enum Calculation {
    /// Copy another register verbatim.
    Reference(RegisterId),
    /// Evaluate an expression over the row.
    Expression(Box<dyn RowExpression>),
}

impl Calculation {
    fn evaluate(&self, row: &InputRow<'_>) -> ExecResult<Value> {
        match self {
            Self::Reference(reg) => Ok(row.value(*reg).clone()),
            Self::Expression(expr) => expr.evaluate(row),
        }
    }
}

/// Writes one computed register per input row, carrying the rest through.
pub struct CalculationExecutor {
    calculation: Calculation,
    out_register: RegisterId,
}

impl CalculationExecutor {
    #[must_use]
    pub fn new(calculation: Calculation, out_register: RegisterId) -> Self {
        Self { calculation, out_register }
    }

    fn run_state(input: &InputRange) -> ExecutorState {
        if input.more_data_rows_upstream() {
            ExecutorState::HasMore
        } else {
            ExecutorState::Done
        }
    }
}

impl Executor for CalculationExecutor {
    fn produce_rows(
        &mut self,
        input: &mut InputRange,
        output: &mut OutputRow,
    ) -> ExecResult<(ExecutorState, ExecutorStats, Call)> {
        while !output.is_full() {
            let Some(row) = input.next_data_row() else { break };
            let value = self.calculation.evaluate(&row)?;
            output.copy_row(&row);
            output.set_value(self.out_register, value);
            output.advance_row();
        }
        Ok((Self::run_state(input), ExecutorStats::default(), Call::unbounded()))
    }

    // Skipped rows never materialize the calculated register.
    fn skip_rows_range(
        &mut self,
        input: &mut InputRange,
        call: &mut Call,
    ) -> ExecResult<(ExecutorState, ExecutorStats, usize, Call)> {
        let mut skipped = 0;
        while call.should_skip() && input.next_data_row().is_some() {
            call.did_skip(1);
            skipped += 1;
        }
        let state = if call.should_skip() { Self::run_state(input) } else { ExecutorState::HasMore };
        Ok((state, ExecutorStats::default(), skipped, Call::unbounded()))
    }

    fn name(&self) -> &'static str {
        "CalculationExecutor"
    }
}
