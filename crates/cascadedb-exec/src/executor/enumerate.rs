//! Expansion of an array register into one row per element.

use crate::block::{InputRange, OutputRow, RegisterId};
use crate::call::Call;
use crate::error::{ExecError, ExecResult};
use crate::executor::{Executor, ExecutorState, ExecutorStats};

/// Emits one output row per element of an array register.
///
/// The element cursor survives output-full boundaries, so a long array can
/// span several output batches without re-reading the input row.
pub struct EnumerateListExecutor {
    list_register: RegisterId,
    out_register: RegisterId,
    /// Next element of the current input row's array.
    current_index: usize,
}

impl EnumerateListExecutor {
    #[must_use]
    pub fn new(list_register: RegisterId, out_register: RegisterId) -> Self {
        Self { list_register, out_register, current_index: 0 }
    }

    fn run_state(input: &InputRange) -> ExecutorState {
        if input.more_data_rows_upstream() {
            ExecutorState::HasMore
        } else {
            ExecutorState::Done
        }
    }
}

impl Executor for EnumerateListExecutor {
    fn produce_rows(
        &mut self,
        input: &mut InputRange,
        output: &mut OutputRow,
    ) -> ExecResult<(ExecutorState, ExecutorStats, Call)> {
        let stats = ExecutorStats::default();
        loop {
            if output.is_full() {
                return Ok((ExecutorState::HasMore, stats, Call::unbounded()));
            }
            let row_consumed = {
                let Some(row) = input.peek_data_row() else { break };
                let items = row.value(self.list_register).as_array().ok_or_else(|| {
                    ExecError::Expression(format!(
                        "expected an array to enumerate, got {}",
                        row.value(self.list_register).type_name()
                    ))
                })?;
                while self.current_index < items.len() && !output.is_full() {
                    output.copy_row(&row);
                    output.set_value(self.out_register, items[self.current_index].clone());
                    output.advance_row();
                    self.current_index += 1;
                }
                self.current_index >= items.len()
            };
            if row_consumed {
                input.advance();
                self.current_index = 0;
            }
        }
        Ok((Self::run_state(input), stats, Call::unbounded()))
    }

    fn skip_rows_range(
        &mut self,
        input: &mut InputRange,
        call: &mut Call,
    ) -> ExecResult<(ExecutorState, ExecutorStats, usize, Call)> {
        let mut skipped = 0;
        while call.should_skip() {
            let remaining = {
                let Some(row) = input.peek_data_row() else { break };
                let items = row.value(self.list_register).as_array().ok_or_else(|| {
                    ExecError::Expression(format!(
                        "expected an array to enumerate, got {}",
                        row.value(self.list_register).type_name()
                    ))
                })?;
                items.len() - self.current_index
            };
            let wanted = if call.offset() > 0 { call.offset().min(remaining) } else { remaining };
            call.did_skip(wanted);
            skipped += wanted;
            self.current_index += wanted;
            if wanted == remaining {
                input.advance();
                self.current_index = 0;
            }
        }
        let state = if call.should_skip() { Self::run_state(input) } else { ExecutorState::HasMore };
        Ok((state, ExecutorStats::default(), skipped, Call::unbounded()))
    }

    fn reset(&mut self) -> ExecResult<()> {
        self.current_index = 0;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "EnumerateListExecutor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{ItemBatch, RegisterSet};
    use crate::call::Limit;
    use cascadedb_core::Value;
    use std::sync::Arc;

    fn array(values: &[i64]) -> Value {
        Value::Array(values.iter().map(|v| Value::Int(*v)).collect())
    }

    fn range(lists: Vec<Value>) -> InputRange {
        let rows = lists.into_iter().map(|list| vec![list, Value::Null]).collect();
        InputRange::with_batch(Arc::new(ItemBatch::from_rows(2, rows)), ExecutorState::Done)
    }

    fn output(capacity: usize) -> OutputRow {
        OutputRow::new(
            ItemBatch::allocate(capacity, 2),
            RegisterSet::new(vec![1]),
            RegisterSet::new(vec![0]),
        )
    }

    fn elements(batch: &ItemBatch) -> Vec<Value> {
        (0..batch.num_rows()).map(|row| batch.value(row, 1).clone()).collect()
    }

    #[test]
    fn expands_each_array_into_rows() {
        let mut input = range(vec![array(&[1, 2]), array(&[]), array(&[3])]);
        let mut out = output(10);
        let mut exec = EnumerateListExecutor::new(0, 1);

        let (state, _, _) = exec.produce_rows(&mut input, &mut out).unwrap();
        assert_eq!(state, ExecutorState::Done);
        let batch = out.finalize().unwrap();
        assert_eq!(elements(&batch), vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn resumes_mid_array_after_output_fills_up() {
        let mut input = range(vec![array(&[1, 2, 3])]);
        let mut exec = EnumerateListExecutor::new(0, 1);

        let mut out = output(2);
        let (state, _, _) = exec.produce_rows(&mut input, &mut out).unwrap();
        assert_eq!(state, ExecutorState::HasMore);
        assert_eq!(out.num_rows_written(), 2);

        let mut out = output(2);
        let (state, _, _) = exec.produce_rows(&mut input, &mut out).unwrap();
        assert_eq!(state, ExecutorState::Done);
        let batch = out.finalize().unwrap();
        assert_eq!(elements(&batch), vec![Value::Int(3)]);
    }

    #[test]
    fn skip_counts_elements_not_input_rows() {
        let mut input = range(vec![array(&[1, 2, 3]), array(&[4])]);
        let mut exec = EnumerateListExecutor::new(0, 1);
        let mut call = Call::new(2, Limit::Unbounded, false);

        let (_, _, skipped, _) = exec.skip_rows_range(&mut input, &mut call).unwrap();
        assert_eq!(skipped, 2);

        let mut out = output(10);
        exec.produce_rows(&mut input, &mut out).unwrap();
        let batch = out.finalize().unwrap();
        assert_eq!(elements(&batch), vec![Value::Int(3), Value::Int(4)]);
    }

    #[test]
    fn non_array_register_is_an_error() {
        let mut input = range(vec![Value::Int(1)]);
        let mut exec = EnumerateListExecutor::new(0, 1);
        let mut out = output(10);
        assert!(matches!(
            exec.produce_rows(&mut input, &mut out),
            Err(ExecError::Expression(_))
        ));
    }
}
