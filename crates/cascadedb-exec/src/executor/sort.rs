//! Blocking sort executors.

use std::sync::Arc;

use cascadedb_core::Value;

use crate::block::{InputRange, OutputRow, RegisterId};
use crate::call::Call;
use crate::context::ExecutionContext;
use crate::error::ExecResult;
use crate::executor::{poll_cancellation, Executor, ExecutorState, ExecutorStats};
use crate::sort::{
    ExternalSortConfig, ExternalSortedRowsBackend, MemorySortedRowsBackend, SortComparator,
    SortSpec, SortedRowsBackend, StagedSortedRowsBackend,
};
use cascadedb_storage::StorageEngine;

type BackendFactory = Box<dyn Fn() -> Box<dyn SortedRowsBackend> + Send>;

/// Materializes its whole input run, sorts it, then drains it in order.
///
/// Accumulation is non-blocking in the cooperative sense: while upstream
/// reports more input the executor returns control instead of looping, so
/// `Waiting` sources propagate cleanly.
pub struct SortExecutor {
    backend: Box<dyn SortedRowsBackend>,
    factory: BackendFactory,
    sealed: bool,
    ctx: Arc<ExecutionContext>,
    rows_since_check: usize,
}

impl SortExecutor {
    #[must_use]
    pub fn new(factory: BackendFactory, ctx: Arc<ExecutionContext>) -> Self {
        let backend = factory();
        Self { backend, factory, sealed: false, ctx, rows_since_check: 0 }
    }

    /// A sort holding everything in memory, bounded only by the monitor.
    #[must_use]
    pub fn in_memory(spec: SortSpec, ctx: Arc<ExecutionContext>) -> Self {
        let comparator = Arc::new(SortComparator::new(spec.keys));
        let stable = spec.stable;
        let monitor = Arc::clone(ctx.monitor());
        let factory: BackendFactory = Box::new(move || {
            Box::new(MemorySortedRowsBackend::new(
                Arc::clone(&comparator),
                stable,
                Arc::clone(&monitor),
            ))
        });
        Self::new(factory, ctx)
    }

    /// A sort that buffers up to `memory_limit_rows`/`memory_limit_bytes`
    /// in memory and spills the rest into `engine`.
    #[must_use]
    pub fn with_spill<E>(
        spec: SortSpec,
        ctx: Arc<ExecutionContext>,
        engine: E,
        memory_limit_rows: usize,
        memory_limit_bytes: usize,
        config: ExternalSortConfig,
    ) -> Self
    where
        E: StorageEngine + Clone + 'static,
    {
        let comparator = Arc::new(SortComparator::new(spec.keys.clone()));
        let keys = spec.keys;
        let stable = spec.stable;
        let monitor = Arc::clone(ctx.monitor());
        let factory: BackendFactory = Box::new(move || {
            let memory = MemorySortedRowsBackend::new(
                Arc::clone(&comparator),
                stable,
                Arc::clone(&monitor),
            )
            .with_capacity_limits(memory_limit_rows, memory_limit_bytes);
            let external =
                ExternalSortedRowsBackend::new(engine.clone(), keys.clone(), config.clone());
            Box::new(StagedSortedRowsBackend::new(vec![Box::new(memory), Box::new(external)]))
        });
        Self::new(factory, ctx)
    }

    /// Feeds the input into the backend; `Ok(true)` once the run is
    /// complete and sealed.
    fn accumulate(&mut self, input: &mut InputRange) -> ExecResult<bool> {
        if self.sealed {
            return Ok(true);
        }
        let before = input.count_data_rows();
        let state = self.backend.consume_input_range(input)?;
        poll_cancellation(&self.ctx, &mut self.rows_since_check, before)?;
        if state == ExecutorState::HasMore {
            return Ok(false);
        }
        self.backend.seal()?;
        self.sealed = true;
        Ok(true)
    }
}

impl Executor for SortExecutor {
    fn produce_rows(
        &mut self,
        input: &mut InputRange,
        output: &mut OutputRow,
    ) -> ExecResult<(ExecutorState, ExecutorStats, Call)> {
        let stats = ExecutorStats::default();
        if !self.accumulate(input)? {
            return Ok((ExecutorState::HasMore, stats, Call::unbounded()));
        }
        while !output.is_full() && self.backend.has_more() {
            self.backend.produce_output_row(output)?;
            poll_cancellation(&self.ctx, &mut self.rows_since_check, 1)?;
        }
        let state = if self.backend.has_more() { ExecutorState::HasMore } else { ExecutorState::Done };
        Ok((state, stats, Call::unbounded()))
    }

    fn skip_rows_range(
        &mut self,
        input: &mut InputRange,
        call: &mut Call,
    ) -> ExecResult<(ExecutorState, ExecutorStats, usize, Call)> {
        let stats = ExecutorStats::default();
        if !self.accumulate(input)? {
            return Ok((ExecutorState::HasMore, stats, 0, Call::unbounded()));
        }
        let mut skipped = 0;
        while call.should_skip() && self.backend.has_more() {
            skipped += self.backend.skip_output_row()?;
            call.did_skip(1);
            poll_cancellation(&self.ctx, &mut self.rows_since_check, 1)?;
        }
        let state = if self.backend.has_more() { ExecutorState::HasMore } else { ExecutorState::Done };
        Ok((state, stats, skipped, Call::unbounded()))
    }

    fn reset(&mut self) -> ExecResult<()> {
        self.backend = (self.factory)();
        self.sealed = false;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "SortExecutor"
    }
}

/// Sorts within contiguous groups of pre-clustered input.
///
/// The caller guarantees that rows with equal grouping registers arrive
/// adjacently; only one group is buffered at a time, in a fresh in-memory
/// backend per group.
pub struct GroupedSortExecutor {
    group_registers: Vec<RegisterId>,
    comparator: Arc<SortComparator>,
    stable: bool,
    ctx: Arc<ExecutionContext>,
    backend: Option<MemorySortedRowsBackend>,
    current_group: Option<Vec<Value>>,
    draining: bool,
    rows_since_check: usize,
}

impl GroupedSortExecutor {
    #[must_use]
    pub fn new(group_registers: Vec<RegisterId>, spec: SortSpec, ctx: Arc<ExecutionContext>) -> Self {
        Self {
            group_registers,
            comparator: Arc::new(SortComparator::new(spec.keys)),
            stable: spec.stable,
            ctx,
            backend: None,
            current_group: None,
            draining: false,
            rows_since_check: 0,
        }
    }

    fn group_key(&self, row: &crate::block::InputRow<'_>) -> Vec<Value> {
        self.group_registers.iter().map(|reg| row.value(*reg).clone()).collect()
    }

    fn same_group(&self, key: &[Value]) -> bool {
        self.current_group.as_deref().is_some_and(|current| {
            current
                .iter()
                .zip(key)
                .all(|(a, b)| a.compare(b) == std::cmp::Ordering::Equal)
        })
    }

    fn seal_current(&mut self) -> ExecResult<()> {
        if let Some(backend) = self.backend.as_mut() {
            backend.seal()?;
            self.draining = true;
        }
        self.current_group = None;
        Ok(())
    }
}

impl Executor for GroupedSortExecutor {
    fn produce_rows(
        &mut self,
        input: &mut InputRange,
        output: &mut OutputRow,
    ) -> ExecResult<(ExecutorState, ExecutorStats, Call)> {
        let stats = ExecutorStats::default();
        loop {
            if self.draining {
                let backend = self.backend.as_mut().ok_or_else(|| {
                    crate::error::ExecError::Expression("draining without a sort buffer".into())
                })?;
                while !output.is_full() && backend.has_more() {
                    backend.produce_output_row(output)?;
                    poll_cancellation(&self.ctx, &mut self.rows_since_check, 1)?;
                }
                if backend.has_more() {
                    return Ok((ExecutorState::HasMore, stats, Call::unbounded()));
                }
                self.backend = None;
                self.draining = false;
            }

            let Some(row) = input.peek_data_row() else {
                if input.more_data_rows_upstream() {
                    return Ok((ExecutorState::HasMore, stats, Call::unbounded()));
                }
                // End of the run: flush the final group, if any.
                if self.backend.is_some() {
                    self.seal_current()?;
                    continue;
                }
                return Ok((ExecutorState::Done, stats, Call::unbounded()));
            };

            let key = self.group_key(&row);
            if self.backend.is_some() && !self.same_group(&key) {
                // Group boundary: drain what we have before consuming the
                // next group's first row.
                self.seal_current()?;
                continue;
            }

            let batch = input.current_batch().cloned().ok_or_else(|| {
                crate::error::ExecError::Expression("data row without a batch".into())
            })?;
            let index = row.row_index();
            let backend = self.backend.get_or_insert_with(|| {
                MemorySortedRowsBackend::new(
                    Arc::clone(&self.comparator),
                    self.stable,
                    Arc::clone(self.ctx.monitor()),
                )
            });
            backend.push_row(&batch, index)?;
            self.current_group = Some(key);
            input.advance();
            poll_cancellation(&self.ctx, &mut self.rows_since_check, 1)?;
        }
    }

    fn skip_rows_range(
        &mut self,
        input: &mut InputRange,
        call: &mut Call,
    ) -> ExecResult<(ExecutorState, ExecutorStats, usize, Call)> {
        // Same accumulation as produce_rows; drained rows are discarded
        // through the backend instead of written out.
        let mut skipped = 0;
        loop {
            if !call.should_skip() {
                return Ok((ExecutorState::HasMore, ExecutorStats::default(), skipped, Call::unbounded()));
            }
            if self.draining {
                let backend = self.backend.as_mut().ok_or_else(|| {
                    crate::error::ExecError::Expression("draining without a sort buffer".into())
                })?;
                while call.should_skip() && backend.has_more() {
                    skipped += backend.skip_output_row()?;
                    call.did_skip(1);
                    poll_cancellation(&self.ctx, &mut self.rows_since_check, 1)?;
                }
                if backend.has_more() {
                    continue;
                }
                self.backend = None;
                self.draining = false;
            }

            let Some(row) = input.peek_data_row() else {
                if input.more_data_rows_upstream() {
                    return Ok((ExecutorState::HasMore, ExecutorStats::default(), skipped, Call::unbounded()));
                }
                if self.backend.is_some() {
                    self.seal_current()?;
                    continue;
                }
                return Ok((ExecutorState::Done, ExecutorStats::default(), skipped, Call::unbounded()));
            };

            let key = self.group_key(&row);
            if self.backend.is_some() && !self.same_group(&key) {
                self.seal_current()?;
                continue;
            }

            let batch = input.current_batch().cloned().ok_or_else(|| {
                crate::error::ExecError::Expression("data row without a batch".into())
            })?;
            let index = row.row_index();
            let backend = self.backend.get_or_insert_with(|| {
                MemorySortedRowsBackend::new(
                    Arc::clone(&self.comparator),
                    self.stable,
                    Arc::clone(self.ctx.monitor()),
                )
            });
            backend.push_row(&batch, index)?;
            self.current_group = Some(key);
            input.advance();
            poll_cancellation(&self.ctx, &mut self.rows_since_check, 1)?;
        }
    }

    fn reset(&mut self) -> ExecResult<()> {
        self.backend = None;
        self.current_group = None;
        self.draining = false;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "GroupedSortExecutor"
    }
}
