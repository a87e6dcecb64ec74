//! The execution block: demand-driven driver around one executor.

use std::sync::Arc;

use crate::block::{InputRange, ItemBatch, OutputRow, RegisterSet, SharedItemBatch};
use crate::call::{Call, Limit};
use crate::context::ExecutionContext;
use crate::error::ExecResult;
use crate::executor::{BlockSource, Executor, ExecutorState, ExecutorStats, SourceState};

/// Register layout of one block's output batches.
#[derive(Debug, Clone)]
pub struct RegisterPlan {
    /// Total registers per row.
    pub num_registers: usize,
    /// Registers this block's executor writes.
    pub registers_to_write: RegisterSet,
    /// Registers carried through from the input.
    pub registers_to_keep: RegisterSet,
}

impl RegisterPlan {
    /// A plan that carries all `num_registers` input registers through and
    /// writes nothing, as a pure filter does.
    #[must_use]
    pub fn passthrough(num_registers: usize) -> Self {
        Self {
            num_registers,
            registers_to_write: RegisterSet::empty(),
            registers_to_keep: RegisterSet::all(num_registers),
        }
    }

    /// A plan that carries `num_input` registers through and writes the
    /// registers from `num_input` up to `num_registers`.
    #[must_use]
    pub fn extending(num_input: usize, num_registers: usize) -> Self {
        Self {
            num_registers,
            registers_to_write: RegisterSet::new((num_input..num_registers).collect()),
            registers_to_keep: RegisterSet::all(num_input),
        }
    }
}

/// Paused progress carried across a `Waiting` return.
#[derive(Debug)]
struct Resume {
    call: Call,
    template: Call,
    output: Option<OutputRow>,
}

enum Fetch {
    Delivered,
    Waiting,
}

/// Drives one [`Executor`] over an upstream [`BlockSource`].
///
/// The block owns the fetch loop, output allocation, demand accounting,
/// and shadow-row forwarding; the executor only transforms ranges into
/// rows. Because the block implements [`BlockSource`] itself, blocks
/// compose into pipelines.
pub struct ExecutionBlock {
    plan: RegisterPlan,
    executor: Box<dyn Executor>,
    source: Box<dyn BlockSource>,
    input: InputRange,
    executor_done: bool,
    resume: Option<Resume>,
    ctx: Arc<ExecutionContext>,
    stats: ExecutorStats,
}

impl ExecutionBlock {
    pub fn new(
        plan: RegisterPlan,
        executor: Box<dyn Executor>,
        source: Box<dyn BlockSource>,
        ctx: Arc<ExecutionContext>,
    ) -> Self {
        Self {
            plan,
            executor,
            source,
            input: InputRange::empty(),
            executor_done: false,
            resume: None,
            ctx,
            stats: ExecutorStats::default(),
        }
    }

    /// Statistics accumulated over all calls so far.
    #[must_use]
    pub fn stats(&self) -> ExecutorStats {
        self.stats
    }

    fn allocate_output(&self, call: &Call) -> OutputRow {
        let capacity = match call.limit().rows() {
            Some(rows) => rows.clamp(1, self.ctx.batch_size()),
            None => self.ctx.batch_size(),
        };
        OutputRow::new(
            ItemBatch::allocate(capacity, self.plan.num_registers),
            self.plan.registers_to_write.clone(),
            self.plan.registers_to_keep.clone(),
        )
    }

    /// Pulls one batch from upstream, retrying empty `HasMore` responses.
    fn fetch(&mut self, upstream_call: Call) -> ExecResult<Fetch> {
        loop {
            self.ctx.check_cancelled()?;
            let (state, _skipped, batch) = self.source.execute(upstream_call)?;
            match (state, batch) {
                (SourceState::Waiting, _) => return Ok(Fetch::Waiting),
                (SourceState::Done, Some(batch)) => {
                    self.input.replace_batch(batch, ExecutorState::Done);
                    return Ok(Fetch::Delivered);
                }
                (SourceState::Done, None) => {
                    self.input.set_upstream_state(ExecutorState::Done);
                    return Ok(Fetch::Delivered);
                }
                (SourceState::HasMore, Some(batch)) => {
                    self.input.replace_batch(batch, ExecutorState::HasMore);
                    return Ok(Fetch::Delivered);
                }
                (SourceState::HasMore, None) => continue,
            }
        }
    }

    fn upstream_exhausted(&self) -> bool {
        self.input.is_exhausted() && self.input.upstream_state() == ExecutorState::Done
    }

    fn finish(
        &mut self,
        call: &Call,
        output: Option<OutputRow>,
    ) -> (SourceState, usize, Option<SharedItemBatch>) {
        let batch = output.and_then(OutputRow::finalize);
        let state = if self.executor_done && self.upstream_exhausted() {
            SourceState::Done
        } else {
            SourceState::HasMore
        };
        (state, call.skip_count(), batch)
    }
}

impl BlockSource for ExecutionBlock {
    fn execute(&mut self, call: Call) -> ExecResult<(SourceState, usize, Option<SharedItemBatch>)> {
        let (mut call, template, mut output) = match self.resume.take() {
            Some(resume) => (resume.call, resume.template, resume.output),
            None => (call, call, None),
        };

        loop {
            self.ctx.check_cancelled()?;

            if self.executor_done {
                if self.input.has_shadow_row() {
                    // A subquery boundary: forward the marker and restart
                    // the executor for the next run.
                    if output.as_ref().is_some_and(OutputRow::is_full) {
                        return Ok(self.finish(&call, output));
                    }
                    if output.is_none() {
                        output = Some(self.allocate_output(&Call::unbounded()));
                    }
                    let out = output.as_mut().ok_or_else(|| {
                        crate::error::ExecError::Expression("missing output batch".into())
                    })?;
                    let shadow = self.input.next_shadow_row().ok_or_else(|| {
                        crate::error::ExecError::Expression("shadow row vanished".into())
                    })?;
                    out.copy_shadow_row(&shadow);
                    self.executor.reset()?;
                    self.executor_done = false;
                    call = template.clone_with_skipped(call.skip_count());
                    continue;
                }
                if self.upstream_exhausted() {
                    return Ok(self.finish(&call, output));
                }
                if self.input.is_exhausted() {
                    // Only shadow rows can still matter; drain data rows
                    // upstream without counting them.
                    match self.fetch(Call::new(0, Limit::Hard(0), false))? {
                        Fetch::Delivered => {
                            self.input.skip_all_remaining_data_rows();
                            continue;
                        }
                        Fetch::Waiting => {
                            self.resume = Some(Resume { call, template, output });
                            return Ok((SourceState::Waiting, 0, None));
                        }
                    }
                }
                self.input.skip_all_remaining_data_rows();
                continue;
            }

            if call.should_skip() {
                let (state, stats, _, upstream_call) =
                    self.executor.skip_rows_range(&mut self.input, &mut call)?;
                self.stats += stats;
                if state == ExecutorState::Done {
                    self.executor_done = true;
                    continue;
                }
                if !call.should_skip() {
                    continue;
                }
                match self.fetch(upstream_call)? {
                    Fetch::Delivered => continue,
                    Fetch::Waiting => {
                        self.resume = Some(Resume { call, template, output });
                        return Ok((SourceState::Waiting, 0, None));
                    }
                }
            }

            if call.should_produce() {
                if output.is_none() {
                    output = Some(self.allocate_output(&call));
                }
                let out = output.as_mut().ok_or_else(|| {
                    crate::error::ExecError::Expression("missing output batch".into())
                })?;
                let before = out.num_rows_written();
                let (state, stats, upstream_call) =
                    self.executor.produce_rows(&mut self.input, out)?;
                let produced = out.num_rows_written() - before;
                call.did_produce(produced.min(call.limit().rows().unwrap_or(produced)));
                self.stats += stats;
                self.stats.rows_produced += produced as u64;
                if state == ExecutorState::Done {
                    self.executor_done = true;
                    continue;
                }
                if out.is_full() || !call.should_produce() {
                    return Ok(self.finish(&call, output));
                }
                match self.fetch(upstream_call)? {
                    Fetch::Delivered => continue,
                    Fetch::Waiting => {
                        self.resume = Some(Resume { call, template, output });
                        return Ok((SourceState::Waiting, 0, None));
                    }
                }
            }

            if call.should_fast_forward() {
                // A hard limit without fullcount: discard everything up to
                // the next subquery boundary without counting.
                self.input.skip_all_remaining_data_rows();
                if self.input.has_shadow_row() || self.upstream_exhausted() {
                    self.executor_done = true;
                    continue;
                }
                match self.fetch(Call::new(0, Limit::Hard(0), false))? {
                    Fetch::Delivered => continue,
                    Fetch::Waiting => {
                        self.resume = Some(Resume { call, template, output });
                        return Ok((SourceState::Waiting, 0, None));
                    }
                }
            }

            // Soft limit satisfied; the consumer may ask again later.
            return Ok(self.finish(&call, output));
        }
    }
}
