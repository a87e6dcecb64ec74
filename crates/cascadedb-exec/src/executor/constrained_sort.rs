//! Bounded top-K sorting.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use cascadedb_core::Value;

use crate::block::{InputRange, OutputRow};
use crate::call::Call;
use crate::context::ExecutionContext;
use crate::error::ExecResult;
use crate::executor::{poll_cancellation, Executor, ExecutorState, ExecutorStats};
use crate::sort::SortComparator;

/// One heap resident: a materialized row plus its insertion sequence.
struct HeapEntry {
    values: Vec<Value>,
    seq: u64,
    comparator: Arc<SortComparator>,
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.comparator
            .compare_values(&self.values, &other.values)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

/// Sorts under a hard limit of `k` rows using a bounded heap.
///
/// Holds at most `k` rows at any time; rows past the heap's worst entry
/// are discarded on arrival. The produced rows equal what a full sort
/// followed by taking the first `k` would produce, up to the order of
/// equal rows.
pub struct ConstrainedSortExecutor {
    comparator: Arc<SortComparator>,
    k: usize,
    heap: BinaryHeap<HeapEntry>,
    next_seq: u64,
    rows_seen: usize,
    sealed: bool,
    drained: Vec<Vec<Value>>,
    cursor: usize,
    /// Rows discarded at the heap boundary, owed to a fullcount drain.
    discarded: usize,
    ctx: Arc<ExecutionContext>,
    rows_since_check: usize,
}

impl ConstrainedSortExecutor {
    #[must_use]
    pub fn new(comparator: Arc<SortComparator>, k: usize, ctx: Arc<ExecutionContext>) -> Self {
        Self {
            comparator,
            k,
            heap: BinaryHeap::new(),
            next_seq: 0,
            rows_seen: 0,
            sealed: false,
            drained: Vec::new(),
            cursor: 0,
            discarded: 0,
            ctx,
            rows_since_check: 0,
        }
    }

    /// Rows observed on the input so far.
    #[must_use]
    pub fn rows_seen(&self) -> usize {
        self.rows_seen
    }

    fn accumulate(&mut self, input: &mut InputRange) -> ExecResult<bool> {
        if self.sealed {
            return Ok(true);
        }
        while let Some(row) = input.next_data_row() {
            self.rows_seen += 1;
            if self.k > 0 {
                self.heap.push(HeapEntry {
                    values: row.values(),
                    seq: self.next_seq,
                    comparator: Arc::clone(&self.comparator),
                });
                self.next_seq += 1;
            }
            if self.heap.len() > self.k {
                self.heap.pop();
            }
            poll_cancellation(&self.ctx, &mut self.rows_since_check, 1)?;
        }
        if input.more_data_rows_upstream() {
            return Ok(false);
        }
        let entries = std::mem::take(&mut self.heap).into_sorted_vec();
        self.drained = entries.into_iter().map(|entry| entry.values).collect();
        self.discarded = self.rows_seen - self.drained.len();
        self.sealed = true;
        Ok(true)
    }

    fn has_more(&self) -> bool {
        self.cursor < self.drained.len()
    }
}

impl Executor for ConstrainedSortExecutor {
    fn produce_rows(
        &mut self,
        input: &mut InputRange,
        output: &mut OutputRow,
    ) -> ExecResult<(ExecutorState, ExecutorStats, Call)> {
        let stats = ExecutorStats::default();
        if !self.accumulate(input)? {
            return Ok((ExecutorState::HasMore, stats, Call::unbounded()));
        }
        while !output.is_full() && self.has_more() {
            let values = self.drained[self.cursor].clone();
            self.cursor += 1;
            output.write_full_row(values);
            poll_cancellation(&self.ctx, &mut self.rows_since_check, 1)?;
        }
        let state = if self.has_more() { ExecutorState::HasMore } else { ExecutorState::Done };
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
        while call.should_skip() && self.has_more() {
            self.cursor += 1;
            call.did_skip(1);
            skipped += 1;
            poll_cancellation(&self.ctx, &mut self.rows_since_check, 1)?;
        }
        // A fullcount drain also reports the rows that never entered the
        // heap.
        if call.should_skip() && !self.has_more() && call.needs_fullcount() && self.discarded > 0 {
            call.did_skip(self.discarded);
            skipped += self.discarded;
            self.discarded = 0;
        }
        let state = if self.has_more() { ExecutorState::HasMore } else { ExecutorState::Done };
        Ok((state, stats, skipped, Call::unbounded()))
    }

    fn reset(&mut self) -> ExecResult<()> {
        self.heap.clear();
        self.next_seq = 0;
        self.rows_seen = 0;
        self.sealed = false;
        self.drained.clear();
        self.cursor = 0;
        self.discarded = 0;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "ConstrainedSortExecutor"
    }
}
