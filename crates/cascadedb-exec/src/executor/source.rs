//! Upstream sources that feed batches into an execution block.

use std::collections::VecDeque;

use crate::block::SharedItemBatch;
use crate::call::Call;
use crate::error::ExecResult;
use crate::executor::SourceState;

/// Anything a block can pull batches from: another block, or a pipeline
/// root that injects batches from outside.
pub trait BlockSource {
    /// Requests rows per `call`. Returns the source's state, the number of
    /// rows it skipped on the caller's behalf, and at most one batch.
    ///
    /// A `Waiting` return delivers nothing and loses nothing; the same
    /// call may be re-issued later.
    fn execute(&mut self, call: Call) -> ExecResult<(SourceState, usize, Option<SharedItemBatch>)>;
}

/// An event a [`BatchSource`] replays to its consumer.
#[derive(Debug, Clone)]
pub enum SourceEvent {
    /// Report `Waiting` once, delivering nothing.
    Waiting,
    /// Deliver this batch.
    Batch(SharedItemBatch),
}

/// A pipeline root fed from a queue of prepared events.
///
/// Drives tests and embedding scenarios where batches originate outside
/// the pipeline. `Waiting` events let callers exercise cooperative
/// resumption deterministically.
#[derive(Debug, Default)]
pub struct BatchSource {
    events: VecDeque<SourceEvent>,
}

impl BatchSource {
    #[must_use]
    pub fn new() -> Self {
        Self { events: VecDeque::new() }
    }

    /// Builds a source that delivers the given batches in order.
    #[must_use]
    pub fn from_batches<I>(batches: I) -> Self
    where
        I: IntoIterator<Item = SharedItemBatch>,
    {
        Self { events: batches.into_iter().map(SourceEvent::Batch).collect() }
    }

    /// Appends a batch to the queue.
    pub fn push_batch(&mut self, batch: SharedItemBatch) {
        self.events.push_back(SourceEvent::Batch(batch));
    }

    /// Appends a one-shot `Waiting` report to the queue.
    pub fn push_waiting(&mut self) {
        self.events.push_back(SourceEvent::Waiting);
    }
}

impl BlockSource for BatchSource {
    fn execute(&mut self, _call: Call) -> ExecResult<(SourceState, usize, Option<SharedItemBatch>)> {
        match self.events.pop_front() {
            None => Ok((SourceState::Done, 0, None)),
            Some(SourceEvent::Waiting) => Ok((SourceState::Waiting, 0, None)),
            Some(SourceEvent::Batch(batch)) => {
                let state = if self.events.is_empty() { SourceState::Done } else { SourceState::HasMore };
                Ok((state, 0, Some(batch)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::ItemBatch;
    use cascadedb_core::Value;
    use std::sync::Arc;

    #[test]
    fn batch_source_replays_events_in_order() {
        let batch = Arc::new(ItemBatch::from_rows(1, vec![vec![Value::Int(1)]]));
        let mut source = BatchSource::new();
        source.push_waiting();
        source.push_batch(Arc::clone(&batch));

        let (state, skipped, delivered) = source.execute(Call::unbounded()).unwrap();
        assert_eq!(state, SourceState::Waiting);
        assert_eq!(skipped, 0);
        assert!(delivered.is_none());

        let (state, _, delivered) = source.execute(Call::unbounded()).unwrap();
        assert_eq!(state, SourceState::Done);
        assert!(delivered.is_some());

        let (state, _, delivered) = source.execute(Call::unbounded()).unwrap();
        assert_eq!(state, SourceState::Done);
        assert!(delivered.is_none());
    }
}
