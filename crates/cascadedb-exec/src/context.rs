//! Execution context for a query.
//!
//! The context carries the pieces of per-query state every stage needs:
//! the cooperative cancellation flag, the resource monitor, and batch
//! sizing. It is shared via `Arc` across the stages of one query.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{ExecError, ExecResult};
use crate::resource::ResourceMonitor;

/// Default number of rows per output batch.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Per-query execution state shared by all stages.
#[derive(Debug)]
pub struct ExecutionContext {
    cancelled: AtomicBool,
    monitor: Arc<ResourceMonitor>,
    batch_size: usize,
}

impl ExecutionContext {
    /// Creates a context with default batch size and an unlimited monitor.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            monitor: Arc::new(ResourceMonitor::unlimited()),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Creates a context with the given resource monitor.
    #[must_use]
    pub fn with_monitor(monitor: Arc<ResourceMonitor>) -> Self {
        Self { cancelled: AtomicBool::new(false), monitor, batch_size: DEFAULT_BATCH_SIZE }
    }

    /// Sets the output batch size in rows.
    ///
    /// # Panics
    ///
    /// Panics if `batch_size` is zero.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        assert!(batch_size > 0, "batch size must be positive");
        self.batch_size = batch_size;
        self
    }

    /// Rows per output batch.
    #[must_use]
    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// The query's resource monitor.
    #[must_use]
    pub fn monitor(&self) -> &Arc<ResourceMonitor> {
        &self.monitor
    }

    /// Requests cancellation of the query.
    ///
    /// Cancellation is cooperative: running stages observe the flag at
    /// row-processing granularity and abort with [`ExecError::Cancelled`].
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Checks if the query has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fails with [`ExecError::Cancelled`] if cancellation was requested.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Cancelled`] once [`cancel`](Self::cancel) has
    /// been observed.
    pub fn check_cancelled(&self) -> ExecResult<()> {
        if self.is_cancelled() {
            return Err(ExecError::Cancelled);
        }
        Ok(())
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}
