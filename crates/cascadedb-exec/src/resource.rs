//! Query-scoped resource accounting.
//!
//! Every buffer the sort backends grow or shrink is reported to a
//! [`ResourceMonitor`] passed in explicitly at construction. The monitor is
//! scoped to one query; exceeding its ceiling fails that query and nothing
//! else.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{ExecError, ExecResult};

/// Tracks memory attributed to one query.
///
/// Thread-safe so a single query's monitor can be shared across its stages
/// via `Arc`; the pipeline itself runs single-threaded.
#[derive(Debug)]
pub struct ResourceMonitor {
    /// Ceiling in bytes; 0 means unlimited.
    limit: usize,
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl ResourceMonitor {
    /// Creates a monitor with the given ceiling in bytes.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self { limit, current: AtomicUsize::new(0), peak: AtomicUsize::new(0) }
    }

    /// Creates a monitor that never fails an allocation.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::with_limit(0)
    }

    /// Account for `bytes` of additional usage.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::ResourceLimitExceeded`] if the new total would
    /// exceed the ceiling; the usage is not recorded in that case.
    pub fn increase_memory_usage(&self, bytes: usize) -> ExecResult<()> {
        let new = self.current.fetch_add(bytes, Ordering::Relaxed) + bytes;
        if self.limit > 0 && new > self.limit {
            self.current.fetch_sub(bytes, Ordering::Relaxed);
            return Err(ExecError::resource_limit(format!(
                "query memory ({new} bytes requested, {} allowed)",
                self.limit
            )));
        }
        self.peak.fetch_max(new, Ordering::Relaxed);
        Ok(())
    }

    /// Release `bytes` of previously accounted usage.
    pub fn decrease_memory_usage(&self, bytes: usize) {
        let prev = self.current.fetch_sub(bytes, Ordering::Relaxed);
        debug_assert!(prev >= bytes, "released more memory than was accounted");
    }

    /// Currently accounted bytes.
    #[must_use]
    pub fn current(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }

    /// High-water mark of accounted bytes.
    #[must_use]
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Relaxed)
    }
}

impl Default for ResourceMonitor {
    fn default() -> Self {
        Self::unlimited()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_current_and_peak() {
        let monitor = ResourceMonitor::unlimited();
        monitor.increase_memory_usage(100).expect("within limit");
        monitor.increase_memory_usage(50).expect("within limit");
        monitor.decrease_memory_usage(100);

        assert_eq!(monitor.current(), 50);
        assert_eq!(monitor.peak(), 150);
    }

    #[test]
    fn ceiling_is_enforced() {
        let monitor = ResourceMonitor::with_limit(100);
        monitor.increase_memory_usage(80).expect("within limit");

        let err = monitor.increase_memory_usage(30).expect_err("over limit");
        assert!(matches!(err, ExecError::ResourceLimitExceeded { .. }));

        // The failed increase must not change the accounted total
        assert_eq!(monitor.current(), 80);
    }
}
