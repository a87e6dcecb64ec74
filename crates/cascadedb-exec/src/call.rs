//! The demand descriptor passed down the pipeline.
//!
//! A [`Call`] tells a stage how many rows its consumer wants: how many to
//! skip first (`offset`), how many to produce at most (`limit`), and
//! whether to keep counting discarded rows after a hard limit is reached
//! (`fullcount`). Stages mutate their copy of the call as they satisfy it
//! and report the accumulated skip count back to the consumer.

/// Row limit of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    /// No limit; the consumer wants everything.
    Unbounded,
    /// The consumer wants at most this many rows now, but may ask again.
    Soft(usize),
    /// The consumer will never ask for more than this many rows.
    Hard(usize),
}

impl Limit {
    /// Rows still allowed under this limit; `None` when unbounded.
    #[must_use]
    pub const fn rows(&self) -> Option<usize> {
        match self {
            Self::Unbounded => None,
            Self::Soft(n) | Self::Hard(n) => Some(*n),
        }
    }

    /// Whether this is a hard limit.
    #[must_use]
    pub const fn is_hard(&self) -> bool {
        matches!(self, Self::Hard(_))
    }

    fn consume(&mut self, n: usize) {
        match self {
            Self::Unbounded => {}
            Self::Soft(rows) | Self::Hard(rows) => {
                debug_assert!(*rows >= n, "produced more rows than the limit allowed");
                *rows = rows.saturating_sub(n);
            }
        }
    }
}

/// A demand descriptor: offset, limit, and fullcount flag.
///
/// The call also accumulates the number of rows skipped on its behalf
/// (both offset skips and fullcount skips), which is what the caller is
/// owed as the skip count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Call {
    offset: usize,
    limit: Limit,
    fullcount: bool,
    skipped: usize,
}

impl Call {
    /// A call asking for every row: no offset, no limit, no fullcount.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self { offset: 0, limit: Limit::Unbounded, fullcount: false, skipped: 0 }
    }

    /// Creates a call with the given demand.
    #[must_use]
    pub const fn new(offset: usize, limit: Limit, fullcount: bool) -> Self {
        Self { offset, limit, fullcount, skipped: 0 }
    }

    /// Rows still to be skipped before any row is produced.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// The remaining limit.
    #[must_use]
    pub const fn limit(&self) -> Limit {
        self.limit
    }

    /// Whether discarded rows past a hard limit must still be counted.
    #[must_use]
    pub const fn needs_fullcount(&self) -> bool {
        self.fullcount
    }

    /// Whether the stage is currently in a skipping phase: either offset
    /// rows remain, or a fullcount drain is due after the limit ran out.
    #[must_use]
    pub fn should_skip(&self) -> bool {
        self.offset > 0 || (self.fullcount && self.limit.rows() == Some(0))
    }

    /// Whether the stage may produce rows right now.
    #[must_use]
    pub fn should_produce(&self) -> bool {
        self.offset == 0 && self.limit.rows().map_or(true, |n| n > 0)
    }

    /// Whether a hard limit has been exhausted and remaining input should
    /// be discarded without counting.
    #[must_use]
    pub fn should_fast_forward(&self) -> bool {
        !self.fullcount && self.offset == 0 && self.limit == Limit::Hard(0)
    }

    /// Records `n` skipped rows, consuming offset first; any excess counts
    /// as fullcount skipping.
    pub fn did_skip(&mut self, n: usize) {
        let from_offset = n.min(self.offset);
        self.offset -= from_offset;
        debug_assert!(
            n == from_offset || self.fullcount || self.limit.rows() == Some(0),
            "skipped rows beyond the offset without a fullcount request"
        );
        self.skipped += n;
    }

    /// Records `n` produced rows against the limit.
    pub fn did_produce(&mut self, n: usize) {
        self.limit.consume(n);
    }

    /// Total rows skipped on behalf of this call so far.
    #[must_use]
    pub const fn skip_count(&self) -> usize {
        self.skipped
    }

    /// A copy of this call carrying `skipped` as its accumulated skip
    /// count. Used to restart a demand for a new subquery run while
    /// keeping the skip total across runs.
    #[must_use]
    pub const fn clone_with_skipped(&self, skipped: usize) -> Self {
        Self { offset: self.offset, limit: self.limit, fullcount: self.fullcount, skipped }
    }
}

impl Default for Call {
    fn default() -> Self {
        Self::unbounded()
    }
}
