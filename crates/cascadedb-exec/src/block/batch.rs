//! The item batch: a fixed-shape grid of register values.

use std::collections::BTreeMap;
use std::sync::Arc;

use cascadedb_core::Value;

/// Index of a register (column) within an item batch.
pub type RegisterId = usize;

/// An immutable, shared reference to a finalized item batch.
///
/// Once a batch is behind an `Arc` it has multiple owners and can no longer
/// be mutated; writers always work on a batch they hold exclusively.
pub type SharedItemBatch = Arc<ItemBatch>;

/// A sorted set of register ids.
///
/// Used to describe which registers a stage writes and which it carries
/// through from its input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterSet {
    regs: Vec<RegisterId>,
}

impl RegisterSet {
    /// Creates a set from the given register ids.
    #[must_use]
    pub fn new(mut regs: Vec<RegisterId>) -> Self {
        regs.sort_unstable();
        regs.dedup();
        Self { regs }
    }

    /// The empty set.
    #[must_use]
    pub const fn empty() -> Self {
        Self { regs: Vec::new() }
    }

    /// The set of all registers below `count`.
    #[must_use]
    pub fn all(count: usize) -> Self {
        Self { regs: (0..count).collect() }
    }

    /// Whether `reg` is in the set.
    #[must_use]
    pub fn contains(&self, reg: RegisterId) -> bool {
        self.regs.binary_search(&reg).is_ok()
    }

    /// Iterates the registers in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = RegisterId> + '_ {
        self.regs.iter().copied()
    }

    /// Number of registers in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regs.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regs.is_empty()
    }
}

impl From<Vec<RegisterId>> for RegisterSet {
    fn from(regs: Vec<RegisterId>) -> Self {
        Self::new(regs)
    }
}

/// A fixed-capacity grid of rows by registers.
///
/// The register count is fixed for the lifetime of the batch; rows are
/// committed one at a time up to the capacity chosen at allocation.
///
/// # Shadow rows
///
/// A row may be marked as a *shadow row*: a subquery boundary marker
/// carrying a nesting depth instead of data registers. Within one batch,
/// shadow rows for a nesting level come after all data rows of that level;
/// producers are responsible for maintaining that order.
#[derive(Debug)]
pub struct ItemBatch {
    num_registers: usize,
    capacity: usize,
    /// Committed rows; rows at indices >= num_rows are unwritten slots.
    num_rows: usize,
    /// Row-major storage, `capacity * num_registers` slots.
    values: Vec<Value>,
    /// Shadow row index -> nesting depth.
    shadows: BTreeMap<usize, u64>,
}

impl ItemBatch {
    /// Allocates an empty batch of `capacity` rows by `num_registers`
    /// registers.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn allocate(capacity: usize, num_registers: usize) -> Self {
        assert!(capacity > 0, "batch capacity must be positive");
        Self {
            num_registers,
            capacity,
            num_rows: 0,
            values: vec![Value::Null; capacity * num_registers],
            shadows: BTreeMap::new(),
        }
    }

    /// Builds a fully committed batch from explicit rows. Intended for
    /// pipeline roots and tests.
    ///
    /// # Panics
    ///
    /// Panics if a row's length differs from `num_registers` or `rows` is
    /// empty.
    #[must_use]
    pub fn from_rows(num_registers: usize, rows: Vec<Vec<Value>>) -> Self {
        let mut batch = Self::allocate(rows.len().max(1), num_registers);
        for row in rows {
            assert_eq!(row.len(), num_registers, "row width must match register count");
            let base = batch.num_rows * num_registers;
            for (reg, value) in row.into_iter().enumerate() {
                batch.values[base + reg] = value;
            }
            batch.num_rows += 1;
        }
        batch
    }

    /// Number of committed rows.
    #[must_use]
    pub const fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Number of registers per row.
    #[must_use]
    pub const fn num_registers(&self) -> usize {
        self.num_registers
    }

    /// Maximum number of rows this batch can hold.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the batch holds no committed rows.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    /// The value at (`row`, `reg`) of a committed row.
    ///
    /// # Panics
    ///
    /// Panics if `reg` is out of bounds, or (in debug builds) if `row` has
    /// not been committed yet.
    #[must_use]
    pub fn value(&self, row: usize, reg: RegisterId) -> &Value {
        debug_assert!(row < self.num_rows, "read of uncommitted row {row} ({} committed)", self.num_rows);
        &self.values[row * self.num_registers + reg]
    }

    /// Writes the value at (`row`, `reg`).
    ///
    /// Only callable while the batch is exclusively owned; shared batches
    /// are immutable by construction.
    pub fn set_value(&mut self, row: usize, reg: RegisterId, value: Value) {
        debug_assert!(row < self.capacity, "row {row} beyond capacity {}", self.capacity);
        self.values[row * self.num_registers + reg] = value;
    }

    /// Commits the in-progress row (the row at index `num_rows`).
    pub(crate) fn commit_row(&mut self) {
        debug_assert!(self.num_rows < self.capacity, "commit beyond batch capacity");
        self.num_rows += 1;
    }

    /// Marks `row` as a shadow row at the given nesting depth.
    pub fn make_shadow_row(&mut self, row: usize, depth: u64) {
        debug_assert!(row < self.capacity);
        self.shadows.insert(row, depth);
    }

    /// Whether `row` is a shadow row.
    #[must_use]
    pub fn is_shadow_row(&self, row: usize) -> bool {
        self.shadows.contains_key(&row)
    }

    /// The nesting depth of `row` if it is a shadow row.
    #[must_use]
    pub fn shadow_depth(&self, row: usize) -> Option<u64> {
        self.shadows.get(&row).copied()
    }

    /// Number of shadow rows at or after `offset`.
    #[must_use]
    pub fn count_shadow_rows_from(&self, offset: usize) -> usize {
        self.shadows.range(offset..).count()
    }

    /// Approximate heap footprint of the batch, for resource accounting.
    #[must_use]
    pub fn memory_usage(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.values.iter().map(Value::memory_usage).sum::<usize>()
            + self.shadows.len() * (std::mem::size_of::<usize>() + std::mem::size_of::<u64>())
    }

    /// Clones all register values of `row` into a vector.
    ///
    /// Used when a row has to leave its batch, e.g. to be serialized into
    /// the spill store.
    #[must_use]
    pub fn row_values(&self, row: usize) -> Vec<Value> {
        (0..self.num_registers).map(|reg| self.value(row, reg).clone()).collect()
    }
}
