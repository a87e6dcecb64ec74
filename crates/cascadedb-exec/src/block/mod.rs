//! Item batches, row views, and input ranges.
//!
//! # Data flow
//!
//! Rows move through the pipeline in [`ItemBatch`]es: fixed-capacity grids
//! of rows by registers. A producing stage writes into a batch it owns
//! exclusively through an [`OutputRow`]; once full (or the stage's call is
//! satisfied) the batch is frozen into a [`SharedItemBatch`] and handed
//! downstream, where consumers read it through [`InputRow`] views obtained
//! from an [`InputRange`] cursor.

mod batch;
mod range;
mod rows;

pub use batch::{ItemBatch, RegisterId, RegisterSet, SharedItemBatch};
pub use range::InputRange;
pub use rows::{InputRow, OutputRow};
