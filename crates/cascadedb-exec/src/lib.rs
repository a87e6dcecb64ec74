//! `CascadeDB` Execution
//!
//! A demand-driven, batch-at-a-time query execution pipeline. Stages are
//! [`Executor`]s wrapped in [`ExecutionBlock`]s; the consumer at the
//! bottom issues [`Call`]s describing how many rows it wants, and blocks
//! pull batches from their upstream sources to satisfy them.
//!
//! # Architecture
//!
//! - [`block`] - item batches, row views, and input ranges
//! - [`call`] - the demand descriptor (offset, limit, fullcount)
//! - [`executor`] - the executor contract, the block driver, and the
//!   concrete executors (filter, calculation, enumerate, sort)
//! - [`sort`] - sorted-row storage backends, in memory and spilling
//! - [`resource`] - query-scoped memory accounting
//! - [`context`] - cancellation, batch sizing
//!
//! # Example
//!
//! Sorting a small pipeline end to end:
//!
//! ```
//! use std::sync::Arc;
//! use cascadedb_core::Value;
//! use cascadedb_exec::block::ItemBatch;
//! use cascadedb_exec::call::Call;
//! use cascadedb_exec::context::ExecutionContext;
//! use cascadedb_exec::executor::{
//!     BatchSource, BlockSource, ExecutionBlock, RegisterPlan, SortExecutor, SourceState,
//! };
//! use cascadedb_exec::sort::{SortRegister, SortSpec};
//!
//! # fn main() -> Result<(), cascadedb_exec::error::ExecError> {
//! let batch = Arc::new(ItemBatch::from_rows(
//!     1,
//!     vec![vec![Value::Int(3)], vec![Value::Int(1)], vec![Value::Int(2)]],
//! ));
//! let ctx = Arc::new(ExecutionContext::new());
//! let sort = SortExecutor::in_memory(
//!     SortSpec::new(vec![SortRegister::asc(0)]),
//!     Arc::clone(&ctx),
//! );
//! let mut block = ExecutionBlock::new(
//!     RegisterPlan::passthrough(1),
//!     Box::new(sort),
//!     Box::new(BatchSource::from_batches(vec![batch])),
//!     ctx,
//! );
//!
//! let (state, _skipped, out) = block.execute(Call::unbounded())?;
//! assert_eq!(state, SourceState::Done);
//! let out = out.expect("rows were produced");
//! assert_eq!(out.value(0, 0), &Value::Int(1));
//! # Ok(())
//! # }
//! ```

// Deny unwrap in library code to ensure proper error handling
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod block;
pub mod call;
pub mod context;
pub mod error;
pub mod executor;
pub mod resource;
pub mod sort;

pub use call::{Call, Limit};
pub use context::ExecutionContext;
pub use error::{ExecError, ExecResult};
pub use executor::{ExecutionBlock, Executor, ExecutorState, SourceState};
pub use resource::ResourceMonitor;
