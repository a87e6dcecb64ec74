//! Redb storage backend.
//!
//! This module provides a storage backend implementation using Redb, a
//! pure-Rust embedded database with byte-ordered keys and ACID transactions.
//!
//! # Example
//!
//! ```
//! use cascadedb_storage::backends::RedbEngine;
//! use cascadedb_storage::{StorageEngine, Transaction};
//!
//! # fn main() -> Result<(), cascadedb_storage::StorageError> {
//! let engine = RedbEngine::in_memory()?;
//!
//! let mut tx = engine.begin_write()?;
//! tx.put("spill", b"a", b"1")?;
//! tx.commit()?;
//!
//! let tx = engine.begin_read()?;
//! assert_eq!(tx.get("spill", b"a")?, Some(b"1".to_vec()));
//! # Ok(())
//! # }
//! ```
//!
//! # In-Memory Databases
//!
//! [`RedbEngine::in_memory`] creates a database that does not persist,
//! useful for tests and for spill stores scoped to a single query.

mod engine;
pub mod tables;
mod transaction;

pub use engine::RedbEngine;
pub use transaction::{RedbCursor, RedbTransaction};
