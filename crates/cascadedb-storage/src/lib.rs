//! `CascadeDB` Storage
//!
//! This crate provides the ordered key-value storage abstraction used by the
//! `CascadeDB` execution pipeline, most importantly as the persistent store
//! behind the external (spilling) sort backend.
//!
//! # Overview
//!
//! The storage layer exposes a transactional key-value interface with
//! byte-lexicographic key ordering. Backends implement the traits; consumers
//! stay backend-agnostic.
//!
//! # Core Traits
//!
//! - [`StorageEngine`] - The main entry point for storage operations
//! - [`Transaction`] - Transactional read/write operations
//! - [`Cursor`] - Ordered iteration over key-value pairs
//!
//! # Error Handling
//!
//! All storage operations return [`StorageResult<T>`], an alias for
//! `Result<T, StorageError>`.
//!
//! # Example
//!
//! ```
//! use cascadedb_storage::{StorageEngine, Transaction};
//! use cascadedb_storage::backends::RedbEngine;
//!
//! # fn main() -> Result<(), cascadedb_storage::StorageError> {
//! let engine = RedbEngine::in_memory()?;
//!
//! let mut tx = engine.begin_write()?;
//! tx.put("rows", b"key:1", b"alpha")?;
//! tx.put("rows", b"key:2", b"beta")?;
//! tx.commit()?;
//!
//! let tx = engine.begin_read()?;
//! assert_eq!(tx.get("rows", b"key:1")?, Some(b"alpha".to_vec()));
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`engine`] - Storage engine traits and abstractions
//! - [`backends`] - Concrete storage backend implementations

// Deny unwrap in library code to ensure proper error handling
#![deny(clippy::unwrap_used)]

pub mod backends;
pub mod engine;

pub use engine::{
    Cursor, CursorResult, KeyValue, StorageEngine, StorageError, StorageResult, Transaction,
};
