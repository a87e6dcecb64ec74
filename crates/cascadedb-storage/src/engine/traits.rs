//! Core storage engine traits.
//!
//! This module defines the fundamental traits for storage backends:
//!
//! - [`StorageEngine`] - The main entry point for storage operations
//! - [`Transaction`] - Read/write operations with commit semantics
//! - [`Cursor`] - Ordered iteration over key-value pairs
//!
//! Keys within a table are ordered byte-lexicographically; [`Transaction::range`]
//! iterates in that order. The execution layer's external sort backend builds
//! its keys so that this native ordering is the sort order.

use super::StorageError;

/// A key-value pair returned by cursor operations.
pub type KeyValue = (Vec<u8>, Vec<u8>);

/// Result type for cursor operations that return a key-value pair.
pub type CursorResult = Result<Option<KeyValue>, StorageError>;

/// A storage engine that provides transactional key-value operations.
///
/// Implementations must be thread-safe (`Send + Sync`); transactions
/// themselves are used from a single thread.
pub trait StorageEngine: Send + Sync {
    /// The transaction type for this engine.
    type Transaction<'a>: Transaction
    where
        Self: 'a;

    /// Begin a read-only transaction.
    ///
    /// Read transactions provide a consistent snapshot of the database.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Transaction`] if the transaction cannot be started.
    fn begin_read(&self) -> Result<Self::Transaction<'_>, StorageError>;

    /// Begin a read-write transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Transaction`] if the transaction cannot be started.
    fn begin_write(&self) -> Result<Self::Transaction<'_>, StorageError>;
}

/// A transaction that provides key-value operations over ordered tables.
///
/// Write transactions must be explicitly committed; dropping without
/// committing rolls back all changes.
pub trait Transaction {
    /// The cursor type for ordered iteration.
    type Cursor: Cursor;

    /// Get a value by key from a table.
    ///
    /// Returns `Ok(Some(value))` if the key exists, `Ok(None)` if it doesn't.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Table`] if the table cannot be opened.
    fn get(&self, table: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    /// Put a key-value pair into a table.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ReadOnly`] on a read-only transaction.
    fn put(&mut self, table: &str, key: &[u8], value: &[u8]) -> Result<(), StorageError>;

    /// Delete every key in `[start, end)` from a table.
    ///
    /// Returns the number of keys removed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ReadOnly`] on a read-only transaction.
    fn delete_range(&mut self, table: &str, start: &[u8], end: &[u8])
        -> Result<u64, StorageError>;

    /// Open a cursor over `[start, end)` in key order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Table`] if the table cannot be opened.
    fn range(&self, table: &str, start: &[u8], end: &[u8])
        -> Result<Self::Cursor, StorageError>;

    /// Commit the transaction, making all writes durable.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Transaction`] if the commit fails.
    fn commit(self) -> Result<(), StorageError>
    where
        Self: Sized;
}

/// Ordered iteration over key-value pairs.
pub trait Cursor {
    /// Advance to the next pair, or `Ok(None)` when exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Corruption`] if the underlying data cannot be read.
    fn next(&mut self) -> CursorResult;
}
