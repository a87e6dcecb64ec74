//! Redb engine implementation.

use std::path::Path;
use std::sync::Arc;

use redb::backends::InMemoryBackend;
use redb::Database;

use crate::engine::{StorageEngine, StorageError};

use super::transaction::RedbTransaction;

/// A storage engine backed by a Redb database.
///
/// The engine is cheap to clone via internal `Arc` sharing; all clones refer
/// to the same database.
#[derive(Clone)]
pub struct RedbEngine {
    db: Arc<Database>,
}

impl RedbEngine {
    /// Open (or create) a database at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Database`] if the file cannot be opened or
    /// created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref())
            .map_err(|e| StorageError::Database(e.to_string()))?;
        tracing::debug!(path = %path.as_ref().display(), "opened redb database");
        Ok(Self { db: Arc::new(db) })
    }

    /// Create a database that lives entirely in memory.
    ///
    /// Nothing is persisted; dropping the last engine handle releases all
    /// data. Intended for tests and query-scoped spill stores.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Database`] if the database cannot be created.
    pub fn in_memory() -> Result<Self, StorageError> {
        let db = Database::builder()
            .create_with_backend(InMemoryBackend::new())
            .map_err(|e| StorageError::Database(e.to_string()))?;
        Ok(Self { db: Arc::new(db) })
    }
}

impl std::fmt::Debug for RedbEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbEngine").finish_non_exhaustive()
    }
}

impl StorageEngine for RedbEngine {
    type Transaction<'a> = RedbTransaction;

    fn begin_read(&self) -> Result<Self::Transaction<'_>, StorageError> {
        let tx = self
            .db
            .begin_read()
            .map_err(|e| StorageError::Transaction(e.to_string()))?;
        Ok(RedbTransaction::read(tx))
    }

    fn begin_write(&self) -> Result<Self::Transaction<'_>, StorageError> {
        let tx = self
            .db
            .begin_write()
            .map_err(|e| StorageError::Transaction(e.to_string()))?;
        Ok(RedbTransaction::write(tx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Transaction;

    #[test]
    fn open_on_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = RedbEngine::open(dir.path().join("test.redb")).expect("open");

        let mut tx = engine.begin_write().expect("begin");
        tx.put("t", b"k", b"v").expect("put");
        tx.commit().expect("commit");

        let tx = engine.begin_read().expect("begin");
        assert_eq!(tx.get("t", b"k").expect("get"), Some(b"v".to_vec()));
    }

    #[test]
    fn uncommitted_writes_roll_back() {
        let engine = RedbEngine::in_memory().expect("create");

        {
            let mut tx = engine.begin_write().expect("begin");
            tx.put("t", b"k", b"v").expect("put");
            // dropped without commit
        }

        let tx = engine.begin_read().expect("begin");
        assert_eq!(tx.get("t", b"k").expect("get"), None);
    }
}
