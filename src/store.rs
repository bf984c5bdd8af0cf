//! Durable Store Module
//!
//! SQLite-backed `memo` table that lets cached results outlive the process.
//! A store that was never configured, or failed to open, is disabled: every
//! call becomes a no-op and lookups report nothing.

use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{info, warn};

use crate::cache::{OperationId, Timestamp};
use crate::error::{MemoError, Result};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS memo (
    operation  TEXT    NOT NULL,
    expires_at INTEGER NOT NULL,
    args       BLOB    NOT NULL,
    result     BLOB    NOT NULL,
    PRIMARY KEY (operation, args)
)";

/// How long a writer waits on a lock held by another connection.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// == Durable Record ==
/// One row of the `memo` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurableRecord {
    pub operation: OperationId,
    pub expires_at: Timestamp,
    pub args: Vec<u8>,
    pub result: Vec<u8>,
}

// == Durable Store ==
#[derive(Debug)]
pub struct DurableStore {
    conn: Option<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl DurableStore {
    // == Constructors ==
    /// A store with durability switched off.
    pub fn disabled() -> Self {
        Self {
            conn: None,
            path: None,
        }
    }

    /// Opens (or creates) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| {
            MemoError::StoreUnavailable(format!("{}: {}", path.display(), e))
        })?;
        let store = Self::init(conn, Some(path.to_path_buf()))?;
        info!("Durable store opened at {}", path.display());
        Ok(store)
    }

    /// Opens a private in-memory database. Lives as long as the store.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| MemoError::StoreUnavailable(e.to_string()))?;
        Self::init(conn, None)
    }

    /// Opens `path` if given, falling back to a disabled store when it is
    /// absent or unusable.
    pub fn open_or_disabled(path: Option<&Path>) -> Self {
        match path {
            Some(path) => Self::open(path).unwrap_or_else(|err| {
                warn!("Durability disabled, continuing memory-only: {}", err);
                Self::disabled()
            }),
            None => Self::disabled(),
        }
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        let unavailable = |e: rusqlite::Error| MemoError::StoreUnavailable(e.to_string());
        conn.busy_timeout(BUSY_TIMEOUT).map_err(unavailable)?;
        conn.execute(SCHEMA, []).map_err(unavailable)?;
        Ok(Self {
            conn: Some(Mutex::new(conn)),
            path,
        })
    }

    /// Returns true when a database is attached.
    pub fn is_enabled(&self) -> bool {
        self.conn.is_some()
    }

    /// Location of the database file, if file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // == Lookup ==
    /// Point lookup by the natural key.
    pub fn lookup(&self, operation: &OperationId, args: &[u8]) -> Result<Option<DurableRecord>> {
        let Some(conn) = &self.conn else {
            return Ok(None);
        };
        let conn = conn.lock();
        let record = conn
            .query_row(
                "SELECT expires_at, result FROM memo WHERE operation = ?1 AND args = ?2",
                params![operation.as_str(), args],
                |row| {
                    Ok(DurableRecord {
                        operation: operation.clone(),
                        expires_at: row.get(0)?,
                        args: args.to_vec(),
                        result: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    // == Upsert ==
    /// Writes a record, replacing any row with the same (operation, args).
    pub fn upsert(&self, record: &DurableRecord) -> Result<()> {
        let Some(conn) = &self.conn else {
            return Ok(());
        };
        conn.lock().execute(
            "INSERT OR REPLACE INTO memo (operation, expires_at, args, result)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                record.operation.as_str(),
                record.expires_at,
                record.args,
                record.result
            ],
        )?;
        Ok(())
    }

    // == Delete By Operation ==
    /// Removes all rows of one operation. Returns the number removed.
    pub fn delete_by_operation(&self, operation: &OperationId) -> Result<usize> {
        let Some(conn) = &self.conn else {
            return Ok(0);
        };
        let removed = conn
            .lock()
            .execute("DELETE FROM memo WHERE operation = ?1", params![operation.as_str()])?;
        Ok(removed)
    }

    // == Clear All ==
    pub fn clear_all(&self) -> Result<usize> {
        let Some(conn) = &self.conn else {
            return Ok(0);
        };
        let removed = conn.lock().execute("DELETE FROM memo", [])?;
        Ok(removed)
    }

    // == Purge Expired ==
    /// Removes rows whose expiry is at or before `now`.
    pub fn purge_expired(&self, now: Timestamp) -> Result<usize> {
        let Some(conn) = &self.conn else {
            return Ok(0);
        };
        let removed = conn
            .lock()
            .execute("DELETE FROM memo WHERE expires_at <= ?1", params![now])?;
        Ok(removed)
    }

    // == Compact ==
    /// Reclaims space freed by deletes.
    pub fn compact(&self) -> Result<()> {
        let Some(conn) = &self.conn else {
            return Ok(());
        };
        conn.lock().execute_batch("VACUUM")?;
        Ok(())
    }

    // == Records ==
    /// All rows, ordered by operation then args. Diagnostic use.
    pub fn records(&self) -> Result<Vec<DurableRecord>> {
        let Some(conn) = &self.conn else {
            return Ok(Vec::new());
        };
        let conn = conn.lock();
        let mut stmt = conn.prepare(
            "SELECT operation, expires_at, args, result FROM memo ORDER BY operation, args",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(DurableRecord {
                operation: OperationId::from(row.get::<_, String>(0)?),
                expires_at: row.get(1)?,
                args: row.get(2)?,
                result: row.get(3)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn record(op: &str, args: &[u8], result: &[u8], expires_at: Timestamp) -> DurableRecord {
        DurableRecord {
            operation: OperationId::new(op),
            expires_at,
            args: args.to_vec(),
            result: result.to_vec(),
        }
    }

    #[test]
    fn test_disabled_store_is_a_no_op() {
        let store = DurableStore::disabled();
        assert!(!store.is_enabled());

        store.upsert(&record("inc", b"[]", b"1", 100)).unwrap();
        assert_eq!(store.lookup(&OperationId::new("inc"), b"[]").unwrap(), None);
        assert_eq!(store.delete_by_operation(&OperationId::new("inc")).unwrap(), 0);
        assert_eq!(store.clear_all().unwrap(), 0);
        store.compact().unwrap();
        assert!(store.records().unwrap().is_empty());
    }

    #[test]
    fn test_upsert_and_lookup() {
        let store = DurableStore::open_in_memory().unwrap();
        let rec = record("inc", b"[]", b"1", 100);
        store.upsert(&rec).unwrap();

        assert_eq!(store.lookup(&OperationId::new("inc"), b"[]").unwrap(), Some(rec));
        assert_eq!(store.lookup(&OperationId::new("inc"), b"[1]").unwrap(), None);
    }

    #[test]
    fn test_upsert_last_write_wins() {
        let store = DurableStore::open_in_memory().unwrap();
        store.upsert(&record("inc", b"[]", b"1", 100)).unwrap();
        store.upsert(&record("inc", b"[]", b"2", 200)).unwrap();

        let found = store.lookup(&OperationId::new("inc"), b"[]").unwrap().unwrap();
        assert_eq!(found.result, b"2");
        assert_eq!(found.expires_at, 200);
        assert_eq!(store.records().unwrap().len(), 1);
    }

    #[test]
    fn test_many_args_per_operation() {
        let store = DurableStore::open_in_memory().unwrap();
        store.upsert(&record("fib", b"[1]", b"1", 100)).unwrap();
        store.upsert(&record("fib", b"[2]", b"1", 100)).unwrap();
        store.upsert(&record("fib", b"[3]", b"2", 100)).unwrap();

        assert_eq!(store.records().unwrap().len(), 3);
    }

    #[test]
    fn test_delete_by_operation_is_scoped() {
        let store = DurableStore::open_in_memory().unwrap();
        store.upsert(&record("inc", b"[1]", b"1", 100)).unwrap();
        store.upsert(&record("inc", b"[2]", b"2", 100)).unwrap();
        store.upsert(&record("dec", b"[1]", b"0", 100)).unwrap();

        assert_eq!(store.delete_by_operation(&OperationId::new("inc")).unwrap(), 2);
        store.compact().unwrap();

        let left = store.records().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].operation, OperationId::new("dec"));
    }

    #[test]
    fn test_clear_all() {
        let store = DurableStore::open_in_memory().unwrap();
        store.upsert(&record("inc", b"[1]", b"1", 100)).unwrap();
        store.upsert(&record("dec", b"[1]", b"0", 100)).unwrap();

        assert_eq!(store.clear_all().unwrap(), 2);
        store.compact().unwrap();
        assert!(store.records().unwrap().is_empty());
    }

    #[test]
    fn test_purge_expired_uses_exclusive_expiry() {
        let store = DurableStore::open_in_memory().unwrap();
        store.upsert(&record("a", b"[]", b"1", 100)).unwrap();
        store.upsert(&record("b", b"[]", b"1", 101)).unwrap();

        assert_eq!(store.purge_expired(100).unwrap(), 1);
        let left = store.records().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].operation, OperationId::new("b"));
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memo.db");

        {
            let store = DurableStore::open(&path).unwrap();
            store.upsert(&record("inc", b"[]", b"1", 100)).unwrap();
        }

        let store = DurableStore::open(&path).unwrap();
        assert_eq!(store.path(), Some(path.as_path()));
        assert!(store.lookup(&OperationId::new("inc"), b"[]").unwrap().is_some());
    }

    #[test]
    fn test_unusable_path_degrades_to_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("nested").join("memo.db");

        assert!(matches!(
            DurableStore::open(&path),
            Err(MemoError::StoreUnavailable(_))
        ));
        assert!(!DurableStore::open_or_disabled(Some(path.as_path())).is_enabled());
        assert!(!DurableStore::open_or_disabled(None).is_enabled());
    }
}
