//! Persistent key -> (payload, stored_at) cache with atomic replace

use crate::error::SmartFoldersError;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Cache key for the full folder list
pub const FOLDER_LIST_KEY: &str = "folders";

/// A cached snapshot: opaque payload plus its write timestamp (unix seconds).
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub payload: String,
    pub stored_at: i64,
}

/// SQLite-backed cache store shared between the request path and background
/// refresher threads. A write replaces the whole entry for a key in a single
/// statement, so readers never observe a partial entry.
pub struct CacheStore {
    conn: Mutex<Connection>,
}

impl CacheStore {
    /// Open (or create) the cache database at `path`.
    pub fn open(path: &Path) -> crate::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// In-memory store, for tests and throwaway sessions.
    pub fn open_in_memory() -> crate::Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> crate::Result<Self> {
        // Overlapping invocations share the same database file.
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS cache (
                 key TEXT PRIMARY KEY,
                 payload TEXT NOT NULL,
                 stored_at INTEGER NOT NULL
             );
             CREATE TABLE IF NOT EXISTS claims (
                 key TEXT PRIMARY KEY,
                 claimed_at INTEGER NOT NULL
             );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Atomically replace the entry for `key` and stamp the current time.
    pub fn put(&self, key: &str, payload: &str) -> crate::Result<()> {
        self.put_at(key, payload, unix_now())
    }

    pub(crate) fn put_at(&self, key: &str, payload: &str, stored_at: i64) -> crate::Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO cache (key, payload, stored_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                 payload = excluded.payload,
                 stored_at = excluded.stored_at",
            params![key, payload, stored_at],
        )?;
        Ok(())
    }

    /// Whatever is cached for `key`, regardless of staleness. Staleness is a
    /// separate question (`is_fresh`), so a stale-but-present snapshot can
    /// still be served while a refresh runs in the background.
    pub fn get(&self, key: &str) -> crate::Result<Option<CacheEntry>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT payload, stored_at FROM cache WHERE key = ?1",
            params![key],
            |row| {
                Ok(CacheEntry {
                    payload: row.get(0)?,
                    stored_at: row.get(1)?,
                })
            },
        )
        .optional()
        .map_err(Into::into)
    }

    /// True iff an entry exists and is no older than `max_age`. An absent
    /// entry is never fresh.
    pub fn is_fresh(&self, key: &str, max_age: Duration) -> crate::Result<bool> {
        match self.get(key)? {
            Some(entry) => {
                let age = unix_now() - entry.stored_at;
                Ok(age <= max_age.as_secs() as i64)
            }
            None => Ok(false),
        }
    }

    /// Store a JSON-serialized snapshot.
    pub fn put_json<T: Serialize>(&self, key: &str, value: &T) -> crate::Result<()> {
        self.put(key, &serde_json::to_string(value)?)
    }

    /// Read back a JSON-serialized snapshot, regardless of staleness.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> crate::Result<Option<T>> {
        match self.get(key)? {
            Some(entry) => Ok(Some(serde_json::from_str(&entry.payload)?)),
            None => Ok(None),
        }
    }

    /// Atomically claim `key` for one refresh run. Returns false while an
    /// unexpired claim is already held, in this or any other process
    /// sharing the database. A claim older than `ttl` is presumed dead and
    /// taken over, so a crashed refresher cannot wedge its key.
    pub fn try_claim(&self, key: &str, ttl: Duration) -> crate::Result<bool> {
        let conn = self.lock()?;
        let now = unix_now();
        let cutoff = now - ttl.as_secs() as i64;
        let changed = conn.execute(
            "INSERT INTO claims (key, claimed_at) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET claimed_at = excluded.claimed_at
                 WHERE claims.claimed_at < ?3",
            params![key, now, cutoff],
        )?;
        Ok(changed == 1)
    }

    /// Release a claim once its refresh has finished or failed.
    pub fn release_claim(&self, key: &str) -> crate::Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM claims WHERE key = ?1", params![key])?;
        Ok(())
    }

    /// True while an unexpired claim for `key` is held.
    pub fn is_claimed(&self, key: &str, ttl: Duration) -> crate::Result<bool> {
        let conn = self.lock()?;
        let claimed_at: Option<i64> = conn
            .query_row(
                "SELECT claimed_at FROM claims WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(claimed_at.is_some_and(|t| t >= unix_now() - ttl.as_secs() as i64))
    }

    #[cfg(test)]
    pub(crate) fn claim_at(&self, key: &str, claimed_at: i64) -> crate::Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO claims (key, claimed_at) VALUES (?1, ?2)",
            params![key, claimed_at],
        )?;
        Ok(())
    }

    fn lock(&self) -> crate::Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SmartFoldersError::CachePoisoned)
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
