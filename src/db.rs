//! Database module
//!
//! SQLite-backed namespaced key-value storage for conversation records.

mod schema;

pub use schema::*;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn();
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== Key-Value Operations ====================

    /// Read every entry in a namespace, oldest write first
    pub fn get_all(&self, namespace: &str) -> DbResult<Vec<KvEntry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT key, value, updated_at FROM kv_entries
             WHERE namespace = ?1 ORDER BY updated_at ASC, key ASC",
        )?;

        let rows = stmt.query_map(params![namespace], |row| {
            let key: String = row.get(0)?;
            let updated_at = parse_datetime(&key, &row.get::<_, String>(2)?);
            Ok(KvEntry {
                key,
                value: row.get(1)?,
                updated_at,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Read a single entry
    #[allow(dead_code)] // Used in tests
    pub fn get(&self, namespace: &str, key: &str) -> DbResult<Option<String>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT value FROM kv_entries WHERE namespace = ?1 AND key = ?2",
            params![namespace, key],
            |row| row.get(0),
        )
        .optional()
        .map_err(DbError::from)
    }

    /// Insert or replace a single entry
    pub fn put(&self, namespace: &str, key: &str, value: &str) -> DbResult<()> {
        let conn = self.conn();
        let now = Utc::now();
        conn.execute(
            "INSERT INTO kv_entries (namespace, key, value, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(namespace, key)
             DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![namespace, key, value, now.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Insert or replace many entries in one transaction
    pub fn put_all(&self, namespace: &str, entries: &[(String, String)]) -> DbResult<()> {
        let mut conn = self.conn();
        let now = Utc::now().to_rfc3339();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO kv_entries (namespace, key, value, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(namespace, key)
                 DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            )?;
            for (key, value) in entries {
                stmt.execute(params![namespace, key, value, now])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Number of entries in a namespace
    #[allow(dead_code)] // Used in tests
    pub fn count(&self, namespace: &str) -> DbResult<i64> {
        let conn = self.conn();
        conn.query_row(
            "SELECT COUNT(*) FROM kv_entries WHERE namespace = ?1",
            params![namespace],
            |row| row.get(0),
        )
        .map_err(DbError::from)
    }
}

fn parse_datetime(key: &str, s: &str) -> DateTime<Utc> {
    match DateTime::parse_from_rfc3339(s) {
        Ok(dt) => dt.with_timezone(&Utc),
        Err(e) => {
            tracing::warn!(
                key = %key,
                value = %s,
                error = %e,
                "Unreadable updated_at, using current time"
            );
            Utc::now()
        }
    }
}
