//! SQLite-based local persistence.
//!
//! Provides persistent storage for:
//! - The append-only session log
//! - The last committed anchor collection snapshot
//! - Key-value store for small flags (grace marker, sync bookkeeping)

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::anchor::{Anchor, AnchorStore};
use crate::error::{DatabaseError, Result};
use crate::session::{SessionLog, SessionLogEntry, SessionType};

use super::{data_dir, KeyValueStore};

const LAST_SYNCED_KEY: &str = "sync.last_synced_at";

/// SQLite database for the session log and anchor snapshot.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/anchor/anchor.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("anchor.db");
        Self::open_at(&path)
    }

    /// Open (or create) a database file at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database. Nothing survives the handle.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS session_log (
                id           TEXT PRIMARY KEY,
                anchor_id    TEXT NOT NULL,
                session_type TEXT NOT NULL,
                completed_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS anchors (
                id       TEXT PRIMARY KEY,
                position INTEGER NOT NULL,
                body     TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_session_log_completed_at ON session_log(completed_at);
            CREATE INDEX IF NOT EXISTS idx_session_log_anchor_id ON session_log(anchor_id);",
        )?;
        Ok(())
    }

    /// Append a completed session. Entries are never updated or deleted.
    pub fn append_session(&self, entry: &SessionLogEntry) -> Result<()> {
        self.conn.execute(
            "INSERT INTO session_log (id, anchor_id, session_type, completed_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.id,
                entry.anchor_id,
                entry.session_type.as_str(),
                entry.completed_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Load the whole session log. Rows that no longer parse are skipped.
    pub fn load_session_log(&self) -> Result<SessionLog> {
        let mut stmt = self.conn.prepare(
            "SELECT id, anchor_id, session_type, completed_at FROM session_log",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, anchor_id, session_type, completed_at) = row?;
            let Some(session_type) = SessionType::parse(&session_type) else {
                tracing::warn!(%id, %session_type, "skipping session with unknown type");
                continue;
            };
            let completed_at = match DateTime::parse_from_rfc3339(&completed_at) {
                Ok(at) => at,
                Err(e) => {
                    tracing::warn!(%id, "skipping session with bad timestamp: {e}");
                    continue;
                }
            };
            entries.push(SessionLogEntry {
                id,
                anchor_id,
                session_type,
                completed_at,
            });
        }
        Ok(SessionLog::from_entries(entries))
    }

    /// Replace the stored anchor snapshot with the store's collection.
    ///
    /// Written in a single transaction so readers never see a partial set.
    pub fn save_anchors(&mut self, store: &AnchorStore) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM anchors", [])?;
        {
            let mut insert =
                tx.prepare("INSERT INTO anchors (id, position, body) VALUES (?1, ?2, ?3)")?;
            for (position, anchor) in store.anchors().iter().enumerate() {
                let body = serde_json::to_string(anchor)?;
                insert.execute(params![anchor.id, position as i64, body])?;
            }
        }
        match store.last_synced_at() {
            Some(at) => {
                tx.execute(
                    "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                    params![LAST_SYNCED_KEY, at.to_rfc3339()],
                )?;
            }
            None => {
                tx.execute("DELETE FROM kv WHERE key = ?1", params![LAST_SYNCED_KEY])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Load the stored anchor snapshot in its committed order.
    pub fn load_anchors(&self) -> Result<AnchorStore> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, body FROM anchors ORDER BY position ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut anchors = Vec::new();
        for row in rows {
            let (id, body) = row?;
            match serde_json::from_str::<Anchor>(&body) {
                Ok(anchor) => anchors.push(anchor.normalized()),
                Err(e) => tracing::warn!(%id, "skipping unreadable anchor: {e}"),
            }
        }

        let mut store = AnchorStore::with_anchors(anchors);
        if let Some(at) = self
            .kv_get(LAST_SYNCED_KEY)?
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        {
            store.mark_synced(at.with_timezone(&Utc));
        }
        Ok(store)
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Remove a key from the kv store. Missing keys are fine.
    pub fn kv_remove(&self, key: &str) -> Result<(), rusqlite::Error> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

impl KeyValueStore for Database {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.kv_get(key)?)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        Ok(self.kv_set(key, value)?)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        Ok(self.kv_remove(key)?)
    }
}
