//! Durable key/value storage, the native stand-in for browser `localStorage`.
//!
//! Values are plain strings. Callers that store structured records
//! (the user, the pending-auth fallback) serialize them to JSON themselves.

mod schema;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};

/// Key holding the bearer token.
pub const TOKEN_KEY: &str = "auth_token";
/// Key holding the JSON-encoded [`crate::models::User`] of the session.
pub const USER_KEY: &str = "auth_user";
/// Key holding the JSON-encoded [`crate::models::PendingAuth`] fallback record.
pub const PENDING_AUTH_KEY: &str = "pending_auth";

const STORAGE_FILE: &str = "storage.db";

#[derive(Clone)]
pub struct LocalStorage {
    conn: Arc<Mutex<Connection>>,
}

impl LocalStorage {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Storage path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        let storage = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        storage.migrate()?;
        Ok(storage)
    }

    /// Open storage in `data_dir`, or in the platform data directory.
    pub fn open_in(data_dir: Option<&Path>) -> Result<Self> {
        match data_dir {
            Some(dir) => Self::open(dir.join(STORAGE_FILE)),
            None => Self::open_default(),
        }
    }

    pub fn open_default() -> Result<Self> {
        let dirs = directories::ProjectDirs::from("", "", "agent-console")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Self::open(dirs.data_dir().join(STORAGE_FILE))
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let storage = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        storage.migrate()?;
        Ok(storage)
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("storage lock poisoned");
        schema::run_migrations(&conn)
    }

    pub fn get_item(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().expect("storage lock poisoned");
        let value = conn
            .query_row(
                "SELECT value FROM local_storage WHERE key = ?",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().expect("storage lock poisoned");
        conn.execute(
            "INSERT INTO local_storage (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
                 value = excluded.value,
                 updated_at = excluded.updated_at",
            (key, value, Utc::now().to_rfc3339()),
        )?;
        Ok(())
    }

    /// Remove a key. Returns whether anything was stored under it.
    pub fn remove_item(&self, key: &str) -> Result<bool> {
        let conn = self.conn.lock().expect("storage lock poisoned");
        let rows = conn.execute("DELETE FROM local_storage WHERE key = ?", [key])?;
        Ok(rows > 0)
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().expect("storage lock poisoned");
        let mut stmt = conn.prepare("SELECT key FROM local_storage ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }
}
