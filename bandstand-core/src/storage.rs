//! Persistence scopes.
//!
//! Two string-keyed stores back the player: a durable scope that survives
//! restarts (SQLite) and a session scope that lives and dies with the
//! process (in-memory map). Writes are best-effort, last-write-wins;
//! concurrent writers are expected and tolerated.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::OptionalExtension;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tokio_rusqlite::Connection;
use tracing::{info, warn};

use crate::error::Result;

/// Well-known store keys.
pub mod keys {
    // Durable scope
    pub const SHUFFLE_ENABLED: &str = "shuffle_enabled";
    pub const VOLUME: &str = "volume";
    pub const PENDING_PLAY: &str = "pending_play";
    pub const AUDIO_CONSENT: &str = "audio_consent";
    pub const NOTIFICATIONS: &str = "notifications";

    // Session scope
    pub const RESUME_STATE: &str = "resume_state";
    pub const SHUFFLE_ORDER: &str = "shuffle_order";
    pub const LAST_BROADCAST_TOKEN: &str = "last_broadcast_token";
}

/// A string-keyed mapping of string-serialized values.
///
/// Reads return `None` for missing keys; writes never raise (implementations
/// log and drop failed writes, since no caller can do better than retry on
/// its next save anyway).
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: &str);
    async fn remove(&self, key: &str);
}

/// Session-scoped store: cleared when the process ends.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, key: &str) -> Option<String> {
        match self.values.lock() {
            Ok(values) => values.get(key).cloned(),
            Err(_) => None,
        }
    }

    async fn set(&self, key: &str, value: &str) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), value.to_string());
        }
    }

    async fn remove(&self, key: &str) {
        if let Ok(mut values) = self.values.lock() {
            values.remove(key);
        }
    }
}

const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);
";

/// Durable store: SQLite-backed key-value table surviving restarts.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open the store at the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created or opened.
    pub async fn new() -> Result<Self> {
        let path = crate::paths::state_db_path();
        Self::open(&path).await
    }

    /// Open a store at a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub async fn open(path: &Path) -> Result<Self> {
        info!("Opening state database at {:?}", path);

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).await?;

        // Initialize schema
        conn.call(|conn| {
            conn.execute_batch(SCHEMA_SQL)?;
            conn.pragma_update(None, "journal_mode", "WAL")?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    /// Checkpoint WAL for clean shutdown
    ///
    /// # Errors
    ///
    /// Returns an error if the WAL checkpoint fails.
    pub async fn checkpoint(&self) -> Result<()> {
        self.conn
            .call(|conn| {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE)")?;
                Ok(())
            })
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl StateStore for SqliteStore {
    async fn get(&self, key: &str) -> Option<String> {
        let key = key.to_string();
        let result = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare_cached("SELECT value FROM kv WHERE key = ?1")?;
                let value = stmt
                    .query_row(rusqlite::params![key], |row| row.get::<_, String>(0))
                    .optional()?;
                Ok(value)
            })
            .await;

        match result {
            Ok(value) => value,
            Err(e) => {
                warn!("State read failed: {e}");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str) {
        let key = key.to_string();
        let value = value.to_string();
        let now = Utc::now().timestamp();

        let result = self
            .conn
            .call(move |conn| {
                conn.execute(
                    r"
                    INSERT INTO kv (key, value, updated_at)
                    VALUES (?1, ?2, ?3)
                    ON CONFLICT(key) DO UPDATE SET
                        value = excluded.value,
                        updated_at = excluded.updated_at
                ",
                    rusqlite::params![key, value, now],
                )?;
                Ok(())
            })
            .await;

        if let Err(e) = result {
            warn!("State write failed: {e}");
        }
    }

    async fn remove(&self, key: &str) {
        let key = key.to_string();
        let result = self
            .conn
            .call(move |conn| {
                conn.execute("DELETE FROM kv WHERE key = ?1", rusqlite::params![key])?;
                Ok(())
            })
            .await;

        if let Err(e) = result {
            warn!("State delete failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("missing").await, None);

        store.set("volume", "0.4").await;
        assert_eq!(store.get("volume").await.as_deref(), Some("0.4"));

        store.set("volume", "0.9").await;
        assert_eq!(store.get("volume").await.as_deref(), Some("0.9"));

        store.remove("volume").await;
        assert_eq!(store.get("volume").await, None);
    }

    #[tokio::test]
    async fn test_sqlite_store_roundtrip() {
        let Ok(dir) = tempfile::tempdir() else {
            unreachable!("tempdir creation failed");
        };
        let path = dir.path().join("state.db");

        let Ok(store) = SqliteStore::open(&path).await else {
            unreachable!("store open failed");
        };

        assert_eq!(store.get(keys::VOLUME).await, None);
        store.set(keys::VOLUME, "0.6").await;
        store.set(keys::AUDIO_CONSENT, "true").await;
        assert_eq!(store.get(keys::VOLUME).await.as_deref(), Some("0.6"));

        store.remove(keys::VOLUME).await;
        assert_eq!(store.get(keys::VOLUME).await, None);
        assert_eq!(store.get(keys::AUDIO_CONSENT).await.as_deref(), Some("true"));
    }

    #[tokio::test]
    async fn test_sqlite_store_survives_reopen() {
        let Ok(dir) = tempfile::tempdir() else {
            unreachable!("tempdir creation failed");
        };
        let path = dir.path().join("state.db");

        {
            let Ok(store) = SqliteStore::open(&path).await else {
                unreachable!("store open failed");
            };
            store.set(keys::SHUFFLE_ENABLED, "true").await;
            let _ = store.checkpoint().await;
        }

        let Ok(store) = SqliteStore::open(&path).await else {
            unreachable!("store reopen failed");
        };
        assert_eq!(
            store.get(keys::SHUFFLE_ENABLED).await.as_deref(),
            Some("true")
        );
    }
}
