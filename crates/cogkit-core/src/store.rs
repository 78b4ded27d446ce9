//! Keyed configuration store shared by all cogs.
//!
//! One SQLite table holds every durable setting, addressed by
//! (cog, scope kind, scope id, key) with JSON values. Cogs treat this as a
//! black box; there is no per-cog schema. Safe to initialise on every
//! startup.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::ids::{GuildId, UserId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Addressing context for a stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// One value per cog, shared across all guilds.
    Global,
    /// Per-guild settings.
    Guild(GuildId),
    /// Per-user settings, independent of any guild.
    User(UserId),
    /// Cog-defined grouping, e.g. per-message or per-date buckets.
    Custom { group: String, id: String },
}

impl Scope {
    pub fn custom(group: impl Into<String>, id: impl Into<String>) -> Self {
        Scope::Custom {
            group: group.into(),
            id: id.into(),
        }
    }

    fn kind(&self) -> &str {
        match self {
            Scope::Global => "global",
            Scope::Guild(_) => "guild",
            Scope::User(_) => "user",
            Scope::Custom { group, .. } => group,
        }
    }

    fn id(&self) -> String {
        match self {
            Scope::Global => String::new(),
            Scope::Guild(g) => g.to_string(),
            Scope::User(u) => u.to_string(),
            Scope::Custom { id, .. } => id.clone(),
        }
    }
}

/// Thread-safe store over a single SQLite connection.
pub struct ConfigStore {
    db: Mutex<Connection>,
}

impl ConfigStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        init_db(&conn)?;
        Ok(Self { db: Mutex::new(conn) })
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        init_db(&conn)?;
        Ok(Self { db: Mutex::new(conn) })
    }

    /// Store or replace one value.
    pub fn set<T: Serialize>(
        &self,
        cog: &str,
        scope: &Scope,
        key: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string(value)?;
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO cog_config (cog, scope, scope_id, key, value, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(cog, scope, scope_id, key)
             DO UPDATE SET value = ?5, updated_at = ?6",
            rusqlite::params![cog, scope.kind(), scope.id(), key, json, now],
        )?;
        Ok(())
    }

    /// Fetch one value, `None` when unset.
    pub fn get<T: DeserializeOwned>(
        &self,
        cog: &str,
        scope: &Scope,
        key: &str,
    ) -> Result<Option<T>, StoreError> {
        let db = self.db.lock().unwrap();
        let json: Option<String> = db
            .query_row(
                "SELECT value FROM cog_config
                 WHERE cog = ?1 AND scope = ?2 AND scope_id = ?3 AND key = ?4",
                rusqlite::params![cog, scope.kind(), scope.id(), key],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        match json {
            Some(j) => Ok(Some(serde_json::from_str(&j)?)),
            None => Ok(None),
        }
    }

    /// Remove one value. Removing an absent key is not an error.
    pub fn clear(&self, cog: &str, scope: &Scope, key: &str) -> Result<(), StoreError> {
        let db = self.db.lock().unwrap();
        db.execute(
            "DELETE FROM cog_config
             WHERE cog = ?1 AND scope = ?2 AND scope_id = ?3 AND key = ?4",
            rusqlite::params![cog, scope.kind(), scope.id(), key],
        )?;
        Ok(())
    }

    /// Remove every value in a scope.
    pub fn clear_scope(&self, cog: &str, scope: &Scope) -> Result<(), StoreError> {
        let db = self.db.lock().unwrap();
        db.execute(
            "DELETE FROM cog_config WHERE cog = ?1 AND scope = ?2 AND scope_id = ?3",
            rusqlite::params![cog, scope.kind(), scope.id()],
        )?;
        Ok(())
    }

    /// All (key, value) pairs stored in one scope.
    pub fn entries<T: DeserializeOwned>(
        &self,
        cog: &str,
        scope: &Scope,
    ) -> Result<Vec<(String, T)>, StoreError> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT key, value FROM cog_config
             WHERE cog = ?1 AND scope = ?2 AND scope_id = ?3 ORDER BY key",
        )?;
        let rows: Vec<(String, String)> = stmt
            .query_map(
                rusqlite::params![cog, scope.kind(), scope.id()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?
            .filter_map(|r| r.ok())
            .collect();
        let mut out = Vec::with_capacity(rows.len());
        for (key, json) in rows {
            out.push((key, serde_json::from_str(&json)?));
        }
        Ok(out)
    }

    /// Distinct scope ids present for a cog under one scope kind
    /// (e.g. every guild id with stored settings).
    pub fn scope_ids(&self, cog: &str, kind: &str) -> Result<Vec<String>, StoreError> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT DISTINCT scope_id FROM cog_config
             WHERE cog = ?1 AND scope = ?2 ORDER BY scope_id",
        )?;
        let ids = stmt
            .query_map(rusqlite::params![cog, kind], |row| row.get(0))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(ids)
    }
}

/// Initialise the config table. Idempotent.
fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS cog_config (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            cog         TEXT NOT NULL,
            scope       TEXT NOT NULL,
            scope_id    TEXT NOT NULL,
            key         TEXT NOT NULL,
            value       TEXT NOT NULL,
            updated_at  TEXT NOT NULL,
            UNIQUE(cog, scope, scope_id, key)
        );
        CREATE INDEX IF NOT EXISTS idx_cog_config_scope
            ON cog_config(cog, scope, scope_id);",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_roundtrip() {
        let store = ConfigStore::open_in_memory().unwrap();
        let scope = Scope::Guild(GuildId(1));
        store.set("test", &scope, "channel", &42u64).unwrap();
        let got: Option<u64> = store.get("test", &scope, "channel").unwrap();
        assert_eq!(got, Some(42));
    }

    #[test]
    fn get_unset_is_none() {
        let store = ConfigStore::open_in_memory().unwrap();
        let got: Option<String> = store.get("test", &Scope::Global, "missing").unwrap();
        assert_eq!(got, None);
    }

    #[test]
    fn set_overwrites() {
        let store = ConfigStore::open_in_memory().unwrap();
        store.set("test", &Scope::Global, "k", &"a").unwrap();
        store.set("test", &Scope::Global, "k", &"b").unwrap();
        let got: Option<String> = store.get("test", &Scope::Global, "k").unwrap();
        assert_eq!(got.as_deref(), Some("b"));
    }

    #[test]
    fn scopes_are_isolated() {
        let store = ConfigStore::open_in_memory().unwrap();
        store.set("test", &Scope::Guild(GuildId(1)), "k", &1u8).unwrap();
        store.set("test", &Scope::Guild(GuildId(2)), "k", &2u8).unwrap();
        store.set("other", &Scope::Guild(GuildId(1)), "k", &3u8).unwrap();
        let got: Option<u8> = store.get("test", &Scope::Guild(GuildId(1)), "k").unwrap();
        assert_eq!(got, Some(1));
        assert_eq!(store.scope_ids("test", "guild").unwrap(), vec!["1", "2"]);
    }

    #[test]
    fn clear_scope_removes_all_keys() {
        let store = ConfigStore::open_in_memory().unwrap();
        let scope = Scope::custom("MESSAGE", "10_20");
        store.set("test", &scope, "🎂", &7u64).unwrap();
        store.set("test", &scope, "🎉", &8u64).unwrap();
        store.clear_scope("test", &scope).unwrap();
        let entries: Vec<(String, u64)> = store.entries("test", &scope).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn entries_lists_pairs() {
        let store = ConfigStore::open_in_memory().unwrap();
        let scope = Scope::User(UserId(5));
        store.set("test", &scope, "a", &"x").unwrap();
        store.set("test", &scope, "b", &"y").unwrap();
        let entries: Vec<(String, String)> = store.entries("test", &scope).unwrap();
        assert_eq!(
            entries,
            vec![
                ("a".to_string(), "x".to_string()),
                ("b".to_string(), "y".to_string())
            ]
        );
    }
}
