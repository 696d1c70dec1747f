//! SQLite-backed lookup cache implementation.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{CacheError, CacheState, MetadataCache};

const KIND_MOVIE: &str = "movie";
const KIND_SEASON: &str = "season";
const KIND_EPISODE: &str = "episode";

/// SQLite-backed lookup cache.
pub struct SqliteMetadataCache {
    conn: Mutex<Connection>,
}

impl SqliteMetadataCache {
    /// Open the cache, creating the database file and table if needed.
    pub fn new(path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| CacheError::Database(e.to_string()))?;
            }
        }
        let conn = Connection::open(path).map_err(|e| CacheError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory cache (useful for testing).
    pub fn in_memory() -> Result<Self, CacheError> {
        let conn =
            Connection::open_in_memory().map_err(|e| CacheError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), CacheError> {
        conn.execute_batch(
            r#"
            -- One row per cached lookup, payload stored as JSON
            CREATE TABLE IF NOT EXISTS lookup_cache (
                kind TEXT NOT NULL,
                cache_key TEXT NOT NULL,
                payload TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (kind, cache_key)
            );
            "#,
        )
        .map_err(|e| CacheError::Database(e.to_string()))?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, CacheError> {
        self.conn
            .lock()
            .map_err(|_| CacheError::Database("cache connection lock poisoned".to_string()))
    }

    fn load_kind<T: DeserializeOwned>(
        conn: &Connection,
        kind: &str,
    ) -> Result<HashMap<String, T>, CacheError> {
        let mut stmt = conn
            .prepare("SELECT cache_key, payload FROM lookup_cache WHERE kind = ?")
            .map_err(|e| CacheError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![kind], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| CacheError::Database(e.to_string()))?;

        let mut entries = HashMap::new();
        for row in rows {
            let (key, payload) = row.map_err(|e| CacheError::Database(e.to_string()))?;
            let value: T = serde_json::from_str(&payload)
                .map_err(|e| CacheError::Decode(format!("{}/{}: {}", kind, key, e)))?;
            entries.insert(key, value);
        }
        Ok(entries)
    }

    fn insert_kind<T: Serialize>(
        tx: &rusqlite::Transaction<'_>,
        kind: &str,
        entries: &HashMap<String, T>,
        updated_at: &str,
    ) -> Result<(), CacheError> {
        let mut stmt = tx
            .prepare(
                "INSERT INTO lookup_cache (kind, cache_key, payload, updated_at)
                 VALUES (?, ?, ?, ?)",
            )
            .map_err(|e| CacheError::Database(e.to_string()))?;

        for (key, value) in entries {
            let payload =
                serde_json::to_string(value).map_err(|e| CacheError::Decode(e.to_string()))?;
            stmt.execute(params![kind, key, payload, updated_at])
                .map_err(|e| CacheError::Database(e.to_string()))?;
        }
        Ok(())
    }
}

impl MetadataCache for SqliteMetadataCache {
    fn load(&self) -> Result<CacheState, CacheError> {
        let conn = self.lock()?;
        Ok(CacheState {
            movies: Self::load_kind(&conn, KIND_MOVIE)?,
            seasons: Self::load_kind(&conn, KIND_SEASON)?,
            episodes: Self::load_kind(&conn, KIND_EPISODE)?,
        })
    }

    fn save(&self, state: &CacheState) -> Result<(), CacheError> {
        let mut conn = self.lock()?;
        let now = Utc::now().to_rfc3339();

        let tx = conn
            .transaction()
            .map_err(|e| CacheError::Database(e.to_string()))?;
        tx.execute("DELETE FROM lookup_cache", [])
            .map_err(|e| CacheError::Database(e.to_string()))?;
        Self::insert_kind(&tx, KIND_MOVIE, &state.movies, &now)?;
        Self::insert_kind(&tx, KIND_SEASON, &state.seasons, &now)?;
        Self::insert_kind(&tx, KIND_EPISODE, &state.episodes, &now)?;
        tx.commit()
            .map_err(|e| CacheError::Database(e.to_string()))?;

        Ok(())
    }
}
