use std::{fs, path::Path, path::PathBuf};

use sqlx::{Row, SqlitePool, migrate::Migrator, sqlite::SqliteConnectOptions};
use thiserror::Error;

use super::detector::SyncTrie;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const TRIE_KEY: &str = "directory_trie";
const TASKS_KEY: &str = "active_tasks";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid stored value for {key}: {source}")]
    Json {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("XDG data directory is unavailable")]
    MissingDataDir,
}

/// Everything a run reads at start and writes back at the end.
#[derive(Debug, Clone, Default)]
pub struct MirrorState {
    pub trie: SyncTrie,
    pub active_tasks: Vec<String>,
}

#[derive(Clone)]
pub struct StateStore {
    pool: SqlitePool,
}

impl StateStore {
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (and creates if needed) the state file at `path`.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    pub async fn init(&self) -> Result<(), StoreError> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    /// Missing keys load as empty values.
    pub async fn load(&self) -> Result<MirrorState, StoreError> {
        let trie = match self.get_value(TRIE_KEY).await? {
            Some(raw) => decode(TRIE_KEY, &raw)?,
            None => SyncTrie::new(),
        };
        let active_tasks = match self.get_value(TASKS_KEY).await? {
            Some(raw) => decode(TASKS_KEY, &raw)?,
            None => Vec::new(),
        };
        Ok(MirrorState { trie, active_tasks })
    }

    /// Writes both keys in one transaction.
    pub async fn save(&self, state: &MirrorState) -> Result<(), StoreError> {
        let trie = encode(TRIE_KEY, &state.trie)?;
        let tasks = encode(TASKS_KEY, &state.active_tasks)?;
        let now = now_unix();

        let mut tx = self.pool.begin().await?;
        for (key, value) in [(TRIE_KEY, trie), (TASKS_KEY, tasks)] {
            sqlx::query(
                "INSERT INTO state (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                     value = excluded.value,
                     updated_at = excluded.updated_at",
            )
            .bind(key)
            .bind(value)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn updated_at(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let row = sqlx::query("SELECT updated_at FROM state WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(match row {
            Some(row) => Some(row.try_get("updated_at")?),
            None => None,
        })
    }

    async fn get_value(&self, key: &str) -> Result<Option<String>, StoreError> {
        let row = sqlx::query("SELECT value FROM state WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(match row {
            Some(row) => Some(row.try_get("value")?),
            None => None,
        })
    }
}

pub fn default_state_path() -> Result<PathBuf, StoreError> {
    let base = dirs::data_dir().ok_or(StoreError::MissingDataDir)?;
    Ok(base.join("treemirror").join("state.db"))
}

fn decode<T: serde::de::DeserializeOwned>(key: &'static str, raw: &str) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|source| StoreError::Json { key, source })
}

fn encode<T: serde::Serialize>(key: &'static str, value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|source| StoreError::Json { key, source })
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|duration| duration.as_secs() as i64)
        .unwrap_or_default()
}
