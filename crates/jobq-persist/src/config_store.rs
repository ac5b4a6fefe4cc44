//! Key/value configuration table

use chrono::Utc;
use jobq_queue::config::KNOWN_KEYS;
use jobq_queue::QueueSettings;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::StorageError;

/// Queue tunables stored in the `config` table, shared by every process
/// pointed at the same database.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    pool: SqlitePool,
}

impl ConfigStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert default values for keys that have never been set.
    pub async fn seed_defaults(&self) -> Result<(), StorageError> {
        let now = Utc::now().timestamp_micros();
        for (key, value) in QueueSettings::default_pairs() {
            sqlx::query("INSERT OR IGNORE INTO config (key, value, updated_at) VALUES (?, ?, ?)")
                .bind(key)
                .bind(value)
                .bind(now)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let key = QueueSettings::normalize_key(key);
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM config WHERE key = ?")
            .bind(&key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(v,)| v))
    }

    /// Validate and store a value. Unknown keys are rejected.
    pub async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let key = QueueSettings::normalize_key(key);
        if !KNOWN_KEYS.contains(&key.as_str()) {
            return Err(StorageError::Invalid(format!(
                "unknown config key '{}' (expected one of: {})",
                key,
                KNOWN_KEYS.join(", ")
            )));
        }

        let mut probe = QueueSettings::default();
        probe
            .apply(&key, value)
            .map_err(|e| StorageError::Invalid(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO config (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(&key)
        .bind(value.trim())
        .bind(Utc::now().timestamp_micros())
        .execute(&self.pool)
        .await?;

        info!(key = %key, value = %value.trim(), "Config updated");
        Ok(())
    }

    /// All stored pairs, ordered by key.
    pub async fn all(&self) -> Result<Vec<(String, String)>, StorageError> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT key, value FROM config ORDER BY key")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }

    /// Stored values layered over the defaults.
    pub async fn load_settings(&self) -> Result<QueueSettings, StorageError> {
        let pairs = self.all().await?;
        QueueSettings::from_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .map_err(|e| StorageError::Invalid(e.to_string()))
    }
}
