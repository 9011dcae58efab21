//! Persisted UI preferences (view mode, dashboard layout).
//!
//! Preferences live in a small SQLite key/value table. Every row is loaded at
//! open; writes go to the table first and then to memory, so the last write
//! wins for both.

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::RwLock;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use thiserror::Error;

const VIEW_MODE_KEY: &str = "view_mode";
const DASHBOARD_LAYOUT_KEY: &str = "dashboard_layout";

#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid value for preference {key}: {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not resolve a data directory for preferences")]
    NoDataDir,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which side of the marketplace the user is browsing as.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Buyer,
    Seller,
}

impl ViewMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ViewMode::Buyer => "buyer",
            ViewMode::Seller => "seller",
        }
    }
}

impl core::fmt::Display for ViewMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order and visibility of the seller dashboard widgets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardLayout {
    pub widgets: Vec<String>,
    #[serde(default)]
    pub hidden: Vec<String>,
}

impl Default for DashboardLayout {
    fn default() -> Self {
        Self {
            widgets: ["revenue", "orders", "products", "reviews"]
                .into_iter()
                .map(String::from)
                .collect(),
            hidden: Vec::new(),
        }
    }
}

impl DashboardLayout {
    pub fn visible(&self) -> impl Iterator<Item = &str> {
        self.widgets
            .iter()
            .filter(|w| !self.hidden.contains(w))
            .map(String::as_str)
    }
}

/// SQLite-backed preference store with an in-memory mirror.
#[derive(Debug)]
pub struct PreferenceStore {
    pool: SqlitePool,
    values: RwLock<HashMap<String, serde_json::Value>>,
}

impl PreferenceStore {
    /// Open (creating if needed) the store at a SQLite URL such as
    /// `sqlite://prefs.db` or `sqlite::memory:`.
    pub async fn open(url: &str) -> Result<Self, PreferenceError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        // each in-memory connection is its own database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS preferences (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        let rows = sqlx::query("SELECT key, value FROM preferences")
            .fetch_all(&pool)
            .await?;

        let mut values = HashMap::with_capacity(rows.len());
        for row in rows {
            let key: String = row.try_get("key")?;
            let raw: String = row.try_get("value")?;
            match serde_json::from_str(&raw) {
                Ok(value) => {
                    values.insert(key, value);
                }
                Err(err) => {
                    tracing::warn!(key = %key, error = %err, "skipping unreadable preference");
                }
            }
        }
        tracing::debug!(count = values.len(), "preferences loaded");

        Ok(Self {
            pool,
            values: RwLock::new(values),
        })
    }

    /// Open the store at `{data_dir}/roastah/preferences.db`.
    pub async fn open_default() -> Result<Self, PreferenceError> {
        let path = default_db_path()?;
        Self::open(&format!("sqlite://{}", path.to_string_lossy())).await
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let values = self.values.read().ok()?;
        let value = values.get(key)?.clone();
        match serde_json::from_value(value) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                tracing::warn!(key, error = %err, "stored preference has unexpected shape");
                None
            }
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), PreferenceError> {
        let json = serde_json::to_value(value).map_err(|source| PreferenceError::Serialization {
            key: key.to_string(),
            source,
        })?;

        sqlx::query(
            r#"
            INSERT INTO preferences (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(json.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        if let Ok(mut values) = self.values.write() {
            values.insert(key.to_string(), json);
        }
        Ok(())
    }

    pub async fn remove(&self, key: &str) -> Result<(), PreferenceError> {
        sqlx::query("DELETE FROM preferences WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        if let Ok(mut values) = self.values.write() {
            values.remove(key);
        }
        Ok(())
    }

    pub fn view_mode(&self) -> ViewMode {
        self.get(VIEW_MODE_KEY).unwrap_or_default()
    }

    pub async fn set_view_mode(&self, mode: ViewMode) -> Result<(), PreferenceError> {
        self.set(VIEW_MODE_KEY, &mode).await
    }

    pub fn dashboard_layout(&self) -> DashboardLayout {
        self.get(DASHBOARD_LAYOUT_KEY).unwrap_or_default()
    }

    pub async fn set_dashboard_layout(
        &self,
        layout: &DashboardLayout,
    ) -> Result<(), PreferenceError> {
        self.set(DASHBOARD_LAYOUT_KEY, layout).await
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

fn default_db_path() -> Result<PathBuf, PreferenceError> {
    let mut dir = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut h| {
                h.push(".local");
                h.push("share");
                h
            })
        })
        .ok_or(PreferenceError::NoDataDir)?;
    dir.push("roastah");
    std::fs::create_dir_all(&dir)?;
    dir.push("preferences.db");
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn defaults_when_empty() {
        let store = PreferenceStore::open("sqlite::memory:").await.unwrap();
        assert_eq!(store.view_mode(), ViewMode::Buyer);
        assert_eq!(store.dashboard_layout(), DashboardLayout::default());
        assert_eq!(store.get::<String>("missing"), None);
    }

    #[tokio::test]
    async fn last_write_wins() {
        let store = PreferenceStore::open("sqlite::memory:").await.unwrap();
        store.set_view_mode(ViewMode::Seller).await.unwrap();
        store.set_view_mode(ViewMode::Buyer).await.unwrap();
        assert_eq!(store.view_mode(), ViewMode::Buyer);

        store.remove(VIEW_MODE_KEY).await.unwrap();
        assert_eq!(store.get::<ViewMode>(VIEW_MODE_KEY), None);
    }

    #[tokio::test]
    async fn values_survive_reopen() {
        let path = std::env::temp_dir().join(format!("roastah-prefs-{}.db", uuid::Uuid::now_v7()));
        let url = format!("sqlite://{}", path.to_string_lossy());

        let layout = DashboardLayout {
            widgets: vec!["orders".to_string(), "revenue".to_string()],
            hidden: vec!["revenue".to_string()],
        };
        {
            let store = PreferenceStore::open(&url).await.unwrap();
            store.set_view_mode(ViewMode::Seller).await.unwrap();
            store.set_dashboard_layout(&layout).await.unwrap();
            store.close().await;
        }

        let reopened = PreferenceStore::open(&url).await.unwrap();
        assert_eq!(reopened.view_mode(), ViewMode::Seller);
        assert_eq!(reopened.dashboard_layout(), layout);
        assert_eq!(reopened.dashboard_layout().visible().collect::<Vec<_>>(), vec!["orders"]);
        reopened.close().await;

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn mismatched_shape_reads_as_absent() {
        let store = PreferenceStore::open("sqlite::memory:").await.unwrap();
        store.set(VIEW_MODE_KEY, &42).await.unwrap();
        assert_eq!(store.view_mode(), ViewMode::Buyer);
    }
}
