use anyhow::{Context, Result};
use serde_json::{Map, Value};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

/// SQLite-backed key/value collections holding raw JSON entries.
#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Writes `value` under `collection/key`, replacing any previous entry.
    pub async fn put_entry(&self, collection: &str, key: &str, value: &Value) -> Result<()> {
        let value_json = serde_json::to_string(value)?;
        sqlx::query(
            r#"
            INSERT INTO entries (collection, entry_key, value_json)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (collection, entry_key) DO UPDATE SET
                value_json = excluded.value_json,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(collection)
        .bind(key)
        .bind(value_json)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to write entry {collection}/{key}"))?;
        Ok(())
    }

    pub async fn get_entry(&self, collection: &str, key: &str) -> Result<Option<Value>> {
        let row = sqlx::query(
            "SELECT value_json FROM entries WHERE collection = ?1 AND entry_key = ?2",
        )
        .bind(collection)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            let raw: String = row.try_get("value_json")?;
            parse_stored_value(collection, key, &raw)
        })
        .transpose()
    }

    /// All entries of a collection keyed by entry key. An unknown
    /// collection is simply empty.
    pub async fn list_entries(&self, collection: &str) -> Result<Map<String, Value>> {
        let rows = sqlx::query(
            "SELECT entry_key, value_json FROM entries WHERE collection = ?1 ORDER BY entry_key",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("failed to list collection {collection}"))?;

        let mut entries = Map::new();
        for row in rows {
            let key: String = row.try_get("entry_key")?;
            let raw: String = row.try_get("value_json")?;
            let value = parse_stored_value(collection, &key, &raw)?;
            entries.insert(key, value);
        }
        Ok(entries)
    }

    /// Returns whether an entry was actually removed.
    pub async fn delete_entry(&self, collection: &str, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM entries WHERE collection = ?1 AND entry_key = ?2")
            .bind(collection)
            .bind(key)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete entry {collection}/{key}"))?;
        Ok(result.rows_affected() > 0)
    }
}

fn parse_stored_value(collection: &str, key: &str, raw: &str) -> Result<Value> {
    serde_json::from_str(raw)
        .with_context(|| format!("stored entry {collection}/{key} is not valid json"))
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
