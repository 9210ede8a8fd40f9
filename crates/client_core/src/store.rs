//! Record store clients.
//!
//! A store holds one collection of flat user entries keyed by record id.
//! Writes are upserts; deleting a missing key succeeds.

use std::collections::BTreeMap;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;
use shared::{
    domain::{RecordId, UserRecord},
    protocol::{decode_collection, UserEntryPayload, DEFAULT_COLLECTION},
};
use tokio::sync::Mutex;
use tracing::debug;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Writes the full record under its id.
    async fn create(&self, record: &UserRecord) -> Result<()>;
    /// Every well-formed record, sorted by case-insensitive name.
    async fn fetch_all(&self) -> Result<Vec<UserRecord>>;
    async fn delete(&self, id: &RecordId) -> Result<()>;
}

/// Client for a realtime-database style REST endpoint
/// (`PUT/DELETE {base}/{collection}/{id}.json`, `GET {base}/{collection}.json`).
pub struct HttpRecordStore {
    http: Client,
    base_url: String,
    collection: String,
}

impl HttpRecordStore {
    pub fn new(base_url: impl Into<String>, collection: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url, collection)
    }

    pub fn with_client(
        http: Client,
        base_url: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        let collection = collection.into();
        let collection = collection.trim_matches('/');
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            collection: if collection.is_empty() {
                DEFAULT_COLLECTION.to_string()
            } else {
                collection.to_string()
            },
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn collection_url(&self) -> Result<Url> {
        self.json_url(None)
    }

    fn entry_url(&self, id: &RecordId) -> Result<Url> {
        self.json_url(Some(id.as_str()))
    }

    /// `{base}/{collection}[/{key}].json` with every segment percent-encoded,
    /// so keys written by other clients cannot escape their path segment.
    fn json_url(&self, key: Option<&str>) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("invalid store url {}", self.base_url))?;
        let mut segments: Vec<String> = self.collection.split('/').map(str::to_string).collect();
        segments.extend(key.map(str::to_string));
        if let Some(last) = segments.last_mut() {
            last.push_str(".json");
        }
        url.path_segments_mut()
            .map_err(|()| anyhow!("store url {} cannot carry a path", self.base_url))?
            .pop_if_empty()
            .extend(&segments);
        Ok(url)
    }
}

#[async_trait]
impl RecordStore for HttpRecordStore {
    async fn create(&self, record: &UserRecord) -> Result<()> {
        self.http
            .put(self.entry_url(&record.id)?)
            .json(&UserEntryPayload::from(record))
            .send()
            .await
            .with_context(|| format!("failed to send write for record {}", record.id))?
            .error_for_status()
            .with_context(|| format!("store rejected write for record {}", record.id))?;
        debug!(id = %record.id, collection = %self.collection, "record written");
        Ok(())
    }

    async fn fetch_all(&self) -> Result<Vec<UserRecord>> {
        let body: Value = self
            .http
            .get(self.collection_url()?)
            .send()
            .await
            .with_context(|| format!("failed to fetch collection {}", self.collection))?
            .error_for_status()?
            .json()
            .await
            .context("collection body is not valid json")?;
        Ok(decode_collection(&body))
    }

    async fn delete(&self, id: &RecordId) -> Result<()> {
        self.http
            .delete(self.entry_url(id)?)
            .send()
            .await
            .with_context(|| format!("failed to send delete for record {id}"))?
            .error_for_status()?;
        debug!(%id, collection = %self.collection, "record deleted");
        Ok(())
    }
}

/// In-process store holding raw JSON entries, decoded the same way as
/// entries fetched over HTTP.
#[derive(Default)]
pub struct MemoryRecordStore {
    entries: Mutex<BTreeMap<String, Value>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an arbitrary entry, well-formed or not.
    pub async fn insert_raw(&self, key: impl Into<String>, value: Value) {
        self.entries.lock().await.insert(key.into(), value);
    }

    pub async fn raw_entry(&self, key: &str) -> Option<Value> {
        self.entries.lock().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create(&self, record: &UserRecord) -> Result<()> {
        let value = serde_json::to_value(UserEntryPayload::from(record))?;
        self.entries.lock().await.insert(record.id.0.clone(), value);
        Ok(())
    }

    async fn fetch_all(&self) -> Result<Vec<UserRecord>> {
        let entries = self.entries.lock().await;
        let body = Value::Object(
            entries
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        );
        Ok(decode_collection(&body))
    }

    async fn delete(&self, id: &RecordId) -> Result<()> {
        self.entries.lock().await.remove(id.as_str());
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
