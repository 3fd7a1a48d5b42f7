//! Per-scope settings records and the store that serves them.
//!
//! A [`ContextRecord`] holds the language, prefix and free-form flags of one
//! guild (or of one direct-message channel). Stores follow
//! read-through-create semantics: the first lookup of an unknown id creates
//! and persists a default record instead of failing.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::StoreResult;
use crate::translation::DEFAULT_LANGUAGE;

/// Persisted settings for a guild or direct-message channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextRecord {
    pub id: String,
    pub language: String,
    pub prefix: String,
    #[serde(default)]
    pub flags: Map<String, Value>,
}

impl ContextRecord {
    /// Creates the default record for `id`.
    pub fn new(id: impl Into<String>, default_prefix: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            language: DEFAULT_LANGUAGE.to_string(),
            prefix: default_prefix.into(),
            flags: Map::new(),
        }
    }

    /// Returns `true` if the flag is set to boolean `true`.
    pub fn flag(&self, name: &str) -> bool {
        self.flags.get(name).and_then(Value::as_bool).unwrap_or(false)
    }
}

/// Read-through-create access to context records.
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Fetches the record for `id`, creating a default one on first access.
    async fn get_context(&self, id: &str) -> StoreResult<ContextRecord>;

    /// Replaces the stored record.
    async fn put_context(&self, record: ContextRecord) -> StoreResult<()>;
}

/// In-process [`ContextStore`] backed by a hash map.
pub struct MemoryContextStore {
    default_prefix: String,
    records: RwLock<HashMap<String, ContextRecord>>,
}

impl MemoryContextStore {
    /// Creates an empty store whose new records use `default_prefix`.
    pub fn new(default_prefix: impl Into<String>) -> Self {
        Self {
            default_prefix: default_prefix.into(),
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Number of records created so far.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl ContextStore for MemoryContextStore {
    async fn get_context(&self, id: &str) -> StoreResult<ContextRecord> {
        if let Some(record) = self.records.read().get(id) {
            return Ok(record.clone());
        }
        let mut records = self.records.write();
        let record = records.entry(id.to_string()).or_insert_with(|| {
            debug!(context = %id, "Created default context record");
            ContextRecord::new(id, self.default_prefix.clone())
        });
        Ok(record.clone())
    }

    async fn put_context(&self, record: ContextRecord) -> StoreResult<()> {
        self.records.write().insert(record.id.clone(), record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_context_creates_default() {
        let store = MemoryContextStore::new("z-");
        assert!(store.is_empty());

        let record = store.get_context("guild-1").await.unwrap();
        assert_eq!(record.id, "guild-1");
        assert_eq!(record.language, "en");
        assert_eq!(record.prefix, "z-");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_put_context_overrides_prefix() {
        let store = MemoryContextStore::new("z-");
        let mut record = store.get_context("guild-1").await.unwrap();
        record.prefix = "!".into();
        record.flags.insert("nsfw_ok".into(), Value::Bool(true));
        store.put_context(record).await.unwrap();

        let reloaded = store.get_context("guild-1").await.unwrap();
        assert_eq!(reloaded.prefix, "!");
        assert!(reloaded.flag("nsfw_ok"));
        assert!(!reloaded.flag("missing"));
    }
}
