use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named snippet of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub content: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("tag store unavailable: {0}")]
    Unavailable(String),
    #[error("invalid table name {0:?}")]
    InvalidTable(String),
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("store task failed: {0}")]
    Task(String),
}

/// Persistent tag storage.
#[async_trait]
pub trait TagStore: Send + Sync {
    /// Insert or replace a tag.
    async fn insert(&self, name: &str, content: &str) -> Result<(), StoreError>;
    async fn get(&self, name: &str) -> Result<Option<Tag>, StoreError>;
    /// Delete one tag, or every tag when `name` is `None`. Returns the number removed.
    async fn delete(&self, name: Option<&str>) -> Result<usize, StoreError>;
    /// All tag names in alphabetical order.
    async fn list(&self) -> Result<Vec<String>, StoreError>;
    fn name(&self) -> &str;
}
