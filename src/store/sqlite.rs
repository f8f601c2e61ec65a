use super::traits::{StoreError, Tag, TagStore};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Tag store backed by a single SQLite connection.
pub struct SqliteTagStore {
    conn: Arc<Mutex<Connection>>,
    table: String,
}

fn valid_table_name(table: &str) -> bool {
    !table.is_empty() && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl SqliteTagStore {
    pub fn open(path: &Path, table: &str) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Unavailable(format!("cannot create {}: {e}", parent.display()))
                })?;
            }
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn, table)
    }

    pub fn open_in_memory(table: &str) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?, table)
    }

    fn with_connection(conn: Connection, table: &str) -> Result<Self, StoreError> {
        if !valid_table_name(table) {
            return Err(StoreError::InvalidTable(table.to_string()));
        }
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                name TEXT PRIMARY KEY NOT NULL,
                content TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );"
        ))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            table: table.to_string(),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn interact<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection, &str) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let table = self.table.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            f(&guard, &table)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

#[async_trait]
impl TagStore for SqliteTagStore {
    async fn insert(&self, name: &str, content: &str) -> Result<(), StoreError> {
        let name = name.to_string();
        let content = content.to_string();
        self.interact(move |conn, table| {
            conn.execute(
                &format!(
                    "INSERT INTO {table} (name, content, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(name) DO UPDATE SET content = excluded.content,
                                                     updated_at = excluded.updated_at"
                ),
                params![name, content, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
        .await
    }

    async fn get(&self, name: &str) -> Result<Option<Tag>, StoreError> {
        let name = name.to_string();
        self.interact(move |conn, table| {
            let row = conn
                .query_row(
                    &format!("SELECT name, content, updated_at FROM {table} WHERE name = ?1"),
                    params![name],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    },
                )
                .optional()?;
            Ok(row.map(|(name, content, updated_at)| Tag {
                name,
                content,
                updated_at: chrono::DateTime::parse_from_rfc3339(&updated_at)
                    .map(|ts| ts.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            }))
        })
        .await
    }

    async fn delete(&self, name: Option<&str>) -> Result<usize, StoreError> {
        let name = name.map(str::to_string);
        self.interact(move |conn, table| {
            let removed = match name {
                Some(name) => conn.execute(
                    &format!("DELETE FROM {table} WHERE name = ?1"),
                    params![name],
                )?,
                None => conn.execute(&format!("DELETE FROM {table}"), [])?,
            };
            Ok(removed)
        })
        .await
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        self.interact(|conn, table| {
            let mut stmt = conn.prepare(&format!("SELECT name FROM {table} ORDER BY name"))?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(names)
        })
        .await
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_get_and_upsert() {
        let store = SqliteTagStore::open_in_memory("tags").unwrap();
        tokio_test::assert_ok!(store.insert("rust", "fast").await);
        tokio_test::assert_ok!(store.insert("rust", "fast and safe").await);

        let tag = store.get("rust").await.unwrap().unwrap();
        assert_eq!(tag.content, "fast and safe");
        assert_eq!(store.list().await.unwrap(), vec!["rust".to_string()]);
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_one_and_clear() {
        let store = SqliteTagStore::open_in_memory("tags").unwrap();
        for name in ["b", "a", "c"] {
            store.insert(name, "x").await.unwrap();
        }
        assert_eq!(store.list().await.unwrap(), vec!["a", "b", "c"]);
        assert_eq!(store.delete(Some("b")).await.unwrap(), 1);
        assert_eq!(store.delete(Some("b")).await.unwrap(), 0);
        assert_eq!(store.delete(None).await.unwrap(), 2);
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("data").join("tags.db");
        {
            let store = SqliteTagStore::open(&path, "tags").unwrap();
            store.insert("hello", "world").await.unwrap();
        }
        let store = SqliteTagStore::open(&path, "tags").unwrap();
        assert_eq!(store.get("hello").await.unwrap().unwrap().content, "world");
    }

    #[test]
    fn rejects_unsafe_table_names() {
        let err = SqliteTagStore::open_in_memory("tags; DROP TABLE x").err().unwrap();
        assert!(matches!(err, StoreError::InvalidTable(_)));
    }
}
