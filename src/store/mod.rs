pub mod backup;
pub mod sqlite;
pub mod traits;

pub use backup::BackupTags;
pub use sqlite::SqliteTagStore;
pub use traits::{StoreError, Tag, TagStore};

use crate::config::Config;
use std::sync::Arc;

/// Open the configured tag store. Failures are logged and yield `None`;
/// the bot keeps running on the backup snapshot.
pub fn create_tag_store(config: &Config) -> Option<Arc<dyn TagStore>> {
    if !config.store.enabled {
        tracing::info!("Tag store disabled in config");
        return None;
    }
    let path = config.resolve_path(&config.store.path);
    match SqliteTagStore::open(&path, &config.store.table) {
        Ok(store) => {
            tracing::info!(path = %path.display(), table = %config.store.table, "Tag store opened");
            Some(Arc::new(store))
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), "Tag store unavailable, using backup tags: {e}");
            None
        }
    }
}

pub fn load_backup_tags(config: &Config) -> BackupTags {
    BackupTags::load(&config.resolve_path(&config.store.backup_tags))
}
