use std::collections::BTreeMap;
use std::path::Path;

/// Read-only tag snapshot used while the database is unavailable.
///
/// The file is a JSON object of `name -> content`. A missing or malformed
/// file yields an empty snapshot.
#[derive(Debug, Clone, Default)]
pub struct BackupTags {
    tags: BTreeMap<String, String>,
}

impl BackupTags {
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!(path = %path.display(), "No backup tags loaded: {e}");
                return Self::default();
            }
        };
        match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
            Ok(tags) => {
                tracing::info!(path = %path.display(), count = tags.len(), "Backup tags loaded");
                Self { tags }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "Ignoring malformed backup tags: {e}");
                Self::default()
            }
        }
    }

    pub fn from_map(tags: BTreeMap<String, String>) -> Self {
        Self { tags }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(String::as_str)
    }

    pub fn names(&self) -> Vec<String> {
        self.tags.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_object_of_strings() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("backup_tags.json");
        std::fs::write(&path, r#"{"zeta": "last", "alpha": "first"}"#).unwrap();

        let backup = BackupTags::load(&path);
        assert_eq!(backup.get("alpha"), Some("first"));
        assert_eq!(backup.names(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn missing_or_malformed_file_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(BackupTags::load(&tmp.path().join("missing.json")).is_empty());

        let path = tmp.path().join("bad.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(BackupTags::load(&path).is_empty());
    }
}
