use anyhow::{Context, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

/// File name of the bot configuration inside the config directory.
pub const CONFIG_FILE_NAME: &str = "turbo.toml";

/// Environment variable that overrides the config directory.
pub const CONFIG_DIR_ENV: &str = "TURBO_CONFIG_DIR";

// ── Top-level config ──────────────────────────────────────────────

/// Top-level Turbo configuration, loaded from `turbo.toml`.
///
/// Resolution order for the directory: `--config-dir` → `TURBO_CONFIG_DIR` → `./config`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Config {
    /// Config directory - computed at load time, not serialized
    #[serde(skip)]
    pub config_dir: PathBuf,
    /// Path to turbo.toml - computed at load time, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,
    /// Account token. Overridden by `TURBO_TOKEN`.
    #[serde(default)]
    pub token: String,
    /// `true` for a bot application account, `false` for a user account. Default: `true`.
    #[serde(default = "default_true")]
    pub bot_account: bool,
    /// Leading string that marks a command. Overridden by `TURBO_PREFIX`. Default: `"!"`.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Only respond to messages written by the operating account. Default: `false`.
    #[serde(default)]
    pub selfbot: bool,
    /// Respond to commands sent in private channels. Default: `true`.
    #[serde(default = "default_true")]
    pub allow_private: bool,
    /// Allow responses to be deleted after their delay. Default: `true`.
    #[serde(default = "default_true")]
    pub allow_deletion: bool,
    /// Edit self-authored command messages in place instead of sending a reply. Default: `true`.
    #[serde(default = "default_true")]
    pub edit_instead_of_send: bool,
    /// Shown by `help` above the command list.
    #[serde(default = "default_description")]
    pub description: String,

    /// Tag store configuration (`[store]`).
    #[serde(default)]
    pub store: StoreConfig,

    /// Command alias configuration (`[aliases]`).
    #[serde(default)]
    pub aliases: AliasConfig,

    /// Log output configuration (`[logging]`).
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Outbound HTTP configuration (`[http]`).
    #[serde(default)]
    pub http: HttpConfig,

    /// Shell command configuration (`[subprocess]`).
    #[serde(default)]
    pub subprocess: SubprocessConfig,
}

fn default_true() -> bool {
    true
}

fn default_prefix() -> String {
    "!".into()
}

fn default_description() -> String {
    "A Discord bot.".into()
}

// ── Store ────────────────────────────────────────────────────────

/// Tag store configuration (`[store]` section).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StoreConfig {
    /// Open the SQLite tag store at startup. Default: `true`.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// SQLite database path. Default: `data/tags.db`.
    #[serde(default = "default_store_path")]
    pub path: String,
    /// Table holding tags. Default: `tags`.
    #[serde(default = "default_store_table")]
    pub table: String,
    /// JSON snapshot read when the store is unavailable. Default: `config/backup_tags.json`.
    #[serde(default = "default_backup_tags")]
    pub backup_tags: String,
}

fn default_store_path() -> String {
    "data/tags.db".into()
}

fn default_store_table() -> String {
    "tags".into()
}

fn default_backup_tags() -> String {
    "config/backup_tags.json".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_store_path(),
            table: default_store_table(),
            backup_tags: default_backup_tags(),
        }
    }
}

// ── Aliases ──────────────────────────────────────────────────────

/// Command alias configuration (`[aliases]` section).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AliasConfig {
    /// Load the alias file. Default: `true`.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// JSON object mapping command names to alias lists. Default: `config/aliases.json`.
    #[serde(default = "default_alias_file")]
    pub file: String,
}

fn default_alias_file() -> String {
    "config/aliases.json".into()
}

impl Default for AliasConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            file: default_alias_file(),
        }
    }
}

// ── Logging ──────────────────────────────────────────────────────

/// Log output configuration (`[logging]` section).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LoggingConfig {
    /// Log file, truncated at every start. Unset disables file logging. Default: `turbo.log`.
    #[serde(default = "default_log_file")]
    pub file: Option<String>,
}

fn default_log_file() -> Option<String> {
    Some("turbo.log".into())
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
        }
    }
}

// ── HTTP ─────────────────────────────────────────────────────────

/// Outbound HTTP configuration (`[http]` section).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HttpConfig {
    /// Request timeout in seconds. Default: `15`.
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Endpoint used by the `cat` command.
    #[serde(default = "default_cat_api_url")]
    pub cat_api_url: String,
    /// Base URL of the GitHub REST API used by `ghissue`.
    #[serde(default = "default_github_api_url")]
    pub github_api_url: String,
}

fn default_http_timeout_secs() -> u64 {
    15
}

fn default_user_agent() -> String {
    format!("turbo/{}", env!("CARGO_PKG_VERSION"))
}

fn default_cat_api_url() -> String {
    "https://api.thecatapi.com/v1/images/search".into()
}

fn default_github_api_url() -> String {
    "https://api.github.com".into()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout_secs(),
            user_agent: default_user_agent(),
            cat_api_url: default_cat_api_url(),
            github_api_url: default_github_api_url(),
        }
    }
}

// ── Subprocess ───────────────────────────────────────────────────

/// Shell command configuration (`[subprocess]` section).
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SubprocessConfig {
    /// Enable the `subprocess` command for the account owner. Default: `false`.
    #[serde(default)]
    pub enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = PathBuf::from("config");
        Self {
            config_path: config_dir.join(CONFIG_FILE_NAME),
            config_dir,
            token: String::new(),
            bot_account: true,
            prefix: default_prefix(),
            selfbot: false,
            allow_private: true,
            allow_deletion: true,
            edit_instead_of_send: true,
            description: default_description(),
            store: StoreConfig::default(),
            aliases: AliasConfig::default(),
            logging: LoggingConfig::default(),
            http: HttpConfig::default(),
            subprocess: SubprocessConfig::default(),
        }
    }
}

/// Result of [`Config::load_or_init`].
#[derive(Debug)]
pub enum LoadOutcome {
    /// An existing config file was parsed.
    Loaded(Config),
    /// No file existed; defaults were written to `path` and need editing.
    Created(PathBuf),
}

/// Pick the config directory: explicit flag, then `TURBO_CONFIG_DIR`, then `./config`.
pub fn resolve_config_dir(explicit: Option<&Path>) -> PathBuf {
    if let Some(dir) = explicit {
        return expand_path(&dir.to_string_lossy());
    }
    match std::env::var(CONFIG_DIR_ENV) {
        Ok(dir) if !dir.trim().is_empty() => expand_path(&dir),
        _ => PathBuf::from("config"),
    }
}

/// Expand `~` and `$VARS` in a configured path; unexpandable input is used verbatim.
pub fn expand_path(raw: &str) -> PathBuf {
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(raw),
    }
}

impl Config {
    /// Parse a config document without touching the filesystem.
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse config file")
    }

    /// Load `<dir>/turbo.toml`, or write a default one when it does not exist.
    ///
    /// The directory itself must already exist; a missing directory is a startup error.
    pub async fn load_or_init(config_dir: &Path) -> Result<LoadOutcome> {
        if !config_dir.is_dir() {
            anyhow::bail!(
                "Config directory {} does not exist",
                config_dir.display()
            );
        }
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            let mut config = Config::default();
            config.config_dir = config_dir.to_path_buf();
            config.config_path = config_path.clone();
            config.save().await?;
            tracing::info!(path = %config_path.display(), "Default config written");
            return Ok(LoadOutcome::Created(config_path));
        }

        let contents = fs::read_to_string(&config_path)
            .await
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let mut config = Self::from_toml(&contents)?;
        config.config_dir = config_dir.to_path_buf();
        config.config_path = config_path;
        config.apply_env_overrides();
        tracing::info!(
            path = %config.config_path.display(),
            bot_account = config.bot_account,
            prefix = %config.prefix,
            "Config loaded"
        );
        Ok(LoadOutcome::Loaded(config))
    }

    /// Apply environment variable overrides to config
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("TURBO_TOKEN") {
            if !token.is_empty() {
                self.token = token;
            }
        }

        if let Ok(prefix) = std::env::var("TURBO_PREFIX") {
            if !prefix.is_empty() {
                self.prefix = prefix;
            }
        }
    }

    /// Resolve a path from the config file against the filesystem.
    pub fn resolve_path(&self, raw: &str) -> PathBuf {
        expand_path(raw)
    }

    pub async fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;

        let parent_dir = self
            .config_path
            .parent()
            .context("Config path must have a parent directory")?;

        let file_name = self
            .config_path
            .file_name()
            .and_then(|v| v.to_str())
            .unwrap_or(CONFIG_FILE_NAME);
        let temp_path = parent_dir.join(format!(".{file_name}.tmp-{}", uuid::Uuid::new_v4()));

        let mut temp_file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to create temporary config file: {}",
                    temp_path.display()
                )
            })?;
        temp_file
            .write_all(toml_str.as_bytes())
            .await
            .context("Failed to write temporary config contents")?;
        temp_file
            .sync_all()
            .await
            .context("Failed to fsync temporary config file")?;
        drop(temp_file);

        if let Err(e) = fs::rename(&temp_path, &self.config_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e).context("Failed to atomically replace config file");
        }

        #[cfg(unix)]
        {
            use std::{fs::Permissions, os::unix::fs::PermissionsExt};
            let _ = fs::set_permissions(&self.config_path, Permissions::from_mode(0o600)).await;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.prefix, "!");
        assert!(config.bot_account);
        assert!(!config.selfbot);
        assert!(config.allow_private);
        assert!(config.allow_deletion);
        assert!(config.edit_instead_of_send);
        assert_eq!(config.store.table, "tags");
        assert_eq!(config.http.timeout_secs, 15);
        assert!(!config.subprocess.enabled);
        assert_eq!(config.logging.file.as_deref(), Some("turbo.log"));
    }

    #[test]
    fn partial_document_fills_defaults() {
        let config = Config::from_toml(
            r#"
token = "abc"
prefix = "t!"

[store]
table = "quotes"
"#,
        )
        .unwrap();
        assert_eq!(config.token, "abc");
        assert_eq!(config.prefix, "t!");
        assert_eq!(config.store.table, "quotes");
        assert_eq!(config.store.path, "data/tags.db");
        assert!(config.aliases.enabled);
    }

    #[test]
    fn invalid_document_reports_parse_error() {
        let err = Config::from_toml("prefix = [").unwrap_err();
        assert!(err.to_string().contains("parse"));
    }

    #[test]
    fn explicit_config_dir_wins() {
        let dir = resolve_config_dir(Some(Path::new("/tmp/turbo-config")));
        assert_eq!(dir, PathBuf::from("/tmp/turbo-config"));
    }

    #[tokio::test]
    async fn missing_file_writes_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let outcome = Config::load_or_init(tmp.path()).await.unwrap();
        let path = match outcome {
            LoadOutcome::Created(path) => path,
            LoadOutcome::Loaded(_) => panic!("expected a freshly created config"),
        };
        assert!(path.exists());

        match Config::load_or_init(tmp.path()).await.unwrap() {
            LoadOutcome::Loaded(config) => {
                assert_eq!(config.config_path, path);
                assert_eq!(config.store.table, "tags");
            }
            LoadOutcome::Created(_) => panic!("second load should read the written file"),
        }
    }

    #[tokio::test]
    async fn missing_directory_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope");
        let err = Config::load_or_init(&missing).await.unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn schema_names_top_level_fields() {
        let schema = schemars::schema_for!(Config);
        let json = serde_json::to_string(&schema).unwrap();
        assert!(json.contains("edit_instead_of_send"));
        assert!(json.contains("StoreConfig"));
    }
}
