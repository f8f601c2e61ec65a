use super::schema::Config;
use std::fmt;

/// Config validator for checking configuration consistency.
pub trait ConfigValidator: Send + Sync {
    /// Validate a configuration, returning a list of warnings/errors.
    fn validate(&self, config: &Config) -> Vec<ConfigIssue>;
    /// Return the validator name.
    fn name(&self) -> &str;
}

/// Severity level for configuration issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigIssueSeverity {
    Warning,
    Error,
}

/// A single configuration issue found during validation.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigIssueSeverity,
    pub field: String,
    pub message: String,
}

impl ConfigIssue {
    fn error(field: &str, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigIssueSeverity::Error,
            field: field.to_string(),
            message: message.into(),
        }
    }

    fn warning(field: &str, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigIssueSeverity::Warning,
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == ConfigIssueSeverity::Error
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            ConfigIssueSeverity::Warning => "warning",
            ConfigIssueSeverity::Error => "error",
        };
        write!(f, "{level}: {}: {}", self.field, self.message)
    }
}

/// Checks the values that would otherwise fail at arbitrary points at runtime.
pub struct DefaultConfigValidator;

impl ConfigValidator for DefaultConfigValidator {
    fn validate(&self, config: &Config) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if config.prefix.is_empty() {
            issues.push(ConfigIssue::error("prefix", "must not be empty"));
        } else if config.prefix.chars().any(char::is_whitespace) {
            issues.push(ConfigIssue::error("prefix", "must not contain whitespace"));
        }

        if config.http.timeout_secs == 0 {
            issues.push(ConfigIssue::error(
                "http.timeout_secs",
                "must be greater than 0",
            ));
        }

        let table = &config.store.table;
        if table.is_empty()
            || !table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            issues.push(ConfigIssue::error(
                "store.table",
                format!("{table:?} is not a valid table name; expected [A-Za-z0-9_]+"),
            ));
        }

        if config.token.trim().is_empty() {
            issues.push(ConfigIssue::warning(
                "token",
                "no token configured; `run` will refuse to start",
            ));
        }

        if config.selfbot && config.bot_account {
            issues.push(ConfigIssue::warning(
                "selfbot",
                "selfbot mode on a bot account only answers the bot's own messages",
            ));
        }

        issues
    }

    fn name(&self) -> &str {
        "default"
    }
}
