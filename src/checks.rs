use crate::config::{self, Config, ConfigIssue, LoadOutcome};
use std::fmt::Write as _;
use std::path::Path;

/// Result of the startup checks. Every check runs; failures are collected rather than
/// stopping at the first one.
#[derive(Debug, Default)]
pub struct CheckReport {
    pub config: Option<Config>,
    pub failures: Vec<String>,
    pub warnings: Vec<ConfigIssue>,
}

impl CheckReport {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    /// One `ERROR:` line per failure, one `WARNING:` line per warning.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for failure in &self.failures {
            let _ = writeln!(out, "ERROR: {failure}");
        }
        for warning in &self.warnings {
            let _ = writeln!(out, "WARNING: {}: {}", warning.field, warning.message);
        }
        out
    }
}

/// Run the startup checks against `config_dir`.
///
/// `require_token` is set when the bot is about to connect to the chat service.
pub async fn run_startup_checks(config_dir: &Path, require_token: bool) -> CheckReport {
    let mut report = CheckReport::default();

    if !config_dir.is_dir() {
        report.failures.push(format!(
            "Config directory {} does not exist",
            config_dir.display()
        ));
        return report;
    }

    let config = match Config::load_or_init(config_dir).await {
        Ok(LoadOutcome::Loaded(config)) => config,
        Ok(LoadOutcome::Created(path)) => {
            report.failures.push(format!(
                "No config found; a default one was written to {}. Set a token in it and restart",
                path.display()
            ));
            return report;
        }
        Err(e) => {
            report.failures.push(format!("{e:#}"));
            return report;
        }
    };

    if require_token && config.token.trim().is_empty() {
        report
            .failures
            .push("No token configured; set `token` in turbo.toml or TURBO_TOKEN".into());
    }

    let validator = config::create_validator();
    for issue in validator.validate(&config) {
        if issue.is_error() {
            report
                .failures
                .push(format!("{}: {}", issue.field, issue.message));
        } else if !(require_token && issue.field == "token") {
            report.warnings.push(issue);
        }
    }

    report.config = Some(config);
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_directory_is_a_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let report = run_startup_checks(&tmp.path().join("nope"), true).await;
        assert!(!report.is_ok());
        assert!(report.render().starts_with("ERROR: Config directory"));
        assert!(report.config.is_none());
    }

    #[tokio::test]
    async fn missing_file_is_created_and_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let report = run_startup_checks(tmp.path(), true).await;
        assert!(!report.is_ok());
        assert!(report.failures[0].contains("default one was written"));
        assert!(tmp.path().join(config::CONFIG_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn all_failures_are_reported_together() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(config::CONFIG_FILE_NAME),
            "token = \"\"\nprefix = \" \"\n[http]\ntimeout_secs = 0\n",
        )
        .unwrap();

        let report = run_startup_checks(tmp.path(), true).await;
        assert_eq!(report.failures.len(), 3, "{:?}", report.failures);
        assert!(report.config.is_some());
    }

    #[tokio::test]
    async fn empty_token_is_only_a_warning_without_connecting() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(config::CONFIG_FILE_NAME), "prefix = \"?\"\n").unwrap();

        let report = run_startup_checks(tmp.path(), false).await;
        assert!(report.is_ok());
        assert!(report.render().contains("WARNING: token"));
    }

    #[tokio::test]
    async fn unparsable_file_is_a_failure() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(config::CONFIG_FILE_NAME), "prefix = [").unwrap();
        let report = run_startup_checks(tmp.path(), false).await;
        assert!(report.failures[0].contains("Failed to parse config file"));
    }
}
