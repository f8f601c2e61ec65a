pub mod schema;
pub mod traits;

pub use schema::{
    expand_path, resolve_config_dir, AliasConfig, Config, HttpConfig, LoadOutcome, LoggingConfig,
    StoreConfig, SubprocessConfig, CONFIG_DIR_ENV, CONFIG_FILE_NAME,
};
pub use traits::{ConfigIssue, ConfigIssueSeverity, ConfigValidator, DefaultConfigValidator};

pub fn create_validator() -> Box<dyn ConfigValidator> {
    Box::new(DefaultConfigValidator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reexported_config_default_is_constructible() {
        let config = Config::default();

        assert_eq!(config.prefix, "!");
        assert_eq!(config.config_path, config.config_dir.join(CONFIG_FILE_NAME));
        assert_eq!(create_validator().name(), "default");
    }
}
