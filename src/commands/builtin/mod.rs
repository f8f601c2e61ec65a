pub mod basic;
pub mod presence;
pub mod snowflake;
pub mod subprocess;
pub mod tags;
pub mod web;

pub use basic::{HelpCommand, PingCommand, ReloadCommand, ShutdownCommand, StatsCommand};
pub use presence::{PresenceCommand, StatusCommand};
pub use snowflake::SnowflakeCommand;
pub use subprocess::SubprocessCommand;
pub use tags::{ClearTagsCommand, CreateTagCommand, DeleteTagCommand, TagCommand, TagsCommand};
pub use web::{CatCommand, GhIssueCommand};

use super::traits::CommandHandler;
use std::sync::Arc;

/// Every built-in command.
pub fn all() -> Vec<Arc<dyn CommandHandler>> {
    vec![
        Arc::new(PingCommand),
        Arc::new(HelpCommand),
        Arc::new(ShutdownCommand),
        Arc::new(ReloadCommand),
        Arc::new(StatsCommand),
        Arc::new(SnowflakeCommand),
        Arc::new(StatusCommand),
        Arc::new(PresenceCommand),
        Arc::new(TagsCommand),
        Arc::new(CreateTagCommand),
        Arc::new(DeleteTagCommand),
        Arc::new(TagCommand),
        Arc::new(ClearTagsCommand),
        Arc::new(CatCommand),
        Arc::new(GhIssueCommand),
        Arc::new(SubprocessCommand),
    ]
}

/// Text following the command token, e.g. `multi word` for `!tag multi word`.
pub fn text_after_command<'a>(content: &'a str, prefix: &str) -> &'a str {
    let rest = content.trim().strip_prefix(prefix).unwrap_or(content).trim_start();
    match rest.find(char::is_whitespace) {
        Some(idx) => rest[idx..].trim(),
        None => "",
    }
}
