pub mod console;
pub mod discord;
pub mod traits;

pub use console::ConsoleTransport;
pub use discord::DiscordTransport;
pub use traits::{
    ChannelRef, ChatTransport, IncomingMessage, Presence, PresenceStatus, SentMessage, ServerRef,
    TransportError, UserRef,
};

use crate::config::Config;
use std::sync::Arc;

/// Transport selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Discord,
    Console,
}

pub fn create_transport(
    kind: TransportKind,
    config: &Config,
    client: reqwest::Client,
) -> anyhow::Result<Arc<dyn ChatTransport>> {
    match kind {
        TransportKind::Discord => {
            if config.token.trim().is_empty() {
                anyhow::bail!("No token configured; set `token` in turbo.toml or TURBO_TOKEN");
            }
            Ok(Arc::new(DiscordTransport::new(
                &config.token,
                config.bot_account,
                client,
            )))
        }
        TransportKind::Console => Ok(Arc::new(ConsoleTransport::new("operator"))),
    }
}
