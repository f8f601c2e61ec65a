use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// An account on the chat service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: String,
    pub name: String,
    pub discriminator: Option<String>,
    pub bot: bool,
}

impl UserRef {
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }

    /// `name#1234` when the account still has a discriminator, `name` otherwise.
    pub fn display_tag(&self) -> String {
        match self.discriminator.as_deref() {
            Some(d) if !d.is_empty() && d != "0" => format!("{}#{d}", self.name),
            _ => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRef {
    pub id: String,
    pub name: Option<String>,
    /// Direct/private conversation rather than a server channel.
    pub private: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRef {
    pub id: String,
    pub name: Option<String>,
}

/// A message received from the transport's event stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub id: String,
    pub content: String,
    pub author: UserRef,
    pub channel: ChannelRef,
    pub server: Option<ServerRef>,
    pub timestamp: DateTime<Utc>,
}

impl IncomingMessage {
    /// Where the message came from: `Private Message` or `#channel (server)`.
    pub fn origin(&self) -> String {
        if self.channel.private {
            return "Private Message".to_string();
        }
        let channel = self.channel.name.as_deref().unwrap_or(&self.channel.id);
        match &self.server {
            Some(server) => format!(
                "#{channel} ({})",
                server.name.as_deref().unwrap_or(&server.id)
            ),
            None => format!("#{channel}"),
        }
    }
}

/// Handle to a message the bot created or edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentMessage {
    pub id: String,
    pub channel_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Idle,
    Dnd,
    Invisible,
}

impl PresenceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Idle => "idle",
            Self::Dnd => "dnd",
            Self::Invisible => "invisible",
        }
    }

    /// Parse a user-supplied status; blank means online.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "online" => Some(Self::Online),
            "idle" | "away" => Some(Self::Idle),
            "dnd" | "do_not_disturb" => Some(Self::Dnd),
            "invisible" | "offline" => Some(Self::Invisible),
            _ => None,
        }
    }
}

/// Status plus optional "playing" activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presence {
    pub status: PresenceStatus,
    pub activity: Option<String>,
    pub afk: bool,
}

impl Default for Presence {
    fn default() -> Self {
        Self {
            status: PresenceStatus::Online,
            activity: None,
            afk: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("missing permission: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("transport failure: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Connection to a chat service: one inbound event stream plus the outbound
/// operations the dispatcher renders responses with.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Forward incoming messages into `tx` until the connection drops.
    /// Returning `Ok(())` means the transport shut down on purpose.
    async fn listen(&self, tx: mpsc::Sender<IncomingMessage>) -> anyhow::Result<()>;

    /// The account this transport acts as.
    async fn current_user(&self) -> Result<UserRef, TransportError>;

    /// Id of the account that owns the bot application.
    async fn application_owner(&self) -> Result<String, TransportError>;

    async fn send(&self, channel_id: &str, content: &str) -> Result<SentMessage, TransportError>;

    async fn edit(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<SentMessage, TransportError>;

    async fn delete(&self, channel_id: &str, message_id: &str) -> Result<(), TransportError>;

    async fn set_presence(&self, presence: &Presence) -> Result<(), TransportError>;

    /// Close the connection; a running `listen` returns `Ok(())`.
    async fn logout(&self) -> Result<(), TransportError>;
}
