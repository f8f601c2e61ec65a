use super::traits::{
    ChannelRef, ChatTransport, IncomingMessage, Presence, SentMessage, TransportError, UserRef,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

const CONSOLE_CHANNEL: &str = "console";

/// Local transport: each stdin line is a message written by the operator,
/// who is also the acting account.
pub struct ConsoleTransport {
    operator: UserRef,
    closed: AtomicBool,
    presence: Mutex<Presence>,
}

impl ConsoleTransport {
    pub fn new(operator_name: &str) -> Self {
        Self {
            operator: UserRef {
                id: "0".to_string(),
                name: operator_name.to_string(),
                discriminator: None,
                bot: false,
            },
            closed: AtomicBool::new(false),
            presence: Mutex::new(Presence::default()),
        }
    }

    fn message_from_line(&self, line: &str) -> IncomingMessage {
        IncomingMessage {
            id: uuid::Uuid::new_v4().to_string(),
            content: line.to_string(),
            author: self.operator.clone(),
            channel: ChannelRef {
                id: CONSOLE_CHANNEL.to_string(),
                name: Some(CONSOLE_CHANNEL.to_string()),
                private: false,
            },
            server: None,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Feed lines from any reader; `listen` uses stdin.
    pub async fn listen_from<R>(
        &self,
        reader: R,
        tx: mpsc::Sender<IncomingMessage>,
    ) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if self.closed.load(Ordering::SeqCst) {
                break;
            }
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            if tx.send(self.message_from_line(line)).await.is_err() {
                break;
            }
        }
        Ok(())
    }

    pub fn presence(&self) -> Presence {
        self.presence.lock().clone()
    }
}

#[async_trait]
impl ChatTransport for ConsoleTransport {
    fn name(&self) -> &str {
        "console"
    }

    async fn listen(&self, tx: mpsc::Sender<IncomingMessage>) -> anyhow::Result<()> {
        println!("Type commands below. Ctrl-D or the shutdown command exits.");
        self.listen_from(BufReader::new(tokio::io::stdin()), tx)
            .await
    }

    async fn current_user(&self) -> Result<UserRef, TransportError> {
        Ok(self.operator.clone())
    }

    async fn application_owner(&self) -> Result<String, TransportError> {
        Ok(self.operator.id.clone())
    }

    async fn send(&self, channel_id: &str, content: &str) -> Result<SentMessage, TransportError> {
        let id = uuid::Uuid::new_v4().to_string();
        println!("{content}");
        Ok(SentMessage {
            id,
            channel_id: channel_id.to_string(),
        })
    }

    async fn edit(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<SentMessage, TransportError> {
        println!("{content}");
        Ok(SentMessage {
            id: message_id.to_string(),
            channel_id: channel_id.to_string(),
        })
    }

    async fn delete(&self, _channel_id: &str, message_id: &str) -> Result<(), TransportError> {
        tracing::debug!(message_id, "Console: message deleted");
        Ok(())
    }

    async fn set_presence(&self, presence: &Presence) -> Result<(), TransportError> {
        *self.presence.lock() = presence.clone();
        tracing::info!(
            status = presence.status.as_str(),
            activity = presence.activity.as_deref().unwrap_or(""),
            "Console: presence updated"
        );
        Ok(())
    }

    async fn logout(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
