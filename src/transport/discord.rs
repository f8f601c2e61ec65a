use super::traits::{
    ChannelRef, ChatTransport, IncomingMessage, Presence, SentMessage, ServerRef, TransportError,
    UserRef,
};
use anyhow::Context;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rand::Rng;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message as WsMessage};

const API_BASE: &str = "https://discord.com/api/v10";
const GATEWAY_QUERY: &str = "?v=10&encoding=json";

/// GUILDS | GUILD_MESSAGES | DIRECT_MESSAGES | MESSAGE_CONTENT
const INTENTS: u64 = (1 << 0) | (1 << 9) | (1 << 12) | (1 << 15);

const OP_DISPATCH: u8 = 0;
const OP_HEARTBEAT: u8 = 1;
const OP_IDENTIFY: u8 = 2;
const OP_PRESENCE_UPDATE: u8 = 3;
const OP_RECONNECT: u8 = 7;
const OP_INVALID_SESSION: u8 = 9;
const OP_HELLO: u8 = 10;
const OP_HEARTBEAT_ACK: u8 = 11;

#[derive(Debug, Deserialize)]
struct GatewayPayload {
    op: u8,
    #[serde(default)]
    d: Value,
    s: Option<u64>,
    t: Option<String>,
}

/// Discord over REST (reqwest) for outbound calls and the WebSocket gateway for events.
pub struct DiscordTransport {
    token: String,
    bot_account: bool,
    api_base: String,
    client: reqwest::Client,
    outbound: Mutex<Option<mpsc::UnboundedSender<WsMessage>>>,
    closing: AtomicBool,
    server_names: Mutex<HashMap<String, String>>,
    channel_names: Mutex<HashMap<String, String>>,
    presence: Mutex<Presence>,
}

impl DiscordTransport {
    pub fn new(token: &str, bot_account: bool, client: reqwest::Client) -> Self {
        Self {
            token: token.trim().to_string(),
            bot_account,
            api_base: API_BASE.to_string(),
            client,
            outbound: Mutex::new(None),
            closing: AtomicBool::new(false),
            server_names: Mutex::new(HashMap::new()),
            channel_names: Mutex::new(HashMap::new()),
            presence: Mutex::new(Presence::default()),
        }
    }

    /// Point REST calls at another base URL.
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    fn authorization(&self) -> String {
        if self.bot_account {
            format!("Bot {}", self.token)
        } else {
            self.token.clone()
        }
    }

    async fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<reqwest::Response, TransportError> {
        let url = format!("{}{path}", self.api_base);
        let mut builder = self
            .client
            .request(method.clone(), &url)
            .header("Authorization", self.authorization());
        if let Some(body) = body {
            builder = builder.json(&body);
        }
        let response = builder.send().await?;
        let status = response.status();
        tracing::debug!(method = %method, path, status = status.as_u16(), "Discord REST call");

        if status.is_success() {
            return Ok(response);
        }
        let detail = format!("{method} {path} returned {status}");
        Err(match status.as_u16() {
            401 | 403 => TransportError::Forbidden(detail),
            404 => TransportError::NotFound(detail),
            _ => TransportError::Transport(detail),
        })
    }

    async fn request_json(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, TransportError> {
        let response = self.request(method, path, body).await?;
        response
            .json::<Value>()
            .await
            .map_err(|e| TransportError::Transport(format!("invalid JSON from {path}: {e}")))
    }

    fn push_frame(&self, frame: WsMessage) -> Result<(), TransportError> {
        let guard = self.outbound.lock();
        let tx = guard
            .as_ref()
            .ok_or_else(|| TransportError::Transport("gateway not connected".into()))?;
        tx.send(frame)
            .map_err(|_| TransportError::Transport("gateway writer closed".into()))
    }

    fn identify_payload(&self) -> Value {
        let presence = self.presence.lock().clone();
        json!({
            "op": OP_IDENTIFY,
            "d": {
                "token": self.token,
                "intents": INTENTS,
                "properties": {
                    "os": std::env::consts::OS,
                    "browser": "turbo",
                    "device": "turbo",
                },
                "presence": presence_data(&presence),
            }
        })
    }

    /// Remember server and channel names from a `GUILD_CREATE` payload for origin strings.
    fn cache_guild(&self, d: &Value) {
        let Some(guild_id) = d.get("id").and_then(Value::as_str) else {
            return;
        };
        if let Some(name) = d.get("name").and_then(Value::as_str) {
            self.server_names
                .lock()
                .insert(guild_id.to_string(), name.to_string());
        }
        if let Some(channels) = d.get("channels").and_then(Value::as_array) {
            let mut cache = self.channel_names.lock();
            for channel in channels {
                if let (Some(id), Some(name)) = (
                    channel.get("id").and_then(Value::as_str),
                    channel.get("name").and_then(Value::as_str),
                ) {
                    cache.insert(id.to_string(), name.to_string());
                }
            }
        }
    }

    /// Convert a `MESSAGE_CREATE` payload into an [`IncomingMessage`].
    fn parse_message(&self, d: &Value) -> Option<IncomingMessage> {
        let id = d.get("id")?.as_str()?.to_string();
        let channel_id = d.get("channel_id")?.as_str()?.to_string();
        let author = parse_user(d.get("author")?)?;
        let content = d
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let timestamp = d
            .get("timestamp")
            .and_then(Value::as_str)
            .and_then(|ts| chrono::DateTime::parse_from_rfc3339(ts).ok())
            .map(|ts| ts.with_timezone(&chrono::Utc))
            .unwrap_or_else(chrono::Utc::now);

        let server = d.get("guild_id").and_then(Value::as_str).map(|guild_id| ServerRef {
            id: guild_id.to_string(),
            name: self.server_names.lock().get(guild_id).cloned(),
        });
        let channel = ChannelRef {
            name: self.channel_names.lock().get(&channel_id).cloned(),
            id: channel_id,
            private: server.is_none(),
        };

        Some(IncomingMessage {
            id,
            content,
            author,
            channel,
            server,
            timestamp,
        })
    }

    async fn gateway_url(&self) -> anyhow::Result<String> {
        let body = self
            .request_json(reqwest::Method::GET, "/gateway", None)
            .await
            .context("Failed to fetch gateway URL")?;
        let url = body
            .get("url")
            .and_then(Value::as_str)
            .context("Gateway response has no url")?;
        Ok(format!("{}/{GATEWAY_QUERY}", url.trim_end_matches('/')))
    }
}

fn parse_user(value: &Value) -> Option<UserRef> {
    Some(UserRef {
        id: value.get("id")?.as_str()?.to_string(),
        name: value
            .get("username")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        discriminator: value
            .get("discriminator")
            .and_then(Value::as_str)
            .map(str::to_string),
        bot: value.get("bot").and_then(Value::as_bool).unwrap_or(false),
    })
}

fn presence_data(presence: &Presence) -> Value {
    let activities: Vec<Value> = presence
        .activity
        .iter()
        .map(|name| json!({ "name": name, "type": 0 }))
        .collect();
    json!({
        "since": Value::Null,
        "activities": activities,
        "status": presence.status.as_str(),
        "afk": presence.afk,
    })
}

fn sent_message(body: &Value, fallback_channel: &str) -> Result<SentMessage, TransportError> {
    let id = body
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| TransportError::Transport("message response has no id".into()))?;
    let channel_id = body
        .get("channel_id")
        .and_then(Value::as_str)
        .unwrap_or(fallback_channel);
    Ok(SentMessage {
        id: id.to_string(),
        channel_id: channel_id.to_string(),
    })
}

#[async_trait]
impl ChatTransport for DiscordTransport {
    fn name(&self) -> &str {
        "discord"
    }

    async fn listen(&self, tx: mpsc::Sender<IncomingMessage>) -> anyhow::Result<()> {
        self.closing.store(false, Ordering::SeqCst);
        let url = self.gateway_url().await?;
        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .context("Failed to connect to Discord gateway")?;
        tracing::info!("Discord: connected to gateway");

        let (mut write, mut read) = ws_stream.split();

        let hello = loop {
            match read.next().await {
                Some(Ok(WsMessage::Text(text))) => {
                    let payload: GatewayPayload =
                        serde_json::from_str(&text).context("Invalid gateway frame")?;
                    if payload.op == OP_HELLO {
                        break payload;
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e).context("Gateway read failed before hello"),
                None => anyhow::bail!("Gateway closed before hello"),
            }
        };
        let interval_ms = hello
            .d
            .get("heartbeat_interval")
            .and_then(Value::as_u64)
            .context("Hello frame has no heartbeat_interval")?;

        write
            .send(WsMessage::Text(self.identify_payload().to_string()))
            .await
            .context("Failed to identify")?;

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<WsMessage>();
        *self.outbound.lock() = Some(out_tx);

        let jitter = rand::thread_rng().gen_range(0.0..1.0);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let first_beat = Duration::from_millis((interval_ms as f64 * jitter) as u64);
        let mut heartbeat = tokio::time::interval_at(
            tokio::time::Instant::now() + first_beat,
            Duration::from_millis(interval_ms),
        );
        let mut sequence: Option<u64> = None;

        let result: anyhow::Result<()> = loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    let beat = json!({ "op": OP_HEARTBEAT, "d": sequence });
                    if let Err(e) = write.send(WsMessage::Text(beat.to_string())).await {
                        break Err(e).context("Heartbeat send failed");
                    }
                }
                Some(frame) = out_rx.recv() => {
                    let is_close = matches!(frame, WsMessage::Close(_));
                    if let Err(e) = write.send(frame).await {
                        break Err(e).context("Gateway write failed");
                    }
                    if is_close {
                        break Ok(());
                    }
                }
                incoming = read.next() => {
                    let text = match incoming {
                        Some(Ok(WsMessage::Text(text))) => text,
                        Some(Ok(WsMessage::Close(frame))) => {
                            if self.closing.load(Ordering::SeqCst) {
                                break Ok(());
                            }
                            break Err(anyhow::anyhow!("Gateway closed: {frame:?}"));
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => break Err(e).context("Gateway read failed"),
                        None => break Err(anyhow::anyhow!("Gateway stream ended")),
                    };
                    let payload: GatewayPayload = match serde_json::from_str(&text) {
                        Ok(p) => p,
                        Err(e) => {
                            tracing::debug!("Discord: skipping unparseable frame: {e}");
                            continue;
                        }
                    };
                    if payload.s.is_some() {
                        sequence = payload.s;
                    }
                    match payload.op {
                        OP_DISPATCH => match payload.t.as_deref() {
                            Some("READY") => {
                                let user = payload.d.get("user").and_then(parse_user);
                                tracing::info!(
                                    user = %user.map(|u| u.display_tag()).unwrap_or_default(),
                                    "Discord: session ready"
                                );
                            }
                            Some("GUILD_CREATE") => self.cache_guild(&payload.d),
                            Some("MESSAGE_CREATE") => {
                                if let Some(message) = self.parse_message(&payload.d) {
                                    if tx.send(message).await.is_err() {
                                        break Ok(());
                                    }
                                }
                            }
                            _ => {}
                        },
                        OP_HEARTBEAT => {
                            let beat = json!({ "op": OP_HEARTBEAT, "d": sequence });
                            if let Err(e) = write.send(WsMessage::Text(beat.to_string())).await {
                                break Err(e).context("Heartbeat send failed");
                            }
                        }
                        OP_RECONNECT => break Err(anyhow::anyhow!("Gateway requested reconnect")),
                        OP_INVALID_SESSION => break Err(anyhow::anyhow!("Gateway invalidated session")),
                        OP_HEARTBEAT_ACK | OP_HELLO => {}
                        other => tracing::debug!(op = other, "Discord: unhandled gateway op"),
                    }
                }
            }
        };

        *self.outbound.lock() = None;
        result
    }

    async fn current_user(&self) -> Result<UserRef, TransportError> {
        let body = self
            .request_json(reqwest::Method::GET, "/users/@me", None)
            .await?;
        parse_user(&body).ok_or_else(|| TransportError::Transport("user response has no id".into()))
    }

    async fn application_owner(&self) -> Result<String, TransportError> {
        if !self.bot_account {
            return Ok(self.current_user().await?.id);
        }
        let body = self
            .request_json(reqwest::Method::GET, "/oauth2/applications/@me", None)
            .await?;
        body.get("team")
            .and_then(|team| team.get("owner_user_id"))
            .and_then(Value::as_str)
            .or_else(|| {
                body.get("owner")
                    .and_then(|owner| owner.get("id"))
                    .and_then(Value::as_str)
            })
            .map(str::to_string)
            .ok_or_else(|| TransportError::Transport("application has no owner".into()))
    }

    async fn send(&self, channel_id: &str, content: &str) -> Result<SentMessage, TransportError> {
        let body = self
            .request_json(
                reqwest::Method::POST,
                &format!("/channels/{channel_id}/messages"),
                Some(json!({ "content": content })),
            )
            .await?;
        sent_message(&body, channel_id)
    }

    async fn edit(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<SentMessage, TransportError> {
        let body = self
            .request_json(
                reqwest::Method::PATCH,
                &format!("/channels/{channel_id}/messages/{message_id}"),
                Some(json!({ "content": content })),
            )
            .await?;
        sent_message(&body, channel_id)
    }

    async fn delete(&self, channel_id: &str, message_id: &str) -> Result<(), TransportError> {
        self.request(
            reqwest::Method::DELETE,
            &format!("/channels/{channel_id}/messages/{message_id}"),
            None,
        )
        .await?;
        Ok(())
    }

    async fn set_presence(&self, presence: &Presence) -> Result<(), TransportError> {
        *self.presence.lock() = presence.clone();
        let frame = json!({ "op": OP_PRESENCE_UPDATE, "d": presence_data(presence) });
        self.push_frame(WsMessage::Text(frame.to_string()))
    }

    async fn logout(&self) -> Result<(), TransportError> {
        self.closing.store(true, Ordering::SeqCst);
        match self.push_frame(WsMessage::Close(None)) {
            Ok(()) | Err(TransportError::Transport(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::PresenceStatus;

    fn transport(bot_account: bool) -> DiscordTransport {
        DiscordTransport::new(" secret-token ", bot_account, reqwest::Client::new())
    }

    fn message_payload(guild_id: Option<&str>) -> Value {
        let mut d = json!({
            "id": "555",
            "channel_id": "100",
            "content": "!ping",
            "timestamp": "2017-01-01T12:00:00.000000+00:00",
            "author": { "id": "42", "username": "turbo_user", "discriminator": "0001" }
        });
        if let Some(guild_id) = guild_id {
            d["guild_id"] = json!(guild_id);
        }
        d
    }

    #[test]
    fn authorization_depends_on_account_kind() {
        assert_eq!(transport(true).authorization(), "Bot secret-token");
        assert_eq!(transport(false).authorization(), "secret-token");
    }

    #[test]
    fn direct_message_is_private() {
        let t = transport(true);
        let msg = t.parse_message(&message_payload(None)).unwrap();
        assert!(msg.channel.private);
        assert!(msg.server.is_none());
        assert_eq!(msg.author.display_tag(), "turbo_user#0001");
        assert_eq!(msg.origin(), "Private Message");
    }

    #[test]
    fn guild_message_uses_cached_names() {
        let t = transport(true);
        t.cache_guild(&json!({
            "id": "7",
            "name": "Rustaceans",
            "channels": [{ "id": "100", "name": "general" }]
        }));
        let msg = t.parse_message(&message_payload(Some("7"))).unwrap();
        assert!(!msg.channel.private);
        assert_eq!(msg.origin(), "#general (Rustaceans)");
        assert_eq!(msg.timestamp.to_rfc3339(), "2017-01-01T12:00:00+00:00");
    }

    #[test]
    fn message_without_author_is_skipped() {
        let t = transport(true);
        let mut payload = message_payload(None);
        payload.as_object_mut().unwrap().remove("author");
        assert!(t.parse_message(&payload).is_none());
    }

    #[test]
    fn presence_payload_shape() {
        let data = presence_data(&Presence {
            status: PresenceStatus::Idle,
            activity: Some("with Rust".into()),
            afk: true,
        });
        assert_eq!(data["status"], "idle");
        assert_eq!(data["afk"], true);
        assert_eq!(data["activities"][0]["name"], "with Rust");

        let cleared = presence_data(&Presence::default());
        assert_eq!(cleared["activities"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn identify_carries_intents_and_presence() {
        let payload = transport(true).identify_payload();
        assert_eq!(payload["op"], OP_IDENTIFY);
        assert_eq!(payload["d"]["intents"], INTENTS);
        assert_eq!(payload["d"]["token"], "secret-token");
        assert_eq!(payload["d"]["presence"]["status"], "online");
    }

    #[tokio::test]
    async fn presence_without_gateway_is_an_error() {
        let err = transport(true)
            .set_presence(&Presence::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Transport(_)));
    }

    #[tokio::test]
    async fn logout_without_gateway_is_quiet() {
        assert!(transport(true).logout().await.is_ok());
    }
}
