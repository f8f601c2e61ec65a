//! Bot context and the supervised run loop.

use crate::commands::aliases::AliasTable;
use crate::commands::builtin;
use crate::commands::dispatcher::{DispatchOutcome, Dispatcher};
use crate::commands::registry::{Registry, Snapshot, SnapshotCell};
use crate::commands::traits::CommandHandler;
use crate::config::Config;
use crate::http::HttpClient;
use crate::store::{BackupTags, TagStore};
use crate::transport::{ChatTransport, IncomingMessage, Presence, TransportError, UserRef};
use anyhow::Result;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch, OnceCell};
use tokio::task::JoinSet;

/// How long in-flight dispatches may finish after the loop stops.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// How long the listener gets to flush its close frame after logout.
const LISTENER_CLOSE_TIMEOUT: Duration = Duration::from_secs(3);

/// Produces the command handlers a registry is built from.
pub type HandlerSource = fn() -> Vec<Arc<dyn CommandHandler>>;

/// Counters shown by the `stats` command.
#[derive(Debug, Default)]
pub struct ActivityStats {
    messages_seen: AtomicU64,
    commands_run: AtomicU64,
    servers: Mutex<HashSet<String>>,
    private_channels: Mutex<HashSet<String>>,
}

impl ActivityStats {
    pub fn observe(&self, message: &IncomingMessage) {
        self.messages_seen.fetch_add(1, Ordering::Relaxed);
        if let Some(server) = &message.server {
            self.servers.lock().insert(server.id.clone());
        } else if message.channel.private {
            self.private_channels
                .lock()
                .insert(message.channel.id.clone());
        }
    }

    pub fn record_command(&self) {
        self.commands_run.fetch_add(1, Ordering::Relaxed);
    }

    pub fn messages_seen(&self) -> u64 {
        self.messages_seen.load(Ordering::Relaxed)
    }

    pub fn commands_run(&self) -> u64 {
        self.commands_run.load(Ordering::Relaxed)
    }

    pub fn servers(&self) -> usize {
        self.servers.lock().len()
    }

    pub fn private_channels(&self) -> usize {
        self.private_channels.lock().len()
    }
}

/// Counts reported after (re)building the command snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadSummary {
    pub commands: usize,
    pub aliases: usize,
    pub rejected: usize,
}

/// Everything a command can reach, built once at startup.
pub struct BotContext {
    pub config: Config,
    pub transport: Arc<dyn ChatTransport>,
    /// The account the bot acts as.
    pub self_user: UserRef,
    pub store: Option<Arc<dyn TagStore>>,
    pub backup_tags: BackupTags,
    pub http: HttpClient,
    pub activity: ActivityStats,
    pub started_at: Instant,
    presence: Mutex<Presence>,
    snapshots: SnapshotCell,
    handler_source: HandlerSource,
    owner: OnceCell<String>,
}

/// Build a registry from `source` and load the alias file against it.
pub fn build_snapshot(config: &Config, source: HandlerSource) -> (Snapshot, ReloadSummary) {
    let (registry, rejected) = Registry::build(source());
    let aliases = if config.aliases.enabled {
        let path = config.resolve_path(&config.aliases.file);
        AliasTable::load(&path, |name| registry.contains(name))
    } else {
        None
    };
    let summary = ReloadSummary {
        commands: registry.len(),
        aliases: aliases.as_ref().map_or(0, AliasTable::len),
        rejected: rejected.len(),
    };
    (Snapshot { registry, aliases }, summary)
}

impl BotContext {
    pub fn new(
        config: Config,
        transport: Arc<dyn ChatTransport>,
        self_user: UserRef,
        handler_source: HandlerSource,
    ) -> Self {
        let (snapshot, summary) = build_snapshot(&config, handler_source);
        tracing::info!(
            commands = summary.commands,
            aliases = summary.aliases,
            "Commands registered"
        );
        let http = HttpClient::new(&config.http);
        Self {
            config,
            transport,
            self_user,
            store: None,
            backup_tags: BackupTags::default(),
            http,
            activity: ActivityStats::default(),
            started_at: Instant::now(),
            presence: Mutex::new(Presence::default()),
            snapshots: SnapshotCell::new(snapshot),
            handler_source,
            owner: OnceCell::new(),
        }
    }

    pub fn with_store(mut self, store: Option<Arc<dyn TagStore>>) -> Self {
        self.store = store;
        self
    }

    pub fn with_backup_tags(mut self, backup_tags: BackupTags) -> Self {
        self.backup_tags = backup_tags;
        self
    }

    pub fn with_http(mut self, http: HttpClient) -> Self {
        self.http = http;
        self
    }

    /// The current registry/alias view; hold it for the whole dispatch.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshots.load()
    }

    /// Rebuild the registry and reload aliases, then swap them in together.
    pub fn reload(&self) -> ReloadSummary {
        let (snapshot, summary) = build_snapshot(&self.config, self.handler_source);
        self.snapshots.store(snapshot);
        tracing::info!(
            commands = summary.commands,
            aliases = summary.aliases,
            rejected = summary.rejected,
            "Commands reloaded"
        );
        summary
    }

    /// Id of the bot's owner, looked up once. `None` if the lookup fails.
    pub async fn owner_id(&self) -> Option<String> {
        let result = self
            .owner
            .get_or_try_init(|| async { self.transport.application_owner().await })
            .await;
        match result {
            Ok(id) => Some(id.clone()),
            Err(e) => {
                tracing::warn!("Cannot determine bot owner: {e}");
                None
            }
        }
    }

    pub fn presence(&self) -> Presence {
        self.presence.lock().clone()
    }

    pub async fn update_presence(&self, presence: Presence) -> Result<(), TransportError> {
        self.transport.set_presence(&presence).await?;
        *self.presence.lock() = presence;
        Ok(())
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// The handlers a production bot registers.
pub fn default_handlers() -> Vec<Arc<dyn CommandHandler>> {
    builtin::all()
}

/// Keep `transport.listen` running, restarting with exponential backoff
/// after failures. A clean return ends supervision.
pub fn spawn_supervised_listener(
    transport: Arc<dyn ChatTransport>,
    tx: mpsc::Sender<IncomingMessage>,
    initial_backoff_secs: u64,
    max_backoff_secs: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut backoff = initial_backoff_secs.max(1);
        let max_backoff = max_backoff_secs.max(backoff);

        loop {
            let result = transport.listen(tx.clone()).await;

            if tx.is_closed() {
                break;
            }

            match result {
                Ok(()) => {
                    tracing::info!("Transport {} stopped listening", transport.name());
                    break;
                }
                Err(e) => {
                    tracing::error!("Transport {} error: {e:#}; restarting", transport.name());
                }
            }

            tokio::time::sleep(Duration::from_secs(backoff)).await;
            backoff = backoff.saturating_mul(2).min(max_backoff);
        }
    })
}

/// Dispatch inbound messages until shutdown is requested, the event stream
/// ends, or the process is interrupted. Each message runs on its own task.
pub async fn run(bot: Arc<BotContext>) -> Result<()> {
    let (tx, mut rx) = mpsc::channel::<IncomingMessage>(256);
    let mut listener = spawn_supervised_listener(Arc::clone(&bot.transport), tx, 2, 60);
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&bot)));

    tracing::info!(
        user = %bot.self_user.display_tag(),
        transport = bot.transport.name(),
        prefix = %bot.config.prefix,
        "Bot running"
    );

    let mut in_flight = JoinSet::new();
    loop {
        tokio::select! {
            received = rx.recv() => {
                let Some(message) = received else {
                    tracing::info!("Event stream closed");
                    break;
                };
                bot.activity.observe(&message);
                let dispatcher = Arc::clone(&dispatcher);
                let shutdown_tx = shutdown_tx.clone();
                in_flight.spawn(async move {
                    if dispatcher.dispatch(message).await == DispatchOutcome::ShutdownRequested {
                        let _ = shutdown_tx.send(true);
                    }
                });
            }
            Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    let drain = async { while in_flight.join_next().await.is_some() {} };
    if tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
        tracing::warn!("Abandoning dispatches still running at shutdown");
    }

    if let Err(e) = bot.transport.logout().await {
        tracing::warn!("Logout failed: {e}");
    }
    if tokio::time::timeout(LISTENER_CLOSE_TIMEOUT, &mut listener)
        .await
        .is_err()
    {
        tracing::warn!("Listener did not close in time, aborting it");
        listener.abort();
    }
    tracing::info!("Bot stopped");
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::transport::SentMessage;
    use async_trait::async_trait;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Action {
        Send {
            channel_id: String,
            content: String,
        },
        Edit {
            channel_id: String,
            message_id: String,
            content: String,
        },
        Delete {
            channel_id: String,
            message_id: String,
        },
        Presence(Presence),
        Logout,
    }

    /// In-memory transport that records every outbound call.
    pub struct RecordingTransport {
        actions: Mutex<Vec<Action>>,
        next_id: AtomicU64,
        owner: String,
        inbound: Mutex<Vec<IncomingMessage>>,
    }

    impl RecordingTransport {
        pub fn new(owner: &str) -> Self {
            Self {
                actions: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                owner: owner.to_string(),
                inbound: Mutex::new(Vec::new()),
            }
        }

        pub fn with_inbound(self, messages: Vec<IncomingMessage>) -> Self {
            *self.inbound.lock() = messages;
            self
        }

        pub fn actions(&self) -> Vec<Action> {
            self.actions.lock().clone()
        }

        pub fn sent_contents(&self) -> Vec<String> {
            self.actions()
                .into_iter()
                .filter_map(|a| match a {
                    Action::Send { content, .. } | Action::Edit { content, .. } => Some(content),
                    _ => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl ChatTransport for RecordingTransport {
        fn name(&self) -> &str {
            "recording"
        }

        async fn listen(&self, tx: mpsc::Sender<IncomingMessage>) -> anyhow::Result<()> {
            let messages = std::mem::take(&mut *self.inbound.lock());
            for message in messages {
                if tx.send(message).await.is_err() {
                    break;
                }
            }
            Ok(())
        }

        async fn current_user(&self) -> Result<UserRef, TransportError> {
            Ok(self_user())
        }

        async fn application_owner(&self) -> Result<String, TransportError> {
            Ok(self.owner.clone())
        }

        async fn send(
            &self,
            channel_id: &str,
            content: &str,
        ) -> Result<SentMessage, TransportError> {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
            self.actions.lock().push(Action::Send {
                channel_id: channel_id.to_string(),
                content: content.to_string(),
            });
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
            self.actions.lock().push(Action::Edit {
                channel_id: channel_id.to_string(),
                message_id: message_id.to_string(),
                content: content.to_string(),
            });
            Ok(SentMessage {
                id: message_id.to_string(),
                channel_id: channel_id.to_string(),
            })
        }

        async fn delete(&self, channel_id: &str, message_id: &str) -> Result<(), TransportError> {
            self.actions.lock().push(Action::Delete {
                channel_id: channel_id.to_string(),
                message_id: message_id.to_string(),
            });
            Ok(())
        }

        async fn set_presence(&self, presence: &Presence) -> Result<(), TransportError> {
            self.actions.lock().push(Action::Presence(presence.clone()));
            Ok(())
        }

        async fn logout(&self) -> Result<(), TransportError> {
            self.actions.lock().push(Action::Logout);
            Ok(())
        }
    }

    pub fn self_user() -> UserRef {
        UserRef {
            id: "self".into(),
            name: "turbo".into(),
            discriminator: None,
            bot: true,
        }
    }

    /// Bot with built-in commands, no store and no alias file.
    pub fn test_bot(
        configure: impl FnOnce(&mut Config),
    ) -> (Arc<BotContext>, Arc<RecordingTransport>) {
        test_bot_with(RecordingTransport::new("owner"), configure)
    }

    pub fn test_bot_with(
        transport: RecordingTransport,
        configure: impl FnOnce(&mut Config),
    ) -> (Arc<BotContext>, Arc<RecordingTransport>) {
        let mut config = Config::default();
        config.aliases.enabled = false;
        config.store.enabled = false;
        config.logging.file = None;
        configure(&mut config);
        let transport = Arc::new(transport);
        let bot = BotContext::new(
            config,
            Arc::clone(&transport) as Arc<dyn ChatTransport>,
            self_user(),
            default_handlers,
        );
        (Arc::new(bot), transport)
    }
}
