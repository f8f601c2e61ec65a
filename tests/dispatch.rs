//! End-to-end dispatch through the public API with an in-memory transport.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use turbo::bot::{self, BotContext};
use turbo::commands::{DispatchOutcome, Dispatcher};
use turbo::store;
use turbo::transport::{
    ChannelRef, ChatTransport, IncomingMessage, Presence, SentMessage, ServerRef, TransportError,
    UserRef,
};
use turbo::Config;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Send(String, String),
    Edit(String, String),
    Delete(String),
    Logout,
}

#[derive(Default)]
struct MemoryTransport {
    calls: Mutex<Vec<Call>>,
    next_id: AtomicU64,
    refuse_sends: bool,
    lose_messages: bool,
}

impl MemoryTransport {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    fn texts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Send(_, text) | Call::Edit(_, text) => Some(text),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ChatTransport for MemoryTransport {
    fn name(&self) -> &str {
        "memory"
    }

    async fn listen(&self, _tx: mpsc::Sender<IncomingMessage>) -> anyhow::Result<()> {
        Ok(())
    }

    async fn current_user(&self) -> Result<UserRef, TransportError> {
        Ok(user("bot-self"))
    }

    async fn application_owner(&self) -> Result<String, TransportError> {
        Ok("creator".into())
    }

    async fn send(&self, channel_id: &str, content: &str) -> Result<SentMessage, TransportError> {
        if self.refuse_sends {
            return Err(TransportError::Forbidden("missing permissions".into()));
        }
        let id = format!("out-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.calls
            .lock()
            .push(Call::Send(channel_id.into(), content.into()));
        Ok(SentMessage {
            id,
            channel_id: channel_id.into(),
        })
    }

    async fn edit(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<SentMessage, TransportError> {
        self.calls
            .lock()
            .push(Call::Edit(message_id.into(), content.into()));
        Ok(SentMessage {
            id: message_id.into(),
            channel_id: channel_id.into(),
        })
    }

    async fn delete(&self, _channel_id: &str, message_id: &str) -> Result<(), TransportError> {
        self.calls.lock().push(Call::Delete(message_id.into()));
        if self.lose_messages {
            return Err(TransportError::NotFound("unknown message".into()));
        }
        Ok(())
    }

    async fn set_presence(&self, _presence: &Presence) -> Result<(), TransportError> {
        Ok(())
    }

    async fn logout(&self) -> Result<(), TransportError> {
        self.calls.lock().push(Call::Logout);
        Ok(())
    }
}

fn user(id: &str) -> UserRef {
    UserRef {
        id: id.into(),
        name: id.into(),
        discriminator: Some("0001".into()),
        bot: false,
    }
}

fn message(author: &str, content: &str) -> IncomingMessage {
    IncomingMessage {
        id: "in-1".into(),
        content: content.into(),
        author: user(author),
        channel: ChannelRef {
            id: "general".into(),
            name: Some("general".into()),
            private: false,
        },
        server: Some(ServerRef {
            id: "s1".into(),
            name: Some("Test Server".into()),
        }),
        timestamp: chrono::Utc::now(),
    }
}

fn base_config() -> Config {
    let mut config = Config::default();
    config.aliases.enabled = false;
    config.store.enabled = false;
    config.logging.file = None;
    config
}

fn bot_with(config: Config) -> (Dispatcher, Arc<BotContext>, Arc<MemoryTransport>) {
    bot_with_transport(config, MemoryTransport::default())
}

fn bot_with_transport(
    config: Config,
    transport: MemoryTransport,
) -> (Dispatcher, Arc<BotContext>, Arc<MemoryTransport>) {
    let transport = Arc::new(transport);
    let store = store::create_tag_store(&config);
    let bot = Arc::new(
        BotContext::new(
            config,
            Arc::clone(&transport) as Arc<dyn ChatTransport>,
            user("bot-self"),
            bot::default_handlers,
        )
        .with_store(store),
    );
    (Dispatcher::new(Arc::clone(&bot)), bot, transport)
}

#[tokio::test(start_paused = true)]
async fn ping_replies_in_channel_and_deletes_after_five_seconds() {
    let (dispatcher, _bot, transport) = bot_with(base_config());

    let outcome = dispatcher.dispatch(message("alice", "!ping")).await;
    assert_eq!(
        outcome,
        DispatchOutcome::Responded {
            command: "ping".into()
        }
    );
    assert_eq!(
        transport.calls(),
        vec![Call::Send("general".into(), "<@alice>, :ping_pong:".into())]
    );

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(transport.calls().len(), 1);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(transport.calls().last(), Some(&Call::Delete("out-0".into())));
}

#[tokio::test(start_paused = true)]
async fn deletion_can_be_disabled() {
    let mut config = base_config();
    config.allow_deletion = false;
    let (dispatcher, _bot, transport) = bot_with(config);

    dispatcher.dispatch(message("alice", "!ping")).await;
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(!transport
        .calls()
        .iter()
        .any(|call| matches!(call, Call::Delete(_))));
}

#[tokio::test(start_paused = true)]
async fn refused_sends_are_absorbed() {
    let transport = MemoryTransport {
        refuse_sends: true,
        ..MemoryTransport::default()
    };
    let (dispatcher, _bot, transport) = bot_with_transport(base_config(), transport);

    for _ in 0..2 {
        assert_eq!(
            dispatcher.dispatch(message("alice", "!ping")).await,
            DispatchOutcome::Responded {
                command: "ping".into()
            }
        );
    }
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(transport.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn deleting_a_vanished_message_fails_soft() {
    let transport = MemoryTransport {
        lose_messages: true,
        ..MemoryTransport::default()
    };
    let (dispatcher, _bot, transport) = bot_with_transport(base_config(), transport);

    for _ in 0..2 {
        assert_eq!(
            dispatcher.dispatch(message("alice", "!ping")).await,
            DispatchOutcome::Responded {
                command: "ping".into()
            }
        );
        tokio::time::sleep(Duration::from_secs(6)).await;
    }
    assert_eq!(
        transport.calls(),
        vec![
            Call::Send("general".into(), "<@alice>, :ping_pong:".into()),
            Call::Delete("out-0".into()),
            Call::Send("general".into(), "<@alice>, :ping_pong:".into()),
            Call::Delete("out-1".into()),
        ]
    );
}

#[tokio::test]
async fn unknown_and_unprefixed_messages_do_nothing() {
    let (dispatcher, _bot, transport) = bot_with(base_config());

    assert_eq!(
        dispatcher.dispatch(message("alice", "hello there")).await,
        DispatchOutcome::FilteredOut
    );
    assert_eq!(
        dispatcher.dispatch(message("alice", "!nosuchcommand")).await,
        DispatchOutcome::Unresolved
    );
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn self_authored_commands_edit_in_place() {
    let mut config = base_config();
    config.bot_account = false;
    let (dispatcher, _bot, transport) = bot_with(config);

    dispatcher.dispatch(message("bot-self", "!ping")).await;
    assert_eq!(
        transport.calls()[0],
        Call::Edit("in-1".into(), ":ping_pong:".into())
    );
}

#[tokio::test]
async fn createtag_without_store_is_denied() {
    let (dispatcher, bot, transport) = bot_with(base_config());
    assert!(bot.store.is_none());

    let outcome = dispatcher
        .dispatch(message("alice", r#"!createtag "a" "b""#))
        .await;
    assert_eq!(
        outcome,
        DispatchOutcome::Denied {
            command: "createtag".into()
        }
    );
    assert!(transport.texts()[0].contains("database is unavailable"));
}

#[tokio::test]
async fn alias_dispatches_to_canonical_command() {
    let tmp = tempfile::tempdir().unwrap();
    let alias_file = tmp.path().join("aliases.json");
    std::fs::write(&alias_file, r#"{"stats": ["about", "info"]}"#).unwrap();

    let mut config = base_config();
    config.aliases.enabled = true;
    config.aliases.file = alias_file.to_string_lossy().into_owned();
    let (dispatcher, _bot, transport) = bot_with(config);

    let outcome = dispatcher.dispatch(message("alice", "!about")).await;
    assert_eq!(
        outcome,
        DispatchOutcome::Responded {
            command: "stats".into()
        }
    );
    assert!(transport.texts()[0].contains("Uptime"));
}

#[tokio::test]
async fn snapshot_taken_before_reload_stays_consistent() {
    let tmp = tempfile::tempdir().unwrap();
    let alias_file = tmp.path().join("aliases.json");
    std::fs::write(&alias_file, r#"{"stats": ["about"]}"#).unwrap();

    let mut config = base_config();
    config.aliases.enabled = true;
    config.aliases.file = alias_file.to_string_lossy().into_owned();
    let (_dispatcher, bot, _transport) = bot_with(config);

    let before = bot.snapshot();
    std::fs::write(&alias_file, r#"{"help": ["about"]}"#).unwrap();
    let summary = bot.reload();
    let after = bot.snapshot();

    assert_eq!(summary.aliases, 1);
    assert_eq!(before.resolve("about").unwrap().name(), "stats");
    assert_eq!(after.resolve("about").unwrap().name(), "help");
    assert_eq!(before.registry.len(), after.registry.len());
}

#[tokio::test]
async fn handler_failure_hides_details_from_the_channel() {
    let mut config = base_config();
    config.http.github_api_url = "http://127.0.0.1:1".into();
    config.http.timeout_secs = 2;
    let (dispatcher, _bot, transport) = bot_with(config);

    let outcome = dispatcher
        .dispatch(message("alice", "!ghissue owner/repo crash"))
        .await;
    assert_eq!(
        outcome,
        DispatchOutcome::Failed {
            command: "ghissue".into()
        }
    );
    let reply = &transport.texts()[0];
    assert!(reply.contains("An error occurred while running `ghissue`"));
    assert!(!reply.contains("127.0.0.1"));
}

#[tokio::test]
async fn tag_lifecycle_against_sqlite_store() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = base_config();
    config.store.enabled = true;
    config.store.path = tmp.path().join("data/tags.db").to_string_lossy().into_owned();
    let (dispatcher, bot, transport) = bot_with(config);
    assert!(bot.store.is_some());

    dispatcher
        .dispatch(message("alice", r#"!createtag "greeting" "hello world""#))
        .await;
    dispatcher
        .dispatch(message("alice", "!tag greeting"))
        .await;
    dispatcher.dispatch(message("alice", "!tags")).await;
    dispatcher
        .dispatch(message("alice", r#"!deletetag "greeting""#))
        .await;
    dispatcher
        .dispatch(message("alice", "!tag greeting"))
        .await;

    let texts = transport.texts();
    assert!(texts[0].contains("Saved tag **greeting**"));
    assert_eq!(texts[1], "hello world");
    assert!(texts[2].contains("greeting"));
    assert!(texts[3].contains("Deleted tag **greeting**"));
    assert!(texts[4].contains("Tag not found"));
}

#[tokio::test]
async fn cleartags_is_reserved_for_the_creator() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = base_config();
    config.store.enabled = true;
    config.store.path = tmp.path().join("tags.db").to_string_lossy().into_owned();
    let (dispatcher, _bot, transport) = bot_with(config);

    let outcome = dispatcher.dispatch(message("alice", "!cleartags")).await;
    assert_eq!(
        outcome,
        DispatchOutcome::Denied {
            command: "cleartags".into()
        }
    );
    let outcome = dispatcher.dispatch(message("creator", "!cleartags")).await;
    assert_eq!(
        outcome,
        DispatchOutcome::Responded {
            command: "cleartags".into()
        }
    );
    assert!(transport.texts()[1].contains("Cleared 0 tags"));
}

#[tokio::test]
async fn shutdown_from_creator_ends_the_run_loop() {
    let (dispatcher, _bot, transport) = bot_with(base_config());

    assert_eq!(
        dispatcher.dispatch(message("creator", "!shutdown")).await,
        DispatchOutcome::ShutdownRequested
    );
    assert_eq!(
        transport.calls(),
        vec![Call::Send("general".into(), ":wave:".into())]
    );
}
