use super::text_after_command;
use crate::commands::guards::Guard;
use crate::commands::response::Response;
use crate::commands::traits::{
    CommandError, CommandHandler, CommandSpec, ContextParam, Invocation, ParamSpec,
};
use crate::store::TagStore;
use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, OnceLock};

/// Strings between double quotes, in order.
pub fn quoted_strings(text: &str) -> Vec<String> {
    static QUOTED: OnceLock<Regex> = OnceLock::new();
    let re = QUOTED.get_or_init(|| Regex::new(r#""([^"]*)""#).expect("static regex"));
    re.captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// The store, which the `RequiresStore` guard has already checked for.
fn store<'a>(invocation: &Invocation<'a>) -> Result<&'a Arc<dyn TagStore>, CommandError> {
    invocation.bot.store.as_ref().ok_or_else(|| {
        CommandError::denied(
            ":warning: This command cannot be used because the database is unavailable",
        )
    })
}

pub struct TagsCommand;

#[async_trait]
impl CommandHandler for TagsCommand {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new(
            "tags",
            "
            Lists every tag
            {prefix}tags
            ",
        )
    }

    async fn execute(&self, invocation: Invocation<'_>) -> Result<Response, CommandError> {
        let bot = invocation.bot;
        let (names, from_backup) = match &bot.store {
            Some(store) => match store.list().await {
                Ok(names) => (names, false),
                Err(e) => {
                    tracing::warn!("Tag list failed, using backup tags: {e}");
                    (bot.backup_tags.names(), true)
                }
            },
            None => (bot.backup_tags.names(), true),
        };

        if names.is_empty() {
            return Ok(Response::warning("There are no tags"));
        }
        let source = if from_backup { " (backup)" } else { "" };
        Ok(Response::new(format!(
            "**Tags{source}**\n```\n{}\n```",
            names.join(", ")
        ))
        .delete_after_secs(60))
    }
}

pub struct CreateTagCommand;

#[async_trait]
impl CommandHandler for CreateTagCommand {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new(
            "createtag",
            r#"
            Creates or replaces a tag
            {prefix}createtag "name" "content"
            "#,
        )
        .context(&[ContextParam::Message])
        .guards(&[Guard::RequiresStore])
    }

    async fn execute(&self, invocation: Invocation<'_>) -> Result<Response, CommandError> {
        let message = invocation.message()?;
        let quoted = quoted_strings(&message.content);
        let [name, content] = quoted.as_slice() else {
            return Err(CommandError::Usage);
        };
        let name = name.trim();
        if name.is_empty() || content.trim().is_empty() {
            return Err(CommandError::Usage);
        }

        store(&invocation)?.insert(name, content).await?;
        tracing::info!(tag = name, author = %message.author.display_tag(), "Tag saved");
        Ok(Response::new(format!(":thumbsup: Saved tag **{name}**")).delete_after_secs(10))
    }
}

pub struct DeleteTagCommand;

#[async_trait]
impl CommandHandler for DeleteTagCommand {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new(
            "deletetag",
            r#"
            Deletes a tag
            {prefix}deletetag "name"
            "#,
        )
        .context(&[ContextParam::Message])
        .guards(&[Guard::RequiresStore])
    }

    async fn execute(&self, invocation: Invocation<'_>) -> Result<Response, CommandError> {
        let message = invocation.message()?;
        let quoted = quoted_strings(&message.content);
        let [name] = quoted.as_slice() else {
            return Err(CommandError::Usage);
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(CommandError::Usage);
        }

        if store(&invocation)?.delete(Some(name)).await? == 0 {
            return Ok(Response::warning("Tag not found"));
        }
        tracing::info!(tag = name, author = %message.author.display_tag(), "Tag deleted");
        Ok(Response::new(format!(":thumbsup: Deleted tag **{name}**")).delete_after_secs(10))
    }
}

pub struct TagCommand;

#[async_trait]
impl CommandHandler for TagCommand {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new(
            "tag",
            "
            Shows a tag
            {prefix}tag <name>
            ",
        )
        .context(&[ContextParam::Message])
        .params(vec![ParamSpec::required("name")])
    }

    async fn execute(&self, invocation: Invocation<'_>) -> Result<Response, CommandError> {
        let bot = invocation.bot;
        let message = invocation.message()?;
        let name = text_after_command(&message.content, invocation.prefix());

        let stored = match &bot.store {
            Some(store) => match store.get(name).await {
                Ok(tag) => tag.map(|t| t.content),
                Err(e) => {
                    tracing::warn!(tag = name, "Tag lookup failed, using backup tags: {e}");
                    bot.backup_tags.get(name).map(str::to_string)
                }
            },
            None => bot.backup_tags.get(name).map(str::to_string),
        };

        match stored {
            Some(content) => Ok(Response::new(content).without_mention()),
            None => Ok(Response::warning("Tag not found")),
        }
    }
}

pub struct ClearTagsCommand;

#[async_trait]
impl CommandHandler for ClearTagsCommand {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new(
            "cleartags",
            "
            Deletes every tag
            {prefix}cleartags
            ",
        )
        .guards(&[Guard::RequiresStore, Guard::CreatorOnly])
    }

    async fn execute(&self, invocation: Invocation<'_>) -> Result<Response, CommandError> {
        let removed = store(&invocation)?.delete(None).await?;
        tracing::info!(removed, "Tags cleared");
        Ok(Response::new(format!(":thumbsup: Cleared {removed} tags")).delete_after_secs(10))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::test_support::{test_bot, RecordingTransport};
    use crate::bot::BotContext;
    use crate::commands::dispatcher::{DispatchOutcome, Dispatcher};
    use crate::store::SqliteTagStore;
    use crate::transport::{ChannelRef, IncomingMessage, UserRef};

    fn with_store() -> (Arc<BotContext>, Arc<RecordingTransport>, Arc<dyn TagStore>) {
        let (bot, transport) = test_bot(|_| {});
        let store: Arc<dyn TagStore> = Arc::new(SqliteTagStore::open_in_memory("tags").unwrap());
        let bot = Arc::try_unwrap(bot)
            .ok()
            .expect("sole owner")
            .with_store(Some(Arc::clone(&store)));
        (Arc::new(bot), transport, store)
    }

    fn said(content: &str) -> IncomingMessage {
        IncomingMessage {
            id: "m1".into(),
            content: content.into(),
            author: UserRef {
                id: "u1".into(),
                name: "u1".into(),
                discriminator: None,
                bot: false,
            },
            channel: ChannelRef {
                id: "c1".into(),
                name: None,
                private: false,
            },
            server: None,
            timestamp: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn createtag_needs_exactly_two_quoted_strings() {
        let (bot, _transport, store) = with_store();
        let dispatcher = Dispatcher::new(bot);

        for content in [r#"!createtag "a" "b" "c""#, r#"!createtag "a""#] {
            assert_eq!(
                dispatcher.dispatch(said(content)).await,
                DispatchOutcome::UsageShown {
                    command: "createtag".into()
                }
            );
        }
        assert!(store.list().await.unwrap().is_empty());

        assert_eq!(
            dispatcher.dispatch(said(r#"!createtag "a" "b""#)).await,
            DispatchOutcome::Responded {
                command: "createtag".into()
            }
        );
        assert_eq!(store.get("a").await.unwrap().unwrap().content, "b");
    }

    #[tokio::test]
    async fn deletetag_needs_exactly_one_quoted_name() {
        let (bot, _transport, store) = with_store();
        store.insert("a", "x").await.unwrap();
        store.insert("b", "y").await.unwrap();
        let dispatcher = Dispatcher::new(bot);

        assert_eq!(
            dispatcher.dispatch(said(r#"!deletetag "a" "b""#)).await,
            DispatchOutcome::UsageShown {
                command: "deletetag".into()
            }
        );
        assert_eq!(store.list().await.unwrap().len(), 2);

        dispatcher.dispatch(said(r#"!deletetag "a""#)).await;
        assert_eq!(store.list().await.unwrap(), vec!["b".to_string()]);
    }

    #[test]
    fn quoted_strings_in_order() {
        assert_eq!(
            quoted_strings(r#"!createtag "greeting" "hello there" trailing"#),
            vec!["greeting", "hello there"]
        );
        assert!(quoted_strings("!createtag greeting").is_empty());
        assert_eq!(quoted_strings(r#"!deletetag """#), vec![""]);
    }
}
