use super::binder;
use super::filter::{extract_tokens, should_dispatch};
use super::guards;
use super::registry::{CommandDescriptor, Snapshot};
use super::response::Response;
use super::traits::{CommandError, Invocation};
use crate::bot::BotContext;
use crate::transport::{ChatTransport, IncomingMessage, SentMessage};
use crate::util::truncate_with_ellipsis;
use std::sync::Arc;
use std::time::Duration;

/// Longest message the chat service accepts.
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// Per-message state derived before a handler is resolved.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    pub message: IncomingMessage,
    pub command_token: String,
    pub argument_tokens: Vec<String>,
    pub self_operating: bool,
}

impl DispatchContext {
    /// `None` when the message holds no command token.
    pub fn from_message(message: IncomingMessage, prefix: &str, self_id: &str) -> Option<Self> {
        let (command_token, argument_tokens) = extract_tokens(&message.content, prefix)?;
        let self_operating = message.author.id == self_id;
        Some(Self {
            message,
            command_token,
            argument_tokens,
            self_operating,
        })
    }
}

/// How a single message was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    FilteredOut,
    Unresolved,
    Responded { command: String },
    UsageShown { command: String },
    Denied { command: String },
    Failed { command: String },
    ShutdownRequested,
}

pub struct Dispatcher {
    bot: Arc<BotContext>,
}

impl Dispatcher {
    pub fn new(bot: Arc<BotContext>) -> Self {
        Self { bot }
    }

    pub async fn dispatch(&self, message: IncomingMessage) -> DispatchOutcome {
        let bot = &*self.bot;
        if !should_dispatch(&message, &bot.self_user.id, &bot.config) {
            return DispatchOutcome::FilteredOut;
        }
        let Some(ctx) = DispatchContext::from_message(message, &bot.config.prefix, &bot.self_user.id)
        else {
            return DispatchOutcome::Unresolved;
        };

        let snapshot = bot.snapshot();
        let Some(descriptor) = snapshot.resolve(&ctx.command_token) else {
            tracing::debug!(token = %ctx.command_token, "No command matches token");
            return DispatchOutcome::Unresolved;
        };
        let command = descriptor.name().to_string();

        bot.activity.record_command();
        tracing::info!(
            author = %ctx.message.author.display_tag(),
            origin = %ctx.message.origin(),
            command = %command,
            text = %ctx.message.content,
            "Command invoked"
        );

        match self.invoke(&descriptor, &snapshot, &ctx).await {
            Ok(response) => {
                self.render(&ctx, response).await;
                DispatchOutcome::Responded { command }
            }
            Err(CommandError::Shutdown) => {
                tracing::info!(command = %command, "Shutdown requested");
                DispatchOutcome::ShutdownRequested
            }
            Err(e) if e.is_usage() => {
                tracing::debug!(command = %command, "Invalid usage: {e}");
                let doc = descriptor.spec.render_doc(&bot.config.prefix);
                let content = if doc.is_empty() {
                    ":warning: Invalid usage".to_string()
                } else {
                    format!("```\n{doc}\n```")
                };
                self.render(&ctx, Response::new(content).delete_after_secs(10))
                    .await;
                DispatchOutcome::UsageShown { command }
            }
            Err(CommandError::CapabilityDenied(reason)) => {
                tracing::info!(command = %command, reason = %reason, "Command denied");
                self.render(&ctx, Response::new(reason).delete_after_secs(10))
                    .await;
                DispatchOutcome::Denied { command }
            }
            Err(e) => {
                tracing::error!(command = %command, "Command failed: {e:#}");
                let notice = format!("An error occurred while running `{command}`");
                self.render(&ctx, Response::warning(&notice)).await;
                DispatchOutcome::Failed { command }
            }
        }
    }

    async fn invoke(
        &self,
        descriptor: &CommandDescriptor,
        snapshot: &Snapshot,
        ctx: &DispatchContext,
    ) -> Result<Response, CommandError> {
        let bot = &*self.bot;
        guards::check_all(&descriptor.spec.guards, bot, &ctx.message).await?;
        let args = binder::bind(&descriptor.spec, ctx)?;
        descriptor
            .handler
            .execute(Invocation {
                bot,
                snapshot,
                self_operating: ctx.self_operating,
                args,
            })
            .await
    }

    /// Deliver a response: edit in place for self-authored messages when
    /// configured, send otherwise. Transport failures are logged only.
    pub async fn render(&self, ctx: &DispatchContext, response: Response) {
        let bot = &*self.bot;
        let channel_id = ctx.message.channel.id.as_str();

        let mut content = if response.mention_prefix && !ctx.self_operating {
            format!("{}, {}", ctx.message.author.mention(), response.content)
        } else {
            response.content
        };
        if content.chars().count() > MAX_MESSAGE_CHARS {
            tracing::warn!(
                chars = content.chars().count(),
                "Response exceeds message limit, truncating"
            );
            content = truncate_with_ellipsis(&content, MAX_MESSAGE_CHARS);
        }

        let delivered = if ctx.self_operating && bot.config.edit_instead_of_send {
            bot.transport
                .edit(channel_id, &ctx.message.id, &content)
                .await
        } else {
            bot.transport.send(channel_id, &content).await
        };

        match delivered {
            Ok(sent) => {
                if let Some(delay) = response.delete_after {
                    if bot.config.allow_deletion {
                        schedule_delete(Arc::clone(&bot.transport), sent, delay);
                    }
                }
            }
            Err(e) => tracing::warn!(channel = channel_id, "Failed to deliver response: {e}"),
        }
    }
}

/// Delete `sent` after `delay` on its own task.
pub fn schedule_delete(transport: Arc<dyn ChatTransport>, sent: SentMessage, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if let Err(e) = transport.delete(&sent.channel_id, &sent.id).await {
            tracing::warn!(message_id = %sent.id, "Scheduled delete failed: {e}");
        }
    });
}
