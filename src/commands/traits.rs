use super::guards::Guard;
use super::registry::Snapshot;
use super::response::Response;
use crate::bot::BotContext;
use crate::transport::{ChannelRef, IncomingMessage, ServerRef, UserRef};
use async_trait::async_trait;
use std::collections::HashMap;

/// Values taken from the inbound message rather than from user tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextParam {
    Message,
    Channel,
    Author,
    Server,
}

impl ContextParam {
    pub const ALL: [ContextParam; 4] = [
        ContextParam::Message,
        ContextParam::Channel,
        ContextParam::Author,
        ContextParam::Server,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Channel => "channel",
            Self::Author => "author",
            Self::Server => "server",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    Required,
    Optional { default: Option<&'static str> },
    /// Receives every token left after the positional parameters.
    CatchAll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
}

impl ParamSpec {
    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::Required,
        }
    }

    pub const fn optional(name: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::Optional { default: None },
        }
    }

    pub const fn optional_or(name: &'static str, default: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::Optional {
                default: Some(default),
            },
        }
    }

    /// The conventional `args` catch-all.
    pub const fn catch_all() -> Self {
        Self {
            name: "args",
            kind: ParamKind::CatchAll,
        }
    }

    pub fn is_positional(&self) -> bool {
        !matches!(self.kind, ParamKind::CatchAll)
    }
}

/// Everything the registry needs to know about a command.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub name: &'static str,
    pub context: Vec<ContextParam>,
    pub params: Vec<ParamSpec>,
    /// Usage text; `{prefix}` is substituted when rendered.
    pub doc: &'static str,
    pub guards: Vec<Guard>,
}

impl CommandSpec {
    pub fn new(name: &'static str, doc: &'static str) -> Self {
        Self {
            name,
            context: Vec::new(),
            params: Vec::new(),
            doc,
            guards: Vec::new(),
        }
    }

    pub fn context(mut self, context: &[ContextParam]) -> Self {
        self.context = context.to_vec();
        self
    }

    pub fn params(mut self, params: Vec<ParamSpec>) -> Self {
        self.params = params;
        self
    }

    pub fn guards(mut self, guards: &[Guard]) -> Self {
        self.guards = guards.to_vec();
        self
    }

    pub fn wants(&self, param: ContextParam) -> bool {
        self.context.contains(&param)
    }

    pub fn catch_all(&self) -> Option<&ParamSpec> {
        self.params.iter().find(|p| !p.is_positional())
    }

    /// Documentation with `{prefix}` filled in and surrounding blank lines removed.
    pub fn render_doc(&self, prefix: &str) -> String {
        self.doc
            .lines()
            .map(str::trim)
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .replace("{prefix}", prefix)
    }
}

/// Arguments produced by the binder for one invocation.
#[derive(Debug, Clone, Default)]
pub struct BoundArgs {
    pub message: Option<IncomingMessage>,
    pub channel: Option<ChannelRef>,
    pub author: Option<UserRef>,
    pub server: Option<ServerRef>,
    pub(crate) positional: HashMap<&'static str, String>,
    pub(crate) defaults: HashMap<&'static str, &'static str>,
    pub(crate) rest: Option<Vec<String>>,
}

impl BoundArgs {
    /// The token bound to `name`, if one was supplied.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.positional.get(name).map(String::as_str)
    }

    /// The bound token, falling back to the parameter's declared default.
    pub fn get_or_default(&self, name: &str) -> Option<&str> {
        self.get(name)
            .or_else(|| self.defaults.get(name).copied())
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.positional.contains_key(name)
    }

    /// Tokens captured by the catch-all; empty when none was declared.
    pub fn rest(&self) -> &[String] {
        self.rest.as_deref().unwrap_or(&[])
    }

    pub fn has_catch_all(&self) -> bool {
        self.rest.is_some()
    }
}

/// One resolved call, handed to [`CommandHandler::execute`].
pub struct Invocation<'a> {
    pub bot: &'a BotContext,
    pub snapshot: &'a Snapshot,
    /// Acting account wrote the message.
    pub self_operating: bool,
    pub args: BoundArgs,
}

impl Invocation<'_> {
    /// The triggering message; handlers that read it declare `ContextParam::Message`.
    pub fn message(&self) -> Result<&IncomingMessage, CommandError> {
        self.args
            .message
            .as_ref()
            .ok_or_else(|| CommandError::Failure(anyhow::anyhow!("message was not bound")))
    }

    pub fn prefix(&self) -> &str {
        &self.bot.config.prefix
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Arguments do not fit the command; the usage doc is shown.
    #[error("invalid usage")]
    Usage,
    #[error("missing required argument `{0}`")]
    MissingArgument(&'static str),
    /// A guard refused; the reason is shown to the user.
    #[error("{0}")]
    CapabilityDenied(String),
    #[error("shutdown requested")]
    Shutdown,
    #[error(transparent)]
    Failure(#[from] anyhow::Error),
}

impl CommandError {
    pub fn denied(reason: impl Into<String>) -> Self {
        Self::CapabilityDenied(reason.into())
    }

    pub fn is_usage(&self) -> bool {
        matches!(self, Self::Usage | Self::MissingArgument(_))
    }
}

impl From<crate::store::StoreError> for CommandError {
    fn from(err: crate::store::StoreError) -> Self {
        Self::Failure(err.into())
    }
}

impl From<crate::transport::TransportError> for CommandError {
    fn from(err: crate::transport::TransportError) -> Self {
        Self::Failure(err.into())
    }
}

#[async_trait]
pub trait CommandHandler: Send + Sync {
    fn spec(&self) -> CommandSpec;
    async fn execute(&self, invocation: Invocation<'_>) -> Result<Response, CommandError>;
}
