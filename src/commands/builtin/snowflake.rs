use crate::commands::response::Response;
use crate::commands::traits::{
    CommandError, CommandHandler, CommandSpec, ContextParam, Invocation, ParamSpec,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Milliseconds between the Unix epoch and the first second of 2015.
pub const DISCORD_EPOCH_MS: u64 = 1_420_070_400_000;

/// What a snowflake argument referred to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnowflakeKind {
    Plain,
    User,
    Role,
    Channel,
    Emoji(String),
}

/// Accept a bare id or mention syntax: `<@id>`, `<@!id>`, `<@&id>`, `<#id>`, `<:name:id>`.
pub fn parse_snowflake(raw: &str) -> Option<(SnowflakeKind, u64)> {
    let raw = raw.trim();
    let inner = raw
        .strip_prefix('<')
        .and_then(|s| s.strip_suffix('>'))
        .unwrap_or(raw);

    let (kind, digits) = if let Some(rest) = inner.strip_prefix("@&") {
        (SnowflakeKind::Role, rest)
    } else if let Some(rest) = inner.strip_prefix('@') {
        (SnowflakeKind::User, rest.trim_start_matches('!'))
    } else if let Some(rest) = inner.strip_prefix('#') {
        (SnowflakeKind::Channel, rest)
    } else if inner.contains(':') {
        let mut parts = inner.rsplitn(3, ':');
        let id = parts.next()?;
        let name = parts.next()?;
        (SnowflakeKind::Emoji(name.to_string()), id)
    } else {
        (SnowflakeKind::Plain, inner)
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some((kind, digits.parse().ok()?))
}

/// Creation time encoded in the top 42 bits of a snowflake.
pub fn snowflake_time(id: u64) -> Option<DateTime<Utc>> {
    let millis = (id >> 22).checked_add(DISCORD_EPOCH_MS)?;
    DateTime::from_timestamp_millis(i64::try_from(millis).ok()?)
}

pub struct SnowflakeCommand;

#[async_trait]
impl CommandHandler for SnowflakeCommand {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new(
            "snowflake",
            "
            Shows when an id (user, channel, role, emoji or message) was created
            {prefix}snowflake [id or mention]
            ",
        )
        .context(&[ContextParam::Author])
        .params(vec![ParamSpec::optional("id")])
    }

    async fn execute(&self, invocation: Invocation<'_>) -> Result<Response, CommandError> {
        let bot = invocation.bot;
        let raw = match invocation.args.get("id") {
            Some(id) => id.to_string(),
            None if bot.config.selfbot => bot.self_user.id.clone(),
            None => invocation
                .args
                .author
                .as_ref()
                .map(|author| author.id.clone())
                .unwrap_or_else(|| bot.self_user.id.clone()),
        };

        let Some((kind, id)) = parse_snowflake(&raw) else {
            return Ok(Response::warning("Invalid snowflake"));
        };
        let Some(created) = snowflake_time(id) else {
            return Ok(Response::warning("Invalid snowflake"));
        };

        let label = match kind {
            SnowflakeKind::Plain => String::new(),
            SnowflakeKind::User => "User ".to_string(),
            SnowflakeKind::Role => "Role ".to_string(),
            SnowflakeKind::Channel => "Channel ".to_string(),
            SnowflakeKind::Emoji(name) => format!("Emoji :{name}: "),
        };
        Ok(Response::new(format!(
            ":snowflake: {label}`{id}` was created on **{}** (**{}** UTC)",
            created.format("%a %d %b %Y"),
            created.format("%H:%M:%S"),
        )))
    }
}
