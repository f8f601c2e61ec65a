use crate::commands::response::Response;
use crate::commands::traits::{
    CommandError, CommandHandler, CommandSpec, ContextParam, Invocation, ParamSpec,
};
use crate::transport::{Presence, PresenceStatus};
use async_trait::async_trait;

pub struct StatusCommand;

#[async_trait]
impl CommandHandler for StatusCommand {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new(
            "status",
            "
            Sets the playing status, or clears it when given nothing
            {prefix}status [text]
            ",
        )
        .context(&[ContextParam::Author])
        .params(vec![ParamSpec::optional("status"), ParamSpec::catch_all()])
    }

    async fn execute(&self, invocation: Invocation<'_>) -> Result<Response, CommandError> {
        let args = &invocation.args;
        let activity = args.get("status").map(|first| {
            std::iter::once(first)
                .chain(args.rest().iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join(" ")
        });

        let presence = Presence {
            activity: activity.clone(),
            ..invocation.bot.presence()
        };
        invocation.bot.update_presence(presence).await?;
        tracing::info!(
            author = %args.author.as_ref().map(|a| a.display_tag()).unwrap_or_default(),
            activity = activity.as_deref().unwrap_or(""),
            "Status changed"
        );

        let content = match activity {
            Some(text) => format!(":white_check_mark: Set status to **{text}**"),
            None => ":white_check_mark: Cleared status".to_string(),
        };
        Ok(Response::new(content).delete_after_secs(60))
    }
}

pub struct PresenceCommand;

#[async_trait]
impl CommandHandler for PresenceCommand {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new(
            "presence",
            "
            Sets the online presence
            {prefix}presence [online|idle|dnd|invisible]
            ",
        )
        .params(vec![ParamSpec::optional_or("option", "online")])
    }

    async fn execute(&self, invocation: Invocation<'_>) -> Result<Response, CommandError> {
        let option = invocation.args.get_or_default("option").unwrap_or("online");
        let status = PresenceStatus::parse(option).ok_or(CommandError::Usage)?;
        let presence = Presence {
            status,
            afk: status == PresenceStatus::Idle,
            ..invocation.bot.presence()
        };
        invocation.bot.update_presence(presence).await?;
        Ok(Response::new(format!(
            ":white_check_mark: Set presence to **{}**",
            status.as_str()
        ))
        .delete_after_secs(10))
    }
}
