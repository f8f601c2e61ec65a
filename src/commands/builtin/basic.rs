use crate::commands::guards::Guard;
use crate::commands::response::Response;
use crate::commands::traits::{
    CommandError, CommandHandler, CommandSpec, ContextParam, Invocation, ParamSpec,
};
use crate::util::format_hms;
use async_trait::async_trait;

pub struct PingCommand;

#[async_trait]
impl CommandHandler for PingCommand {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new(
            "ping",
            "
            Tests the bot's connection
            {prefix}ping
            ",
        )
    }

    async fn execute(&self, _invocation: Invocation<'_>) -> Result<Response, CommandError> {
        Ok(Response::new(":ping_pong:").delete_after_secs(5))
    }
}

pub struct HelpCommand;

#[async_trait]
impl CommandHandler for HelpCommand {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new(
            "help",
            "
            Shows the commands, or the usage of one command
            {prefix}help [command]
            ",
        )
        .params(vec![ParamSpec::optional("cmd")])
    }

    async fn execute(&self, invocation: Invocation<'_>) -> Result<Response, CommandError> {
        let prefix = invocation.prefix();
        let snapshot = invocation.snapshot;

        if let Some(raw) = invocation.args.get("cmd") {
            let token = raw.strip_prefix(prefix).unwrap_or(raw).to_lowercase();
            let Some(descriptor) = snapshot.resolve(&token) else {
                return Ok(Response::warning("Invalid command"));
            };
            let mut content = format!("```\n{}\n```", descriptor.spec.render_doc(prefix));
            if let Some(aliases) = &snapshot.aliases {
                let names: Vec<&str> = aliases.aliases_of(descriptor.name()).collect();
                if !names.is_empty() {
                    content.push_str(&format!("\nAliases: {}", names.join(", ")));
                }
            }
            return Ok(Response::new(content).delete_after_secs(60));
        }

        let commands = snapshot
            .registry
            .names()
            .iter()
            .map(|name| format!("{prefix}{name}"))
            .collect::<Vec<_>>()
            .join(", ");
        let content = format!(
            "{}\n\n**Commands**\n```\n{commands}\n```\nType `{prefix}help <command>` for usage.",
            invocation.bot.config.description
        );
        Ok(Response::new(content).delete_after_secs(60))
    }
}

pub struct ShutdownCommand;

#[async_trait]
impl CommandHandler for ShutdownCommand {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new(
            "shutdown",
            "
            Shuts down the bot
            {prefix}shutdown
            ",
        )
        .context(&[ContextParam::Channel])
        .guards(&[Guard::CreatorOnly])
    }

    async fn execute(&self, invocation: Invocation<'_>) -> Result<Response, CommandError> {
        if let Some(channel) = &invocation.args.channel {
            if let Err(e) = invocation.bot.transport.send(&channel.id, ":wave:").await {
                tracing::warn!("Failed to say goodbye: {e}");
            }
        }
        Err(CommandError::Shutdown)
    }
}

pub struct ReloadCommand;

#[async_trait]
impl CommandHandler for ReloadCommand {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new(
            "reload",
            "
            Reloads the alias file and rebuilds the command list
            {prefix}reload
            ",
        )
        .guards(&[Guard::CreatorOnly])
    }

    async fn execute(&self, invocation: Invocation<'_>) -> Result<Response, CommandError> {
        let summary = invocation.bot.reload();
        Ok(Response::new(format!(
            ":arrows_counterclockwise: Reloaded {} commands and {} aliases",
            summary.commands, summary.aliases
        ))
        .delete_after_secs(10))
    }
}

pub struct StatsCommand;

#[async_trait]
impl CommandHandler for StatsCommand {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new(
            "stats",
            "
            Shows uptime and usage statistics
            {prefix}stats
            ",
        )
    }

    async fn execute(&self, invocation: Invocation<'_>) -> Result<Response, CommandError> {
        let bot = invocation.bot;
        let snapshot = invocation.snapshot;
        let aliases = snapshot.aliases.as_ref().map_or(0, |a| a.len());
        let content = format!(
            "```xl\nUptime: {}\n\nServers: {}\nPrivate channels: {}\n\nCommands: {} ({} aliases)\nMessages seen: {}\nCommands run: {}\n```",
            format_hms(bot.uptime().as_secs()),
            bot.activity.servers(),
            bot.activity.private_channels(),
            snapshot.registry.len(),
            aliases,
            bot.activity.messages_seen(),
            bot.activity.commands_run(),
        );
        Ok(Response::new(content))
    }
}
