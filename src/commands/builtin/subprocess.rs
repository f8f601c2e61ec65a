use crate::commands::guards::Guard;
use crate::commands::response::Response;
use crate::commands::traits::{CommandError, CommandHandler, CommandSpec, Invocation, ParamSpec};
use crate::util::truncate_with_ellipsis;
use anyhow::Context;
use async_trait::async_trait;

/// Room left for the code block around the output.
const MAX_OUTPUT_CHARS: usize = 1900;

pub struct SubprocessCommand;

#[async_trait]
impl CommandHandler for SubprocessCommand {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new(
            "subprocess",
            "
            Runs a shell command on the host
            {prefix}subprocess <command line>
            ",
        )
        .params(vec![ParamSpec::catch_all()])
        .guards(&[Guard::CreatorOnly])
    }

    async fn execute(&self, invocation: Invocation<'_>) -> Result<Response, CommandError> {
        if !invocation.bot.config.subprocess.enabled {
            return Err(CommandError::denied(
                ":warning: The subprocess command is disabled in the config",
            ));
        }
        let command_line = invocation.args.rest().join(" ");
        if command_line.trim().is_empty() {
            return Err(CommandError::Usage);
        }

        tracing::info!(command_line = %command_line, "Running subprocess");
        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&command_line)
            .output()
            .await
            .context("failed to spawn sh")?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        if !output.status.success() {
            let code = output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            text.push_str(&format!("\n(exit status: {code})"));
        }
        let text = truncate_with_ellipsis(text.trim_end(), MAX_OUTPUT_CHARS);
        Ok(Response::new(format!("```xl\n--- Subprocess ---\n{text}\n```")))
    }
}

#[cfg(test)]
mod tests {
    use crate::bot::test_support::test_bot;
    use crate::commands::dispatcher::{DispatchOutcome, Dispatcher};
    use crate::transport::{ChannelRef, IncomingMessage, UserRef};

    fn from_owner(content: &str) -> IncomingMessage {
        IncomingMessage {
            id: "m1".into(),
            content: content.into(),
            author: UserRef {
                id: "owner".into(),
                name: "owner".into(),
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
    async fn disabled_by_default() {
        let (bot, transport) = test_bot(|_| {});
        let outcome = Dispatcher::new(bot)
            .dispatch(from_owner("!subprocess echo hi"))
            .await;
        assert_eq!(
            outcome,
            DispatchOutcome::Denied {
                command: "subprocess".into()
            }
        );
        assert!(transport.sent_contents()[0].contains("disabled"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_shell_command_when_enabled() {
        let (bot, transport) = test_bot(|c| c.subprocess.enabled = true);
        Dispatcher::new(bot)
            .dispatch(from_owner("!subprocess echo hello"))
            .await;
        assert!(transport.sent_contents()[0].contains("--- Subprocess ---\nhello\n```"));
    }
}
