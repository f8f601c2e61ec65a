use super::traits::CommandError;
use crate::bot::BotContext;
use crate::transport::IncomingMessage;

/// Precondition checked by the dispatcher before a command runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    /// Only usable with `selfbot` mode on.
    SelfbotOnly,
    /// Needs the tag database.
    RequiresStore,
    /// Only the account owner may run it.
    CreatorOnly,
}

impl Guard {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SelfbotOnly => "selfbot",
            Self::RequiresStore => "store",
            Self::CreatorOnly => "creator",
        }
    }

    pub async fn check(self, bot: &BotContext, message: &IncomingMessage) -> Result<(), CommandError> {
        match self {
            Self::SelfbotOnly => {
                if !bot.config.selfbot {
                    return Err(CommandError::denied(
                        ":warning: This command can only be used with selfbots",
                    ));
                }
            }
            Self::RequiresStore => {
                if bot.store.is_none() {
                    return Err(CommandError::denied(
                        ":warning: This command cannot be used because the database is unavailable",
                    ));
                }
            }
            Self::CreatorOnly => {
                let owner = bot.owner_id().await;
                if owner.as_deref() != Some(message.author.id.as_str()) {
                    return Err(CommandError::denied(
                        ":warning: This command can only be used by the creator of the bot",
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Run guards in declaration order, stopping at the first refusal.
pub async fn check_all(
    guards: &[Guard],
    bot: &BotContext,
    message: &IncomingMessage,
) -> Result<(), CommandError> {
    for guard in guards {
        guard.check(bot, message).await?;
    }
    Ok(())
}
