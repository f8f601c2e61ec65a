use crate::config::Config;
use crate::transport::IncomingMessage;

/// Decide whether a message is a candidate for dispatch.
pub fn should_dispatch(message: &IncomingMessage, self_id: &str, config: &Config) -> bool {
    if message.channel.private && !config.allow_private {
        return false;
    }
    if !message.content.trim().starts_with(config.prefix.as_str()) {
        return false;
    }
    if config.selfbot && message.author.id != self_id {
        return false;
    }
    // A bot account's own replies can start with the prefix (tags, echoed text).
    if config.bot_account && !config.selfbot && message.author.id == self_id {
        return false;
    }
    true
}

/// Split `text` into a lower-cased command token and its argument tokens.
///
/// Returns `None` when the text does not start with `prefix` or holds only the prefix.
pub fn extract_tokens(text: &str, prefix: &str) -> Option<(String, Vec<String>)> {
    let rest = text.trim().strip_prefix(prefix)?;
    let mut parts = rest.split_whitespace();
    let command = parts.next()?.to_lowercase();
    Some((command, parts.map(str::to_string).collect()))
}
