use std::time::Duration;

/// What a handler wants shown in the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub content: String,
    /// Prefix the reply with a mention of the author (ignored when self-operating).
    pub mention_prefix: bool,
    /// Delete the rendered message after this long, if deletion is allowed.
    pub delete_after: Option<Duration>,
}

impl Response {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            mention_prefix: true,
            delete_after: None,
        }
    }

    pub fn without_mention(mut self) -> Self {
        self.mention_prefix = false;
        self
    }

    pub fn delete_after_secs(mut self, secs: u64) -> Self {
        self.delete_after = Some(Duration::from_secs(secs));
        self
    }

    /// `:warning:` notice that disappears after 10 seconds.
    pub fn warning(text: &str) -> Self {
        Self::new(format!(":warning: {text}")).delete_after_secs(10)
    }
}
