use crate::commands::response::Response;
use crate::commands::traits::{CommandError, CommandHandler, CommandSpec, Invocation, ParamSpec};
use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

/// Image URL from a random-cat API response: `[{"url": ..}]`, `{"file": ..}` or `{"url": ..}`.
pub fn cat_image_url(body: &Value) -> Option<&str> {
    let entry = match body {
        Value::Array(items) => items.first()?,
        other => other,
    };
    entry
        .get("url")
        .or_else(|| entry.get("file"))
        .and_then(Value::as_str)
}

pub struct CatCommand;

#[async_trait]
impl CommandHandler for CatCommand {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new(
            "cat",
            "
            Posts a random cat picture
            {prefix}cat
            ",
        )
    }

    async fn execute(&self, invocation: Invocation<'_>) -> Result<Response, CommandError> {
        let url = &invocation.bot.config.http.cat_api_url;
        let body: Value = invocation.bot.http.get_json(url).await?;
        let image = cat_image_url(&body)
            .with_context(|| format!("no image URL in response from {url}"))?;
        Ok(Response::new(image))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubIssue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub html_url: String,
    pub state: String,
}

/// Issues whose title or body contains `query`, case-insensitively. An empty query matches all.
pub fn matching_issues<'a>(issues: &'a [GithubIssue], query: &str) -> Vec<&'a GithubIssue> {
    let query = query.trim().to_lowercase();
    issues
        .iter()
        .filter(|issue| {
            query.is_empty()
                || issue.title.to_lowercase().contains(&query)
                || issue
                    .body
                    .as_deref()
                    .is_some_and(|body| body.to_lowercase().contains(&query))
        })
        .collect()
}

const MAX_LISTED_ISSUES: usize = 5;

pub struct GhIssueCommand;

#[async_trait]
impl CommandHandler for GhIssueCommand {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new(
            "ghissue",
            "
            Searches the issues of a GitHub repository
            {prefix}ghissue <owner/repo> <search terms>
            ",
        )
        .params(vec![ParamSpec::required("repo"), ParamSpec::catch_all()])
    }

    async fn execute(&self, invocation: Invocation<'_>) -> Result<Response, CommandError> {
        let repo = invocation.args.get("repo").ok_or(CommandError::Usage)?;
        if repo.split('/').filter(|part| !part.is_empty()).count() != 2 {
            return Err(CommandError::Usage);
        }
        let query = invocation.args.rest().join(" ");
        if query.trim().is_empty() {
            return Err(CommandError::Usage);
        }

        let base = invocation
            .bot
            .config
            .http
            .github_api_url
            .trim_end_matches('/');
        let url = format!("{base}/repos/{repo}/issues?state=all&per_page=100");
        let issues: Vec<GithubIssue> = invocation.bot.http.get_json(&url).await?;

        let found = matching_issues(&issues, &query);
        if found.is_empty() {
            return Ok(
                Response::new(":no_entry_sign: No matching issues found").delete_after_secs(10)
            );
        }
        let mut lines: Vec<String> = found
            .iter()
            .take(MAX_LISTED_ISSUES)
            .map(|issue| {
                format!(
                    "**#{}** [{}] {} <{}>",
                    issue.number, issue.state, issue.title, issue.html_url
                )
            })
            .collect();
        if found.len() > MAX_LISTED_ISSUES {
            lines.push(format!("...and {} more", found.len() - MAX_LISTED_ISSUES));
        }
        Ok(Response::new(lines.join("\n")))
    }
}
