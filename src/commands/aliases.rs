//! Alias table: canonical command name -> alternative names.
//!
//! Loaded from a JSON object such as `{"stats": ["about", "info"]}`. After
//! loading, every alias maps to exactly one registered command.

use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    by_command: BTreeMap<String, BTreeSet<String>>,
    by_alias: HashMap<String, String>,
}

/// Why an alias entry was dropped while building a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasIssue {
    Empty { command: String },
    UnknownCommand { command: String },
    ShadowsCommand { alias: String },
    Conflict { alias: String, commands: Vec<String> },
}

impl std::fmt::Display for AliasIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty { command } => write!(f, "empty alias listed for `{command}`"),
            Self::UnknownCommand { command } => {
                write!(f, "aliases for unknown command `{command}` ignored")
            }
            Self::ShadowsCommand { alias } => {
                write!(f, "alias `{alias}` is already a command name")
            }
            Self::Conflict { alias, commands } => write!(
                f,
                "alias `{alias}` claimed by {} and dropped",
                commands.join(", ")
            ),
        }
    }
}

impl AliasTable {
    /// Build a table from raw entries. `is_command` reports whether a name is registered.
    pub fn build(
        raw: BTreeMap<String, Vec<String>>,
        is_command: impl Fn(&str) -> bool,
    ) -> (Self, Vec<AliasIssue>) {
        let mut issues = Vec::new();
        let mut claims: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for (command, aliases) in raw {
            let command = command.trim().to_lowercase();
            if !is_command(&command) {
                issues.push(AliasIssue::UnknownCommand { command });
                continue;
            }
            for alias in aliases {
                let alias = alias.trim().to_lowercase();
                if alias.is_empty() || alias.chars().any(char::is_whitespace) {
                    issues.push(AliasIssue::Empty {
                        command: command.clone(),
                    });
                    continue;
                }
                if is_command(&alias) {
                    issues.push(AliasIssue::ShadowsCommand { alias });
                    continue;
                }
                claims.entry(alias).or_default().insert(command.clone());
            }
        }

        let mut table = Self::default();
        for (alias, commands) in claims {
            if commands.len() > 1 {
                issues.push(AliasIssue::Conflict {
                    alias,
                    commands: commands.into_iter().collect(),
                });
                continue;
            }
            if let Some(command) = commands.into_iter().next() {
                table
                    .by_command
                    .entry(command.clone())
                    .or_default()
                    .insert(alias.clone());
                table.by_alias.insert(alias, command);
            }
        }
        (table, issues)
    }

    /// Parse a JSON alias document.
    pub fn parse(
        json: &str,
        is_command: impl Fn(&str) -> bool,
    ) -> Result<(Self, Vec<AliasIssue>)> {
        let raw: BTreeMap<String, Vec<String>> =
            serde_json::from_str(json).context("Alias file must map names to string lists")?;
        Ok(Self::build(raw, is_command))
    }

    /// Load and log. Any problem reading the file disables aliases.
    pub fn load(path: &Path, is_command: impl Fn(&str) -> bool) -> Option<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::warn!(path = %path.display(), "Aliases disabled, cannot read alias file: {e}");
                return None;
            }
        };
        match Self::parse(&contents, is_command) {
            Ok((table, issues)) => {
                for issue in &issues {
                    tracing::warn!(path = %path.display(), "Alias dropped: {issue}");
                }
                tracing::info!(path = %path.display(), aliases = table.len(), "Aliases loaded");
                Some(table)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "Aliases disabled: {e:#}");
                None
            }
        }
    }

    pub fn canonical_for(&self, alias: &str) -> Option<&str> {
        self.by_alias.get(alias).map(String::as_str)
    }

    pub fn aliases_of(&self, command: &str) -> impl Iterator<Item = &str> {
        self.by_command
            .get(command)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    pub fn len(&self) -> usize {
        self.by_alias.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_alias.is_empty()
    }
}
