//! Command registry and the snapshot the dispatcher reads it through.
//!
//! The registry is built once from a list of handlers and never mutated.
//! A reload builds a fresh [`Snapshot`] and swaps it into the [`SnapshotCell`];
//! dispatches already holding the old `Arc` finish on the old view.

use super::aliases::AliasTable;
use super::traits::{CommandHandler, CommandSpec, ContextParam, ParamKind};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// A registered command: its spec plus the handler that runs it.
pub struct CommandDescriptor {
    pub spec: CommandSpec,
    pub handler: Arc<dyn CommandHandler>,
}

impl CommandDescriptor {
    pub fn name(&self) -> &'static str {
        self.spec.name
    }
}

impl std::fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("command name {0:?} must be non-empty lowercase without whitespace")]
    InvalidName(String),
    #[error("command `{0}` is registered twice")]
    DuplicateCommand(String),
    #[error("command `{command}`: parameter `{param}` is declared twice")]
    DuplicateParam { command: String, param: String },
    #[error("command `{command}`: parameter `{param}` shadows a context value")]
    ReservedParam { command: String, param: String },
    #[error("command `{command}`: required parameter `{param}` follows an optional one")]
    RequiredAfterOptional { command: String, param: String },
    #[error("command `{command}`: catch-all `{param}` must be the last parameter")]
    CatchAllNotLast { command: String, param: String },
}

/// Check a spec for declarations the binder could not honour.
pub fn validate_spec(spec: &CommandSpec) -> Result<(), RegistryError> {
    let name = spec.name;
    if name.is_empty()
        || name.chars().any(char::is_whitespace)
        || name.to_lowercase() != name
    {
        return Err(RegistryError::InvalidName(name.to_string()));
    }

    let mut seen = HashSet::new();
    let mut saw_optional = false;
    let last = spec.params.len().saturating_sub(1);
    for (idx, param) in spec.params.iter().enumerate() {
        let err_fields = || (name.to_string(), param.name.to_string());
        if ContextParam::ALL.iter().any(|c| c.as_str() == param.name) {
            let (command, param) = err_fields();
            return Err(RegistryError::ReservedParam { command, param });
        }
        if !seen.insert(param.name) {
            let (command, param) = err_fields();
            return Err(RegistryError::DuplicateParam { command, param });
        }
        match param.kind {
            ParamKind::Required if saw_optional => {
                let (command, param) = err_fields();
                return Err(RegistryError::RequiredAfterOptional { command, param });
            }
            ParamKind::Required => {}
            ParamKind::Optional { .. } => saw_optional = true,
            ParamKind::CatchAll if idx != last => {
                let (command, param) = err_fields();
                return Err(RegistryError::CatchAllNotLast { command, param });
            }
            ParamKind::CatchAll => {}
        }
    }
    Ok(())
}

/// Immutable map of canonical command names to descriptors.
#[derive(Debug, Default)]
pub struct Registry {
    commands: BTreeMap<&'static str, Arc<CommandDescriptor>>,
}

impl Registry {
    /// Register each handler; invalid or duplicate specs are logged and skipped.
    pub fn build(handlers: Vec<Arc<dyn CommandHandler>>) -> (Self, Vec<RegistryError>) {
        let mut registry = Self::default();
        let mut rejected = Vec::new();
        for handler in handlers {
            if let Err(e) = registry.insert(handler) {
                tracing::warn!("Command skipped: {e}");
                rejected.push(e);
            }
        }
        tracing::debug!(commands = registry.len(), "Command registry built");
        (registry, rejected)
    }

    fn insert(&mut self, handler: Arc<dyn CommandHandler>) -> Result<(), RegistryError> {
        let spec = handler.spec();
        validate_spec(&spec)?;
        if self.commands.contains_key(spec.name) {
            return Err(RegistryError::DuplicateCommand(spec.name.to_string()));
        }
        self.commands
            .insert(spec.name, Arc::new(CommandDescriptor { spec, handler }));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<CommandDescriptor>> {
        self.commands.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Canonical names in alphabetical order.
    pub fn names(&self) -> Vec<&'static str> {
        self.commands.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Registry and alias table as one consistent view.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub registry: Registry,
    pub aliases: Option<AliasTable>,
}

impl Snapshot {
    pub fn resolve(&self, token: &str) -> Option<Arc<CommandDescriptor>> {
        resolve(token, &self.registry, self.aliases.as_ref())
    }
}

/// Registry first, then alias table; `None` means the token is ignored.
pub fn resolve(
    token: &str,
    registry: &Registry,
    aliases: Option<&AliasTable>,
) -> Option<Arc<CommandDescriptor>> {
    if let Some(descriptor) = registry.get(token) {
        return Some(descriptor);
    }
    let canonical = aliases?.canonical_for(token)?;
    registry.get(canonical)
}

/// Swappable holder for the current [`Snapshot`].
#[derive(Debug, Default)]
pub struct SnapshotCell {
    inner: RwLock<Arc<Snapshot>>,
}

impl SnapshotCell {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            inner: RwLock::new(Arc::new(snapshot)),
        }
    }

    pub fn load(&self) -> Arc<Snapshot> {
        Arc::clone(&self.inner.read())
    }

    pub fn store(&self, snapshot: Snapshot) {
        *self.inner.write() = Arc::new(snapshot);
    }
}
