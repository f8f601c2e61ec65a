pub mod aliases;
pub mod binder;
pub mod builtin;
pub mod dispatcher;
pub mod filter;
pub mod guards;
pub mod registry;
pub mod response;
pub mod traits;

pub use aliases::{AliasIssue, AliasTable};
pub use binder::bind;
pub use dispatcher::{DispatchContext, DispatchOutcome, Dispatcher};
pub use filter::{extract_tokens, should_dispatch};
pub use guards::Guard;
pub use registry::{
    resolve, CommandDescriptor, Registry, RegistryError, Snapshot, SnapshotCell,
};
pub use response::Response;
pub use traits::{
    BoundArgs, CommandError, CommandHandler, CommandSpec, ContextParam, Invocation, ParamKind,
    ParamSpec,
};
