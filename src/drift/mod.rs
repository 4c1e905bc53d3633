mod change;
mod changeset;
mod cluster;
mod collection;
mod context;
mod database;
mod follower;

pub use change::{
    Change, DeletionChange, EntityChange, EntityGroupChange, Heading, PermissionChange,
    PolicyChange,
};
pub use changeset::ChangeSet;
pub use context::DiffContext;
pub use follower::diff_followers;

/// A declared state that can be diffed against an observed one.
pub trait Reconcilable: Clone + Send + Sync {
    fn changeset_name(&self) -> String;

    /// Database the generated commands run in; `None` for cluster-level commands.
    fn command_scope(&self) -> Option<String>;

    fn diff(from: &Self, to: &Self, context: &DiffContext) -> ChangeSet<Self>;
}
