mod cluster;
mod database;
mod entity_group;
mod export;
mod external;
mod follower;
mod function;
mod loader;
mod principal;
mod table;
mod view;

pub use cluster::{
    ClusterCapacityPolicy, ClusterDeletions, ClusterState, ExportCapacity, ExtentsMergeCapacity,
    ExtentsPartitionCapacity, ExtentsPurgeRebuildCapacity, ExtentsRebuildCapacity,
    IngestionCapacity, MaterializedViewsCapacity, PolicyField, PolicyFields,
    QueryAcceleratorCapacity, StoredQueryResultsCapacity,
    StreamingIngestionPostProcessingCapacity, WorkloadGroup,
};
pub use database::{DatabaseState, Deletions};
pub use entity_group::EntityGroup;
pub use export::ContinuousExport;
pub use external::{ExternalTable, ExternalTableKind};
pub use follower::{FollowerCache, FollowerDatabase, FollowerState, ModificationKind};
pub use function::Function;
pub use loader::{StateFile, StateLoader};
pub use principal::{Principal, PrincipalKind, Role};
pub use table::{RetentionPolicy, RowLevelSecurity, Table, UpdatePolicy};
pub use view::MaterializedView;
