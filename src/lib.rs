pub mod analyzer;
pub mod config;
pub mod drift;
pub mod dsl;
pub mod error;
pub mod executor;
pub mod schema;
pub mod script;
pub mod validation;

pub use analyzer::{
    Analysis, Diagnostic, DiagnosticSeverity, LexicalAnalyzer, QueryAnalyzer,
    QuerySchemaExtractor, SchemaContext,
};
pub use config::{Settings, ValidationConfig};
pub use drift::{
    diff_followers, Change, ChangeSet, DeletionChange, DiffContext, EntityChange,
    EntityGroupChange, Heading, PermissionChange, PolicyChange, Reconcilable,
};
pub use dsl::{
    ClusterState, DatabaseState, Deletions, EntityGroup, FollowerState, Function,
    MaterializedView, Principal, PrincipalKind, Role, StateLoader, Table, UpdatePolicy,
};
pub use error::{KqlDriftError, Result};
pub use executor::{
    ApplyEngine, ApplyPhase, ApplyReport, CommandClient, CommandResult, ScriptResult,
    StateObserver,
};
pub use schema::{is_type_compatible, ColumnSchema, KqlType};
pub use script::{Comment, CommentKind, EntityScripts, ScriptContainer};
pub use validation::{
    validate_column_order, PrincipalDirectory, PrincipalValidator, QueryValidation,
    StructuralValidation, UpdatePolicyValidator,
};
