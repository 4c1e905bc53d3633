use super::entity_group::EntityGroup;
use super::export::ContinuousExport;
use super::external::ExternalTable;
use super::follower::{FollowerDatabase, FollowerState};
use super::function::Function;
use super::principal::{Principal, Role};
use super::table::Table;
use super::view::MaterializedView;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Declared (or observed) state of one database.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseState {
    pub name: String,
    pub tables: BTreeMap<String, Table>,
    pub functions: BTreeMap<String, Function>,
    pub materialized_views: BTreeMap<String, MaterializedView>,
    pub continuous_exports: BTreeMap<String, ContinuousExport>,
    pub external_tables: BTreeMap<String, ExternalTable>,
    pub entity_groups: BTreeMap<String, EntityGroup>,
    pub admins: Vec<Principal>,
    pub users: Vec<Principal>,
    pub viewers: Vec<Principal>,
    pub unrestricted_viewers: Vec<Principal>,
    pub ingestors: Vec<Principal>,
    pub monitors: Vec<Principal>,
    pub deletions: Deletions,
    /// Follower configuration keyed by follower cluster name.
    pub followers: BTreeMap<String, FollowerDatabase>,
}

/// Names the declared state wants removed from the live database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Deletions {
    pub tables: Vec<String>,
    /// `Table.Column` references.
    pub columns: Vec<String>,
    pub functions: Vec<String>,
    pub materialized_views: Vec<String>,
    pub continuous_exports: Vec<String>,
    pub external_tables: Vec<String>,
    pub entity_groups: Vec<String>,
}

impl DatabaseState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn principals(&self, role: Role) -> &[Principal] {
        match role {
            Role::Admins => &self.admins,
            Role::Users => &self.users,
            Role::Viewers => &self.viewers,
            Role::UnrestrictedViewers => &self.unrestricted_viewers,
            Role::Ingestors => &self.ingestors,
            Role::Monitors => &self.monitors,
        }
    }

    pub fn principals_mut(&mut self, role: Role) -> &mut Vec<Principal> {
        match role {
            Role::Admins => &mut self.admins,
            Role::Users => &mut self.users,
            Role::Viewers => &mut self.viewers,
            Role::UnrestrictedViewers => &mut self.unrestricted_viewers,
            Role::Ingestors => &mut self.ingestors,
            Role::Monitors => &mut self.monitors,
        }
    }

    pub fn follower_states(&self) -> Vec<FollowerState> {
        self.followers
            .iter()
            .map(|(cluster, follower)| FollowerState {
                cluster: cluster.clone(),
                database: self.name.clone(),
                follower: follower.clone(),
            })
            .collect()
    }

    /// Whether the named `Table.Column` exists in this state.
    pub fn has_column(&self, reference: &str) -> bool {
        match reference.split_once('.') {
            Some((table, column)) => self
                .tables
                .get(table)
                .map(|t| t.columns.contains(column))
                .unwrap_or(false),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnSchema;

    #[test]
    fn test_has_column() {
        let mut db = DatabaseState::new("Telemetry");
        db.tables.insert(
            "Logs".to_string(),
            Table::with_columns(ColumnSchema::new().with("Message", "string")),
        );
        assert!(db.has_column("Logs.Message"));
        assert!(!db.has_column("Logs.Level"));
        assert!(!db.has_column("Other.Message"));
        assert!(!db.has_column("Logs"));
    }

    #[test]
    fn test_yaml_roundtrip_of_minimal_state() {
        let yaml = r#"
name: Telemetry
tables:
  Logs:
    columns:
      Timestamp: datetime
      Message: string
admins:
  - id: aaduser=alice@contoso.com
    name: Alice
deletions:
  functions: [Obsolete]
"#;
        let db: DatabaseState = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(db.name, "Telemetry");
        assert_eq!(db.tables["Logs"].columns.len(), 2);
        assert_eq!(db.admins[0].display_name(), "Alice");
        assert_eq!(db.deletions.functions, vec!["Obsolete".to_string()]);
    }
}
