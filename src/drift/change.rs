use crate::analyzer::QuerySchemaExtractor;
use crate::dsl::{EntityGroup, PolicyFields, Principal, Role};
use crate::script::{order, quote_string, Comment, EntityScripts, ScriptContainer};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;

/// One reviewed difference between two states.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Change {
    Entity(EntityChange),
    Deletion(DeletionChange),
    Permission(PermissionChange),
    EntityGroup(EntityGroupChange),
    Policy(PolicyChange),
    Heading(Heading),
}

impl Change {
    pub fn entity_type(&self) -> &str {
        match self {
            Change::Entity(c) => &c.entity_type,
            Change::Deletion(c) => &c.entity_type,
            Change::Permission(_) => "Permission",
            Change::EntityGroup(_) => "EntityGroup",
            Change::Policy(c) => &c.entity_type,
            Change::Heading(_) => "Heading",
        }
    }

    pub fn entity(&self) -> &str {
        match self {
            Change::Entity(c) => &c.entity,
            Change::Deletion(c) => &c.entity,
            Change::Permission(c) => &c.entity,
            Change::EntityGroup(c) => &c.entity,
            Change::Policy(c) => &c.entity,
            Change::Heading(h) => &h.text,
        }
    }

    pub fn scripts(&self) -> &[ScriptContainer] {
        match self {
            Change::Entity(c) => &c.scripts,
            Change::Deletion(c) => &c.scripts,
            Change::Permission(c) => &c.scripts,
            Change::EntityGroup(c) => &c.scripts,
            Change::Policy(c) => &c.scripts,
            Change::Heading(_) => &[],
        }
    }

    pub fn comment(&self) -> Option<&Comment> {
        match self {
            Change::Entity(c) => c.comment.as_ref(),
            Change::Policy(c) => c.comment.as_ref(),
            _ => None,
        }
    }

    pub fn is_heading(&self) -> bool {
        matches!(self, Change::Heading(_))
    }

    /// Syntax-checks every script, recording the outcome in `is_valid`.
    pub fn annotate(self, extractor: &QuerySchemaExtractor) -> Change {
        let check = |scripts: Vec<ScriptContainer>| -> Vec<ScriptContainer> {
            scripts.into_iter().map(|s| extractor.annotate(s)).collect()
        };
        match self {
            Change::Entity(mut c) => {
                c.scripts = check(c.scripts);
                Change::Entity(c)
            }
            Change::Deletion(mut c) => {
                c.scripts = check(c.scripts);
                Change::Deletion(c)
            }
            Change::Permission(mut c) => {
                c.scripts = check(c.scripts);
                Change::Permission(c)
            }
            Change::EntityGroup(mut c) => {
                c.scripts = check(c.scripts);
                Change::EntityGroup(c)
            }
            Change::Policy(mut c) => {
                c.scripts = check(c.scripts);
                Change::Policy(c)
            }
            heading @ Change::Heading(_) => heading,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Heading {
    pub text: String,
}

impl Heading {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Creation or update of a named entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityChange {
    pub entity_type: String,
    pub entity: String,
    pub is_new: bool,
    pub scripts: Vec<ScriptContainer>,
    pub comment: Option<Comment>,
}

impl EntityChange {
    /// Keeps the scripts of `to` that `from` does not already produce verbatim.
    /// Returns `None` when nothing changed.
    pub fn between<E: EntityScripts>(
        entity_type: &str,
        name: &str,
        from: Option<&E>,
        to: &E,
    ) -> Option<Self> {
        let old_scripts = from.map(|e| e.create_scripts(name)).unwrap_or_default();
        let scripts: Vec<ScriptContainer> = to
            .create_scripts(name)
            .into_iter()
            .filter(|script| {
                !old_scripts
                    .iter()
                    .any(|old| old.kind == script.kind && old.text == script.text)
            })
            .collect();
        if scripts.is_empty() {
            return None;
        }
        Some(Self {
            entity_type: entity_type.to_string(),
            entity: name.to_string(),
            is_new: from.is_none(),
            scripts: sorted(scripts),
            comment: None,
        })
    }

    pub fn with_comment(mut self, comment: Option<Comment>) -> Self {
        self.comment = match (self.comment.take(), comment) {
            (Some(existing), Some(added)) => Some(existing.merge(added)),
            (existing, added) => existing.or(added),
        };
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionChange {
    pub entity_type: String,
    pub entity: String,
    pub scripts: Vec<ScriptContainer>,
}

impl DeletionChange {
    pub fn new(entity_type: &str, name: &str, command: String) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            entity: name.to_string(),
            scripts: vec![ScriptContainer::new(
                format!("Drop{}", entity_type),
                order::DELETION,
                command,
            )],
        }
    }
}

/// Membership change of one role, compared by principal identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionChange {
    pub entity: String,
    pub role: String,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    /// `(id, old display name, new display name)`
    pub renamed: Vec<(String, String, String)>,
    pub scripts: Vec<ScriptContainer>,
}

impl PermissionChange {
    /// `target` is the command target, e.g. `database Db` or `follower database Db`.
    pub fn between(target: &str, role: Role, from: &[Principal], to: &[Principal]) -> Option<Self> {
        let old_ids: BTreeSet<String> = from.iter().map(Principal::identity).collect();
        let new_ids: BTreeSet<String> = to.iter().map(Principal::identity).collect();

        let added: Vec<&Principal> = dedup(to)
            .into_iter()
            .filter(|p| !old_ids.contains(&p.identity()))
            .collect();
        let removed: Vec<&Principal> = dedup(from)
            .into_iter()
            .filter(|p| !new_ids.contains(&p.identity()))
            .collect();
        let renamed: Vec<(String, String, String)> = dedup(to)
            .into_iter()
            .filter_map(|new| {
                let old = from.iter().find(|old| old.identity() == new.identity())?;
                (old.display_name() != new.display_name()).then(|| {
                    (
                        new.id.clone(),
                        old.display_name().to_string(),
                        new.display_name().to_string(),
                    )
                })
            })
            .collect();

        if added.is_empty() && removed.is_empty() && renamed.is_empty() {
            return None;
        }

        let role_name = role.keyword();
        let mut scripts = Vec::new();
        match (added.is_empty(), removed.is_empty()) {
            (false, true) => scripts.push(ScriptContainer::new(
                "AddPermissions",
                order::PERMISSION,
                format!(".add {} {} ({})", target, role_name, id_list(&added)),
            )),
            (true, false) => scripts.push(ScriptContainer::new(
                "DropPermissions",
                order::PERMISSION,
                format!(".drop {} {} ({})", target, role_name, id_list(&removed)),
            )),
            (false, false) => {
                let members = dedup(to);
                let list = if members.is_empty() {
                    "none".to_string()
                } else {
                    format!("({})", id_list(&members))
                };
                scripts.push(ScriptContainer::new(
                    "SetPermissions",
                    order::PERMISSION,
                    format!(".set {} {} {}", target, role_name, list),
                ));
            }
            (true, true) => {}
        }
        for (id, old_name, new_name) in &renamed {
            scripts.push(ScriptContainer::informational(
                "RenamePrincipal",
                format!("// {} {}: '{}' is now named '{}'", role_name, id, old_name, new_name),
            ));
        }

        Some(Self {
            entity: format!("{} {}", target, role_name),
            role: role_name.to_string(),
            added: added.iter().map(|p| p.id.clone()).collect(),
            removed: removed.iter().map(|p| p.id.clone()).collect(),
            renamed,
            scripts: sorted(scripts),
        })
    }
}

fn dedup(principals: &[Principal]) -> Vec<&Principal> {
    let mut seen = BTreeSet::new();
    principals
        .iter()
        .filter(|p| seen.insert(p.identity()))
        .collect()
}

fn id_list(principals: &[&Principal]) -> String {
    principals
        .iter()
        .map(|p| quote_string(&p.id))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityGroupChange {
    pub entity: String,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub scripts: Vec<ScriptContainer>,
}

impl EntityGroupChange {
    pub fn between(name: &str, from: Option<&EntityGroup>, to: &EntityGroup) -> Option<Self> {
        let new_members = to.member_set();
        let old_members = from.map(EntityGroup::member_set).unwrap_or_default();
        if from.is_some() && new_members == old_members {
            return None;
        }
        Some(Self {
            entity: name.to_string(),
            added: new_members
                .difference(&old_members)
                .map(|m| m.to_string())
                .collect(),
            removed: old_members
                .difference(&new_members)
                .map(|m| m.to_string())
                .collect(),
            scripts: to.create_scripts(name),
        })
    }
}

/// A policy object compared property by property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyChange {
    pub entity_type: String,
    pub entity: String,
    pub scripts: Vec<ScriptContainer>,
    pub comment: Option<Comment>,
}

impl PolicyChange {
    /// Only properties set on `to` are compared; unset ones are left alone.
    pub fn between<P: PolicyFields + EntityScripts>(
        entity_type: &str,
        name: &str,
        from: Option<&P>,
        to: &P,
    ) -> Option<Self> {
        let new_value = to.to_policy_value();
        let unchanged = from
            .map(|old| is_subset(&new_value, &old.to_policy_value()))
            .unwrap_or(false);
        if unchanged {
            return None;
        }
        Some(Self::with_scripts(entity_type, name, to.create_scripts(name)))
    }

    pub fn with_scripts(entity_type: &str, name: &str, scripts: Vec<ScriptContainer>) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            entity: name.to_string(),
            scripts: sorted(scripts),
            comment: None,
        }
    }
}

/// Whether every property set in `new` has the same value in `old`.
fn is_subset(new: &Value, old: &Value) -> bool {
    match (new, old) {
        (Value::Object(new), Value::Object(old)) => new.iter().all(|(key, value)| {
            old.get(key)
                .map(|existing| is_subset(value, existing))
                .unwrap_or(false)
        }),
        _ => new == old,
    }
}

/// Stable sort by order; ties keep emission order.
fn sorted(mut scripts: Vec<ScriptContainer>) -> Vec<ScriptContainer> {
    scripts.sort_by_key(|s| s.order);
    scripts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::{ClusterCapacityPolicy, IngestionCapacity, Table, UpdatePolicy};
    use crate::schema::ColumnSchema;

    fn create_test_table(columns: &[&str]) -> Table {
        Table::with_columns(columns.iter().map(|c| (*c, "string")).collect::<ColumnSchema>())
    }

    #[test]
    fn test_identical_entities_produce_no_change() {
        let table = create_test_table(&["A", "B"]);
        assert!(EntityChange::between("Table", "T", Some(&table), &table).is_none());
    }

    #[test]
    fn test_only_changed_scripts_are_kept() {
        let old = create_test_table(&["A"]);
        let mut new = old.clone();
        new.hot_cache = Some("7d".to_string());

        let change = EntityChange::between("Table", "T", Some(&old), &new).unwrap();
        assert!(!change.is_new);
        assert_eq!(change.scripts.len(), 1);
        assert_eq!(change.scripts[0].kind, "TableCachingPolicy");
    }

    #[test]
    fn test_scripts_sorted_by_order() {
        let mut table = create_test_table(&["A"]);
        table.update_policies = vec![UpdatePolicy::new("Src", "Src | project A")];
        table.hot_cache = Some("1d".to_string());

        let change = EntityChange::between("Table", "T", None, &table).unwrap();
        assert!(change.is_new);
        let orders: Vec<i32> = change.scripts.iter().map(|s| s.order).collect();
        let mut expected = orders.clone();
        expected.sort();
        assert_eq!(orders, expected);
    }

    #[test]
    fn test_permission_add_only() {
        let alice = Principal::new("aaduser=alice@contoso.com", "Alice");
        let change = PermissionChange::between("database Db", Role::Admins, &[], &[alice]).unwrap();
        assert_eq!(change.scripts.len(), 1);
        assert_eq!(
            change.scripts[0].text,
            ".add database Db admins (\"aaduser=alice@contoso.com\")"
        );
    }

    #[test]
    fn test_permission_add_and_remove_sets_full_list() {
        let alice = Principal::new("aaduser=alice@contoso.com", "Alice");
        let bob = Principal::new("aaduser=bob@contoso.com", "Bob");
        let change =
            PermissionChange::between("database Db", Role::Viewers, &[alice], &[bob]).unwrap();
        assert_eq!(change.scripts.len(), 1);
        assert_eq!(
            change.scripts[0].text,
            ".set database Db viewers (\"aaduser=bob@contoso.com\")"
        );
    }

    #[test]
    fn test_permission_identity_is_case_insensitive() {
        let lower = Principal::new("aaduser=alice@contoso.com", "Alice");
        let upper = Principal::new("AADUser=Alice@Contoso.com", "Alice");
        assert!(
            PermissionChange::between("database Db", Role::Users, &[lower], &[upper]).is_none()
        );
    }

    #[test]
    fn test_entity_group_member_order_is_ignored() {
        let old = EntityGroup {
            members: vec!["cluster('a').database('x')".into(), "cluster('b').database('y')".into()],
        };
        let new = EntityGroup {
            members: vec!["cluster('b').database('y')".into(), "cluster('a').database('x')".into()],
        };
        assert!(EntityGroupChange::between("G", Some(&old), &new).is_none());

        let grown = EntityGroup {
            members: vec!["cluster('c').database('z')".into()],
        };
        let change = EntityGroupChange::between("G", Some(&old), &grown).unwrap();
        assert_eq!(change.added, vec!["cluster('c').database('z')"]);
        assert_eq!(change.removed.len(), 2);
        assert_eq!(change.scripts.len(), 1);
    }

    #[test]
    fn test_policy_compares_only_set_properties() {
        let old = ClusterCapacityPolicy {
            ingestion_capacity: Some(IngestionCapacity {
                cluster_maximum_concurrent_operations: Some(512),
                core_utilization_coefficient: Some(0.75),
            }),
            ..Default::default()
        };
        let partial = ClusterCapacityPolicy {
            ingestion_capacity: Some(IngestionCapacity {
                cluster_maximum_concurrent_operations: Some(512),
                core_utilization_coefficient: None,
            }),
            ..Default::default()
        };
        assert!(
            PolicyChange::between("ClusterCapacityPolicy", "c", Some(&old), &partial).is_none()
        );

        let raised = ClusterCapacityPolicy {
            ingestion_capacity: Some(IngestionCapacity {
                cluster_maximum_concurrent_operations: Some(1024),
                core_utilization_coefficient: None,
            }),
            ..Default::default()
        };
        let change =
            PolicyChange::between("ClusterCapacityPolicy", "c", Some(&old), &raised).unwrap();
        assert_eq!(change.scripts.len(), 1);
        assert!(change.scripts[0].text.contains("1024"));
        assert!(!change.scripts[0].text.contains("CoreUtilizationCoefficient"));
    }

    #[test]
    fn test_annotate_keeps_markers_valid() {
        let old = Principal::new("aaduser=alice@contoso.com", "Alice");
        let new = Principal::new("aaduser=alice@contoso.com", "Alice Smith");
        let change =
            PermissionChange::between("database Db", Role::Admins, &[old], &[new]).unwrap();
        let change = Change::Permission(change).annotate(&QuerySchemaExtractor::new());
        assert_eq!(change.scripts().len(), 1);
        assert!(change.scripts()[0].order < 0);
        assert_eq!(change.scripts()[0].is_valid, Some(true));
    }
}
