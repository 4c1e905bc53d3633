use super::change::{Change, PermissionChange, PolicyChange};
use super::changeset::ChangeSet;
use super::collection::push_section;
use super::context::DiffContext;
use super::Reconcilable;
use crate::dsl::{DatabaseState, FollowerState, ModificationKind, Role};
use crate::script::{order, quote_identifier, ScriptContainer};
use std::collections::BTreeMap;
use tracing::info;

impl Reconcilable for FollowerState {
    fn changeset_name(&self) -> String {
        format!("{}/{}", self.cluster, self.database)
    }

    fn command_scope(&self) -> Option<String> {
        None
    }

    fn diff(from: &Self, to: &Self, context: &DiffContext) -> ChangeSet<Self> {
        let target = format!("follower database {}", quote_identifier(&to.database));
        let old = &from.follower;
        let new = &to.follower;
        let mut changes = Vec::new();

        let mut caching = Vec::new();
        let mut removed = Vec::new();
        let mut altered = Vec::new();
        for (entity_kind, old_map, new_map) in [
            ("table", &old.cache.tables, &new.cache.tables),
            ("materialized-view", &old.cache.materialized_views, &new.cache.materialized_views),
        ] {
            let (deleted, changed) = diff_cache_map(&target, entity_kind, old_map, new_map);
            removed.extend(deleted);
            altered.extend(changed);
        }
        if !removed.is_empty() {
            caching.push(PolicyChange::with_scripts(
                "FollowerCachingDeletion",
                &to.database,
                removed,
            ));
        }
        if !altered.is_empty() {
            caching.push(PolicyChange::with_scripts("FollowerCaching", &to.database, altered));
        }
        match (&old.cache.default_hot_cache, &new.cache.default_hot_cache) {
            (old_hot, Some(hot)) if old_hot.as_ref() != Some(hot) => {
                caching.push(PolicyChange::with_scripts(
                    "FollowerDefaultCaching",
                    &to.database,
                    vec![follower_script(
                        "AlterFollowerDatabaseCaching",
                        format!(".alter {} policy caching hot = {}", target, hot),
                    )],
                ));
            }
            (Some(_), None) => {
                caching.push(PolicyChange::with_scripts(
                    "FollowerDefaultCaching",
                    &to.database,
                    vec![follower_script(
                        "DeleteFollowerDatabaseCaching",
                        format!(".delete {} policy caching", target),
                    )],
                ));
            }
            _ => {}
        }
        push_section(&mut changes, "Follower Caching", wrap(caching, context));

        let mut settings = Vec::new();
        for (setting, old_kind, new_kind) in [
            (
                "principals-modification-kind",
                old.principals_modification_kind,
                new.principals_modification_kind,
            ),
            (
                "caching-policies-modification-kind",
                old.caching_policies_modification_kind,
                new.caching_policies_modification_kind,
            ),
        ] {
            let change =
                diff_modification_kind(&target, &to.database, setting, old_kind, new_kind);
            settings.extend(change);
        }
        push_section(&mut changes, "Follower Settings", wrap(settings, context));

        let permissions: Vec<Change> = [
            (Role::Admins, &old.admins, &new.admins),
            (Role::Viewers, &old.viewers, &new.viewers),
        ]
        .into_iter()
        .filter_map(|(role, old_members, new_members)| {
            PermissionChange::between(&target, role, old_members, new_members)
        })
        .map(|change| Change::Permission(change).annotate(&context.extractor))
        .collect();
        push_section(&mut changes, "Permissions", permissions);

        info!(
            follower = %to.cluster,
            database = %to.database,
            changes = changes.iter().filter(|c| !c.is_heading()).count(),
            "Computed follower diff"
        );

        ChangeSet::new(to.changeset_name(), from.clone(), to.clone(), changes)
    }
}

fn follower_script(kind: &str, text: String) -> ScriptContainer {
    ScriptContainer::new(kind, order::FOLLOWER, text)
}

fn wrap(changes: Vec<PolicyChange>, context: &DiffContext) -> Vec<Change> {
    changes
        .into_iter()
        .map(|change| Change::Policy(change).annotate(&context.extractor))
        .collect()
}

/// Returns `(delete scripts, alter scripts)` for one per-entity cache map.
fn diff_cache_map(
    target: &str,
    entity_kind: &str,
    old: &BTreeMap<String, String>,
    new: &BTreeMap<String, String>,
) -> (Vec<ScriptContainer>, Vec<ScriptContainer>) {
    let deleted = old
        .keys()
        .filter(|name| !new.contains_key(*name))
        .map(|name| {
            follower_script(
                "DeleteFollowerCaching",
                format!(
                    ".delete {} {} {} policy caching",
                    target,
                    entity_kind,
                    quote_identifier(name)
                ),
            )
        })
        .collect();
    let changed = new
        .iter()
        .filter(|(name, hot)| old.get(*name) != Some(*hot))
        .map(|(name, hot)| {
            follower_script(
                "AlterFollowerCaching",
                format!(
                    ".alter {} {} {} policy caching hot = {}",
                    target,
                    entity_kind,
                    quote_identifier(name),
                    hot
                ),
            )
        })
        .collect();
    (deleted, changed)
}

fn diff_modification_kind(
    target: &str,
    database: &str,
    setting: &str,
    old: Option<ModificationKind>,
    new: Option<ModificationKind>,
) -> Option<PolicyChange> {
    let new = new?;
    if old == Some(new) {
        return None;
    }
    Some(PolicyChange::with_scripts(
        "FollowerModificationKind",
        database,
        vec![follower_script(
            "AlterFollowerModificationKind",
            format!(".alter {} {} = {}", target, setting, new),
        )],
    ))
}

/// Change sets for the followers a database declares, keyed by follower cluster.
///
/// A follower present only in `from` is left alone; detaching is not modelled.
pub fn diff_followers(
    from: &DatabaseState,
    to: &DatabaseState,
    context: &DiffContext,
) -> Vec<ChangeSet<FollowerState>> {
    let live: BTreeMap<String, FollowerState> = from
        .follower_states()
        .into_iter()
        .map(|state| (state.cluster.clone(), state))
        .collect();

    to.follower_states()
        .into_iter()
        .map(|desired| {
            let current = live
                .get(&desired.cluster)
                .cloned()
                .unwrap_or_else(|| FollowerState::new(desired.cluster.clone(), &to.name));
            FollowerState::diff(&current, &desired, context)
        })
        .filter(|set| !set.is_empty())
        .collect()
}
