use super::change::{Change, EntityGroupChange, PermissionChange};
use super::changeset::ChangeSet;
use super::collection::{diff_deletions, diff_entities, diff_plain, push_section};
use super::context::DiffContext;
use super::Reconcilable;
use crate::dsl::{DatabaseState, Role, Table};
use crate::script::{quote_identifier, Comment};
use crate::validation::{validate_column_order, UpdatePolicyValidator};
use std::collections::BTreeMap;
use tracing::info;

impl Reconcilable for DatabaseState {
    fn changeset_name(&self) -> String {
        self.name.clone()
    }

    fn command_scope(&self) -> Option<String> {
        Some(self.name.clone())
    }

    fn diff(from: &Self, to: &Self, context: &DiffContext) -> ChangeSet<Self> {
        let mut changes = Vec::new();

        push_section(&mut changes, "Entity Groups", diff_entity_groups(from, to, context));
        push_section(
            &mut changes,
            "External Tables",
            diff_plain("ExternalTable", &from.external_tables, &to.external_tables, context),
        );
        push_section(&mut changes, "Tables", diff_tables(from, to, context));
        push_section(
            &mut changes,
            "Functions",
            diff_plain("Function", &from.functions, &to.functions, context),
        );
        push_section(
            &mut changes,
            "Materialized Views",
            diff_plain(
                "MaterializedView",
                &from.materialized_views,
                &to.materialized_views,
                context,
            ),
        );
        push_section(
            &mut changes,
            "Continuous Exports",
            diff_plain(
                "ContinuousExport",
                &from.continuous_exports,
                &to.continuous_exports,
                context,
            ),
        );
        push_section(&mut changes, "Permissions", diff_permissions(from, to, context));
        push_section(&mut changes, "Deletions", diff_database_deletions(from, to, context));

        info!(
            database = %to.name,
            changes = changes.iter().filter(|c| !c.is_heading()).count(),
            "Computed database diff"
        );

        ChangeSet::new(to.name.clone(), from.clone(), to.clone(), changes)
    }
}

fn diff_tables(from: &DatabaseState, to: &DatabaseState, context: &DiffContext) -> Vec<Change> {
    // update policies may read from tables only the live side still has
    let mut known: BTreeMap<String, Table> = from.tables.clone();
    known.extend(to.tables.iter().map(|(k, v)| (k.clone(), v.clone())));

    let review = |name: &str, old: Option<&Table>, new: &Table| -> Option<Comment> {
        let mut comment: Option<Comment> = None;
        if context.validation.column_order {
            comment = validate_column_order(old.map(|t| &t.columns), &new.columns, name)
                .to_comment();
        }
        if context.validation.update_policies && !new.update_policies.is_empty() {
            let result = UpdatePolicyValidator::new(&context.extractor).validate_table(
                name,
                new,
                &known,
                &context.validation,
            );
            if let Some(found) = result.to_comment("Update policy validation") {
                comment = Some(match comment {
                    Some(existing) => existing.merge(found),
                    None => found,
                });
            }
        }
        comment
    };

    diff_entities(
        "Table",
        &from.tables,
        &to.tables,
        context,
        |old: Option<&Table>, new: &Table| {
            !new.columns.is_empty() || old.is_some_and(|t| !t.columns.is_empty())
        },
        review,
    )
}

fn diff_entity_groups(
    from: &DatabaseState,
    to: &DatabaseState,
    context: &DiffContext,
) -> Vec<Change> {
    to.entity_groups
        .iter()
        .filter_map(|(name, group)| {
            EntityGroupChange::between(name, from.entity_groups.get(name), group)
        })
        .map(|change| Change::EntityGroup(change).annotate(&context.extractor))
        .collect()
}

fn diff_permissions(
    from: &DatabaseState,
    to: &DatabaseState,
    context: &DiffContext,
) -> Vec<Change> {
    let target = format!("database {}", quote_identifier(&to.name));
    Role::ALL
        .iter()
        .filter_map(|role| {
            PermissionChange::between(&target, *role, from.principals(*role), to.principals(*role))
        })
        .map(|change| Change::Permission(change).annotate(&context.extractor))
        .collect()
}

fn diff_database_deletions(
    from: &DatabaseState,
    to: &DatabaseState,
    context: &DiffContext,
) -> Vec<Change> {
    let deletions = &to.deletions;
    let mut changes = Vec::new();

    changes.extend(diff_deletions(
        "ContinuousExport",
        &deletions.continuous_exports,
        |name| from.continuous_exports.contains_key(name),
        |name| format!(".drop continuous-export {}", quote_identifier(name)),
        context,
    ));
    changes.extend(diff_deletions(
        "MaterializedView",
        &deletions.materialized_views,
        |name| from.materialized_views.contains_key(name),
        |name| format!(".drop materialized-view {}", quote_identifier(name)),
        context,
    ));
    changes.extend(diff_deletions(
        "Function",
        &deletions.functions,
        |name| from.functions.contains_key(name),
        |name| format!(".drop function {}", quote_identifier(name)),
        context,
    ));
    changes.extend(diff_deletions(
        "Column",
        &deletions.columns,
        |reference| from.has_column(reference),
        |reference| match reference.split_once('.') {
            Some((table, column)) => format!(
                ".drop column {}.{}",
                quote_identifier(table),
                quote_identifier(column)
            ),
            None => format!(".drop column {}", reference),
        },
        context,
    ));
    changes.extend(diff_deletions(
        "Table",
        &deletions.tables,
        |name| from.tables.contains_key(name),
        |name| format!(".drop table {}", quote_identifier(name)),
        context,
    ));
    changes.extend(diff_deletions(
        "ExternalTable",
        &deletions.external_tables,
        |name| from.external_tables.contains_key(name),
        |name| format!(".drop external table {}", quote_identifier(name)),
        context,
    ));
    changes.extend(diff_deletions(
        "EntityGroup",
        &deletions.entity_groups,
        |name| from.entity_groups.contains_key(name),
        |name| format!(".drop entity_group {}", quote_identifier(name)),
        context,
    ));

    changes
}
