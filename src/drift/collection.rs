use super::change::{Change, DeletionChange, EntityChange, Heading};
use super::context::DiffContext;
use crate::script::{Comment, EntityScripts};
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::debug;

/// Diffs one named entity collection.
///
/// `gate` may veto an entity before any script is rendered; `review` attaches
/// validation comments to the changes that survive.
pub(crate) fn diff_entities<E, G, R>(
    entity_type: &str,
    from: &BTreeMap<String, E>,
    to: &BTreeMap<String, E>,
    context: &DiffContext,
    gate: G,
    review: R,
) -> Vec<Change>
where
    E: EntityScripts + Sync,
    G: Fn(Option<&E>, &E) -> bool + Sync,
    R: Fn(&str, Option<&E>, &E) -> Option<Comment> + Sync,
{
    // rayon collect() keeps map order
    let changes: Vec<Option<Change>> = to
        .par_iter()
        .map(|(name, new)| {
            let old = from.get(name);
            if !gate(old, new) {
                debug!(entity_type, entity = %name, "Skipping entity");
                return None;
            }
            let change = EntityChange::between(entity_type, name, old, new)?
                .with_comment(review(name, old, new));
            Some(Change::Entity(change).annotate(&context.extractor))
        })
        .collect();
    changes.into_iter().flatten().collect()
}

/// Entities with no gate and no review.
pub(crate) fn diff_plain<E>(
    entity_type: &str,
    from: &BTreeMap<String, E>,
    to: &BTreeMap<String, E>,
    context: &DiffContext,
) -> Vec<Change>
where
    E: EntityScripts + Sync,
{
    diff_entities(entity_type, from, to, context, |_, _| true, |_, _, _| None)
}

/// Drop scripts for listed names that still exist; absent names are ignored.
pub(crate) fn diff_deletions<F>(
    entity_type: &str,
    names: &[String],
    exists: impl Fn(&str) -> bool,
    command: F,
    context: &DiffContext,
) -> Vec<Change>
where
    F: Fn(&str) -> String,
{
    names
        .iter()
        .filter(|name| exists(name))
        .map(|name| {
            Change::Deletion(DeletionChange::new(entity_type, name, command(name)))
                .annotate(&context.extractor)
        })
        .collect()
}

/// Appends a section, preceded by its heading, unless it is empty.
pub(crate) fn push_section(changes: &mut Vec<Change>, heading: &str, section: Vec<Change>) {
    if section.is_empty() {
        return;
    }
    changes.push(Change::Heading(Heading::new(heading)));
    changes.extend(section);
}
