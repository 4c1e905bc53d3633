use super::change::Change;
use crate::script::{Comment, ScriptContainer};
use serde::Serialize;

/// Every change needed to move one database, cluster or follower from `from` to `to`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeSet<S> {
    pub name: String,
    #[serde(skip)]
    pub from: S,
    #[serde(skip)]
    pub to: S,
    pub changes: Vec<Change>,
}

impl<S> ChangeSet<S> {
    pub fn new(name: impl Into<String>, from: S, to: S, changes: Vec<Change>) -> Self {
        Self {
            name: name.into(),
            from,
            to,
            changes,
        }
    }

    /// True when nothing but headings would be reported.
    pub fn is_empty(&self) -> bool {
        self.changes.iter().all(Change::is_heading)
    }

    /// All scripts, in change order.
    pub fn scripts(&self) -> impl Iterator<Item = &ScriptContainer> {
        self.changes.iter().flat_map(|c| c.scripts().iter())
    }

    /// Scripts that will actually run, stably sorted by order.
    pub fn executable_scripts(&self) -> Vec<&ScriptContainer> {
        let mut scripts: Vec<&ScriptContainer> =
            self.scripts().filter(|s| s.is_executable()).collect();
        scripts.sort_by_key(|s| s.order);
        scripts
    }

    pub fn comments(&self) -> impl Iterator<Item = (&Change, &Comment)> {
        self.changes
            .iter()
            .filter_map(|change| change.comment().map(|comment| (change, comment)))
    }

    pub fn fails_rollout(&self) -> bool {
        self.comments().any(|(_, comment)| comment.fails_rollout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drift::change::{EntityChange, Heading};
    use crate::script::{order, ScriptContainer};

    fn create_test_change(entity: &str, scripts: Vec<ScriptContainer>) -> Change {
        Change::Entity(EntityChange {
            entity_type: "Table".to_string(),
            entity: entity.to_string(),
            is_new: true,
            scripts,
            comment: None,
        })
    }

    #[test]
    fn test_headings_alone_are_empty() {
        let set = ChangeSet::new("Db", (), (), vec![Change::Heading(Heading::new("Tables"))]);
        assert!(set.is_empty());
    }

    #[test]
    fn test_executable_scripts_sorted_and_filtered() {
        let set = ChangeSet::new(
            "Db",
            (),
            (),
            vec![
                create_test_change(
                    "T",
                    vec![ScriptContainer::new("UpdatePolicy", order::UPDATE_POLICY, "b")],
                ),
                create_test_change(
                    "U",
                    vec![
                        ScriptContainer::new("CreateMergeTable", order::TABLE, "a"),
                        ScriptContainer::informational("Marker", "// m"),
                        ScriptContainer::new("Broken", order::TABLE, "x").with_validity(false),
                    ],
                ),
            ],
        );
        let texts: Vec<&str> = set.executable_scripts().iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b"]);
        assert_eq!(set.scripts().count(), 4);
        assert!(!set.is_empty());
    }

    #[test]
    fn test_fails_rollout_follows_comments() {
        let mut change = EntityChange {
            entity_type: "Table".to_string(),
            entity: "T".to_string(),
            is_new: false,
            scripts: Vec::new(),
            comment: None,
        };
        change = change.with_comment(Some(Comment::warning("extra column")));
        let set = ChangeSet::new("Db", (), (), vec![Change::Entity(change.clone())]);
        assert!(!set.fails_rollout());

        change = change.with_comment(Some(Comment::caution("bad order")));
        let set = ChangeSet::new("Db", (), (), vec![Change::Entity(change)]);
        assert!(set.fails_rollout());
    }
}
