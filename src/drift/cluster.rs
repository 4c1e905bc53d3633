use super::change::{Change, PolicyChange};
use super::changeset::ChangeSet;
use super::collection::{diff_deletions, diff_plain, push_section};
use super::context::DiffContext;
use super::Reconcilable;
use crate::dsl::ClusterState;
use crate::script::quote_identifier;
use tracing::info;

impl Reconcilable for ClusterState {
    fn changeset_name(&self) -> String {
        self.name.clone()
    }

    fn command_scope(&self) -> Option<String> {
        None
    }

    fn diff(from: &Self, to: &Self, context: &DiffContext) -> ChangeSet<Self> {
        let mut changes = Vec::new();

        let policies: Vec<Change> = to
            .capacity_policy
            .as_ref()
            .and_then(|policy| {
                PolicyChange::between(
                    "ClusterCapacityPolicy",
                    &to.name,
                    from.capacity_policy.as_ref(),
                    policy,
                )
            })
            .map(|change| Change::Policy(change).annotate(&context.extractor))
            .into_iter()
            .collect();
        push_section(&mut changes, "Cluster Policies", policies);

        push_section(
            &mut changes,
            "Workload Groups",
            diff_plain("WorkloadGroup", &from.workload_groups, &to.workload_groups, context),
        );

        push_section(
            &mut changes,
            "Deletions",
            diff_deletions(
                "WorkloadGroup",
                &to.deletions.workload_groups,
                |name| from.workload_groups.contains_key(name),
                |name| format!(".drop workload_group {}", quote_identifier(name)),
                context,
            ),
        );

        info!(
            cluster = %to.name,
            changes = changes.iter().filter(|c| !c.is_heading()).count(),
            "Computed cluster diff"
        );

        ChangeSet::new(to.name.clone(), from.clone(), to.clone(), changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::{ClusterCapacityPolicy, ExportCapacity, WorkloadGroup};
    use serde_json::json;

    fn create_test_cluster() -> ClusterState {
        let mut cluster = ClusterState::new("prod");
        cluster.capacity_policy = Some(ClusterCapacityPolicy {
            export_capacity: Some(ExportCapacity {
                cluster_maximum_concurrent_operations: Some(100),
                core_utilization_coefficient: Some(0.25),
            }),
            ..ClusterCapacityPolicy::default()
        });
        cluster.workload_groups.insert(
            "Reports".to_string(),
            WorkloadGroup {
                request_limits_policy: Some(json!({
                    "DataScope": {"IsRelaxable": true, "Value": "HotCache"}
                })),
                ..WorkloadGroup::default()
            },
        );
        cluster
    }

    #[test]
    fn test_identical_clusters_have_no_changes() {
        let cluster = create_test_cluster();
        let set = ClusterState::diff(&cluster, &cluster, &DiffContext::default());
        assert!(set.changes.is_empty());
    }

    #[test]
    fn test_policy_change_emits_one_script() {
        let from = create_test_cluster();
        let mut to = from.clone();
        if let Some(policy) = to.capacity_policy.as_mut() {
            policy.export_capacity = Some(ExportCapacity {
                cluster_maximum_concurrent_operations: Some(200),
                core_utilization_coefficient: None,
            });
        }

        let set = ClusterState::diff(&from, &to, &DiffContext::default());
        let scripts: Vec<_> = set.scripts().collect();
        assert_eq!(scripts.len(), 1);
        assert!(scripts[0].text.starts_with(".alter-merge cluster policy capacity"));
        assert!(scripts[0].text.contains("200"));
        assert_eq!(scripts[0].is_valid, Some(true));
        assert_eq!(set.changes[0].entity(), "Cluster Policies");
    }

    #[test]
    fn test_workload_group_deletion() {
        let from = create_test_cluster();
        let mut to = from.clone();
        to.workload_groups.clear();
        to.deletions.workload_groups = vec!["Reports".to_string(), "Gone".to_string()];

        let set = ClusterState::diff(&from, &to, &DiffContext::default());
        let texts: Vec<&str> = set.scripts().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec![".drop workload_group Reports"]);
    }
}
