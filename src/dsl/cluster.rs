use crate::script::{order, quote_identifier, EntityScripts, ScriptContainer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Getter for one settable policy property, paired with its wire name.
pub type PolicyField<P> = (&'static str, fn(&P) -> Option<Value>);

/// Explicit property list of a policy type; unset properties return `None`.
pub trait PolicyFields: Sized + 'static {
    const FIELDS: &'static [PolicyField<Self>];

    /// JSON object holding only the properties that are set.
    fn to_policy_value(&self) -> Value {
        let mut map = Map::new();
        for (name, getter) in Self::FIELDS {
            if let Some(value) = getter(self) {
                map.insert((*name).to_string(), value);
            }
        }
        Value::Object(map)
    }
}

fn nested<P: PolicyFields>(policy: &Option<P>) -> Option<Value> {
    policy.as_ref().map(PolicyFields::to_policy_value)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterState {
    pub name: String,
    pub capacity_policy: Option<ClusterCapacityPolicy>,
    pub workload_groups: BTreeMap<String, WorkloadGroup>,
    pub deletions: ClusterDeletions,
}

impl ClusterState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterDeletions {
    pub workload_groups: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterCapacityPolicy {
    pub ingestion_capacity: Option<IngestionCapacity>,
    pub extents_merge_capacity: Option<ExtentsMergeCapacity>,
    pub extents_purge_rebuild_capacity: Option<ExtentsPurgeRebuildCapacity>,
    pub export_capacity: Option<ExportCapacity>,
    pub extents_partition_capacity: Option<ExtentsPartitionCapacity>,
    pub materialized_views_capacity: Option<MaterializedViewsCapacity>,
    pub stored_query_results_capacity: Option<StoredQueryResultsCapacity>,
    pub streaming_ingestion_post_processing_capacity:
        Option<StreamingIngestionPostProcessingCapacity>,
    pub query_accelerator_capacity: Option<QueryAcceleratorCapacity>,
}

impl PolicyFields for ClusterCapacityPolicy {
    const FIELDS: &'static [PolicyField<Self>] = &[
        ("IngestionCapacity", |p| nested(&p.ingestion_capacity)),
        ("ExtentsMergeCapacity", |p| nested(&p.extents_merge_capacity)),
        ("ExtentsPurgeRebuildCapacity", |p| nested(&p.extents_purge_rebuild_capacity)),
        ("ExportCapacity", |p| nested(&p.export_capacity)),
        ("ExtentsPartitionCapacity", |p| nested(&p.extents_partition_capacity)),
        ("MaterializedViewsCapacity", |p| nested(&p.materialized_views_capacity)),
        ("StoredQueryResultsCapacity", |p| nested(&p.stored_query_results_capacity)),
        (
            "StreamingIngestionPostProcessingCapacity",
            |p| nested(&p.streaming_ingestion_post_processing_capacity),
        ),
        ("QueryAcceleratorCapacity", |p| nested(&p.query_accelerator_capacity)),
    ];
}

impl EntityScripts for ClusterCapacityPolicy {
    fn create_scripts(&self, _name: &str) -> Vec<ScriptContainer> {
        vec![ScriptContainer::new(
            "AlterMergeClusterCapacityPolicy",
            order::CLUSTER_POLICY,
            format!(
                ".alter-merge cluster policy capacity ```{}```",
                self.to_policy_value()
            ),
        )]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionCapacity {
    pub cluster_maximum_concurrent_operations: Option<i64>,
    pub core_utilization_coefficient: Option<f64>,
}

impl PolicyFields for IngestionCapacity {
    const FIELDS: &'static [PolicyField<Self>] = &[
        ("ClusterMaximumConcurrentOperations", |p| {
            p.cluster_maximum_concurrent_operations.map(Value::from)
        }),
        ("CoreUtilizationCoefficient", |p| p.core_utilization_coefficient.map(Value::from)),
    ];
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtentsMergeCapacity {
    pub minimum_concurrent_operations_per_node: Option<i64>,
    pub maximum_concurrent_operations_per_node: Option<i64>,
}

impl PolicyFields for ExtentsMergeCapacity {
    const FIELDS: &'static [PolicyField<Self>] = &[
        ("MinimumConcurrentOperationsPerNode", |p| {
            p.minimum_concurrent_operations_per_node.map(Value::from)
        }),
        ("MaximumConcurrentOperationsPerNode", |p| {
            p.maximum_concurrent_operations_per_node.map(Value::from)
        }),
    ];
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtentsPurgeRebuildCapacity {
    pub maximum_concurrent_operations_per_node: Option<i64>,
}

impl PolicyFields for ExtentsPurgeRebuildCapacity {
    const FIELDS: &'static [PolicyField<Self>] = &[("MaximumConcurrentOperationsPerNode", |p| {
        p.maximum_concurrent_operations_per_node.map(Value::from)
    })];
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportCapacity {
    pub cluster_maximum_concurrent_operations: Option<i64>,
    pub core_utilization_coefficient: Option<f64>,
}

impl PolicyFields for ExportCapacity {
    const FIELDS: &'static [PolicyField<Self>] = &[
        ("ClusterMaximumConcurrentOperations", |p| {
            p.cluster_maximum_concurrent_operations.map(Value::from)
        }),
        ("CoreUtilizationCoefficient", |p| p.core_utilization_coefficient.map(Value::from)),
    ];
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtentsPartitionCapacity {
    pub cluster_minimum_concurrent_operations: Option<i64>,
    pub cluster_maximum_concurrent_operations: Option<i64>,
}

impl PolicyFields for ExtentsPartitionCapacity {
    const FIELDS: &'static [PolicyField<Self>] = &[
        ("ClusterMinimumConcurrentOperations", |p| {
            p.cluster_minimum_concurrent_operations.map(Value::from)
        }),
        ("ClusterMaximumConcurrentOperations", |p| {
            p.cluster_maximum_concurrent_operations.map(Value::from)
        }),
    ];
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterializedViewsCapacity {
    pub cluster_maximum_concurrent_operations: Option<i64>,
    pub extents_rebuild_capacity: Option<ExtentsRebuildCapacity>,
}

impl PolicyFields for MaterializedViewsCapacity {
    const FIELDS: &'static [PolicyField<Self>] = &[
        ("ClusterMaximumConcurrentOperations", |p| {
            p.cluster_maximum_concurrent_operations.map(Value::from)
        }),
        ("ExtentsRebuildCapacity", |p| nested(&p.extents_rebuild_capacity)),
    ];
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtentsRebuildCapacity {
    pub cluster_maximum_concurrent_operations: Option<i64>,
    pub maximum_concurrent_operations_per_node: Option<i64>,
}

impl PolicyFields for ExtentsRebuildCapacity {
    const FIELDS: &'static [PolicyField<Self>] = &[
        ("ClusterMaximumConcurrentOperations", |p| {
            p.cluster_maximum_concurrent_operations.map(Value::from)
        }),
        ("MaximumConcurrentOperationsPerNode", |p| {
            p.maximum_concurrent_operations_per_node.map(Value::from)
        }),
    ];
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoredQueryResultsCapacity {
    pub maximum_concurrent_operations_per_node: Option<i64>,
    pub maximum_concurrent_operations_per_cluster: Option<i64>,
}

impl PolicyFields for StoredQueryResultsCapacity {
    const FIELDS: &'static [PolicyField<Self>] = &[
        ("MaximumConcurrentOperationsPerNode", |p| {
            p.maximum_concurrent_operations_per_node.map(Value::from)
        }),
        ("MaximumConcurrentOperationsPerCluster", |p| {
            p.maximum_concurrent_operations_per_cluster.map(Value::from)
        }),
    ];
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingIngestionPostProcessingCapacity {
    pub maximum_concurrent_operations_per_node: Option<i64>,
}

impl PolicyFields for StreamingIngestionPostProcessingCapacity {
    const FIELDS: &'static [PolicyField<Self>] = &[("MaximumConcurrentOperationsPerNode", |p| {
        p.maximum_concurrent_operations_per_node.map(Value::from)
    })];
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryAcceleratorCapacity {
    pub cluster_maximum_concurrent_operations: Option<i64>,
    pub core_utilization_coefficient: Option<f64>,
}

impl PolicyFields for QueryAcceleratorCapacity {
    const FIELDS: &'static [PolicyField<Self>] = &[
        ("ClusterMaximumConcurrentOperations", |p| {
            p.cluster_maximum_concurrent_operations.map(Value::from)
        }),
        ("CoreUtilizationCoefficient", |p| p.core_utilization_coefficient.map(Value::from)),
    ];
}

/// Workload group policies are passed through as opaque JSON documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadGroup {
    pub request_limits_policy: Option<Value>,
    pub request_rate_limit_policies: Option<Value>,
    pub request_rate_limits_enforcement_policy: Option<Value>,
    pub request_queuing_policy: Option<Value>,
    pub query_consistency_policy: Option<Value>,
}

impl PolicyFields for WorkloadGroup {
    const FIELDS: &'static [PolicyField<Self>] = &[
        ("RequestLimitsPolicy", |p| p.request_limits_policy.clone()),
        ("RequestRateLimitPolicies", |p| p.request_rate_limit_policies.clone()),
        ("RequestRateLimitsEnforcementPolicy", |p| {
            p.request_rate_limits_enforcement_policy.clone()
        }),
        ("RequestQueuingPolicy", |p| p.request_queuing_policy.clone()),
        ("QueryConsistencyPolicy", |p| p.query_consistency_policy.clone()),
    ];
}

impl EntityScripts for WorkloadGroup {
    fn create_scripts(&self, name: &str) -> Vec<ScriptContainer> {
        vec![ScriptContainer::new(
            "CreateOrAlterWorkloadGroup",
            order::WORKLOAD_GROUP,
            format!(
                ".create-or-alter workload_group {} ```{}```",
                quote_identifier(name),
                self.to_policy_value()
            ),
        )]
    }
}
