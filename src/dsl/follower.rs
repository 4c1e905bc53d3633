use super::principal::Principal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModificationKind {
    Union,
    Replace,
    None,
}

impl fmt::Display for ModificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Union => "union",
            Self::Replace => "replace",
            Self::None => "none",
        };
        f.write_str(s)
    }
}

/// Hot-cache overrides a follower applies on top of the leader database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowerCache {
    pub default_hot_cache: Option<String>,
    pub tables: BTreeMap<String, String>,
    pub materialized_views: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowerDatabase {
    pub cache: FollowerCache,
    pub principals_modification_kind: Option<ModificationKind>,
    pub caching_policies_modification_kind: Option<ModificationKind>,
    pub admins: Vec<Principal>,
    pub viewers: Vec<Principal>,
}

/// One database as attached on one follower cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowerState {
    pub cluster: String,
    pub database: String,
    pub follower: FollowerDatabase,
}

impl FollowerState {
    pub fn new(cluster: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            database: database.into(),
            follower: FollowerDatabase::default(),
        }
    }
}
