use crate::script::{
    order, quote_identifier, quote_string, with_properties, EntityScripts, ScriptContainer,
};
use serde::{Deserialize, Serialize};

/// A continuous export job writing query results into an external table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContinuousExport {
    pub external_table: String,
    pub query: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub over_tables: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_between_runs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forced_latency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distributed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub managed_identity: Option<String>,
}

impl EntityScripts for ContinuousExport {
    fn create_scripts(&self, name: &str) -> Vec<ScriptContainer> {
        let over = if self.over_tables.is_empty() {
            String::new()
        } else {
            let tables: Vec<String> =
                self.over_tables.iter().map(|t| quote_identifier(t)).collect();
            format!(" over ({})", tables.join(", "))
        };
        let properties = with_properties(&[
            ("intervalBetweenRuns", self.interval_between_runs.clone()),
            ("forcedLatency", self.forced_latency.clone()),
            ("sizeLimit", self.size_limit.map(|s| s.to_string())),
            ("distributed", self.distributed.map(|d| d.to_string())),
            ("managedIdentity", self.managed_identity.as_deref().map(quote_string)),
        ]);
        vec![ScriptContainer::new(
            "CreateOrAlterContinuousExport",
            order::CONTINUOUS_EXPORT,
            format!(
                ".create-or-alter continuous-export {}{} to table {}{} <| {}",
                quote_identifier(name),
                over,
                quote_identifier(&self.external_table),
                properties,
                self.query.trim()
            ),
        )]
    }
}
