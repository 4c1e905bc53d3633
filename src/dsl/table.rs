use crate::schema::ColumnSchema;
use crate::script::{
    order, quote_identifier, quote_string, verbatim_string, with_properties, EntityScripts,
    ScriptContainer,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Table {
    pub columns: ColumnSchema,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_string: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention: Option<RetentionPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hot_cache: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub update_policies: Vec<UpdatePolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restricted_view_access: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_level_security: Option<RowLevelSecurity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub soft_delete: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recoverability: Option<bool>,
}

impl RetentionPolicy {
    pub(crate) fn to_kql(&self) -> String {
        match self.recoverability {
            Some(enabled) => format!(
                "softdelete = {} recoverability = {}",
                self.soft_delete,
                if enabled { "enabled" } else { "disabled" }
            ),
            None => format!("softdelete = {}", self.soft_delete),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowLevelSecurity {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub query: String,
}

/// A transformation query that populates this table from `source` on ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePolicy {
    pub source: String,
    pub query: String,
    #[serde(default = "default_true")]
    pub is_enabled: bool,
    #[serde(default)]
    pub is_transactional: bool,
    #[serde(default)]
    pub propagate_ingestion_properties: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_identity: Option<String>,
}

impl UpdatePolicy {
    pub fn new(source: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            query: query.into(),
            is_enabled: true,
            is_transactional: false,
            propagate_ingestion_properties: false,
            managed_identity: None,
        }
    }

    fn to_policy_json(&self) -> serde_json::Value {
        let mut value = json!({
            "IsEnabled": self.is_enabled,
            "Source": self.source,
            "Query": self.query,
            "IsTransactional": self.is_transactional,
            "PropagateIngestionProperties": self.propagate_ingestion_properties,
        });
        if let Some(identity) = &self.managed_identity {
            value["ManagedIdentity"] = json!(identity);
        }
        value
    }
}

fn default_true() -> bool {
    true
}

impl Table {
    pub fn with_columns(columns: ColumnSchema) -> Self {
        Self {
            columns,
            ..Self::default()
        }
    }

    pub fn update_policy_json(&self) -> String {
        let policies: Vec<_> = self.update_policies.iter().map(|p| p.to_policy_json()).collect();
        serde_json::Value::Array(policies).to_string()
    }
}

impl EntityScripts for Table {
    fn create_scripts(&self, name: &str) -> Vec<ScriptContainer> {
        let table = quote_identifier(name);
        let mut scripts = Vec::new();

        if !self.columns.is_empty() {
            let properties = with_properties(&[
                ("folder", self.folder.as_deref().map(quote_string)),
                ("docstring", self.doc_string.as_deref().map(quote_string)),
            ]);
            scripts.push(ScriptContainer::new(
                "CreateMergeTable",
                order::TABLE,
                format!(".create-merge table {} ({}){}", table, self.columns.to_kql(), properties),
            ));
        }

        if let Some(retention) = &self.retention {
            scripts.push(ScriptContainer::new(
                "TableRetentionPolicy",
                order::TABLE_POLICY,
                format!(".alter-merge table {} policy retention {}", table, retention.to_kql()),
            ));
        }

        if let Some(hot) = &self.hot_cache {
            scripts.push(ScriptContainer::new(
                "TableCachingPolicy",
                order::TABLE_POLICY,
                format!(".alter table {} policy caching hot = {}", table, hot),
            ));
        }

        if let Some(restricted) = self.restricted_view_access {
            scripts.push(ScriptContainer::new(
                "TableRestrictedViewAccess",
                order::TABLE_POLICY,
                format!(".alter table {} policy restricted_view_access {}", table, restricted),
            ));
        }

        if let Some(rls) = &self.row_level_security {
            scripts.push(ScriptContainer::new(
                "TableRowLevelSecurity",
                order::TABLE_POLICY,
                format!(
                    ".alter table {} policy row_level_security {} {}",
                    table,
                    if rls.enabled { "enable" } else { "disable" },
                    quote_string(&rls.query)
                ),
            ));
        }

        if !self.update_policies.is_empty() {
            scripts.push(ScriptContainer::new(
                "TableUpdatePolicy",
                order::UPDATE_POLICY,
                format!(
                    ".alter table {} policy update {}",
                    table,
                    verbatim_string(&self.update_policy_json())
                ),
            ));
        }

        scripts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_table() -> Table {
        Table {
            columns: ColumnSchema::new().with("Timestamp", "datetime").with("Message", "string"),
            folder: Some("Raw".to_string()),
            ..Table::default()
        }
    }

    #[test]
    fn test_create_merge_script() {
        let scripts = create_test_table().create_scripts("Logs");
        assert_eq!(scripts.len(), 1);
        assert_eq!(
            scripts[0].text,
            ".create-merge table Logs (Timestamp:datetime, Message:string) with (folder = \"Raw\")"
        );
        assert_eq!(scripts[0].order, order::TABLE);
    }

    #[test]
    fn test_policies_follow_table() {
        let mut table = create_test_table();
        table.retention = Some(RetentionPolicy {
            soft_delete: "30d".to_string(),
            recoverability: Some(false),
        });
        table.hot_cache = Some("7d".to_string());
        table.update_policies = vec![UpdatePolicy::new(
            "RawLogs",
            "RawLogs | project Timestamp, Message",
        )];

        let scripts = table.create_scripts("Logs");
        let kinds: Vec<_> = scripts.iter().map(|s| s.kind.as_str()).collect();
        assert_eq!(
            kinds,
            vec![
                "CreateMergeTable",
                "TableRetentionPolicy",
                "TableCachingPolicy",
                "TableUpdatePolicy"
            ]
        );
        assert!(scripts[1].text.ends_with("softdelete = 30d recoverability = disabled"));
        assert!(scripts[3].text.contains("\"Source\":\"RawLogs\""));
        assert!(scripts[3].order > scripts[0].order);
    }

    #[test]
    fn test_update_policy_quotes_are_doubled() {
        let mut table = create_test_table();
        table.update_policies = vec![UpdatePolicy::new("Src", "Src | where Level == 'Error'")];
        let scripts = table.create_scripts("Logs");
        assert!(scripts[1].text.contains("Level == ''Error''"));
    }

    #[test]
    fn test_table_without_columns_has_no_create() {
        let table = Table {
            hot_cache: Some("1d".to_string()),
            ..Table::default()
        };
        let scripts = table.create_scripts("Logs");
        assert_eq!(scripts.len(), 1);
        assert_eq!(scripts[0].kind, "TableCachingPolicy");
    }
}
