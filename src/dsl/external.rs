use crate::schema::ColumnSchema;
use crate::script::{
    order, quote_identifier, quote_string, with_properties, EntityScripts, ScriptContainer,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExternalTableKind {
    #[default]
    Storage,
    Delta,
    Sql,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalTable {
    pub kind: ExternalTableKind,
    pub columns: ColumnSchema,
    pub connection_strings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partitions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_dialect: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_string: Option<String>,
}

fn obfuscated(s: &str) -> String {
    format!("h@'{}'", s.replace('\'', "''"))
}

impl EntityScripts for ExternalTable {
    fn create_scripts(&self, name: &str) -> Vec<ScriptContainer> {
        let connections: Vec<String> =
            self.connection_strings.iter().map(|c| obfuscated(c)).collect();
        let connections = format!("(\n{}\n)", connections.join(",\n"));

        let body = match self.kind {
            ExternalTableKind::Storage => {
                let mut clauses = vec!["kind = storage".to_string()];
                if let Some(partitions) = &self.partitions {
                    clauses.push(format!("partition by ({})", partitions));
                }
                if let Some(path_format) = &self.path_format {
                    clauses.push(format!("pathformat = ({})", path_format));
                }
                if let Some(format) = &self.data_format {
                    clauses.push(format!("dataformat = {}", format));
                }
                format!("{} {}", clauses.join(" "), connections)
            }
            ExternalTableKind::Delta => format!("kind = delta {}", connections),
            ExternalTableKind::Sql => format!(
                "kind = sql table = {} {}",
                quote_identifier(self.sql_table.as_deref().unwrap_or(name)),
                connections
            ),
        };

        let properties = with_properties(&[
            ("sqlDialect", self.sql_dialect.as_deref().map(quote_string)),
            ("folder", self.folder.as_deref().map(quote_string)),
            ("docstring", self.doc_string.as_deref().map(quote_string)),
        ]);

        vec![ScriptContainer::new(
            "CreateOrAlterExternalTable",
            order::EXTERNAL_TABLE,
            format!(
                ".create-or-alter external table {} ({}) {}{}",
                quote_identifier(name),
                self.columns.to_kql(),
                body,
                properties
            ),
        )]
    }
}
