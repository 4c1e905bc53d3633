use super::table::RetentionPolicy;
use crate::script::{
    order, quote_identifier, quote_string, with_properties, EntityScripts, ScriptContainer,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterializedView {
    pub source: String,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_string: Option<String>,
    pub backfill: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookback: Option<String>,
    pub auto_update_schema: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention: Option<RetentionPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hot_cache: Option<String>,
}

impl EntityScripts for MaterializedView {
    fn create_scripts(&self, name: &str) -> Vec<ScriptContainer> {
        let view = quote_identifier(name);
        let properties = with_properties(&[
            ("backfill", self.backfill.then(|| "true".to_string())),
            (
                "effectiveDateTime",
                self.effective_date_time
                    .as_deref()
                    .map(|d| format!("datetime({})", d)),
            ),
            ("lookback", self.lookback.clone()),
            ("autoUpdateSchema", self.auto_update_schema.then(|| "true".to_string())),
            ("folder", self.folder.as_deref().map(quote_string)),
            ("docstring", self.doc_string.as_deref().map(quote_string)),
        ]);

        // backfill is only accepted by the async create form
        let verb = if self.backfill {
            ".create async ifnotexists"
        } else {
            ".create-or-alter"
        };

        let mut scripts = vec![ScriptContainer::new(
            "CreateMaterializedView",
            order::MATERIALIZED_VIEW,
            format!(
                "{} materialized-view{} {} on table {} {{\n{}\n}}",
                verb,
                properties,
                view,
                quote_identifier(&self.source),
                self.query.trim()
            ),
        )
        .with_async(self.backfill)];

        if let Some(retention) = &self.retention {
            scripts.push(ScriptContainer::new(
                "MaterializedViewRetentionPolicy",
                order::MATERIALIZED_VIEW_POLICY,
                format!(
                    ".alter-merge materialized-view {} policy retention {}",
                    view,
                    retention.to_kql()
                ),
            ));
        }
        if let Some(hot) = &self.hot_cache {
            scripts.push(ScriptContainer::new(
                "MaterializedViewCachingPolicy",
                order::MATERIALIZED_VIEW_POLICY,
                format!(".alter materialized-view {} policy caching hot = {}", view, hot),
            ));
        }
        scripts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backfill_uses_async_create() {
        let view = MaterializedView {
            source: "Logs".to_string(),
            query: "Logs | summarize count() by Level".to_string(),
            backfill: true,
            ..MaterializedView::default()
        };
        let scripts = view.create_scripts("LevelCounts");
        assert!(scripts[0].is_async);
        assert!(scripts[0].text.starts_with(
            ".create async ifnotexists materialized-view with (backfill = true) LevelCounts on table Logs"
        ));
    }

    #[test]
    fn test_plain_view_with_caching() {
        let view = MaterializedView {
            source: "Logs".to_string(),
            query: "Logs | summarize arg_max(Timestamp, *) by Id".to_string(),
            hot_cache: Some("3d".to_string()),
            ..MaterializedView::default()
        };
        let scripts = view.create_scripts("Latest");
        assert_eq!(scripts.len(), 2);
        assert!(!scripts[0].is_async);
        assert!(scripts[0]
            .text
            .starts_with(".create-or-alter materialized-view Latest on table Logs {"));
        assert_eq!(scripts[1].text, ".alter materialized-view Latest policy caching hot = 3d");
    }
}
