use super::QueryValidation;
use crate::analyzer::QuerySchemaExtractor;
use crate::config::ValidationConfig;
use crate::dsl::{Table, UpdatePolicy};
use crate::schema::is_type_compatible;
use std::collections::BTreeMap;
use tracing::debug;

/// Checks update policies against the tables they read from and write to.
#[derive(Debug, Clone, Copy)]
pub struct UpdatePolicyValidator<'a> {
    extractor: &'a QuerySchemaExtractor,
}

impl<'a> UpdatePolicyValidator<'a> {
    pub fn new(extractor: &'a QuerySchemaExtractor) -> Self {
        Self { extractor }
    }

    /// Validates one policy of `target_name`.
    ///
    /// `source` overrides the lookup of `policy.source` in `all_tables`, for
    /// callers that hold a different revision of the source table.
    pub fn validate_policy(
        &self,
        policy: &UpdatePolicy,
        target_name: &str,
        target: &Table,
        source: Option<&Table>,
        all_tables: &BTreeMap<String, Table>,
        config: &ValidationConfig,
    ) -> QueryValidation {
        if policy.source.trim().is_empty() {
            return QueryValidation::invalid(format!(
                "Update policy on '{}' has no source table",
                target_name
            ));
        }
        if policy.query.trim().is_empty() {
            return QueryValidation::invalid(format!(
                "Update policy on '{}' has an empty query",
                target_name
            ));
        }
        if !all_tables.contains_key(&policy.source) {
            return QueryValidation::invalid(format!(
                "Update policy on '{}' reads from unknown table '{}'",
                target_name, policy.source
            ));
        }

        let Some(source_table) = source.or_else(|| all_tables.get(&policy.source)) else {
            return QueryValidation::valid();
        };
        if source_table.columns.is_empty() {
            let mut result = QueryValidation::valid();
            result.warning(format!(
                "Source table '{}' declares no columns; query was not analysed",
                policy.source
            ));
            return result;
        }

        let analysis =
            self.extractor
                .validate_query(&policy.query, &source_table.columns, &policy.source);

        let mut result = QueryValidation::valid();
        for error in &analysis.errors {
            result.error(format!("Query error: {}", error));
        }
        for warning in &analysis.warnings {
            result.warning(format!("Query warning: {}", warning));
        }

        if analysis.is_valid {
            self.check_output_schema(&analysis, target_name, target, config, &mut result);
        }

        for column in &analysis.referenced_columns {
            if !source_table.columns.contains(column) {
                result.error(format!(
                    "Query references column '{}' which does not exist in source table '{}'",
                    column, policy.source
                ));
            }
        }

        debug!(
            target = %target_name,
            source = %policy.source,
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "Validated update policy"
        );

        result.output_schema = analysis.output_schema;
        result.referenced_columns = analysis.referenced_columns;
        result
    }

    /// Validates every policy declared on `target`, merging the findings.
    pub fn validate_table(
        &self,
        target_name: &str,
        target: &Table,
        all_tables: &BTreeMap<String, Table>,
        config: &ValidationConfig,
    ) -> QueryValidation {
        let mut merged = QueryValidation::valid();
        for policy in &target.update_policies {
            let result =
                self.validate_policy(policy, target_name, target, None, all_tables, config);
            for error in result.errors {
                merged.error(error);
            }
            merged.warnings.extend(result.warnings);
        }
        merged
    }

    fn check_output_schema(
        &self,
        analysis: &QueryValidation,
        target_name: &str,
        target: &Table,
        config: &ValidationConfig,
        result: &mut QueryValidation,
    ) {
        let output = &analysis.output_schema;
        let strict = config.enforce_strict_type_compatibility;

        for (column, target_type) in target.columns.iter() {
            match output.get(column) {
                Some(output_type) if !is_type_compatible(output_type, target_type, strict) => {
                    result.error(format!(
                        "Column '{}': query produces '{}' but table '{}' declares '{}'",
                        column, output_type, target_name, target_type
                    ));
                }
                Some(_) => {}
                None => result.warning(format!(
                    "Column '{}' of table '{}' is not produced by the query and will stay empty",
                    column, target_name
                )),
            }
        }

        for (column, _) in output.iter() {
            if !target.columns.contains(column) {
                result.warning(format!(
                    "Query column '{}' does not exist on table '{}' and will be dropped",
                    column, target_name
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnSchema;

    fn create_test_tables() -> BTreeMap<String, Table> {
        let mut tables = BTreeMap::new();
        tables.insert(
            "Raw".to_string(),
            Table::with_columns(
                ColumnSchema::new()
                    .with("Timestamp", "datetime")
                    .with("Message", "string")
                    .with("Count", "int"),
            ),
        );
        tables.insert(
            "Clean".to_string(),
            Table::with_columns(
                ColumnSchema::new()
                    .with("Timestamp", "datetime")
                    .with("Message", "string")
                    .with("Count", "real"),
            ),
        );
        tables
    }

    fn validate(query: &str, config: &ValidationConfig) -> QueryValidation {
        let tables = create_test_tables();
        let extractor = QuerySchemaExtractor::new();
        let policy = UpdatePolicy::new("Raw", query);
        UpdatePolicyValidator::new(&extractor).validate_policy(
            &policy,
            "Clean",
            &tables["Clean"],
            None,
            &tables,
            config,
        )
    }

    #[test]
    fn test_matching_query_is_valid() {
        let result = validate(
            "Raw | project Timestamp, Message, Count",
            &ValidationConfig::default(),
        );
        assert!(result.is_valid, "{:?}", result.errors);
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    }

    #[test]
    fn test_numeric_widening_depends_on_strictness() {
        let query = "Raw | project Timestamp, Message, Count";
        let strict = validate(query, &ValidationConfig::default().strict());
        assert!(!strict.is_valid);
        assert!(strict.errors[0].contains("'Count'"));
        assert!(strict.errors[0].contains("'int'"));
        assert!(strict.errors[0].contains("'real'"));
    }

    #[test]
    fn test_incompatible_type_is_error() {
        let result = validate(
            "Raw | project Timestamp = tostring(Timestamp), Message, Count",
            &ValidationConfig::default(),
        );
        assert!(!result.is_valid);
        assert!(result.errors[0].contains("'Timestamp'"));
    }

    #[test]
    fn test_missing_and_extra_columns_are_warnings() {
        let result = validate(
            "Raw | project Timestamp, Message, Extra = 1",
            &ValidationConfig::default(),
        );
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 2);
        assert!(result.warnings.iter().any(|w| w.contains("'Count'")));
        assert!(result.warnings.iter().any(|w| w.contains("'Extra'")));
    }

    #[test]
    fn test_unknown_source_column_is_error() {
        let result = validate(
            "Raw | project Timestamp, Message = Body, Count",
            &ValidationConfig::default(),
        );
        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| e.contains("'Body'")));
    }

    #[test]
    fn test_unknown_source_table() {
        let tables = create_test_tables();
        let extractor = QuerySchemaExtractor::new();
        let policy = UpdatePolicy::new("Missing", "Missing | project A");
        let result = UpdatePolicyValidator::new(&extractor).validate_policy(
            &policy,
            "Clean",
            &tables["Clean"],
            None,
            &tables,
            &ValidationConfig::default(),
        );
        assert!(!result.is_valid);
        assert!(result.errors[0].contains("unknown table 'Missing'"));
    }

    #[test]
    fn test_empty_query_is_rejected() {
        let result = validate("  ", &ValidationConfig::default());
        assert!(!result.is_valid);
        assert!(result.errors[0].contains("empty query"));
    }
}
