use super::StructuralValidation;
use crate::schema::ColumnSchema;
use crate::script::CommentKind;

/// Fails when `proposed` places a new column ahead of a column that already exists.
///
/// Kusto keeps existing columns at their ordinal positions, so such a schema
/// cannot be applied as written and would shift every positional reference.
pub fn validate_column_order(
    baseline: Option<&ColumnSchema>,
    proposed: &ColumnSchema,
    table_name: &str,
) -> StructuralValidation {
    let Some(baseline) = baseline else {
        return StructuralValidation::success();
    };
    if proposed.is_empty() {
        return StructuralValidation::success();
    }

    let Some(first_new_index) = proposed.names().position(|name| !baseline.contains(name)) else {
        return StructuralValidation::success();
    };

    let misplaced: Vec<(usize, &str)> = proposed
        .names()
        .enumerate()
        .skip(first_new_index)
        .filter(|(_, name)| baseline.contains(name))
        .collect();
    let Some(&(last_misplaced, _)) = misplaced.last() else {
        return StructuralValidation::success();
    };

    let preceding: Vec<&str> = proposed
        .names()
        .take(last_misplaced)
        .skip(first_new_index)
        .filter(|name| !baseline.contains(name))
        .collect();
    let misplaced: Vec<&str> = misplaced.into_iter().map(|(_, name)| name).collect();

    StructuralValidation::failure(
        format!(
            "Table '{}': existing column(s) {} would follow new column(s) {}. \
             Kusto preserves the ordinal position of existing columns, so inserting new \
             columns before them changes the schema seen by positional consumers such as \
             update policies and ingestion mappings. Move the new columns to the end of the \
             table definition.",
            table_name,
            quote_list(&misplaced),
            quote_list(&preceding),
        ),
        CommentKind::Caution,
    )
}

fn quote_list(names: &[&str]) -> String {
    names
        .iter()
        .map(|n| format!("'{}'", n))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_schema(names: &[&str]) -> ColumnSchema {
        names.iter().map(|n| (*n, "string")).collect()
    }

    #[test]
    fn test_new_column_in_middle_fails() {
        let baseline = create_test_schema(&["Col1", "Col2"]);
        let proposed = create_test_schema(&["Col1", "NewCol", "Col2"]);
        let result = validate_column_order(Some(&baseline), &proposed, "Events");

        assert!(!result.is_valid);
        assert_eq!(result.severity, Some(CommentKind::Caution));
        let message = result.error_message.unwrap();
        assert!(message.contains("'Events'"));
        assert!(message.contains("'Col2'"));
        assert!(message.contains("'NewCol'"));
        assert!(!message.contains("'Col1'"));
    }

    #[test]
    fn test_new_column_at_end_passes() {
        let baseline = create_test_schema(&["Col1", "Col2"]);
        let proposed = create_test_schema(&["Col1", "Col2", "NewCol"]);
        assert!(validate_column_order(Some(&baseline), &proposed, "Events").is_valid);
    }

    #[test]
    fn test_new_table_passes() {
        let proposed = create_test_schema(&["NewCol", "Col1"]);
        assert!(validate_column_order(None, &proposed, "Events").is_valid);
        let baseline = create_test_schema(&["Col1"]);
        assert!(validate_column_order(Some(&baseline), &ColumnSchema::new(), "Events").is_valid);
    }

    #[test]
    fn test_unchanged_columns_pass() {
        let baseline = create_test_schema(&["Col1", "Col2"]);
        assert!(validate_column_order(Some(&baseline), &baseline, "Events").is_valid);
    }

    #[test]
    fn test_only_new_columns_before_misplaced_are_named() {
        let baseline = create_test_schema(&["A", "B"]);
        let proposed = create_test_schema(&["X", "A", "B", "Y"]);
        let message = validate_column_order(Some(&baseline), &proposed, "T")
            .error_message
            .unwrap();
        assert!(message.contains("'A', 'B'"));
        assert!(message.contains("'X'"));
        assert!(!message.contains("'Y'"));
    }
}
