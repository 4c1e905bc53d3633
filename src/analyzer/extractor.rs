use super::{Analysis, Diagnostic, LexicalAnalyzer, QueryAnalyzer, SchemaContext};
use crate::schema::ColumnSchema;
use crate::script::ScriptContainer;
use crate::validation::QueryValidation;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Front door for query analysis.
///
/// Uses the injected analyzer when one is configured and drops to the
/// lexical approximation whenever it is missing or breaks down.
#[derive(Clone, Default)]
pub struct QuerySchemaExtractor {
    primary: Option<Arc<dyn QueryAnalyzer>>,
    fallback: LexicalAnalyzer,
}

impl fmt::Debug for QuerySchemaExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySchemaExtractor")
            .field("primary", &self.primary.is_some())
            .finish()
    }
}

impl QuerySchemaExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_analyzer(analyzer: Arc<dyn QueryAnalyzer>) -> Self {
        Self {
            primary: Some(analyzer),
            fallback: LexicalAnalyzer::new(),
        }
    }

    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    pub fn extract_output_schema(&self, query: &str, input: &ColumnSchema) -> ColumnSchema {
        let context = SchemaContext::new(source_name(query), input.clone());
        self.analyze(query, &context).0.result_schema
    }

    pub fn extract_column_references(
        &self,
        query: &str,
        source: &str,
        input: &ColumnSchema,
    ) -> BTreeSet<String> {
        let context = SchemaContext::new(source, input.clone());
        self.analyze(query, &context).0.referenced_columns
    }

    pub fn validate_query(
        &self,
        query: &str,
        input: &ColumnSchema,
        source: &str,
    ) -> QueryValidation {
        if query.trim().is_empty() {
            return QueryValidation::invalid("Query is empty");
        }

        let context = SchemaContext::new(source, input.clone());
        let (analysis, fallback_note) = self.analyze(query, &context);

        let mut result = QueryValidation::valid();
        for diagnostic in &analysis.diagnostics {
            if diagnostic.is_error() {
                result.error(diagnostic.to_string());
            } else {
                result.warning(diagnostic.to_string());
            }
        }
        if let Some(note) = fallback_note {
            result.warning(note);
        }
        result.output_schema = analysis.result_schema;
        result.referenced_columns = analysis.referenced_columns;
        result
    }

    /// Syntax diagnostics for a generated command.
    pub fn check_script(&self, text: &str) -> Vec<Diagnostic> {
        match &self.primary {
            Some(primary) => primary.parse(text),
            None => self.fallback.parse(text),
        }
    }

    /// Marks a script valid or invalid. Informational scripts are always valid.
    pub fn annotate(&self, script: ScriptContainer) -> ScriptContainer {
        if script.is_informational() {
            return script.with_validity(true);
        }
        let errors: Vec<Diagnostic> = self
            .check_script(&script.text)
            .into_iter()
            .filter(Diagnostic::is_error)
            .collect();
        if !errors.is_empty() {
            warn!(
                kind = %script.kind,
                first_error = %errors[0],
                "Generated script failed syntax check"
            );
        }
        let is_valid = errors.is_empty();
        script.with_validity(is_valid)
    }

    fn analyze(&self, query: &str, context: &SchemaContext) -> (Analysis, Option<String>) {
        if let Some(primary) = &self.primary {
            match primary.parse_and_analyze(query, context) {
                Ok(analysis) => return (analysis, None),
                Err(e) => {
                    warn!(
                        table = %context.table_name,
                        error = %e,
                        "Query analyzer failed, falling back to lexical analysis"
                    );
                    let note = format!(
                        "Query analyzer unavailable ({}); schema inferred lexically",
                        e
                    );
                    return (self.fallback.analyze(query, context), Some(note));
                }
            }
        }
        (self.fallback.analyze(query, context), None)
    }
}

/// Leading identifier of a tabular expression, used when no source is given.
fn source_name(query: &str) -> String {
    super::tokenize(query)
        .tokens
        .into_iter()
        .find(|t| t.kind == super::TokenKind::Ident && !t.is_ident("let"))
        .map(|t| t.text)
        .unwrap_or_default()
}
