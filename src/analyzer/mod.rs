mod extractor;
mod fallback;
mod functions;
mod lexer;

pub use extractor::QuerySchemaExtractor;
pub use fallback::LexicalAnalyzer;
pub use lexer::{check_balance, tokenize, LexError, Lexed, Token, TokenKind};

use crate::error::Result;
use crate::schema::ColumnSchema;
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub offset: usize,
    pub message: String,
    pub severity: DiagnosticSeverity,
}

impl Diagnostic {
    pub fn error(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
            severity: DiagnosticSeverity::Error,
        }
    }

    pub fn warning(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
            severity: DiagnosticSeverity::Warning,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.offset, self.message)
    }
}

/// The symbol table a query is checked against: one table and its columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaContext {
    pub table_name: String,
    pub columns: ColumnSchema,
}

impl SchemaContext {
    pub fn new(table_name: impl Into<String>, columns: ColumnSchema) -> Self {
        Self {
            table_name: table_name.into(),
            columns,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Analysis {
    pub diagnostics: Vec<Diagnostic>,
    pub result_schema: ColumnSchema,
    /// Names the query resolved to columns of the input table.
    pub referenced_columns: BTreeSet<String>,
}

/// A full KQL parser and type checker, supplied from outside this crate.
///
/// `parse_and_analyze` returning `Err` means the analyzer itself broke down;
/// query problems belong in `Analysis::diagnostics`.
pub trait QueryAnalyzer: Send + Sync {
    fn parse_and_analyze(&self, text: &str, context: &SchemaContext) -> Result<Analysis>;

    fn parse(&self, text: &str) -> Vec<Diagnostic>;
}
