use crate::schema::ColumnSchema;
use crate::script::{Comment, CommentKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Outcome of checking a query, or a policy built around one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub output_schema: ColumnSchema,
    pub referenced_columns: BTreeSet<String>,
}

impl QueryValidation {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            ..Default::default()
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            errors: vec![error.into()],
            ..Default::default()
        }
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
        self.is_valid = false;
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn has_findings(&self) -> bool {
        !self.errors.is_empty() || !self.warnings.is_empty()
    }

    /// Errors block rollout; warnings alone are informational.
    pub fn to_comment(&self, subject: &str) -> Option<Comment> {
        if !self.errors.is_empty() {
            let mut lines = self.errors.clone();
            lines.extend(self.warnings.iter().cloned());
            return Some(Comment::caution(format!("{}:\n{}", subject, lines.join("\n"))));
        }
        if !self.warnings.is_empty() {
            return Some(Comment::warning(format!(
                "{}:\n{}",
                subject,
                self.warnings.join("\n")
            )));
        }
        None
    }
}

/// Pass/fail outcome of a structural check such as column ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralValidation {
    pub is_valid: bool,
    pub error_message: Option<String>,
    pub severity: Option<CommentKind>,
}

impl StructuralValidation {
    pub fn success() -> Self {
        Self {
            is_valid: true,
            error_message: None,
            severity: None,
        }
    }

    pub fn failure(message: impl Into<String>, severity: CommentKind) -> Self {
        Self {
            is_valid: false,
            error_message: Some(message.into()),
            severity: Some(severity),
        }
    }

    /// A `Caution` failure blocks rollout; milder severities do not.
    pub fn to_comment(&self) -> Option<Comment> {
        if self.is_valid {
            return None;
        }
        let kind = self.severity.unwrap_or(CommentKind::Caution);
        let text = self.error_message.clone().unwrap_or_default();
        Some(Comment::new(kind, text, kind == CommentKind::Caution))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_fail_rollout() {
        let mut result = QueryValidation::valid();
        result.warning("extra column");
        result.error("unknown column");
        assert!(!result.is_valid);

        let comment = result.to_comment("Update policy").unwrap();
        assert_eq!(comment.kind, CommentKind::Caution);
        assert!(comment.fails_rollout);
        assert!(comment.text.contains("unknown column"));
        assert!(comment.text.contains("extra column"));
    }

    #[test]
    fn test_warnings_only_do_not_fail_rollout() {
        let mut result = QueryValidation::valid();
        result.warning("extra column");
        assert!(result.is_valid);

        let comment = result.to_comment("Update policy").unwrap();
        assert_eq!(comment.kind, CommentKind::Warning);
        assert!(!comment.fails_rollout);
    }

    #[test]
    fn test_clean_result_has_no_comment() {
        assert!(QueryValidation::valid().to_comment("x").is_none());
        assert!(StructuralValidation::success().to_comment().is_none());
    }

    #[test]
    fn test_structural_caution_comment() {
        let failure = StructuralValidation::failure("bad order", CommentKind::Caution);
        let comment = failure.to_comment().unwrap();
        assert!(comment.fails_rollout);
        assert_eq!(comment.text, "bad order");
    }
}
