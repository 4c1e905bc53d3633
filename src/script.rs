use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static PLAIN_IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("plain identifier regex is valid")
});

/// Execution order of generated scripts. Lower runs first; negative never runs.
pub mod order {
    pub const INFORMATIONAL: i32 = -1;
    pub const CLUSTER_POLICY: i32 = 0;
    pub const FOLLOWER: i32 = 0;
    pub const ENTITY_GROUP: i32 = 5;
    pub const WORKLOAD_GROUP: i32 = 10;
    pub const EXTERNAL_TABLE: i32 = 10;
    pub const TABLE: i32 = 20;
    pub const TABLE_POLICY: i32 = 21;
    pub const FUNCTION: i32 = 30;
    pub const MATERIALIZED_VIEW: i32 = 40;
    pub const MATERIALIZED_VIEW_POLICY: i32 = 41;
    pub const UPDATE_POLICY: i32 = 50;
    pub const CONTINUOUS_EXPORT: i32 = 60;
    pub const PERMISSION: i32 = 70;
    pub const DELETION: i32 = 80;
}

/// One command produced for an entity, plus its execution metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptContainer {
    pub kind: String,
    pub order: i32,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_valid: Option<bool>,
    #[serde(default)]
    pub is_async: bool,
}

impl ScriptContainer {
    pub fn new(kind: impl Into<String>, order: i32, text: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            order,
            text: text.into(),
            is_valid: None,
            is_async: false,
        }
    }

    /// A marker that shows up in reports but never executes.
    pub fn informational(kind: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(kind, order::INFORMATIONAL, text)
    }

    pub fn with_async(mut self, is_async: bool) -> Self {
        self.is_async = is_async;
        self
    }

    pub fn with_validity(mut self, is_valid: bool) -> Self {
        self.is_valid = Some(is_valid);
        self
    }

    pub fn is_informational(&self) -> bool {
        self.order < 0
    }

    pub fn is_executable(&self) -> bool {
        !self.is_informational() && self.is_valid != Some(false)
    }
}

impl fmt::Display for ScriptContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} #{}] {}", self.kind, self.order, self.text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CommentKind {
    Note,
    Tip,
    Important,
    Warning,
    Caution,
}

impl fmt::Display for CommentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Note => "NOTE",
            Self::Tip => "TIP",
            Self::Important => "IMPORTANT",
            Self::Warning => "WARNING",
            Self::Caution => "CAUTION",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub kind: CommentKind,
    pub text: String,
    pub fails_rollout: bool,
}

impl Comment {
    pub fn new(kind: CommentKind, text: impl Into<String>, fails_rollout: bool) -> Self {
        Self {
            kind,
            text: text.into(),
            fails_rollout,
        }
    }

    pub fn caution(text: impl Into<String>) -> Self {
        Self::new(CommentKind::Caution, text, true)
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(CommentKind::Warning, text, false)
    }

    pub fn note(text: impl Into<String>) -> Self {
        Self::new(CommentKind::Note, text, false)
    }

    /// Folds `other` into `self`, keeping the more severe kind.
    pub fn merge(self, other: Comment) -> Comment {
        Comment {
            kind: self.kind.max(other.kind),
            text: format!("{}\n{}", self.text, other.text),
            fails_rollout: self.fails_rollout || other.fails_rollout,
        }
    }
}

/// Every schema entity renders itself as an ordered list of scripts.
pub trait EntityScripts {
    fn create_scripts(&self, name: &str) -> Vec<ScriptContainer>;
}

/// Brackets identifiers that are not plain Kusto names.
pub fn quote_identifier(name: &str) -> String {
    if PLAIN_IDENTIFIER.is_match(name) {
        name.to_string()
    } else {
        format!("['{}']", name.replace('\\', "\\\\").replace('\'', "\\'"))
    }
}

/// Double-quoted literal. Control characters are escaped so multi-line text stays on one line.
pub fn quote_string(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            _ => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

pub fn verbatim_string(value: &str) -> String {
    format!("@'{}'", value.replace('\'', "''"))
}

/// Renders `with (k = v, ...)`, or nothing when every property is unset.
pub fn with_properties(properties: &[(&str, Option<String>)]) -> String {
    let set: Vec<String> = properties
        .iter()
        .filter_map(|(k, v)| v.as_ref().map(|v| format!("{} = {}", k, v)))
        .collect();
    if set.is_empty() {
        String::new()
    } else {
        format!(" with ({})", set.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_order_never_executable() {
        let marker = ScriptContainer::informational("Rename", "// note");
        assert!(marker.is_informational());
        assert!(!marker.is_executable());
    }

    #[test]
    fn test_invalid_script_not_executable() {
        let script =
            ScriptContainer::new("CreateMergeTable", order::TABLE, ".create-merge table T (A:int)");
        assert!(script.is_executable());
        assert!(!script.with_validity(false).is_executable());
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("Events"), "Events");
        assert_eq!(quote_identifier("my-table"), "['my-table']");
        assert_eq!(quote_identifier("it's"), "['it\\'s']");
    }

    #[test]
    fn test_quote_string_escapes_control_characters() {
        assert_eq!(quote_string("say \"hi\""), "\"say \\\"hi\\\"\"");
        assert_eq!(quote_string("a\\b"), "\"a\\\\b\"");
        assert_eq!(
            quote_string("T\r\n| where A == 'x'\t"),
            "\"T\\r\\n| where A == 'x'\\t\""
        );
        assert!(!quote_string("line one\nline two").contains('\n'));
    }

    #[test]
    fn test_with_properties_skips_unset() {
        let rendered = with_properties(&[
            ("folder", Some(quote_string("Raw"))),
            ("docstring", None),
        ]);
        assert_eq!(rendered, " with (folder = \"Raw\")");
        assert_eq!(with_properties(&[("folder", None)]), "");
    }

    #[test]
    fn test_comment_merge_keeps_worst() {
        let merged = Comment::warning("extra column").merge(Comment::caution("bad type"));
        assert_eq!(merged.kind, CommentKind::Caution);
        assert!(merged.fails_rollout);
        assert!(merged.text.contains("extra column"));
    }
}
