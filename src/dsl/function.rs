use crate::script::{
    order, quote_identifier, quote_string, with_properties, EntityScripts, ScriptContainer,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Function {
    pub body: String,
    /// Raw parameter list, e.g. `start:datetime, end:datetime = now()`.
    pub parameters: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_string: Option<String>,
    pub skip_validation: bool,
    pub view: bool,
}

impl Function {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }
}

impl EntityScripts for Function {
    fn create_scripts(&self, name: &str) -> Vec<ScriptContainer> {
        let properties = with_properties(&[
            ("view", self.view.then(|| "true".to_string())),
            ("skipvalidation", self.skip_validation.then(|| quote_string("true"))),
            ("folder", self.folder.as_deref().map(quote_string)),
            ("docstring", self.doc_string.as_deref().map(quote_string)),
        ]);
        vec![ScriptContainer::new(
            "CreateOrAlterFunction",
            order::FUNCTION,
            format!(
                ".create-or-alter function{} {}({}) {{\n{}\n}}",
                properties,
                quote_identifier(name),
                self.parameters.trim(),
                self.body.trim()
            ),
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_script() {
        let function = Function {
            body: "  Logs | where Level == \"Error\"  ".to_string(),
            parameters: "since:timespan".to_string(),
            folder: Some("Views".to_string()),
            skip_validation: true,
            ..Function::default()
        };
        let scripts = function.create_scripts("Errors");
        assert_eq!(scripts.len(), 1);
        assert_eq!(
            scripts[0].text,
            ".create-or-alter function with (skipvalidation = \"true\", folder = \"Views\") Errors(since:timespan) {\nLogs | where Level == \"Error\"\n}"
        );
    }

    #[test]
    fn test_body_whitespace_does_not_change_script() {
        let a = Function::new("Logs | take 10");
        let b = Function::new("\nLogs | take 10\n");
        assert_eq!(a.create_scripts("F"), b.create_scripts("F"));
    }
}
