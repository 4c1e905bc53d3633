use crate::error::{KqlDriftError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

const ENV_UPDATE_POLICIES: &str = "KQLDRIFT_VALIDATE_UPDATE_POLICIES";
const ENV_COLUMN_ORDER: &str = "KQLDRIFT_VALIDATE_COLUMN_ORDER";
const ENV_STRICT_TYPES: &str = "KQLDRIFT_STRICT_TYPES";

/// Switches for the pre-flight checks run while changes are generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub update_policies: bool,
    pub column_order: bool,
    /// When set, `int`/`long`/`real`/`decimal` are no longer interchangeable.
    pub enforce_strict_type_compatibility: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            update_policies: true,
            column_order: true,
            enforce_strict_type_compatibility: false,
        }
    }
}

impl ValidationConfig {
    pub fn disabled() -> Self {
        Self {
            update_policies: false,
            column_order: false,
            enforce_strict_type_compatibility: false,
        }
    }

    pub fn strict(mut self) -> Self {
        self.enforce_strict_type_compatibility = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub validation: ValidationConfig,
}

impl Settings {
    /// Reads the optional settings file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            KqlDriftError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_UPDATE_POLICIES) {
            self.validation.update_policies = parse_flag(ENV_UPDATE_POLICIES, &value)?;
        }
        if let Some(value) = lookup(ENV_COLUMN_ORDER) {
            self.validation.column_order = parse_flag(ENV_COLUMN_ORDER, &value)?;
        }
        if let Some(value) = lookup(ENV_STRICT_TYPES) {
            self.validation.enforce_strict_type_compatibility =
                parse_flag(ENV_STRICT_TYPES, &value)?;
        }
        Ok(())
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(KqlDriftError::Config(format!(
            "{} must be a boolean, got '{}'",
            key, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_enable_validation_without_strict_types() {
        let settings = Settings::default();
        assert!(settings.validation.update_policies);
        assert!(settings.validation.column_order);
        assert!(!settings.validation.enforce_strict_type_compatibility);
    }

    #[test]
    fn test_yaml_partial_override() {
        let settings = Settings::from_yaml("validation:\n  column_order: false\n").unwrap();
        assert!(!settings.validation.column_order);
        assert!(settings.validation.update_policies);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(Settings::from_yaml("  \n").unwrap(), Settings::default());
    }

    #[test]
    fn test_env_overrides() {
        let env = HashMap::from([
            (ENV_STRICT_TYPES.to_string(), "yes".to_string()),
            (ENV_UPDATE_POLICIES.to_string(), "0".to_string()),
        ]);
        let mut settings = Settings::default();
        settings.apply_env(|k| env.get(k).cloned()).unwrap();
        assert!(settings.validation.enforce_strict_type_compatibility);
        assert!(!settings.validation.update_policies);
        assert!(settings.validation.column_order);
    }

    #[test]
    fn test_env_rejects_garbage() {
        let mut settings = Settings::default();
        let err = settings
            .apply_env(|k| (k == ENV_COLUMN_ORDER).then(|| "maybe".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_COLUMN_ORDER));
    }
}
