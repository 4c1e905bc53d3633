use thiserror::Error;

#[derive(Error, Debug)]
pub enum KqlDriftError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to load state: {0}")]
    StateLoad(String),

    #[error("Client error: {0}")]
    Client(String),

    #[error("Failed to observe live state: {0}")]
    Observe(String),

    #[error("Query analyzer failed: {0}")]
    Analyzer(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Rollout blocked: {0}")]
    RolloutBlocked(String),

    #[error("No progress after {attempts} attempt(s): {failures} script(s) failed")]
    NoProgress {
        attempts: usize,
        failures: usize,
        results: Vec<crate::executor::ScriptResult>,
    },

    #[error("Apply cancelled after {attempts} attempt(s)")]
    Cancelled {
        attempts: usize,
        results: Vec<crate::executor::ScriptResult>,
    },
}

pub type Result<T> = std::result::Result<T, KqlDriftError>;
