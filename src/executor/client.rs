use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub column_type: String,
}

/// Tabular response of a control command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Vec<String>>,
}

impl CommandResult {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Value of `column` in the first row, if both exist.
    pub fn first_value(&self, column: &str) -> Option<&str> {
        let index = self.columns.iter().position(|c| c.name == column)?;
        self.rows.first()?.get(index).map(String::as_str)
    }
}

/// Connection to a live cluster. Timeouts and transport errors surface as `Err`.
#[async_trait]
pub trait CommandClient: Send + Sync {
    /// Runs `command` in `database`, or at cluster scope when `database` is `None`.
    async fn execute_command(&self, database: Option<&str>, command: &str)
        -> Result<CommandResult>;
}

#[async_trait]
impl<C: CommandClient + ?Sized> CommandClient for Arc<C> {
    async fn execute_command(
        &self,
        database: Option<&str>,
        command: &str,
    ) -> Result<CommandResult> {
        (**self).execute_command(database, command).await
    }
}
