use super::client::CommandClient;
use super::observer::StateObserver;
use crate::drift::{ChangeSet, DiffContext, Reconcilable};
use crate::error::{KqlDriftError, Result};
use crate::script::ScriptContainer;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptResult {
    pub kind: String,
    pub text: String,
    pub order: i32,
    pub attempt: usize,
    pub succeeded: bool,
    pub reason: Option<String>,
    pub executed_at: DateTime<Utc>,
}

impl ScriptResult {
    fn success(script: &ScriptContainer, attempt: usize, executed_at: DateTime<Utc>) -> Self {
        Self {
            kind: script.kind.clone(),
            text: script.text.clone(),
            order: script.order,
            attempt,
            succeeded: true,
            reason: None,
            executed_at,
        }
    }

    fn failure(
        script: &ScriptContainer,
        attempt: usize,
        executed_at: DateTime<Utc>,
        reason: String,
    ) -> Self {
        Self {
            reason: Some(reason),
            succeeded: false,
            ..Self::success(script, attempt, executed_at)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyPhase {
    Idle,
    Diffing,
    Executing,
    Retrying,
    Done,
    Failed,
}

impl fmt::Display for ApplyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Diffing => "diffing",
            Self::Executing => "executing",
            Self::Retrying => "retrying",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplyReport {
    /// Diff/execute rounds that ran at least one script.
    pub attempts: usize,
    pub results: Vec<ScriptResult>,
}

impl ApplyReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.succeeded).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.succeeded).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ScriptResult> {
        self.results.iter().filter(|r| !r.succeeded)
    }
}

struct Attempt {
    succeeded: usize,
    failed: usize,
}

/// Applies a declared state to a live system, re-diffing after partial
/// failures until an attempt succeeds completely or makes no progress.
pub struct ApplyEngine<C, O> {
    client: C,
    observer: O,
    context: DiffContext,
}

impl<C: CommandClient, O> ApplyEngine<C, O> {
    pub fn new(client: C, observer: O, context: DiffContext) -> Self {
        Self {
            client,
            observer,
            context,
        }
    }

    pub fn context(&self) -> &DiffContext {
        &self.context
    }

    pub fn plan<S: Reconcilable>(&self, old: &S, new: &S) -> ChangeSet<S> {
        S::diff(old, new, &self.context)
    }

    /// Refuses a change set that carries rollout-blocking comments.
    pub fn ensure_rollout_allowed<S>(&self, changes: &ChangeSet<S>) -> Result<()> {
        let blocked: Vec<String> = changes
            .comments()
            .filter(|(_, comment)| comment.fails_rollout)
            .map(|(change, _)| format!("{} '{}'", change.entity_type(), change.entity()))
            .collect();
        if blocked.is_empty() {
            Ok(())
        } else {
            Err(KqlDriftError::RolloutBlocked(blocked.join(", ")))
        }
    }

    /// Runs to a fixpoint. Already applied scripts are never rolled back.
    pub async fn write<S>(&self, old: &S, new: &S) -> Result<ApplyReport>
    where
        S: Reconcilable,
        O: StateObserver<S>,
    {
        self.run(old, new, None).await
    }

    /// Like `write`, but checks `cancel` before each attempt and each script.
    pub async fn write_with_cancel<S>(
        &self,
        old: &S,
        new: &S,
        cancel: watch::Receiver<bool>,
    ) -> Result<ApplyReport>
    where
        S: Reconcilable,
        O: StateObserver<S>,
    {
        self.run(old, new, Some(&cancel)).await
    }

    async fn run<S>(
        &self,
        old: &S,
        new: &S,
        cancel: Option<&watch::Receiver<bool>>,
    ) -> Result<ApplyReport>
    where
        S: Reconcilable,
        O: StateObserver<S>,
    {
        let name = new.changeset_name();
        let scope = new.command_scope();
        let mut phase = ApplyPhase::Idle;
        let mut report = ApplyReport::default();
        let mut current = old.clone();

        loop {
            if is_cancelled(cancel) {
                return Err(cancelled(report));
            }

            transition(&name, &mut phase, ApplyPhase::Diffing);
            let changes = S::diff(&current, new, &self.context);
            let scripts: Vec<ScriptContainer> =
                changes.executable_scripts().into_iter().cloned().collect();
            if scripts.is_empty() {
                transition(&name, &mut phase, ApplyPhase::Done);
                return Ok(report);
            }

            report.attempts += 1;
            transition(&name, &mut phase, ApplyPhase::Executing);
            info!(
                changeset = %name,
                attempt = report.attempts,
                scripts = scripts.len(),
                "Executing apply attempt"
            );

            let attempt = self
                .execute_attempt(&scripts, scope.as_deref(), cancel, &mut report)
                .await?;

            if attempt.failed == 0 {
                transition(&name, &mut phase, ApplyPhase::Done);
                return Ok(report);
            }
            if attempt.succeeded == 0 {
                transition(&name, &mut phase, ApplyPhase::Failed);
                return Err(KqlDriftError::NoProgress {
                    attempts: report.attempts,
                    failures: attempt.failed,
                    results: report.results,
                });
            }

            transition(&name, &mut phase, ApplyPhase::Retrying);
            info!(
                changeset = %name,
                succeeded = attempt.succeeded,
                failed = attempt.failed,
                "Partial success, re-observing live state"
            );
            current = self.observer.observe().await?;
        }
    }

    async fn execute_attempt(
        &self,
        scripts: &[ScriptContainer],
        scope: Option<&str>,
        cancel: Option<&watch::Receiver<bool>>,
        report: &mut ApplyReport,
    ) -> Result<Attempt> {
        let mut attempt = Attempt {
            succeeded: 0,
            failed: 0,
        };

        for script in scripts {
            if is_cancelled(cancel) {
                return Err(cancelled(std::mem::take(report)));
            }

            let executed_at = Utc::now();
            let result = match self.client.execute_command(scope, &script.text).await {
                Ok(_) => {
                    attempt.succeeded += 1;
                    ScriptResult::success(script, report.attempts, executed_at)
                }
                Err(e) => {
                    attempt.failed += 1;
                    warn!(
                        kind = %script.kind,
                        order = script.order,
                        error = %e,
                        "Script failed"
                    );
                    ScriptResult::failure(script, report.attempts, executed_at, e.to_string())
                }
            };
            report.results.push(result);
        }

        Ok(attempt)
    }
}

fn transition(name: &str, phase: &mut ApplyPhase, next: ApplyPhase) {
    debug!(changeset = %name, from = %phase, to = %next, "Apply phase transition");
    *phase = next;
}

fn is_cancelled(cancel: Option<&watch::Receiver<bool>>) -> bool {
    cancel.map(|rx| *rx.borrow()).unwrap_or(false)
}

fn cancelled(report: ApplyReport) -> KqlDriftError {
    warn!(attempts = report.attempts, "Apply cancelled");
    KqlDriftError::Cancelled {
        attempts: report.attempts,
        results: report.results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::{DatabaseState, Function};
    use crate::executor::CommandResult;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingClient {
        executed: Mutex<Vec<String>>,
        fail_containing: Option<&'static str>,
    }

    #[async_trait]
    impl CommandClient for RecordingClient {
        async fn execute_command(
            &self,
            _database: Option<&str>,
            command: &str,
        ) -> Result<CommandResult> {
            self.executed.lock().unwrap().push(command.to_string());
            match self.fail_containing {
                Some(needle) if command.contains(needle) => {
                    Err(KqlDriftError::Client(format!("rejected: {}", needle)))
                }
                _ => Ok(Default::default()),
            }
        }
    }

    struct FixedObserver(DatabaseState);

    #[async_trait]
    impl StateObserver<DatabaseState> for FixedObserver {
        async fn observe(&self) -> Result<DatabaseState> {
            Ok(self.0.clone())
        }
    }

    fn create_test_target() -> DatabaseState {
        let mut db = DatabaseState::new("Db");
        db.functions.insert("F1".to_string(), Function::new("print 1"));
        db.functions.insert("F2".to_string(), Function::new("print 2"));
        db
    }

    #[tokio::test]
    async fn test_empty_changeset_runs_nothing() {
        let target = create_test_target();
        let engine = ApplyEngine::new(
            RecordingClient::default(),
            FixedObserver(target.clone()),
            DiffContext::default(),
        );
        let report = engine.write(&target, &target).await.unwrap();
        assert_eq!(report.attempts, 0);
        assert!(report.results.is_empty());
    }

    #[tokio::test]
    async fn test_full_success_is_one_round() {
        let target = create_test_target();
        let engine = ApplyEngine::new(
            RecordingClient::default(),
            FixedObserver(DatabaseState::new("Db")),
            DiffContext::default(),
        );
        let report = engine.write(&DatabaseState::new("Db"), &target).await.unwrap();
        assert_eq!(report.attempts, 1);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(engine.client.executed.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_no_progress_is_an_error() {
        let target = create_test_target();
        let client = RecordingClient {
            fail_containing: Some("print"),
            ..Default::default()
        };
        let engine = ApplyEngine::new(
            client,
            FixedObserver(DatabaseState::new("Db")),
            DiffContext::default(),
        );
        let err = engine.write(&DatabaseState::new("Db"), &target).await.unwrap_err();
        match err {
            KqlDriftError::NoProgress {
                attempts,
                failures,
                results,
            } => {
                assert_eq!(attempts, 1);
                assert_eq!(failures, 2);
                assert_eq!(results.len(), 2);
                assert!(results.iter().all(|r| r.reason.is_some()));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let target = create_test_target();
        let engine = ApplyEngine::new(
            RecordingClient::default(),
            FixedObserver(DatabaseState::new("Db")),
            DiffContext::default(),
        );
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let err = engine
            .write_with_cancel(&DatabaseState::new("Db"), &target, rx)
            .await
            .unwrap_err();
        assert!(matches!(err, KqlDriftError::Cancelled { attempts: 0, .. }));
        assert!(engine.client.executed.lock().unwrap().is_empty());
    }

    #[test]
    fn test_ensure_rollout_allowed() {
        use crate::dsl::Table;
        use crate::schema::ColumnSchema;

        let engine = ApplyEngine::new(
            RecordingClient::default(),
            FixedObserver(DatabaseState::new("Db")),
            DiffContext::default(),
        );
        let mut old = DatabaseState::new("Db");
        old.tables.insert(
            "T".to_string(),
            Table::with_columns(ColumnSchema::new().with("A", "string")),
        );
        let mut new = old.clone();
        new.tables.insert(
            "T".to_string(),
            Table::with_columns(ColumnSchema::new().with("B", "string").with("A", "string")),
        );

        let plan = engine.plan(&old, &new);
        let err = engine.ensure_rollout_allowed(&plan).unwrap_err();
        assert!(err.to_string().contains("Table 'T'"));
        assert!(engine.ensure_rollout_allowed(&engine.plan(&old, &old)).is_ok());
    }
}
