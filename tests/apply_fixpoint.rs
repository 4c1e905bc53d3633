use async_trait::async_trait;
use kqldrift::{
    ApplyEngine, CommandClient, CommandResult, DatabaseState, DiffContext, Function,
    KqlDriftError, Result, StateObserver,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// In-memory cluster: applies `create-or-alter function` commands to a shared state.
#[derive(Clone)]
struct FakeCluster {
    live: Arc<Mutex<DatabaseState>>,
    target: DatabaseState,
    /// Failures left per function before its command is accepted; absent means always accepted.
    failures_left: Arc<Mutex<BTreeMap<String, usize>>>,
    commands: Arc<Mutex<Vec<String>>>,
}

impl FakeCluster {
    fn new(target: DatabaseState, failures: &[(&str, usize)]) -> Self {
        Self {
            live: Arc::new(Mutex::new(DatabaseState::new(target.name.clone()))),
            target,
            failures_left: Arc::new(Mutex::new(
                failures.iter().map(|(n, c)| (n.to_string(), *c)).collect(),
            )),
            commands: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn live(&self) -> DatabaseState {
        self.live.lock().unwrap().clone()
    }

    fn command_count(&self) -> usize {
        self.commands.lock().unwrap().len()
    }
}

#[async_trait]
impl CommandClient for FakeCluster {
    async fn execute_command(
        &self,
        database: Option<&str>,
        command: &str,
    ) -> Result<CommandResult> {
        assert_eq!(database, Some(self.target.name.as_str()));
        self.commands.lock().unwrap().push(command.to_string());

        let (name, function) = self
            .target
            .functions
            .iter()
            .find(|(name, _)| command.contains(&format!("function {}(", name)))
            .ok_or_else(|| KqlDriftError::Client(format!("unknown command: {}", command)))?;

        if let Some(left) = self.failures_left.lock().unwrap().get_mut(name) {
            if *left > 0 {
                *left -= 1;
                return Err(KqlDriftError::Client(format!("function {} rejected", name)));
            }
        }

        self.live
            .lock()
            .unwrap()
            .functions
            .insert(name.clone(), function.clone());
        Ok(CommandResult::empty())
    }
}

#[async_trait]
impl StateObserver<DatabaseState> for FakeCluster {
    async fn observe(&self) -> Result<DatabaseState> {
        Ok(self.live())
    }
}

fn create_test_target() -> DatabaseState {
    let mut db = DatabaseState::new("Telemetry");
    for (name, body) in [("Alpha", "print 1"), ("Beta", "print 2"), ("Gamma", "print 3")] {
        db.functions.insert(name.to_string(), Function::new(body));
    }
    db
}

fn create_test_engine(cluster: &FakeCluster) -> ApplyEngine<FakeCluster, FakeCluster> {
    ApplyEngine::new(cluster.clone(), cluster.clone(), DiffContext::default())
}

#[tokio::test]
async fn test_everything_succeeds_in_one_attempt() {
    let target = create_test_target();
    let cluster = FakeCluster::new(target.clone(), &[]);
    let engine = create_test_engine(&cluster);

    let report = engine
        .write(&DatabaseState::new("Telemetry"), &target)
        .await
        .unwrap();

    assert_eq!(report.attempts, 1);
    assert_eq!(report.succeeded(), 3);
    assert_eq!(report.failed(), 0);
    assert_eq!(cluster.command_count(), 3);
    assert_eq!(cluster.live().functions, target.functions);
}

#[tokio::test]
async fn test_partial_failures_retry_until_no_progress() {
    let target = create_test_target();
    // Alpha always works, Beta fails once, Gamma never works.
    let cluster = FakeCluster::new(target.clone(), &[("Beta", 1), ("Gamma", usize::MAX)]);
    let engine = create_test_engine(&cluster);

    let err = engine
        .write(&DatabaseState::new("Telemetry"), &target)
        .await
        .unwrap_err();

    match err {
        KqlDriftError::NoProgress {
            attempts,
            failures,
            results,
        } => {
            assert_eq!(attempts, 3);
            assert_eq!(failures, 1);

            let per_attempt = |n: usize| {
                let round: Vec<_> = results.iter().filter(|r| r.attempt == n).collect();
                (
                    round.iter().filter(|r| r.succeeded).count(),
                    round.iter().filter(|r| !r.succeeded).count(),
                )
            };
            assert_eq!(per_attempt(1), (1, 2));
            assert_eq!(per_attempt(2), (1, 1));
            assert_eq!(per_attempt(3), (0, 1));
        }
        other => panic!("expected NoProgress, got {}", other),
    }

    // applied scripts are not rolled back
    let live = cluster.live();
    assert!(live.functions.contains_key("Alpha"));
    assert!(live.functions.contains_key("Beta"));
    assert!(!live.functions.contains_key("Gamma"));
}

#[tokio::test]
async fn test_partial_failure_recovers_on_retry() {
    let target = create_test_target();
    let cluster = FakeCluster::new(target.clone(), &[("Gamma", 1)]);
    let engine = create_test_engine(&cluster);

    let report = engine
        .write(&DatabaseState::new("Telemetry"), &target)
        .await
        .unwrap();

    assert_eq!(report.attempts, 2);
    assert_eq!(report.succeeded(), 3);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.failures().next().unwrap().attempt, 1);
    assert_eq!(cluster.live().functions, target.functions);
}

#[tokio::test]
async fn test_already_converged_state_runs_nothing() {
    let target = create_test_target();
    let cluster = FakeCluster::new(target.clone(), &[]);
    let engine = create_test_engine(&cluster);

    let report = engine.write(&target, &target).await.unwrap();

    assert_eq!(report.attempts, 0);
    assert_eq!(cluster.command_count(), 0);
}

#[tokio::test]
async fn test_cancelled_apply_keeps_earlier_work() {
    let target = create_test_target();
    let cluster = FakeCluster::new(target.clone(), &[]);
    let engine = create_test_engine(&cluster);
    let (tx, rx) = watch::channel(true);

    let err = engine
        .write_with_cancel(&DatabaseState::new("Telemetry"), &target, rx)
        .await
        .unwrap_err();
    drop(tx);

    assert!(matches!(err, KqlDriftError::Cancelled { attempts: 0, .. }));
    assert_eq!(cluster.command_count(), 0);
}

/// Raises the cancel flag as soon as its first command has run.
struct CancelAfterFirst {
    cluster: FakeCluster,
    cancel: watch::Sender<bool>,
}

#[async_trait]
impl CommandClient for CancelAfterFirst {
    async fn execute_command(
        &self,
        database: Option<&str>,
        command: &str,
    ) -> Result<CommandResult> {
        let result = self.cluster.execute_command(database, command).await;
        self.cancel.send_replace(true);
        result
    }
}

#[tokio::test]
async fn test_cancel_between_scripts_stops_the_attempt() {
    let target = create_test_target();
    let cluster = FakeCluster::new(target.clone(), &[]);
    let (tx, rx) = watch::channel(false);
    let client = CancelAfterFirst {
        cluster: cluster.clone(),
        cancel: tx,
    };
    let engine = ApplyEngine::new(client, cluster.clone(), DiffContext::default());

    let err = engine
        .write_with_cancel(&DatabaseState::new("Telemetry"), &target, rx)
        .await
        .unwrap_err();

    match err {
        KqlDriftError::Cancelled { attempts, results } => {
            assert_eq!(attempts, 1);
            assert_eq!(results.len(), 1);
            assert!(results[0].succeeded);
        }
        other => panic!("expected Cancelled, got {}", other),
    }
    assert_eq!(cluster.command_count(), 1);
    assert_eq!(cluster.live().functions.len(), 1);
}
