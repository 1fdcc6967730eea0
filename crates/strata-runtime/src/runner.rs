//! The change-set runner: apply / rollback / status / reset.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{info, warn};

use strata_core::error::{Result, StrataError, TxOp};
use strata_core::executor::Executor;
use strata_core::report::{ApplyReport, ResetReport, RollbackReport, ScriptStatus, StatusReport};
use strata_core::script::{ChangeScript, Direction, ScriptRegistry};

use crate::ledger::Ledger;
use crate::lock::BatchLock;

/// Orchestrates one change-set (structural changes or reference data)
/// against its ledger and an executor.
///
/// Scripts run strictly serially: script N may depend on state produced by
/// script N-1, so there is no internal parallelism and no reordering. Each
/// script and its ledger write share one transaction, so a script is either
/// fully applied and recorded or not at all. The first failure stops the
/// batch; everything committed earlier in the batch stays committed, and
/// `status` immediately afterwards reports that partial state truthfully.
pub struct ChangeSetRunner {
    registry: ScriptRegistry,
    ledger: Ledger,
    lock: BatchLock,
}

impl ChangeSetRunner {
    /// One runner per change-type; the ledger table name distinguishes the
    /// instances and keys their batch lock.
    pub fn new(registry: ScriptRegistry, ledger: Ledger) -> Self {
        let lock = BatchLock::new(ledger.table());
        Self {
            registry,
            ledger,
            lock,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Apply every pending script in ascending name order.
    ///
    /// Re-running immediately with no new scripts yields an empty report.
    pub async fn apply_all(&self, exec: &dyn Executor) -> Result<ApplyReport> {
        self.lock.acquire(exec).await?;
        let result = self.apply_all_inner(exec).await;
        self.release_lock(exec).await;
        result
    }

    async fn apply_all_inner(&self, exec: &dyn Executor) -> Result<ApplyReport> {
        self.ledger.ensure_initialized(exec).await?;

        let pending = self.pending(exec).await?;
        if pending.is_empty() {
            info!(ledger = %self.ledger.table(), "no pending scripts");
            return Ok(ApplyReport::empty());
        }

        info!(
            ledger = %self.ledger.table(),
            count = pending.len(),
            "applying pending scripts"
        );

        let mut executed = Vec::new();
        for script in pending {
            self.run_one(exec, script.as_ref(), Direction::Apply).await?;
            executed.push(script.name().to_string());
        }

        info!(
            ledger = %self.ledger.table(),
            count = executed.len(),
            "apply batch complete"
        );
        Ok(ApplyReport::new(executed))
    }

    /// Revert the last `steps` applied scripts, most recently applied first.
    ///
    /// An empty ledger (or `steps == 0`) yields an empty report, not an
    /// error.
    pub async fn rollback(&self, exec: &dyn Executor, steps: usize) -> Result<RollbackReport> {
        self.lock.acquire(exec).await?;
        let result = self.rollback_inner(exec, steps).await;
        self.release_lock(exec).await;
        result
    }

    async fn rollback_inner(&self, exec: &dyn Executor, steps: usize) -> Result<RollbackReport> {
        self.ledger.ensure_initialized(exec).await?;

        let applied = self.ledger.list_applied(exec).await?;
        if applied.is_empty() || steps == 0 {
            info!(ledger = %self.ledger.table(), "nothing to roll back");
            return Ok(RollbackReport::empty());
        }

        let start = applied.len().saturating_sub(steps);
        let targets: Vec<String> = applied[start..]
            .iter()
            .rev()
            .map(|entry| entry.name.clone())
            .collect();

        info!(
            ledger = %self.ledger.table(),
            count = targets.len(),
            "rolling back scripts"
        );

        let by_name = self.scripts_by_name()?;
        let mut rolled_back = Vec::new();
        for name in targets {
            let script = by_name.get(name.as_str()).ok_or_else(|| {
                StrataError::Discovery(format!(
                    "ledger entry '{}' has no registered script to revert",
                    name
                ))
            })?;
            self.run_one(exec, script.as_ref(), Direction::Revert)
                .await?;
            rolled_back.push(name);
        }

        Ok(RollbackReport::new(rolled_back))
    }

    /// Per-script applied flags with derived counts.
    pub async fn status(&self, exec: &dyn Executor) -> Result<StatusReport> {
        self.ledger.ensure_initialized(exec).await?;

        let discovered = self.registry.discover_all()?;
        let applied: HashSet<String> = self
            .ledger
            .list_applied(exec)
            .await?
            .into_iter()
            .map(|entry| entry.name)
            .collect();

        let scripts = discovered
            .iter()
            .map(|script| ScriptStatus {
                name: script.name().to_string(),
                applied: applied.contains(script.name()),
            })
            .collect();

        Ok(StatusReport::from_scripts(scripts))
    }

    /// Revert every applied script in descending order, then drop the
    /// ledger table. Destructive and non-recoverable; confirmation gating
    /// belongs to the caller.
    pub async fn reset(&self, exec: &dyn Executor) -> Result<ResetReport> {
        self.lock.acquire(exec).await?;
        let result = self.reset_inner(exec).await;
        self.release_lock(exec).await;
        result
    }

    async fn reset_inner(&self, exec: &dyn Executor) -> Result<ResetReport> {
        warn!(
            ledger = %self.ledger.table(),
            "resetting change-set; every applied script will be reverted"
        );
        self.ledger.ensure_initialized(exec).await?;

        let applied = self.ledger.list_applied(exec).await?;
        let count = applied.len();
        let by_name = self.scripts_by_name()?;

        for entry in applied.iter().rev() {
            let script = by_name.get(entry.name.as_str()).ok_or_else(|| {
                StrataError::Discovery(format!(
                    "ledger entry '{}' has no registered script to revert",
                    entry.name
                ))
            })?;
            self.run_one(exec, script.as_ref(), Direction::Revert)
                .await?;
        }

        self.ledger.drop_table(exec).await?;
        info!(ledger = %self.ledger.table(), count, "change-set reset");
        Ok(ResetReport { reset: true, count })
    }

    /// Discovered scripts minus applied names, in ascending order.
    async fn pending(&self, exec: &dyn Executor) -> Result<Vec<Arc<dyn ChangeScript>>> {
        let discovered = self.registry.discover_all()?;
        let applied: HashSet<String> = self
            .ledger
            .list_applied(exec)
            .await?
            .into_iter()
            .map(|entry| entry.name)
            .collect();

        Ok(discovered
            .into_iter()
            .filter(|script| !applied.contains(script.name()))
            .collect())
    }

    fn scripts_by_name(&self) -> Result<HashMap<&'static str, Arc<dyn ChangeScript>>> {
        Ok(self
            .registry
            .discover_all()?
            .into_iter()
            .map(|script| (script.name(), script))
            .collect())
    }

    /// Run one script and its ledger write inside a single transaction.
    ///
    /// On any failure the transaction is rolled back, so a script never
    /// leaves a half-applied state or a dangling ledger row.
    async fn run_one(
        &self,
        exec: &dyn Executor,
        script: &dyn ChangeScript,
        direction: Direction,
    ) -> Result<()> {
        let name = script.name();
        info!(script = name, %direction, "executing script");

        exec.begin().await.map_err(|e| StrataError::Transaction {
            op: TxOp::Begin,
            cause: e.to_string(),
        })?;

        let work = async {
            match direction {
                Direction::Apply => {
                    script
                        .apply(exec)
                        .await
                        .map_err(|e| StrataError::script(name, direction, e))?;
                    self.ledger
                        .record_applied(exec, name)
                        .await
                        .map_err(|e| StrataError::script(name, direction, e))?;
                }
                Direction::Revert => {
                    script
                        .revert(exec)
                        .await
                        .map_err(|e| StrataError::script(name, direction, e))?;
                    self.ledger
                        .record_reverted(exec, name)
                        .await
                        .map_err(|e| StrataError::script(name, direction, e))?;
                }
            }
            Ok(())
        };

        match work.await {
            Ok(()) => {
                exec.commit().await.map_err(|e| StrataError::Transaction {
                    op: TxOp::Commit,
                    cause: e.to_string(),
                })?;
                info!(script = name, %direction, "committed");
                Ok(())
            }
            Err(err) => {
                // The original failure is the one worth reporting.
                if let Err(rb) = exec.rollback().await {
                    warn!(script = name, error = %rb, "rollback after failure also failed");
                }
                Err(err)
            }
        }
    }

    async fn release_lock(&self, exec: &dyn Executor) {
        if let Err(e) = self.lock.release(exec).await {
            warn!(error = %e, "failed to release batch lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailPoint, MemoryExecutor};
    use strata_core::executor::BoxFuture;
    use strata_core::schema::{ColumnDef, SqlType, TableDef};

    /// Test script that creates (apply) and drops (revert) a marker table
    /// named `t_<name>`, with optional failure after the side effect.
    struct TrackedScript {
        name: &'static str,
        fail_apply: bool,
        fail_revert: bool,
    }

    fn ok(name: &'static str) -> TrackedScript {
        TrackedScript {
            name,
            fail_apply: false,
            fail_revert: false,
        }
    }

    fn failing_apply(name: &'static str) -> TrackedScript {
        TrackedScript {
            fail_apply: true,
            ..ok(name)
        }
    }

    fn failing_revert(name: &'static str) -> TrackedScript {
        TrackedScript {
            fail_revert: true,
            ..ok(name)
        }
    }

    fn marker(name: &str) -> String {
        format!("t_{}", name)
    }

    impl ChangeScript for TrackedScript {
        fn name(&self) -> &'static str {
            self.name
        }

        fn apply<'a>(&'a self, exec: &'a dyn Executor) -> BoxFuture<'a, ()> {
            Box::pin(async move {
                let table = TableDef::new(marker(self.name))
                    .column(ColumnDef::new("id", SqlType::Integer).primary_key());
                exec.create_table(&table).await?;
                if self.fail_apply {
                    return Err(StrataError::Storage("simulated apply failure".into()));
                }
                Ok(())
            })
        }

        fn revert<'a>(&'a self, exec: &'a dyn Executor) -> BoxFuture<'a, ()> {
            Box::pin(async move {
                if self.fail_revert {
                    return Err(StrataError::Storage("simulated revert failure".into()));
                }
                exec.drop_table(&marker(self.name)).await
            })
        }
    }

    fn runner_with(scripts: Vec<TrackedScript>) -> ChangeSetRunner {
        let mut registry = ScriptRegistry::new();
        for script in scripts {
            registry.register(script);
        }
        ChangeSetRunner::new(registry, Ledger::new("strata_migrations"))
    }

    fn abc_runner() -> ChangeSetRunner {
        runner_with(vec![ok("001_a"), ok("002_b"), ok("003_c")])
    }

    async fn applied_names(runner: &ChangeSetRunner, exec: &MemoryExecutor) -> Vec<String> {
        runner
            .ledger()
            .list_applied(exec)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect()
    }

    #[tokio::test]
    async fn test_apply_all_runs_everything_in_order() {
        let exec = MemoryExecutor::new();
        let runner = abc_runner();

        let report = runner.apply_all(&exec).await.unwrap();
        assert_eq!(report.executed, vec!["001_a", "002_b", "003_c"]);
        assert_eq!(report.total, 3);

        assert!(exec.has_table("t_001_a"));
        assert!(exec.has_table("t_002_b"));
        assert!(exec.has_table("t_003_c"));
        assert_eq!(
            applied_names(&runner, &exec).await,
            vec!["001_a", "002_b", "003_c"]
        );
    }

    #[tokio::test]
    async fn test_apply_all_is_idempotent() {
        let exec = MemoryExecutor::new();
        let runner = abc_runner();

        runner.apply_all(&exec).await.unwrap();
        let second = runner.apply_all(&exec).await.unwrap();

        assert!(second.executed.is_empty());
        assert_eq!(second.total, 0);
    }

    #[tokio::test]
    async fn test_status_after_full_apply() {
        let exec = MemoryExecutor::new();
        let runner = abc_runner();

        runner.apply_all(&exec).await.unwrap();
        let status = runner.status(&exec).await.unwrap();

        assert_eq!(status.total, 3);
        assert_eq!(status.executed, 3);
        assert_eq!(status.pending, 0);
        assert!(status.scripts.iter().all(|s| s.applied));
    }

    #[tokio::test]
    async fn test_rollback_most_recent_first() {
        let exec = MemoryExecutor::new();
        let runner = abc_runner();
        runner.apply_all(&exec).await.unwrap();

        let report = runner.rollback(&exec, 1).await.unwrap();
        assert_eq!(report.rolled_back, vec!["003_c"]);
        assert_eq!(report.total, 1);

        assert!(!exec.has_table("t_003_c"));
        assert!(exec.has_table("t_002_b"));
        assert_eq!(applied_names(&runner, &exec).await, vec!["001_a", "002_b"]);
    }

    #[tokio::test]
    async fn test_rollback_multiple_descending() {
        let exec = MemoryExecutor::new();
        let runner = abc_runner();
        runner.apply_all(&exec).await.unwrap();

        let report = runner.rollback(&exec, 2).await.unwrap();
        assert_eq!(report.rolled_back, vec!["003_c", "002_b"]);
        assert_eq!(applied_names(&runner, &exec).await, vec!["001_a"]);
    }

    #[tokio::test]
    async fn test_rollback_steps_beyond_applied_reverts_all() {
        let exec = MemoryExecutor::new();
        let runner = abc_runner();
        runner.apply_all(&exec).await.unwrap();

        let report = runner.rollback(&exec, 10).await.unwrap();
        assert_eq!(report.rolled_back, vec!["003_c", "002_b", "001_a"]);
        assert!(applied_names(&runner, &exec).await.is_empty());
    }

    #[tokio::test]
    async fn test_rollback_empty_ledger_is_not_an_error() {
        let exec = MemoryExecutor::new();
        let runner = abc_runner();

        let report = runner.rollback(&exec, 1).await.unwrap();
        assert!(report.rolled_back.is_empty());
        assert_eq!(report.total, 0);
    }

    #[tokio::test]
    async fn test_failed_apply_stops_batch_and_keeps_earlier_commits() {
        let exec = MemoryExecutor::new();
        let runner = runner_with(vec![ok("001_a"), failing_apply("002_b"), ok("003_c")]);

        let err = runner.apply_all(&exec).await.unwrap_err();
        match err {
            StrataError::ScriptExecution {
                script, direction, ..
            } => {
                assert_eq!(script, "002_b");
                assert_eq!(direction, Direction::Apply);
            }
            other => panic!("unexpected error: {other}"),
        }

        // 001_a committed, 002_b rolled back, 003_c never attempted.
        assert!(exec.has_table("t_001_a"));
        assert!(!exec.has_table("t_002_b"));
        assert!(!exec.has_table("t_003_c"));
        assert_eq!(applied_names(&runner, &exec).await, vec!["001_a"]);

        // Status right after the failure reports the true partial state.
        let status = runner.status(&exec).await.unwrap();
        assert_eq!(status.executed, 1);
        assert_eq!(status.pending, 2);
        assert_eq!(status.total, status.executed + status.pending);
    }

    #[tokio::test]
    async fn test_failed_apply_leaves_no_ledger_entry() {
        let exec = MemoryExecutor::new();
        let runner = runner_with(vec![failing_apply("001_a")]);

        runner.apply_all(&exec).await.unwrap_err();

        // The script's own side effect and its ledger row rolled back together.
        assert!(!exec.has_table("t_001_a"));
        assert!(applied_names(&runner, &exec).await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_revert_stops_rollback_batch() {
        let exec = MemoryExecutor::new();
        let runner = runner_with(vec![ok("001_a"), failing_revert("002_b"), ok("003_c")]);
        runner.apply_all(&exec).await.unwrap();

        let err = runner.rollback(&exec, 3).await.unwrap_err();
        match err {
            StrataError::ScriptExecution {
                script, direction, ..
            } => {
                assert_eq!(script, "002_b");
                assert_eq!(direction, Direction::Revert);
            }
            other => panic!("unexpected error: {other}"),
        }

        // 003_c reverted before the failure; 001_a never reached.
        assert_eq!(applied_names(&runner, &exec).await, vec!["001_a", "002_b"]);
        assert!(!exec.has_table("t_003_c"));
        assert!(exec.has_table("t_001_a"));
    }

    #[tokio::test]
    async fn test_apply_rollback_round_trip() {
        let exec = MemoryExecutor::new();
        let runner = runner_with(vec![ok("001_a")]);

        runner.apply_all(&exec).await.unwrap();
        runner.rollback(&exec, 1).await.unwrap();

        assert!(!exec.has_table("t_001_a"));
        assert!(applied_names(&runner, &exec).await.is_empty());

        // And the script is pending again.
        let status = runner.status(&exec).await.unwrap();
        assert_eq!(status.pending, 1);
    }

    #[tokio::test]
    async fn test_reapply_after_rollback() {
        let exec = MemoryExecutor::new();
        let runner = abc_runner();
        runner.apply_all(&exec).await.unwrap();
        runner.rollback(&exec, 1).await.unwrap();

        let report = runner.apply_all(&exec).await.unwrap();
        assert_eq!(report.executed, vec!["003_c"]);
    }

    #[tokio::test]
    async fn test_reset_reverts_everything_and_drops_ledger() {
        let exec = MemoryExecutor::new();
        let runner = abc_runner();
        runner.apply_all(&exec).await.unwrap();

        let report = runner.reset(&exec).await.unwrap();
        assert!(report.reset);
        assert_eq!(report.count, 3);

        assert!(!exec.has_table("strata_migrations"));
        assert!(!exec.has_table("t_001_a"));
        assert!(!exec.has_table("t_002_b"));
        assert!(!exec.has_table("t_003_c"));

        // Status reinitializes the ledger and reports a clean slate.
        let status = runner.status(&exec).await.unwrap();
        assert_eq!(status.total, 3);
        assert_eq!(status.executed, 0);
        assert_eq!(status.pending, 3);
    }

    #[tokio::test]
    async fn test_status_initializes_fresh_store() {
        let exec = MemoryExecutor::new();
        let runner = abc_runner();

        let status = runner.status(&exec).await.unwrap();
        assert_eq!(status.total, 3);
        assert_eq!(status.executed, 0);
        assert_eq!(status.pending, 3);
    }

    #[tokio::test]
    async fn test_commit_failure_is_a_transaction_error() {
        let exec = MemoryExecutor::new();
        let runner = runner_with(vec![ok("001_a")]);

        exec.inject_failure(FailPoint::Commit);
        let err = runner.apply_all(&exec).await.unwrap_err();
        assert!(matches!(
            err,
            StrataError::Transaction {
                op: TxOp::Commit,
                ..
            }
        ));

        // Nothing committed, and the next run recovers.
        assert!(applied_names(&runner, &exec).await.is_empty());
        let report = runner.apply_all(&exec).await.unwrap();
        assert_eq!(report.executed, vec!["001_a"]);
    }

    #[tokio::test]
    async fn test_held_lock_blocks_batches() {
        let exec = MemoryExecutor::new();
        let runner = abc_runner();

        let outside = BatchLock::new("strata_migrations");
        outside.acquire(&exec).await.unwrap();

        assert!(matches!(
            runner.apply_all(&exec).await.unwrap_err(),
            StrataError::LockHeld(_)
        ));
        assert!(matches!(
            runner.rollback(&exec, 1).await.unwrap_err(),
            StrataError::LockHeld(_)
        ));
        assert!(matches!(
            runner.reset(&exec).await.unwrap_err(),
            StrataError::LockHeld(_)
        ));

        // Status is read-only and does not contend.
        assert!(runner.status(&exec).await.is_ok());

        outside.force_release(&exec).await.unwrap();
        runner.apply_all(&exec).await.unwrap();
    }

    #[tokio::test]
    async fn test_lock_released_after_failed_batch() {
        let exec = MemoryExecutor::new();
        let runner = runner_with(vec![failing_apply("001_a")]);

        runner.apply_all(&exec).await.unwrap_err();
        // A second attempt must fail on the script again, not on the lock.
        let err = runner.apply_all(&exec).await.unwrap_err();
        assert!(matches!(err, StrataError::ScriptExecution { .. }));
    }

    #[tokio::test]
    async fn test_ledger_entry_without_script_fails_rollback() {
        let exec = MemoryExecutor::new();
        let runner = abc_runner();
        runner.apply_all(&exec).await.unwrap();
        runner
            .ledger()
            .record_applied(&exec, "999_ghost")
            .await
            .unwrap();

        let err = runner.rollback(&exec, 1).await.unwrap_err();
        assert!(matches!(err, StrataError::Discovery(_)));
        assert!(err.to_string().contains("999_ghost"));
    }

    #[tokio::test]
    async fn test_status_invariant_ignores_unknown_ledger_entries() {
        let exec = MemoryExecutor::new();
        let runner = abc_runner();
        runner.apply_all(&exec).await.unwrap();
        runner
            .ledger()
            .record_applied(&exec, "999_ghost")
            .await
            .unwrap();

        let status = runner.status(&exec).await.unwrap();
        assert_eq!(status.total, 3);
        assert_eq!(status.total, status.executed + status.pending);
    }

    #[tokio::test]
    async fn test_two_change_sets_are_independent() {
        let exec = MemoryExecutor::new();
        let migrations = runner_with(vec![ok("001_a")]);
        let seeds = ChangeSetRunner::new(
            {
                let mut registry = ScriptRegistry::new();
                registry.register(ok("001_admin"));
                registry
            },
            Ledger::new("strata_seeds"),
        );

        migrations.apply_all(&exec).await.unwrap();
        seeds.apply_all(&exec).await.unwrap();

        assert_eq!(applied_names(&migrations, &exec).await, vec!["001_a"]);
        let seed_names: Vec<String> = seeds
            .ledger()
            .list_applied(&exec)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(seed_names, vec!["001_admin"]);

        // Resetting seeds leaves the migration ledger untouched.
        seeds.reset(&exec).await.unwrap();
        assert!(exec.has_table("strata_migrations"));
        assert!(!exec.has_table("strata_seeds"));
    }
}
