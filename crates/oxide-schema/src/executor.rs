//! Compiled blueprint executor.
//!
//! Steps run strictly in compiled order on one connection. The first failure
//! aborts the remaining steps; nothing is retried.

use oxide_schema_core::{CompiledBlueprint, Step};
use tracing::{debug, info, warn};

use crate::connection::Connection;
use crate::error::Result;

/// Runs compiled blueprints against a connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct Executor {
    dry_run: bool,
}

impl Executor {
    /// Creates a new executor.
    #[must_use]
    pub const fn new() -> Self {
        Self { dry_run: false }
    }

    /// Enables dry-run mode (statements are logged but not executed).
    #[must_use]
    pub const fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Returns true in dry-run mode.
    #[must_use]
    pub const fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Runs every step of `compiled`, then commits.
    pub async fn run<C: Connection>(
        &self,
        connection: &mut C,
        compiled: &CompiledBlueprint,
    ) -> Result<()> {
        if self.dry_run {
            for sql in compiled.statements() {
                warn!(table = %compiled.table, sql = %sql, "Dry run, statement not executed");
            }
            return Ok(());
        }

        for step in &compiled.steps {
            Self::run_step(connection, step).await?;
        }
        connection.commit().await?;

        info!(
            table = %compiled.table,
            steps = compiled.steps.len(),
            "Blueprint executed"
        );
        Ok(())
    }

    async fn run_step<C: Connection>(connection: &mut C, step: &Step) -> Result<()> {
        match step {
            Step::Statement(sql) => {
                debug!(sql = %sql, "Executing SQL");
                connection.execute(sql).await
            }
            Step::Atomic {
                setup,
                statements,
                checks,
                teardown,
            } => {
                for sql in setup {
                    debug!(sql = %sql, "Executing setup SQL");
                    connection.execute(sql).await?;
                }

                debug!(
                    statements = statements.len(),
                    checks = checks.len(),
                    "Executing atomic batch"
                );
                let outcome = connection.execute_atomic(statements, checks).await;
                if outcome.is_err() {
                    warn!("Atomic batch rolled back");
                }

                // Teardown runs even after a rollback; the batch error wins.
                let mut restored = Ok(());
                for sql in teardown {
                    debug!(sql = %sql, "Executing teardown SQL");
                    if let Err(e) = connection.execute(sql).await {
                        if restored.is_ok() {
                            restored = Err(e);
                        }
                    }
                }
                outcome.and(restored)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use oxide_schema_core::{CatalogRow, Dialect};

    /// Records statements; fails any statement containing `fail`.
    #[derive(Default)]
    struct Recorder {
        log: Vec<String>,
        commits: usize,
    }

    impl Recorder {
        fn check(sql: &str) -> Result<()> {
            if sql.contains("fail") {
                return Err(Error::execution(sql, sqlx::Error::Protocol("boom".into())));
            }
            Ok(())
        }
    }

    impl Connection for Recorder {
        fn dialect(&self) -> Dialect {
            Dialect::Sqlite
        }

        async fn execute(&mut self, sql: &str) -> Result<()> {
            self.log.push(sql.to_string());
            Self::check(sql)
        }

        async fn fetch(&mut self, _sql: &str) -> Result<Vec<CatalogRow>> {
            Ok(Vec::new())
        }

        async fn execute_atomic(&mut self, statements: &[String], checks: &[String]) -> Result<()> {
            self.log.push("BEGIN".to_string());
            for sql in statements {
                self.log.push(sql.clone());
                if let Err(e) = Self::check(sql) {
                    self.log.push("ROLLBACK".to_string());
                    return Err(e);
                }
            }
            for check in checks {
                self.log.push(check.clone());
                if check.contains("violated") {
                    self.log.push("ROLLBACK".to_string());
                    return Err(Error::CheckFailed {
                        check: check.clone(),
                        rows: 1,
                    });
                }
            }
            self.log.push("COMMIT".to_string());
            Ok(())
        }

        async fn commit(&mut self) -> Result<()> {
            self.commits += 1;
            Ok(())
        }
    }

    fn compiled(steps: Vec<Step>) -> CompiledBlueprint {
        CompiledBlueprint {
            table: "users".into(),
            steps,
        }
    }

    fn atomic(statements: &[&str]) -> Step {
        checked(statements, &[])
    }

    fn checked(statements: &[&str], checks: &[&str]) -> Step {
        Step::Atomic {
            setup: vec!["SETUP".into()],
            statements: statements.iter().map(ToString::to_string).collect(),
            checks: checks.iter().map(ToString::to_string).collect(),
            teardown: vec!["TEARDOWN".into()],
        }
    }

    #[tokio::test]
    async fn test_runs_steps_in_order_and_commits() {
        let mut conn = Recorder::default();
        let plan = compiled(vec![
            Step::Statement("A".into()),
            atomic(&["B", "C"]),
            Step::Statement("D".into()),
        ]);

        Executor::new().run(&mut conn, &plan).await.unwrap();
        assert_eq!(
            conn.log,
            vec!["A", "SETUP", "BEGIN", "B", "C", "COMMIT", "TEARDOWN", "D"]
        );
        assert_eq!(conn.commits, 1);
    }

    #[tokio::test]
    async fn test_failure_aborts_remaining_steps() {
        let mut conn = Recorder::default();
        let plan = compiled(vec![
            Step::Statement("fail here".into()),
            Step::Statement("never".into()),
        ]);

        let err = Executor::new().run(&mut conn, &plan).await.unwrap_err();
        assert!(matches!(err, Error::Execution { ref statement, .. } if statement == "fail here"));
        assert_eq!(conn.log, vec!["fail here"]);
        assert_eq!(conn.commits, 0);
    }

    #[tokio::test]
    async fn test_teardown_runs_after_rollback() {
        let mut conn = Recorder::default();
        let plan = compiled(vec![atomic(&["B", "fail", "C"]), Step::Statement("D".into())]);

        let err = Executor::new().run(&mut conn, &plan).await.unwrap_err();
        assert!(matches!(err, Error::Execution { ref statement, .. } if statement == "fail"));
        assert_eq!(
            conn.log,
            vec!["SETUP", "BEGIN", "B", "fail", "ROLLBACK", "TEARDOWN"]
        );
    }

    #[tokio::test]
    async fn test_failed_check_rolls_back_and_stops() {
        let mut conn = Recorder::default();
        let plan = compiled(vec![
            checked(&["B"], &["CHECK violated"]),
            Step::Statement("D".into()),
        ]);

        let err = Executor::new().run(&mut conn, &plan).await.unwrap_err();
        assert!(matches!(err, Error::CheckFailed { rows: 1, .. }));
        assert_eq!(
            conn.log,
            vec!["SETUP", "BEGIN", "B", "CHECK violated", "ROLLBACK", "TEARDOWN"]
        );
        assert_eq!(conn.commits, 0);
    }

    #[tokio::test]
    async fn test_dry_run_executes_nothing() {
        let mut conn = Recorder::default();
        let plan = compiled(vec![Step::Statement("A".into()), atomic(&["B"])]);

        Executor::new().dry_run(true).run(&mut conn, &plan).await.unwrap();
        assert!(conn.log.is_empty());
        assert_eq!(conn.commits, 0);
    }
}
