//! Execution of approved statements.
//!
//! Provides isolated statement execution that can be tested independently
//! of the gateway. One call leases one connection; the lease is dropped on
//! every exit path.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::db::{DatabaseClient, QueryResult, RowRecord};
use crate::error::ExecutionError;
use crate::safety::ApprovedStatement;

/// Lifecycle of a single execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPhase {
    Idle,
    Connecting,
    Executing,
    Succeeded,
    Failed,
    Released,
}

impl fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Executing => "executing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Released => "released",
        };
        f.write_str(name)
    }
}

/// Runs approved statements against the store.
///
/// Cheap to clone; clones share the same client.
#[derive(Clone)]
pub struct QueryExecutor {
    db: Arc<dyn DatabaseClient>,
    timeout: Duration,
}

impl QueryExecutor {
    /// Creates a new executor with the given per-statement timeout.
    pub fn new(db: Arc<dyn DatabaseClient>, timeout: Duration) -> Self {
        Self { db, timeout }
    }

    /// The configured per-statement timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Executes the statement and returns its rows in store order.
    pub async fn execute(
        &self,
        statement: &ApprovedStatement,
    ) -> Result<Vec<RowRecord>, ExecutionError> {
        self.execute_with_cancel(statement, &CancellationToken::new())
            .await
    }

    /// Executes the statement, aborting if `cancel` fires first.
    pub async fn execute_with_cancel(
        &self,
        statement: &ApprovedStatement,
        cancel: &CancellationToken,
    ) -> Result<Vec<RowRecord>, ExecutionError> {
        self.run(statement, cancel)
            .await
            .map(QueryResult::into_records)
    }

    /// Executes the statement and returns the raw result with column metadata.
    pub async fn run(
        &self,
        statement: &ApprovedStatement,
        cancel: &CancellationToken,
    ) -> Result<QueryResult, ExecutionError> {
        let mut phase = ExecutionPhase::Idle;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ExecutionError::Cancelled),
            outcome = tokio::time::timeout(self.timeout, self.lease_and_run(statement, &mut phase)) => {
                outcome.unwrap_or(Err(ExecutionError::Timeout(self.timeout)))
            }
        };

        // The lease lives inside the future above, so by now it has been dropped.
        let terminal = match &result {
            Ok(_) => ExecutionPhase::Succeeded,
            Err(_) => ExecutionPhase::Failed,
        };
        debug!(from = %phase, to = %terminal, "Execution finished");
        debug!(phase = %ExecutionPhase::Released, "Connection released");

        if let Err(e) = &result {
            debug!(code = e.code(), "Execution failed: {}", e);
        }
        result
    }

    async fn lease_and_run(
        &self,
        statement: &ApprovedStatement,
        phase: &mut ExecutionPhase,
    ) -> Result<QueryResult, ExecutionError> {
        *phase = ExecutionPhase::Connecting;
        debug!(phase = %phase, "Acquiring connection");
        let mut conn = self.db.acquire().await?;

        *phase = ExecutionPhase::Executing;
        debug!(phase = %phase, verb = %statement.verb(), "Running statement");
        let result = conn.run(statement.as_str()).await?;

        debug!(
            rows = result.row_count,
            elapsed_ms = result.execution_time.as_millis() as u64,
            "Statement completed"
        );
        Ok(result)
    }
}
