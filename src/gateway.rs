//! The gateway: generator, validator and executor composed into one pipeline.
//!
//! A `Gateway` is built once at startup and shared by reference across
//! concurrent requests. It holds no per-request state.

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::{self, DatabaseClient, MockDatabaseClient, RowRecord};
use crate::error::{ExecutionError, GatewayError, ResponseStatus, Result};
use crate::llm::{self, SqlGenerator};
use crate::query::QueryExecutor;
use crate::safety::{ApprovedStatement, DeclaredIntent, Policy, ValidationOutcome};

/// An inbound question.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AskRequest {
    /// Natural-language question.
    pub question: String,
    /// Declared intent: auto, select, insert, update or delete. Absent means auto.
    pub op: Option<String>,
}

impl AskRequest {
    /// Creates a request with no declared intent.
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            op: None,
        }
    }

    /// Sets the declared intent.
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }
}

/// Successful response: the statement that ran and its rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AskResponse {
    /// The approved statement, exactly as executed.
    pub sql: String,
    /// Result rows in store order.
    pub rows: Vec<RowRecord>,
}

/// Serialized body of a failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub status: ResponseStatus,
    pub code: String,
    pub message: String,
}

impl From<&GatewayError> for ErrorBody {
    fn from(err: &GatewayError) -> Self {
        Self {
            status: err.status(),
            code: err.code().to_string(),
            message: err.detail(),
        }
    }
}

/// Shared context for serving questions.
#[derive(Clone)]
pub struct Gateway {
    policy: Arc<Policy>,
    generator: SqlGenerator,
    executor: QueryExecutor,
}

impl Gateway {
    /// Assembles a gateway from its parts.
    pub fn new(policy: Policy, generator: SqlGenerator, executor: QueryExecutor) -> Self {
        Self {
            policy: Arc::new(policy),
            generator,
            executor,
        }
    }

    /// Builds a gateway from configuration, connecting to the store.
    ///
    /// Fails before serving anything if the policy is invalid, the generator
    /// cannot be created, or no store is configured.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let policy = Policy::from_config(&config.policy)?;
        let generator = llm::create_generator(&config.llm)?;
        let database = config.require_database()?;

        info!(
            "Connecting to {} (policy: {})",
            database.display_string(),
            policy.name()
        );
        let client: Arc<dyn DatabaseClient> =
            Arc::from(db::connect(database, &config.execution).await?);

        Ok(Self::new(
            policy,
            generator,
            QueryExecutor::new(client, config.execution.timeout()),
        ))
    }

    /// Builds a gateway backed by the in-memory mock store.
    pub fn with_mock_store(config: &Config, store: MockDatabaseClient) -> Result<Self> {
        let policy = Policy::from_config(&config.policy)?;
        let generator = llm::create_generator(&config.llm)?;
        Ok(Self::new(
            policy,
            generator,
            QueryExecutor::new(Arc::new(store), config.execution.timeout()),
        ))
    }

    /// The active policy.
    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// The executor, for callers that run their own approved statements.
    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    /// Validates a statement without running it.
    pub fn check(&self, sql: &str, op: Option<&str>) -> Result<ApprovedStatement> {
        let intent = DeclaredIntent::parse_optional(op)?;
        Ok(self.policy.validate(sql, intent).into_result()?)
    }

    /// Answers a question end to end.
    ///
    /// Generation happens only after the request and its intent pass; the
    /// store is touched only with an approved statement.
    pub async fn ask(&self, request: &AskRequest, cancel: &CancellationToken) -> Result<AskResponse> {
        let question = request.question.trim();
        if question.is_empty() {
            return Err(GatewayError::invalid_request("Empty prompt"));
        }

        let intent = DeclaredIntent::parse_optional(request.op.as_deref())?;
        self.policy.check_intent(intent)?;

        let target = self.policy.generator_target(intent);
        let candidate = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(ExecutionError::Cancelled.into());
            }
            candidate = self.generator.generate(question, target) => candidate?,
        };

        let statement = match self.policy.validate(&candidate, intent) {
            ValidationOutcome::Approved(statement) => statement,
            ValidationOutcome::Rejected(rejection) => {
                warn!(code = %rejection.code, "Generated statement rejected");
                return Err(rejection.into());
            }
        };

        let rows = self.executor.execute_with_cancel(&statement, cancel).await?;
        info!(verb = %statement.verb(), rows = rows.len(), "Request served");

        Ok(AskResponse {
            sql: statement.into_sql(),
            rows,
        })
    }

    /// Runs `SELECT 1` through the validator and executor.
    pub async fn health(&self) -> Result<()> {
        let statement = self.check("SELECT 1", Some("select"))?;
        self.executor.execute(&statement).await?;
        Ok(())
    }
}
