//! Store abstraction layer for sqlgate.
//!
//! Provides a trait-based interface to the backing store so the execution
//! adapter can run against PostgreSQL or an in-memory mock interchangeably.
//! A `Connection` is a lease: dropping it returns the connection to its pool
//! (or discards it if it is no longer usable).

mod mock;
mod postgres;
mod sanitize;
mod types;

pub use mock::{MockBehavior, MockDatabaseClient};
pub use postgres::PostgresClient;
pub use sanitize::Redactor;
pub use types::{ColumnInfo, QueryResult, Row, RowRecord, Value};

use crate::config::{ConnectionConfig, ExecutionConfig};
use crate::error::{ExecutionError, Result};
use async_trait::async_trait;

/// Creates a PostgreSQL client for the given configuration.
///
/// This is the central factory function for store connections.
pub async fn connect(
    config: &ConnectionConfig,
    execution: &ExecutionConfig,
) -> Result<Box<dyn DatabaseClient>> {
    let client = PostgresClient::connect(config, execution).await?;
    Ok(Box::new(client))
}

/// Trait defining the interface for store clients.
///
/// Implementations must be shareable across tasks; each call to `acquire`
/// hands out an independent lease.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Checks out a connection for the duration of one execution.
    async fn acquire(&self) -> std::result::Result<Box<dyn Connection>, ExecutionError>;

    /// Closes the client and every pooled connection.
    async fn close(&self) -> Result<()>;
}

/// A leased connection. Released when dropped.
#[async_trait]
pub trait Connection: Send {
    /// Runs exactly the given statement and materializes its rows.
    async fn run(&mut self, sql: &str) -> std::result::Result<QueryResult, ExecutionError>;
}
