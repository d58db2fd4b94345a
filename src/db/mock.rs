//! Mock store client for testing.
//!
//! Provides an in-memory implementation for headless testing. Every lease is
//! counted on checkout and on release, and each executed statement is
//! recorded verbatim.

use super::{ColumnInfo, Connection, DatabaseClient, QueryResult, Value};
use crate::error::{ExecutionError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How the mock behaves once a statement reaches it.
#[derive(Debug, Clone, Default)]
pub enum MockBehavior {
    /// Return the scripted result for the statement, or a default one.
    #[default]
    Respond,
    /// Sleep before responding.
    Delay(Duration),
    /// Fail every statement with the given error.
    Fail(ExecutionError),
    /// Refuse to hand out connections.
    FailAcquire(ExecutionError),
    /// Never finish a statement.
    Hang,
}

#[derive(Debug, Default)]
struct MockState {
    acquired: AtomicUsize,
    released: AtomicUsize,
    executed: Mutex<Vec<String>>,
}

/// A mock store client that returns predefined results.
///
/// Cloning shares the counters, so a test can keep a handle after passing
/// a clone to the executor.
#[derive(Debug, Clone, Default)]
pub struct MockDatabaseClient {
    behavior: MockBehavior,
    responses: Arc<HashMap<String, QueryResult>>,
    state: Arc<MockState>,
}

impl MockDatabaseClient {
    /// Creates a new mock client that answers every statement.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock client with the given behaviour.
    pub fn with_behavior(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            ..Self::default()
        }
    }

    /// Scripts the result returned for an exact statement text.
    pub fn with_result(mut self, sql: impl Into<String>, result: QueryResult) -> Self {
        Arc::make_mut(&mut self.responses).insert(sql.into(), result);
        self
    }

    /// Number of connections checked out so far.
    pub fn acquired(&self) -> usize {
        self.state.acquired.load(Ordering::SeqCst)
    }

    /// Number of connections released so far.
    pub fn released(&self) -> usize {
        self.state.released.load(Ordering::SeqCst)
    }

    /// Connections currently checked out.
    pub fn outstanding(&self) -> usize {
        self.acquired().saturating_sub(self.released())
    }

    /// Every statement that reached the mock, in order.
    pub fn executed(&self) -> Vec<String> {
        self.state
            .executed
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn acquire(&self) -> std::result::Result<Box<dyn Connection>, ExecutionError> {
        if let MockBehavior::FailAcquire(err) = &self.behavior {
            return Err(err.clone());
        }

        self.state.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            behavior: self.behavior.clone(),
            responses: Arc::clone(&self.responses),
            state: Arc::clone(&self.state),
        }))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

struct MockConnection {
    behavior: MockBehavior,
    responses: Arc<HashMap<String, QueryResult>>,
    state: Arc<MockState>,
}

impl MockConnection {
    fn respond(&self, sql: &str) -> QueryResult {
        if let Some(result) = self.responses.get(sql) {
            return result.clone();
        }

        if sql.to_uppercase().starts_with("SELECT") {
            QueryResult::with_data(
                vec![ColumnInfo::new("result", "TEXT")],
                vec![vec![Value::Text(format!("Mock result for: {sql}"))]],
            )
            .with_execution_time(Duration::from_millis(1))
        } else {
            QueryResult::new().with_execution_time(Duration::from_millis(1))
        }
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn run(&mut self, sql: &str) -> std::result::Result<QueryResult, ExecutionError> {
        if let Ok(mut log) = self.state.executed.lock() {
            log.push(sql.to_string());
        }

        match &self.behavior {
            MockBehavior::Respond | MockBehavior::FailAcquire(_) => Ok(self.respond(sql)),
            MockBehavior::Delay(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(self.respond(sql))
            }
            MockBehavior::Fail(err) => Err(err.clone()),
            MockBehavior::Hang => std::future::pending().await,
        }
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.state.released.fetch_add(1, Ordering::SeqCst);
    }
}
