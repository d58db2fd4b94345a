//! PostgreSQL store client implementation.
//!
//! Provides the `PostgresClient` struct that implements the `DatabaseClient` trait
//! for PostgreSQL using a sqlx connection pool.

use crate::config::{ConnectionConfig, ExecutionConfig};
use crate::db::{ColumnInfo, Connection, DatabaseClient, QueryResult, Redactor, Row, Value};
use crate::error::{ExecutionError, GatewayError, Result};
use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow, PgSslMode};
use sqlx::types::BigDecimal;
use sqlx::{Column as SqlxColumn, Decode, Postgres, Row as SqlxRow, Type, TypeInfo};
use std::fmt::Write as _;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Maximum number of connection retry attempts at startup.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay between retry attempts (doubles each retry).
const RETRY_BASE_DELAY_MS: u64 = 500;

/// SQLSTATE raised when `statement_timeout` cancels a statement.
const QUERY_CANCELED: &str = "57014";

/// PostgreSQL store client.
#[derive(Debug)]
pub struct PostgresClient {
    pool: PgPool,
    timeout: Duration,
    redactor: Arc<Redactor>,
}

impl PostgresClient {
    /// Creates the connection pool, retrying transient failures.
    ///
    /// Pool creation is the only place that retries; individual statements
    /// never do.
    pub async fn connect(config: &ConnectionConfig, execution: &ExecutionConfig) -> Result<Self> {
        let options = connect_options(config, execution)?;
        let redactor = Arc::new(redactor_for(config));

        let mut last_error = None;
        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);

        for attempt in 1..=MAX_RETRY_ATTEMPTS {
            debug!("Connection attempt {} of {}", attempt, MAX_RETRY_ATTEMPTS);

            let result = PgPoolOptions::new()
                .max_connections(execution.max_connections)
                .acquire_timeout(execution.acquire_timeout())
                .connect_with(options.clone())
                .await;

            match result {
                Ok(pool) => {
                    debug!("Connected to {}", config.display_string());
                    return Ok(Self {
                        pool,
                        timeout: execution.timeout(),
                        redactor,
                    });
                }
                Err(e) => {
                    let is_transient = is_transient_error(&e);
                    last_error = Some(e);

                    if attempt < MAX_RETRY_ATTEMPTS && is_transient {
                        warn!(
                            "Connection attempt {} failed (transient error), retrying in {:?}",
                            attempt, delay
                        );
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    } else {
                        break;
                    }
                }
            }
        }

        let message = match last_error {
            Some(e) => map_connection_error(&e, config),
            None => "No connection attempt was made".to_string(),
        };
        Err(ExecutionError::connection(redactor.redact(&message)).into())
    }

    /// Wraps an existing pool.
    ///
    /// This is primarily useful for testing.
    pub fn from_pool(pool: PgPool, timeout: Duration) -> Self {
        Self {
            pool,
            timeout,
            redactor: Arc::new(Redactor::new()),
        }
    }
}

#[async_trait]
impl DatabaseClient for PostgresClient {
    async fn acquire(&self) -> std::result::Result<Box<dyn Connection>, ExecutionError> {
        let conn = self.pool.acquire().await.map_err(|e| {
            ExecutionError::connection(self.redactor.redact(&format_query_error(&e)))
        })?;

        Ok(Box::new(PgLease {
            conn,
            timeout: self.timeout,
            redactor: Arc::clone(&self.redactor),
            in_flight: false,
            broken: false,
        }))
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// One pooled connection checked out for a single statement.
///
/// Returned to the pool on drop, unless the statement never completed or
/// the connection broke, in which case it is closed instead.
struct PgLease {
    conn: PoolConnection<Postgres>,
    timeout: Duration,
    redactor: Arc<Redactor>,
    in_flight: bool,
    broken: bool,
}

#[async_trait]
impl Connection for PgLease {
    async fn run(&mut self, sql: &str) -> std::result::Result<QueryResult, ExecutionError> {
        let start = Instant::now();

        self.in_flight = true;
        let result = sqlx::query(sql)
            .persistent(false)
            .fetch_all(&mut *self.conn)
            .await;
        self.in_flight = false;

        let rows = result.map_err(|e| {
            let err = self.map_error(&e);
            if matches!(err, ExecutionError::ConnectionFailure(_)) {
                self.broken = true;
            }
            err
        })?;

        let execution_time = start.elapsed();

        let columns: Vec<ColumnInfo> = rows
            .first()
            .map(|first| {
                first
                    .columns()
                    .iter()
                    .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                    .collect()
            })
            .unwrap_or_default();

        let rows: Vec<Row> = rows.iter().map(convert_row).collect();

        Ok(QueryResult::with_data(columns, rows).with_execution_time(execution_time))
    }
}

impl PgLease {
    fn map_error(&self, error: &sqlx::Error) -> ExecutionError {
        match error {
            sqlx::Error::Database(db) if db.code().as_deref() == Some(QUERY_CANCELED) => {
                ExecutionError::Timeout(self.timeout)
            }
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => {
                ExecutionError::connection(self.redactor.redact(&format_query_error(error)))
            }
            _ => ExecutionError::statement(self.redactor.redact(&format_query_error(error))),
        }
    }
}

impl Drop for PgLease {
    fn drop(&mut self) {
        if self.in_flight || self.broken {
            debug!("Discarding connection instead of returning it to the pool");
            self.conn.close_on_drop();
        }
    }
}

/// Builds connect options from structured config, never from a URL string.
fn connect_options(config: &ConnectionConfig, execution: &ExecutionConfig) -> Result<PgConnectOptions> {
    let database = config
        .database
        .as_deref()
        .ok_or_else(|| GatewayError::config("Database name is required"))?;

    let mut options = PgConnectOptions::new()
        .host(config.host.as_deref().unwrap_or("localhost"))
        .port(config.port)
        .database(database)
        .statement_cache_capacity(0)
        .options([(
            "statement_timeout",
            execution.timeout().as_millis().to_string(),
        )]);

    if let Some(user) = &config.user {
        options = options.username(user);
    }
    if let Some(password) = &config.password {
        options = options.password(password);
    }
    if let Some(mode) = &config.sslmode {
        let mode = PgSslMode::from_str(mode)
            .map_err(|e| GatewayError::config(format!("Invalid sslmode '{mode}': {e}")))?;
        options = options.ssl_mode(mode);
    }

    Ok(options)
}

fn redactor_for(config: &ConnectionConfig) -> Redactor {
    let mut redactor = Redactor::new();
    if let Ok(url) = config.to_connection_string() {
        redactor = redactor.with_secret(url);
    }
    if let Some(password) = &config.password {
        redactor = redactor.with_secret(password.clone());
    }
    redactor
}

/// Converts a sqlx PgRow to our Row type.
fn convert_row(row: &PgRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

/// Decodes a nullable column and wraps it.
fn get<'r, T, F>(row: &'r PgRow, index: usize, wrap: F) -> std::result::Result<Value, sqlx::Error>
where
    T: Decode<'r, Postgres> + Type<Postgres>,
    F: FnOnce(T) -> Value,
{
    Ok(row
        .try_get::<Option<T>, _>(index)?
        .map(wrap)
        .unwrap_or(Value::Null))
}

/// Converts a single column value from a PgRow to our Value type.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    let decoded = match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => get(row, index, Value::Bool),
        "INT2" | "SMALLINT" => get(row, index, |v: i16| Value::Int(v.into())),
        "INT4" | "INT" | "INTEGER" => get(row, index, |v: i32| Value::Int(v.into())),
        "INT8" | "BIGINT" => get(row, index, Value::Int),
        "FLOAT4" | "REAL" => get(row, index, |v: f32| Value::Float(v.into())),
        "FLOAT8" | "DOUBLE PRECISION" => get(row, index, Value::Float),
        // NaN has no BigDecimal form and falls through to NULL below.
        "NUMERIC" => get(row, index, |v: BigDecimal| Value::Decimal(v.to_string())),
        "TIMESTAMP" => get(row, index, Value::Timestamp),
        "TIMESTAMPTZ" => get(row, index, Value::TimestampTz),
        "DATE" => get(row, index, Value::Date),
        "TIME" => get(row, index, Value::Time),
        "UUID" => get(row, index, |v: uuid::Uuid| Value::Text(v.to_string())),
        "JSON" | "JSONB" => get(row, index, Value::Json),
        "BYTEA" => get(row, index, Value::Bytes),
        // TEXT, VARCHAR, BPCHAR, NAME, CITEXT and anything else string-compatible
        _ => get(row, index, Value::Text),
    };

    decoded.unwrap_or_else(|e| {
        warn!("Could not decode column {} of type {}: {}", index, type_name, e);
        Value::Null
    })
}

/// Determines if an error is transient and worth retrying.
fn is_transient_error(error: &sqlx::Error) -> bool {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
        || error_str.contains("does not exist")
        || error_str.contains("ssl")
        || error_str.contains("tls")
    {
        return false;
    }

    error_str.contains("connection refused")
        || error_str.contains("timed out")
        || error_str.contains("timeout")
        || error_str.contains("temporarily unavailable")
        || error_str.contains("connection reset")
        || error_str.contains("broken pipe")
}

/// Maps sqlx connection errors to user-friendly messages.
fn map_connection_error(error: &sqlx::Error, config: &ConnectionConfig) -> String {
    let host = config.host.as_deref().unwrap_or("localhost");
    let port = config.port;
    let user = config.user.as_deref().unwrap_or("unknown");
    let database = config.database.as_deref().unwrap_or("unknown");

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        format!("Cannot connect to {host}:{port}. Check that the server is running.")
    } else if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
    {
        format!("Authentication failed for user '{user}'. Check your credentials.")
    } else if error_str.contains("does not exist") && error_str.contains("database") {
        format!("Database '{database}' does not exist.")
    } else if error_str.contains("ssl") || error_str.contains("tls") {
        "TLS negotiation failed. Check the sslmode setting.".to_string()
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        format!("Connection to {host}:{port} timed out. The server may be overloaded or unreachable.")
    } else {
        error.to_string()
    }
}

/// Formats a store error with detail and hints if available.
fn format_query_error(error: &sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = format!("ERROR: {}", db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        let fields = [
            ("DETAIL", pg_error.detail()),
            ("HINT", pg_error.hint()),
            ("TABLE", pg_error.table()),
            ("COLUMN", pg_error.column()),
            ("CONSTRAINT", pg_error.constraint()),
        ];
        for (label, value) in fields {
            if let Some(value) = value {
                let _ = write!(result, "\n  {label}: {value}");
            }
        }
    }

    result
}
