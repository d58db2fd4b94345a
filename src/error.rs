//! Error types for sqlgate.
//!
//! `GatewayError` is the top-level error returned by the gateway pipeline.
//! Store failures are carried as `ExecutionError`, policy rejections as
//! [`Rejection`](crate::safety::Rejection).

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::safety::Rejection;

/// Errors raised by the query execution adapter.
///
/// Messages are redacted before they are wrapped here and never contain
/// credentials or connection strings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// The store could not be reached, or a pooled connection broke.
    #[error("Connection failure: {0}")]
    ConnectionFailure(String),

    /// The store rejected the statement (syntax, constraint violation, etc.)
    #[error("Statement error: {0}")]
    Statement(String),

    /// The statement did not finish within the configured limit.
    #[error("Statement timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),

    /// The caller went away before the statement finished.
    #[error("Execution cancelled")]
    Cancelled,
}

impl ExecutionError {
    /// Creates a connection failure with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionFailure(msg.into())
    }

    /// Creates a statement error with the given message.
    pub fn statement(msg: impl Into<String>) -> Self {
        Self::Statement(msg.into())
    }

    /// Stable machine-readable code for this failure.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConnectionFailure(_) => "CONNECTION_FAILURE",
            Self::Statement(_) => "STATEMENT_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::Cancelled => "CANCELLED",
        }
    }
}

/// Main error type for gateway operations.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The request itself was unusable (empty question, etc.)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The candidate statement violated the active policy.
    #[error("Policy violation: {0}")]
    Rejected(#[from] Rejection),

    /// The approved statement failed in the store.
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// The text generator failed (rate limits, auth, timeouts, etc.)
    #[error("Generator error: {0}")]
    Generator(String),

    /// Configuration errors (invalid config file, missing store address, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Creates an invalid request error with the given message.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Creates a generator error with the given message.
    pub fn generator(msg: impl Into<String>) -> Self {
        Self::Generator(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "Invalid Request",
            Self::Rejected(_) => "Policy Violation",
            Self::Execution(_) => "Execution Error",
            Self::Generator(_) => "Generator Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::Rejected(rejection) => rejection.code.as_str(),
            Self::Execution(e) => e.code(),
            Self::Generator(_) => "GENERATOR_ERROR",
            Self::Config(_) => "CONFIGURATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Client-facing status class for this error.
    pub fn status(&self) -> ResponseStatus {
        match self {
            Self::InvalidRequest(_) | Self::Rejected(_) => ResponseStatus::BadRequest,
            Self::Execution(ExecutionError::Timeout(_)) => ResponseStatus::StoreTimeout,
            Self::Execution(_) => ResponseStatus::StoreFailure,
            Self::Generator(_) => ResponseStatus::GeneratorFailure,
            Self::Config(_) | Self::Internal(_) => ResponseStatus::Internal,
        }
    }

    /// The message without the category prefix, for response bodies.
    pub fn detail(&self) -> String {
        match self {
            Self::InvalidRequest(msg)
            | Self::Generator(msg)
            | Self::Config(msg)
            | Self::Internal(msg) => msg.clone(),
            Self::Rejected(rejection) => rejection.message.clone(),
            Self::Execution(e) => e.to_string(),
        }
    }
}

/// Status class attached to every failed response.
///
/// Separates "the caller asked for something the policy forbids" from
/// "the store failed while running an approved statement".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    BadRequest,
    StoreFailure,
    StoreTimeout,
    GeneratorFailure,
    Internal,
}

impl ResponseStatus {
    /// Equivalent HTTP status code.
    pub fn http_code(&self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::StoreFailure => 500,
            Self::StoreTimeout => 504,
            Self::GeneratorFailure => 502,
            Self::Internal => 500,
        }
    }

    /// Process exit code used by the command line.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::BadRequest => 2,
            Self::StoreFailure | Self::StoreTimeout => 3,
            Self::GeneratorFailure | Self::Internal => 1,
        }
    }
}

/// Result type alias using GatewayError.
pub type Result<T> = std::result::Result<T, GatewayError>;
