//! Execution of approved statements for sqlgate.
//!
//! This module isolates statement execution from the gateway pipeline.

pub mod executor;

pub use executor::{ExecutionPhase, QueryExecutor};
