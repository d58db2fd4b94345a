//! Integration tests for sqlgate.

pub mod config_test;
pub mod pipeline_test;
pub mod postgres_test;
pub mod validator_test;
