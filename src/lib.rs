//! sqlgate - a natural-language to SQL gateway.
//!
//! A question goes to a text generator, the generated statement is checked
//! against a policy, and only an approved statement reaches the store.
//! This library exposes the core modules for the binary and integration tests.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod llm;
pub mod logging;
pub mod output;
pub mod query;
pub mod safety;
