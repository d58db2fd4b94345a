//! Generator integration for sqlgate.
//!
//! Provides the `LlmClient` trait, its OpenAI and mock implementations, and
//! the `SqlGenerator` that turns a question into a candidate statement.

pub mod generator;
pub mod mock;
pub mod openai;
pub mod parser;
pub mod prompt;
pub mod types;

pub use generator::SqlGenerator;
pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, OpenAiConfig};
pub use parser::extract_candidate;
pub use prompt::{build_messages, build_system_prompt, DEFAULT_SCHEMA_HINT};
pub use types::{Message, Role};

use async_trait::async_trait;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::LlmConfig;
use crate::error::{GatewayError, Result};

/// Trait for clients that can generate completions.
///
/// Implementations must be thread-safe (Send + Sync) to support async operations.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generates a completion for the given messages.
    ///
    /// Returns the complete response as a single string.
    async fn complete(&self, messages: &[Message]) -> Result<String>;
}

/// Generator provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmProvider {
    /// OpenAI or any OpenAI-compatible endpoint.
    #[default]
    OpenAi,
    /// Mock client (no API key required).
    Mock,
}

impl LlmProvider {
    /// Returns the provider as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Mock => "mock",
        }
    }
}

impl FromStr for LlmProvider {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "mock" => Ok(Self::Mock),
            _ => Err(GatewayError::config(format!("Unknown LLM provider: {s}"))),
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Creates a client for the configured provider.
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    match config.provider.parse::<LlmProvider>()? {
        LlmProvider::OpenAi => {
            let client = OpenAiClient::new(OpenAiConfig::from_llm_config(config)?)?;
            Ok(Arc::new(client))
        }
        LlmProvider::Mock => Ok(Arc::new(MockLlmClient::new())),
    }
}

/// Creates the generator described by the configuration.
pub fn create_generator(config: &LlmConfig) -> Result<SqlGenerator> {
    let generator = SqlGenerator::new(create_client(config)?);
    Ok(match &config.schema_hint {
        Some(hint) => generator.with_schema_hint(hint.clone()),
        None => generator,
    })
}
