//! Candidate statement generation.

use std::sync::Arc;

use tracing::debug;

use crate::error::{GatewayError, Result};
use crate::llm::parser::extract_candidate;
use crate::llm::prompt::{build_messages, DEFAULT_SCHEMA_HINT};
use crate::llm::LlmClient;
use crate::safety::DeclaredIntent;

/// Turns a question into a candidate SQL statement.
///
/// The output is untrusted; nothing here checks it.
#[derive(Clone)]
pub struct SqlGenerator {
    client: Arc<dyn LlmClient>,
    schema_hint: String,
}

impl SqlGenerator {
    /// Creates a generator that describes the default healthcare schema.
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            schema_hint: DEFAULT_SCHEMA_HINT.to_string(),
        }
    }

    /// Replaces the schema description sent with every request.
    pub fn with_schema_hint(mut self, schema_hint: impl Into<String>) -> Self {
        self.schema_hint = schema_hint.into();
        self
    }

    /// Asks the client for one statement answering `question`.
    pub async fn generate(&self, question: &str, target: DeclaredIntent) -> Result<String> {
        let messages = build_messages(&self.schema_hint, question, target);
        let response = self.client.complete(&messages).await?;

        let candidate = extract_candidate(&response);
        if candidate.is_empty() {
            return Err(GatewayError::generator("Generator returned an empty response"));
        }

        debug!(target_op = %target, "Generated candidate: {}", candidate);
        Ok(candidate)
    }
}
