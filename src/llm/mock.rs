//! Mock generator client for testing and offline use.
//!
//! Provides deterministic responses based on input patterns.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::error::{GatewayError, Result};
use crate::llm::types::{Message, Role};
use crate::llm::LlmClient;

/// Mock client that returns canned SQL based on input patterns.
///
/// Used for tests and for running the gateway without an API key.
#[derive(Debug, Clone, Default)]
pub struct MockLlmClient {
    /// Custom response mappings (pattern -> response).
    custom_responses: Vec<(String, String)>,
    /// Fail every request with this message.
    failure: Option<String>,
    /// User messages received, in order.
    received: Arc<Mutex<Vec<String>>>,
}

impl MockLlmClient {
    /// Creates a new mock client with default responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a custom response mapping.
    ///
    /// When the input contains `pattern`, the mock will return `response`.
    /// Custom mappings are checked in insertion order before the defaults.
    pub fn with_response(
        mut self,
        pattern: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        self.custom_responses
            .push((pattern.into(), response.into()));
        self
    }

    /// Makes every request fail, as an unreachable provider would.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// User messages this client has been asked to complete.
    pub fn received(&self) -> Vec<String> {
        self.received
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    /// Generates a mock response based on the input.
    fn mock_response(&self, input: &str) -> String {
        let input_lower = input.to_lowercase();

        for (pattern, response) in &self.custom_responses {
            if input_lower.contains(&pattern.to_lowercase()) {
                return response.clone();
            }
        }

        if input_lower.contains("patients named smith") {
            return "SELECT * FROM Patient WHERE last_name = 'Smith'".to_string();
        }

        if input_lower.contains("count") && input_lower.contains("patients") {
            return "SELECT COUNT(*) AS patient_count FROM patient;".to_string();
        }

        if input_lower.contains("medication") && input_lower.contains("patient") {
            return "```sql\nSELECT p.first_name, p.last_name, m.name AS medication\nFROM patient p\nJOIN patient_medication pm ON pm.patient_id = p.patient_id\nJOIN m_medication m ON m.medication_id = pm.medication_id;\n```".to_string();
        }

        if input_lower.contains("diagnos") && input_lower.contains("patient") {
            return "SELECT p.last_name, i.code, pi.diagnosis_date FROM patient p JOIN patient_icd pi ON pi.patient_id = p.patient_id JOIN m_icd i ON i.icd_id = pi.icd_id".to_string();
        }

        if input_lower.contains("all patients") || input_lower.contains("list patients") {
            return "SELECT * FROM patient;".to_string();
        }

        "I don't understand that question. Could you please rephrase it?".to_string()
    }

    /// Extracts the last user message content from a message list.
    fn extract_user_input(messages: &[Message]) -> String {
        messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        let input = Self::extract_user_input(messages);
        if let Ok(mut log) = self.received.lock() {
            log.push(input.clone());
        }

        if let Some(message) = &self.failure {
            return Err(GatewayError::generator(message.clone()));
        }
        Ok(self.mock_response(&input))
    }
}
