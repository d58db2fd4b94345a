//! OpenAI generator client implementation.
//!
//! Implements the LlmClient trait for OpenAI-compatible chat completions APIs.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::error::{GatewayError, Result};
use crate::llm::types::Message;
use crate::llm::LlmClient;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// OpenAI chat completions endpoint.
const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Maximum number of retry attempts for transient errors.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff (milliseconds).
const RETRY_BASE_DELAY_MS: u64 = 1000;

/// Generation is deterministic and short: one statement, no prose.
const TEMPERATURE: f32 = 0.0;
const MAX_TOKENS: u32 = 400;

/// OpenAI client configuration.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API key for authentication.
    pub api_key: String,
    /// Model to use (e.g., "gpt-4o-mini").
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Chat completions endpoint.
    pub api_url: String,
}

impl OpenAiConfig {
    /// Creates a new config with the given API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            api_url: OPENAI_API_URL.to_string(),
        }
    }

    /// Builds the client config from the generator section of the configuration.
    pub fn from_llm_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| GatewayError::config("OPENAI_API_KEY environment variable not set"))?;

        let mut openai = Self::new(api_key, config.model.clone()).with_timeout(config.timeout_secs);
        if let Some(base_url) = &config.base_url {
            openai = openai.with_api_url(base_url);
        }
        Ok(openai)
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Points the client at another OpenAI-compatible endpoint.
    ///
    /// Accepts either a full `/chat/completions` URL or a base ending in `/v1`.
    pub fn with_api_url(mut self, url: &str) -> Self {
        let url = url.trim_end_matches('/');
        self.api_url = if url.ends_with("/chat/completions") {
            url.to_string()
        } else {
            format!("{url}/chat/completions")
        };
        self
    }
}

/// OpenAI generator client.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiClient {
    /// Creates a new OpenAI client with the given configuration.
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Converts internal messages to OpenAI API format.
    fn convert_messages(messages: &[Message]) -> Vec<OpenAiMessage> {
        messages
            .iter()
            .map(|m| OpenAiMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            })
            .collect()
    }

    /// Parses an API error response and returns (error, is_retryable).
    fn parse_error(status: reqwest::StatusCode, body: &str) -> (GatewayError, bool) {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return (
                GatewayError::generator("Authentication failed. Check your OPENAI_API_KEY."),
                false,
            );
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return (
                GatewayError::generator("Rate limited. Please wait and try again."),
                true,
            );
        }

        let is_retryable = status.is_server_error();

        if let Ok(error_response) = serde_json::from_str::<OpenAiErrorResponse>(body) {
            return (
                GatewayError::generator(format!(
                    "OpenAI API error: {}",
                    error_response.error.message
                )),
                is_retryable,
            );
        }

        (
            GatewayError::generator(format!("OpenAI API error ({status}): {body}")),
            is_retryable,
        )
    }

    /// Determines if a request error is retryable.
    fn is_retryable_request_error(error: &reqwest::Error) -> bool {
        error.is_timeout() || error.is_connect()
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        let request = OpenAiRequest {
            model: self.config.model.clone(),
            messages: Self::convert_messages(messages),
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let mut last_error = None;
        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);

        for attempt in 1..=MAX_RETRY_ATTEMPTS {
            debug!(
                "OpenAI API request attempt {} of {}",
                attempt, MAX_RETRY_ATTEMPTS
            );

            let result = self
                .client
                .post(&self.config.api_url)
                .bearer_auth(&self.config.api_key)
                .json(&request)
                .send()
                .await;

            match result {
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.map_err(|e| {
                        GatewayError::generator(format!("Failed to read response: {e}"))
                    })?;

                    if status.is_success() {
                        let response: OpenAiResponse =
                            serde_json::from_str(&body).map_err(|e| {
                                GatewayError::generator(format!("Failed to parse response: {e}"))
                            })?;

                        return response
                            .choices
                            .into_iter()
                            .next()
                            .and_then(|c| c.message.content)
                            .map(|content| content.trim().to_string())
                            .ok_or_else(|| GatewayError::generator("No response from OpenAI"));
                    }

                    let (error, is_retryable) = Self::parse_error(status, &body);
                    last_error = Some(error);

                    if !is_retryable || attempt >= MAX_RETRY_ATTEMPTS {
                        break;
                    }

                    warn!(
                        "OpenAI API request failed (attempt {}), retrying in {:?}: {}",
                        attempt, delay, status
                    );
                }
                Err(e) => {
                    let is_retryable = Self::is_retryable_request_error(&e);
                    let error = if e.is_timeout() {
                        GatewayError::generator("Request timed out. Try again.")
                    } else if e.is_connect() {
                        GatewayError::generator(
                            "Failed to connect to OpenAI API. Check your network.",
                        )
                    } else {
                        GatewayError::generator(format!("Request failed: {e}"))
                    };
                    last_error = Some(error);

                    if !is_retryable || attempt >= MAX_RETRY_ATTEMPTS {
                        break;
                    }

                    warn!(
                        "OpenAI API request failed (attempt {}), retrying in {:?}",
                        attempt, delay
                    );
                }
            }

            tokio::time::sleep(delay).await;
            delay *= 2;
        }

        Err(last_error.unwrap_or_else(|| GatewayError::internal("No request attempt was made")))
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiError,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    message: String,
}
