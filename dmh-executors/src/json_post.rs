// dmh-executors/src/json_post.rs
// ============================================================================
// Module: JSON POST Executor
// Description: Delivers an action as an HTTP POST with a JSON body.
// Purpose: Provide the generic webhook-style delivery transport.
// Dependencies: dmh-core, reqwest, serde_json
// ============================================================================

//! ## Overview
//! The `json_post` executor POSTs the payload's `data` object to the
//! payload's `url` with `application/json` encoding and any extra headers,
//! and succeeds only when the response status is listed in `success_code`.
//! Requests use a bounded timeout and redirects are disabled.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::time::Duration;

use dmh_core::Action;
use dmh_core::Executor;
use dmh_core::ExecutorError;
use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use serde::Deserialize;
use serde_json::Value;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the JSON POST executor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JsonPostConfig {
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for JsonPostConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
        }
    }
}

// ============================================================================
// SECTION: Payload
// ============================================================================

/// Executor payload carried in the action's `data` field.
#[derive(Debug, Deserialize)]
struct JsonPostPayload {
    /// Target URL.
    #[serde(default)]
    url: String,
    /// Extra request headers.
    #[serde(default)]
    headers: BTreeMap<String, String>,
    /// JSON body to deliver.
    #[serde(default)]
    data: BTreeMap<String, Value>,
    /// Response statuses counted as success.
    #[serde(default)]
    success_code: Vec<u16>,
}

impl JsonPostPayload {
    fn parse(action: &Action) -> Result<Self, ExecutorError> {
        let payload: Self = serde_json::from_str(&action.data)
            .map_err(|err| ExecutorError::InvalidPayload(err.to_string()))?;
        if payload.url.is_empty() {
            return Err(ExecutorError::InvalidPayload("url must be provided".to_string()));
        }
        if payload.success_code.is_empty() {
            return Err(ExecutorError::InvalidPayload(
                "success_code must be provided".to_string(),
            ));
        }
        if payload.data.is_empty() {
            return Err(ExecutorError::InvalidPayload("data must be provided".to_string()));
        }
        Ok(payload)
    }
}

// ============================================================================
// SECTION: Executor Implementation
// ============================================================================

/// Executor delivering actions as JSON POST requests.
pub struct JsonPostExecutor {
    /// HTTP client used for delivery.
    client: Client,
}

impl JsonPostExecutor {
    /// Creates a new JSON POST executor.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError`] when the HTTP client cannot be created.
    pub fn new(config: JsonPostConfig) -> Result<Self, ExecutorError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .redirect(Policy::none())
            .build()
            .map_err(|err| ExecutorError::Failed(format!("http client build failed: {err}")))?;
        Ok(Self {
            client,
        })
    }
}

impl Executor for JsonPostExecutor {
    fn validate(&self, action: &Action) -> Result<(), ExecutorError> {
        JsonPostPayload::parse(action).map(|_| ())
    }

    fn run(&self, action: &Action) -> Result<(), ExecutorError> {
        let payload = JsonPostPayload::parse(action)?;
        let mut request = self.client.post(&payload.url).json(&payload.data);
        for (name, value) in &payload.headers {
            request = request.header(name, value);
        }
        let response = request
            .send()
            .map_err(|err| ExecutorError::Failed(format!("http request failed: {err}")))?;
        let status = response.status().as_u16();
        if payload.success_code.contains(&status) {
            return Ok(());
        }
        Err(ExecutorError::Failed(format!("received wrong status code {status}")))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn action(data: &str) -> Action {
        Action {
            kind: "json_post".to_string(),
            process_after: 1,
            min_interval: 0,
            comment: String::new(),
            data: data.to_string(),
        }
    }

    #[test]
    fn complete_payload_validates() {
        let executor = JsonPostExecutor::new(JsonPostConfig::default()).unwrap();
        executor
            .validate(&action(
                r#"{"url":"http://h/x","data":{"k":"v"},"success_code":[200]}"#,
            ))
            .unwrap();
    }

    #[test]
    fn missing_url_is_rejected() {
        let executor = JsonPostExecutor::new(JsonPostConfig::default()).unwrap();
        let result = executor.validate(&action(r#"{"data":{"k":"v"},"success_code":[200]}"#));
        assert!(matches!(result, Err(ExecutorError::InvalidPayload(_))));
    }

    #[test]
    fn missing_success_code_is_rejected() {
        let executor = JsonPostExecutor::new(JsonPostConfig::default()).unwrap();
        let result = executor.validate(&action(r#"{"url":"http://h/x","data":{"k":"v"}}"#));
        assert!(matches!(result, Err(ExecutorError::InvalidPayload(_))));
    }

    #[test]
    fn empty_data_is_rejected() {
        let executor = JsonPostExecutor::new(JsonPostConfig::default()).unwrap();
        let result = executor.validate(&action(r#"{"url":"http://h/x","success_code":[200]}"#));
        assert!(matches!(result, Err(ExecutorError::InvalidPayload(_))));
    }

    #[test]
    fn malformed_json_is_rejected() {
        let executor = JsonPostExecutor::new(JsonPostConfig::default()).unwrap();
        let result = executor.validate(&action("definitely not json"));
        assert!(matches!(result, Err(ExecutorError::InvalidPayload(_))));
    }
}
