//! Remote workflow client: sends transcribed text to the flow and unwraps
//! the text of its chat response.

use secrecy::ExposeSecret;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::WorkflowConfig;
use crate::error::WorkflowError;

#[derive(Debug, Serialize)]
struct RunRequest<'a> {
    input_value: &'a str,
    output_type: &'static str,
    input_type: &'static str,
}

/// HTTP client for one flow endpoint.
pub struct WorkflowClient {
    config: WorkflowConfig,
    client: reqwest::Client,
}

impl WorkflowClient {
    pub fn new(config: WorkflowConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Run the flow on `input` and return its response text.
    pub async fn run(&self, input: &str) -> Result<String, WorkflowError> {
        let body = RunRequest {
            input_value: input,
            output_type: "chat",
            input_type: "chat",
        };

        let resp = self
            .client
            .post(&self.config.url)
            .bearer_auth(self.config.api_token.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            warn!(status = %status, "Workflow request failed");
            return Err(WorkflowError::Status {
                status: status.as_u16(),
            });
        }

        let data: Value = resp.json().await?;
        let text = response_text(&data).ok_or(WorkflowError::MissingText)?;
        debug!(len = text.len(), "Workflow responded");
        Ok(text)
    }
}

/// Dig the chat text out of `outputs[0].outputs[0].results.message.data.text`.
///
/// Returns `None` if any level is missing or the text is not a string.
pub fn response_text(data: &Value) -> Option<String> {
    data.get("outputs")?
        .get(0)?
        .get("outputs")?
        .get(0)?
        .get("results")?
        .get("message")?
        .get("data")?
        .get("text")?
        .as_str()
        .map(str::to_string)
}
