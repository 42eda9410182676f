//! Task service client (`GET <base>/task`).

use crate::error::RelayError;
use async_trait::async_trait;
use std::time::Duration;

/// Source of task records shown to the user.
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Raw task records, one generic template element each.
    async fn fetch_tasks(&self) -> Result<Vec<serde_json::Value>, RelayError>;
}

/// HTTP client for the task service.
#[derive(Clone)]
pub struct TaskClient {
    base_url: String,
    client: reqwest::Client,
}

impl TaskClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::LookupFailed(format!("building http client: {}", e)))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET /task — expects a JSON array.
    pub async fn list_tasks(&self) -> Result<Vec<serde_json::Value>, RelayError> {
        let url = format!("{}/task", self.base_url);
        let res = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RelayError::LookupFailed(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(RelayError::LookupFailed(format!("{} {}", status, body)));
        }
        let data: serde_json::Value = res
            .json()
            .await
            .map_err(|e| RelayError::LookupFailed(format!("invalid json: {}", e)))?;
        match data {
            serde_json::Value::Array(tasks) => Ok(tasks),
            other => Err(RelayError::LookupFailed(format!(
                "expected a list of tasks, got {}",
                json_kind(&other)
            ))),
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[async_trait]
impl TaskSource for TaskClient {
    async fn fetch_tasks(&self) -> Result<Vec<serde_json::Value>, RelayError> {
        self.list_tasks().await
    }
}
