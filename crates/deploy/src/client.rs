use std::time::Duration;

use async_trait::async_trait;
use promptrelay_core::{config::DeploymentConfig, InputMapping};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

const INVOKE_PATH: &str = "/v2/deployments/invoke";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DeploymentRequest {
    pub key: String,
    pub inputs: InputMapping,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
}

impl DeploymentRequest {
    pub fn new(key: impl Into<String>, inputs: InputMapping) -> Self {
        Self { key: key.into(), inputs, context: None }
    }

    pub fn with_context(mut self, context: Option<Map<String, Value>>) -> Self {
        self.context = context;
        self
    }
}

/// First choice of a deployment run. Either field may be missing or blank.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeploymentResponse {
    pub content: Option<String>,
    pub image_url: Option<String>,
}

impl DeploymentResponse {
    pub fn text(&self) -> Option<&str> {
        self.content.as_deref().filter(|value| !value.trim().is_empty())
    }

    /// Image location, falling back to `content` for deployments that return the URL as text.
    pub fn url(&self) -> Option<&str> {
        self.image_url.as_deref().filter(|value| !value.trim().is_empty()).or_else(|| self.text())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeploymentError {
    #[error("deployment client could not be built: {0}")]
    Build(String),
    #[error("deployment request failed: {0}")]
    Transport(String),
    #[error("deployment endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("deployment response could not be decoded: {0}")]
    Decode(String),
}

#[async_trait]
pub trait DeploymentClient: Send + Sync {
    async fn invoke(&self, request: &DeploymentRequest)
        -> Result<DeploymentResponse, DeploymentError>;
}

pub struct HttpDeploymentClient {
    client: Client,
    endpoint: String,
    api_key: SecretString,
}

impl HttpDeploymentClient {
    pub fn new(
        base_url: &str,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, DeploymentError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| DeploymentError::Build(error.to_string()))?;
        let endpoint = format!("{}{INVOKE_PATH}", base_url.trim_end_matches('/'));
        Ok(Self { client, endpoint, api_key })
    }

    pub fn from_config(config: &DeploymentConfig) -> Result<Self, DeploymentError> {
        Self::new(
            &config.base_url,
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl DeploymentClient for HttpDeploymentClient {
    async fn invoke(
        &self,
        request: &DeploymentRequest,
    ) -> Result<DeploymentResponse, DeploymentError> {
        debug!(deployment_key = %request.key, endpoint = %self.endpoint, "invoking deployment");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(|error| DeploymentError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeploymentError::Status { status: status.as_u16(), body: truncate(&body) });
        }

        let payload: InvokeResponse =
            response.json().await.map_err(|error| DeploymentError::Decode(error.to_string()))?;
        Ok(payload.into_response())
    }
}

#[derive(Debug, Default, Deserialize)]
struct InvokeResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<Value>,
    #[serde(default)]
    url: Option<String>,
}

impl InvokeResponse {
    fn into_response(self) -> DeploymentResponse {
        let Some(message) = self.choices.into_iter().next().and_then(|choice| choice.message)
        else {
            return DeploymentResponse::default();
        };

        DeploymentResponse {
            content: message.content.as_ref().and_then(Value::as_str).map(str::to_owned),
            image_url: message.url,
        }
    }
}

fn truncate(body: &str) -> String {
    const LIMIT: usize = 512;
    if body.len() <= LIMIT {
        return body.to_owned();
    }
    let mut end = LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
