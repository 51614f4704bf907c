//! Claude API integration.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{parse_json_payload, render_prompt, PromptInputs, PromptKind, Reasoner, ReasonerError};
use crate::core::ClaudeConfig;
use crate::pipeline::RuntimeConfig;

/// Claude API backend.
pub struct ClaudeReasoner {
    client: Client,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl ClaudeReasoner {
    /// Create a new Claude reasoner.
    ///
    /// Reads API key from ANTHROPIC_API_KEY environment variable.
    pub fn new() -> Result<Self, ReasonerError> {
        Self::from_config(&ClaudeConfig::default())
    }

    /// Create from the `[ai.claude]` config section.
    pub fn from_config(config: &ClaudeConfig) -> Result<Self, ReasonerError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| ReasonerError::Unavailable("ANTHROPIC_API_KEY not set".to_string()))?;

        Ok(Self {
            client: Client::new(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    /// Create with a specific model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn system_prompt(kind: PromptKind) -> String {
        format!(
            "Respond with one JSON object matching this schema and no other text:\n{}",
            kind.output_schema()
        )
    }
}

#[async_trait]
impl Reasoner for ClaudeReasoner {
    async fn invoke(
        &self,
        kind: PromptKind,
        inputs: &PromptInputs,
        config: &RuntimeConfig,
    ) -> Result<Value, ReasonerError> {
        let request = ClaudeRequest {
            model: config.model_for(self.name()).unwrap_or(&self.model).to_string(),
            max_tokens: self.max_tokens,
            temperature: config.temperature(),
            system: Self::system_prompt(kind),
            messages: vec![Message {
                role: "user".to_string(),
                content: render_prompt(kind, inputs),
            }],
        };

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ReasonerError::Api(format!("Claude API error ({status}): {body}")));
        }

        let response: ClaudeResponse = response.json().await?;
        let text = response
            .content
            .first()
            .map(|c| c.text.as_str())
            .ok_or_else(|| ReasonerError::Api("No response from Claude".to_string()))?;

        parse_json_payload(text)
    }

    fn name(&self) -> &str {
        "claude"
    }

    async fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// Claude API request structure.
#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    system: String,
    messages: Vec<Message>,
}

/// Message in a Claude request.
#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

/// Claude API response structure.
#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ContentBlock>,
}

/// Content block in a Claude response.
#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: String,
}
