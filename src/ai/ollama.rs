//! Ollama local LLM integration.
//!
//! Uses the chat endpoint with structured output: the expected JSON schema is
//! sent as `format`, so the model is constrained to the document shape.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{parse_json_payload, render_prompt, PromptInputs, PromptKind, Reasoner, ReasonerError};
use crate::core::OllamaConfig;
use crate::pipeline::RuntimeConfig;

/// Ollama API backend for local models.
pub struct OllamaReasoner {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaReasoner {
    /// Create a new Ollama reasoner with default settings.
    ///
    /// Uses `OLLAMA_HOST` and `OLLAMA_MODEL` when set, otherwise
    /// localhost:11434 and gemma3:27b.
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: std::env::var("OLLAMA_HOST")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            model: std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| "gemma3:27b".to_string()),
        }
    }

    /// Create from the `[ai.ollama]` config section.
    pub fn from_config(config: &OllamaConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
        }
    }

    /// Create with a specific base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Create with a specific model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn build_request(
        &self,
        kind: PromptKind,
        inputs: &PromptInputs,
        config: &RuntimeConfig,
    ) -> ChatRequest {
        ChatRequest {
            model: config.model_for(self.name()).unwrap_or(&self.model).to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: render_prompt(kind, inputs),
            }],
            stream: false,
            format: kind.output_schema(),
            options: ChatOptions { temperature: config.temperature() },
        }
    }
}

impl Default for OllamaReasoner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Reasoner for OllamaReasoner {
    async fn invoke(
        &self,
        kind: PromptKind,
        inputs: &PromptInputs,
        config: &RuntimeConfig,
    ) -> Result<Value, ReasonerError> {
        let request = self.build_request(kind, inputs, config);
        tracing::debug!(model = request.model, %kind, "Sending Ollama chat request");

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ReasonerError::Api(format!("Ollama API error ({status}): {body}")));
        }

        let response: ChatResponse = response.json().await?;
        parse_json_payload(&response.message.content)
    }

    fn name(&self) -> &str {
        "ollama"
    }

    async fn is_available(&self) -> bool {
        // Try to reach the Ollama API
        let result = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(std::time::Duration::from_secs(2))
            .send()
            .await;

        result.is_ok()
    }
}

/// Ollama chat request.
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    format: Value,
    options: ChatOptions,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Ollama chat response.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_from_config() {
        let reasoner = OllamaReasoner::from_config(&OllamaConfig::default());
        assert_eq!(reasoner.name(), "ollama");
        assert_eq!(reasoner.base_url, "http://localhost:11434");
        assert_eq!(reasoner.model, "gemma3:27b");
    }

    #[test]
    fn test_ollama_with_custom_url() {
        let reasoner = OllamaReasoner::new().with_base_url("http://custom:8080");
        assert_eq!(reasoner.base_url, "http://custom:8080");
    }

    #[test]
    fn test_request_uses_runtime_overrides() {
        let reasoner = OllamaReasoner::new().with_model("llama3.2");
        let config = RuntimeConfig::new().with_model("qwen2.5").with_temperature(0.1);

        let request =
            reasoner.build_request(PromptKind::CheckConsistency, &PromptInputs::new(), &config);
        assert_eq!(request.model, "qwen2.5");
        assert!(!request.stream);
        assert_eq!(request.format["required"][0], "items");

        let json = serde_json::to_value(&request).unwrap();
        assert!(json["options"]["temperature"].as_f64().is_some());
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_request_defaults_to_own_model() {
        let reasoner = OllamaReasoner::new().with_model("llama3.2");
        let request = reasoner.build_request(
            PromptKind::ExtractProblem,
            &PromptInputs::new(),
            &RuntimeConfig::new(),
        );
        assert_eq!(request.model, "llama3.2");

        let json = serde_json::to_value(&request).unwrap();
        assert!(json["options"].get("temperature").is_none());
    }

    #[test]
    fn test_request_ignores_other_provider_model() {
        let reasoner = OllamaReasoner::new().with_model("llama3.2");
        let config = RuntimeConfig::new().with_provider("claude").with_model("claude-sonnet-4");

        let request =
            reasoner.build_request(PromptKind::RefineProblem, &PromptInputs::new(), &config);
        assert_eq!(request.model, "llama3.2");
    }
}
