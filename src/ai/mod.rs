//! Reasoning backends.
//!
//! The workflows never talk to a model directly. Every step that needs
//! judgement calls [`Reasoner::invoke`] with a [`PromptKind`] and a map of
//! named inputs, and receives an untyped JSON value that the caller then
//! validates into a document.
//!
//! ## Backends
//!
//! - [`OllamaReasoner`]: local models through the Ollama chat API
//! - [`ClaudeReasoner`]: the Anthropic messages API
//! - [`ScriptedReasoner`]: canned responses for tests and offline runs
//!
//! [`ReasonerChain`] wraps the configured backend. With `ai.fallback` set it
//! also holds the other provider and asks it when the first one fails.

#[cfg(feature = "ai")]
mod claude;
#[cfg(feature = "ai")]
mod ollama;
mod prompts;
mod scripted;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde_json::{json, Value};

#[cfg(feature = "ai")]
pub use claude::ClaudeReasoner;
#[cfg(feature = "ai")]
pub use ollama::OllamaReasoner;
pub use prompts::{format_observations, problem_inputs, render_prompt, summarize_candidates};
pub use scripted::{ScriptedCall, ScriptedReasoner};

use crate::core::{AiConfig, CompanionError};
use crate::pipeline::RuntimeConfig;

/// Named inputs for a prompt.
pub type PromptInputs = BTreeMap<String, Value>;

/// The five kinds of judgement the workflows ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PromptKind {
    /// Structure free text into a ProblemSpace
    ExtractProblem,

    /// Review a ProblemSpace, producing `{items: [String]}`
    CheckConsistency,

    /// Revise a ProblemSpace against observations
    RefineProblem,

    /// Propose one new SolutionCandidate
    GenerateCandidate,

    /// Compare all candidates and recommend one
    CompareSolutions,
}

impl PromptKind {
    pub const ALL: [Self; 5] = [
        Self::ExtractProblem,
        Self::CheckConsistency,
        Self::RefineProblem,
        Self::GenerateCandidate,
        Self::CompareSolutions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExtractProblem => "extract_problem",
            Self::CheckConsistency => "check_consistency",
            Self::RefineProblem => "refine_problem",
            Self::GenerateCandidate => "generate_candidate",
            Self::CompareSolutions => "compare_solutions",
        }
    }

    /// JSON schema of the value a backend must return for this kind.
    pub fn output_schema(&self) -> Value {
        let string_list = json!({ "type": "array", "items": { "type": "string" } });

        match self {
            Self::ExtractProblem | Self::RefineProblem => json!({
                "type": "object",
                "properties": {
                    "context": { "type": "string" },
                    "invariants": string_list,
                    "goal": { "type": "string" },
                    "problem": { "type": "string" },
                    "variants": string_list,
                },
                "required": ["context", "invariants", "goal", "problem", "variants"],
            }),
            Self::CheckConsistency => json!({
                "type": "object",
                "properties": { "items": string_list },
                "required": ["items"],
            }),
            Self::GenerateCandidate => json!({
                "type": "object",
                "properties": {
                    "hypothesis": { "type": "string" },
                    "model": { "type": "string" },
                    "reasoning": { "type": "string" },
                },
                "required": ["hypothesis", "model", "reasoning"],
            }),
            Self::CompareSolutions => json!({
                "type": "object",
                "properties": {
                    "analysis": { "type": "string" },
                    "recommendation": { "type": "string" },
                    "simplification_feedback": { "type": "string" },
                },
                "required": ["analysis", "recommendation", "simplification_feedback"],
            }),
        }
    }
}

impl fmt::Display for PromptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An external reasoning capability.
#[async_trait]
pub trait Reasoner: Send + Sync {
    /// Produce a structured value for `kind` from `inputs`.
    async fn invoke(
        &self,
        kind: PromptKind,
        inputs: &PromptInputs,
        config: &RuntimeConfig,
    ) -> Result<Value, ReasonerError>;

    /// Get the backend name.
    fn name(&self) -> &str;

    /// Check if the backend can be reached.
    async fn is_available(&self) -> bool {
        true
    }
}

/// Reasoner error types.
#[derive(Debug, thiserror::Error)]
pub enum ReasonerError {
    #[error("Provider not available: {0}")]
    Unavailable(String),

    #[error("API error: {0}")]
    Api(String),

    #[cfg(feature = "ai")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Response is not valid JSON: {0}")]
    InvalidResponse(String),

    #[error("Every reasoner failed for {0}")]
    Exhausted(PromptKind),
}

impl From<ReasonerError> for CompanionError {
    fn from(e: ReasonerError) -> Self {
        Self::ReasonerFailure(e.to_string())
    }
}

/// Reasoner with optional fallback.
///
/// Backends are tried in insertion order; a failing backend is logged and
/// the next one is asked. A chain of one backend returns that backend's error
/// unchanged.
#[derive(Default)]
pub struct ReasonerChain {
    reasoners: Vec<Box<dyn Reasoner>>,
}

impl ReasonerChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a backend.
    pub fn with(mut self, reasoner: impl Reasoner + 'static) -> Self {
        self.reasoners.push(Box::new(reasoner));
        self
    }

    /// Build the chain described by the `[ai]` config section.
    ///
    /// Only the configured provider is used unless `fallback` is set, in
    /// which case the other provider is asked when it fails. Claude joins as
    /// a fallback only when `ANTHROPIC_API_KEY` is set.
    #[cfg(feature = "ai")]
    pub fn from_config(config: &AiConfig) -> Result<Self, CompanionError> {
        let chain = match config.provider.as_str() {
            "ollama" => {
                let chain = Self::new().with(OllamaReasoner::from_config(&config.ollama));
                match ClaudeReasoner::from_config(&config.claude) {
                    Ok(claude) if config.fallback => chain.with(claude),
                    _ => chain,
                }
            }
            "claude" => {
                let claude = ClaudeReasoner::from_config(&config.claude)
                    .map_err(|e| CompanionError::Config(e.to_string()))?;
                let chain = Self::new().with(claude);
                if config.fallback {
                    chain.with(OllamaReasoner::from_config(&config.ollama))
                } else {
                    chain
                }
            }
            other => {
                return Err(CompanionError::Config(format!(
                    "unknown reasoner provider '{other}' (expected ollama or claude)"
                )));
            }
        };

        Ok(chain)
    }

    /// Build the chain described by the `[ai]` config section.
    #[cfg(not(feature = "ai"))]
    pub fn from_config(config: &AiConfig) -> Result<Self, CompanionError> {
        Err(CompanionError::Config(format!(
            "provider '{}' requires the `ai` feature",
            config.provider
        )))
    }

    pub fn is_empty(&self) -> bool {
        self.reasoners.is_empty()
    }

    /// Names of the backends in the order they are tried.
    pub fn names(&self) -> Vec<&str> {
        self.reasoners.iter().map(|r| r.name()).collect()
    }
}

#[async_trait]
impl Reasoner for ReasonerChain {
    async fn invoke(
        &self,
        kind: PromptKind,
        inputs: &PromptInputs,
        config: &RuntimeConfig,
    ) -> Result<Value, ReasonerError> {
        let mut last = None;
        for reasoner in &self.reasoners {
            match reasoner.invoke(kind, inputs, config).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    tracing::warn!(
                        reasoner = reasoner.name(),
                        %kind,
                        error = %e,
                        "Reasoner failed"
                    );
                    last = Some(e);
                }
            }
        }

        match last {
            Some(e) if self.reasoners.len() == 1 => Err(e),
            _ => Err(ReasonerError::Exhausted(kind)),
        }
    }

    fn name(&self) -> &str {
        self.reasoners.first().map(|r| r.name()).unwrap_or("none")
    }

    async fn is_available(&self) -> bool {
        for reasoner in &self.reasoners {
            if reasoner.is_available().await {
                return true;
            }
        }
        false
    }
}

/// Parse a model reply as JSON.
///
/// Accepts bare JSON, JSON wrapped in a Markdown code fence, or JSON embedded
/// in surrounding prose.
pub fn parse_json_payload(text: &str) -> Result<Value, ReasonerError> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    let unfenced = strip_fence(trimmed);
    if let Ok(value) = serde_json::from_str(unfenced) {
        return Ok(value);
    }

    if let (Some(start), Some(end)) = (unfenced.find('{'), unfenced.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str(&unfenced[start..=end]) {
                return Ok(value);
            }
        }
    }

    let preview: String = trimmed.chars().take(120).collect();
    Err(ReasonerError::InvalidResponse(preview))
}

fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (`json`, `JSON`, ...) on the opening line.
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
