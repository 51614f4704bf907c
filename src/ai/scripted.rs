//! Scripted reasoner for tests and offline runs.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::{PromptInputs, PromptKind, Reasoner, ReasonerError};
use crate::pipeline::RuntimeConfig;

/// A recorded invocation.
#[derive(Debug, Clone)]
pub struct ScriptedCall {
    pub kind: PromptKind,
    pub inputs: PromptInputs,
}

/// Returns queued responses per prompt kind, in order.
///
/// An invocation with nothing queued for its kind fails with
/// [`ReasonerError::Unavailable`].
#[derive(Debug)]
pub struct ScriptedReasoner {
    name: String,
    delay: Option<Duration>,
    queues: Mutex<HashMap<PromptKind, VecDeque<Result<Value, String>>>>,
    calls: Mutex<Vec<ScriptedCall>>,
}

impl ScriptedReasoner {
    pub fn new() -> Self {
        Self::named("scripted")
    }

    /// Create a reasoner reporting `name`.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            delay: None,
            queues: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue a response for `kind`.
    pub fn respond(self, kind: PromptKind, value: Value) -> Self {
        self.push(kind, value);
        self
    }

    /// Queue a failure for `kind`.
    pub fn fail(self, kind: PromptKind, message: impl Into<String>) -> Self {
        self.queues.lock().entry(kind).or_default().push_back(Err(message.into()));
        self
    }

    /// Sleep before answering every invocation.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a response through a shared reference.
    pub fn push(&self, kind: PromptKind, value: Value) {
        self.queues.lock().entry(kind).or_default().push_back(Ok(value));
    }

    /// All invocations so far, oldest first.
    pub fn calls(&self) -> Vec<ScriptedCall> {
        self.calls.lock().clone()
    }

    /// Number of invocations of `kind`.
    pub fn call_count(&self, kind: PromptKind) -> usize {
        self.calls.lock().iter().filter(|c| c.kind == kind).count()
    }

    /// Responses still queued across all kinds.
    pub fn pending(&self) -> usize {
        self.queues.lock().values().map(VecDeque::len).sum()
    }
}

impl Default for ScriptedReasoner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Reasoner for ScriptedReasoner {
    async fn invoke(
        &self,
        kind: PromptKind,
        inputs: &PromptInputs,
        _config: &RuntimeConfig,
    ) -> Result<Value, ReasonerError> {
        self.calls.lock().push(ScriptedCall { kind, inputs: inputs.clone() });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.queues.lock().get_mut(&kind).and_then(VecDeque::pop_front);
        match next {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(ReasonerError::Api(message)),
            None => Err(ReasonerError::Unavailable(format!("no scripted response for {kind}"))),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_responses_in_order() {
        let reasoner = ScriptedReasoner::new()
            .respond(PromptKind::CheckConsistency, json!({ "items": ["a"] }))
            .respond(PromptKind::CheckConsistency, json!({ "items": ["b"] }));
        let config = RuntimeConfig::new();
        let inputs = PromptInputs::new();

        let first = reasoner.invoke(PromptKind::CheckConsistency, &inputs, &config).await.unwrap();
        let second = reasoner.invoke(PromptKind::CheckConsistency, &inputs, &config).await.unwrap();
        assert_eq!(first["items"][0], "a");
        assert_eq!(second["items"][0], "b");
        assert_eq!(reasoner.call_count(PromptKind::CheckConsistency), 2);
        assert_eq!(reasoner.pending(), 0);
    }

    #[tokio::test]
    async fn test_failure_and_empty_queue() {
        let reasoner = ScriptedReasoner::new().fail(PromptKind::ExtractProblem, "model offline");
        let config = RuntimeConfig::new();
        let inputs = PromptInputs::new();

        let err = reasoner.invoke(PromptKind::ExtractProblem, &inputs, &config).await.unwrap_err();
        assert!(matches!(err, ReasonerError::Api(_)));

        let err = reasoner.invoke(PromptKind::ExtractProblem, &inputs, &config).await.unwrap_err();
        assert!(matches!(err, ReasonerError::Unavailable(_)));
        assert_eq!(reasoner.calls().len(), 2);
    }
}
