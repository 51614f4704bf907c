//! Run-level parameters threaded unchanged to every step.

use std::time::Duration;

/// Opaque run parameters: provider and model selection, sampling, deadlines.
///
/// Steps may read it but never write it, and it is never merged into the
/// pipeline context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeConfig {
    provider: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    step_timeout: Option<Duration>,
}

impl RuntimeConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the provider the model override belongs to.
    pub fn with_provider(mut self, provider: &str) -> Self {
        self.provider = Some(provider.to_string());
        self
    }

    /// Override the model of the configured provider.
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Bound the wall-clock time of each step.
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Model override for the backend called `reasoner`.
    ///
    /// An override bound to another provider does not apply; one without a
    /// provider applies to every backend.
    pub fn model_for(&self, reasoner: &str) -> Option<&str> {
        match self.provider() {
            Some(provider) if provider != reasoner => None,
            _ => self.model(),
        }
    }

    pub fn temperature(&self) -> Option<f32> {
        self.temperature
    }

    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout
    }
}
