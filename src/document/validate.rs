//! Schema validation for untyped documents.
//!
//! Missing fields take their defaults; present fields with the wrong shape are
//! rejected as [`CompanionError::MalformedDocument`].

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::allocator::sanitize;
use super::model::{ProblemSpace, SolutionSpace, Workspace};
use crate::core::{CompanionError, Result};

/// A document type that can be validated from a key/value structure.
pub trait Document: DeserializeOwned {
    /// Human-readable kind used in error messages.
    const KIND: &'static str;

    /// Normalize after a successful parse.
    fn normalize(self) -> Self {
        self
    }
}

impl Document for ProblemSpace {
    const KIND: &'static str = "ProblemSpace";
}

impl Document for SolutionSpace {
    const KIND: &'static str = "SolutionSpace";

    fn normalize(self) -> Self {
        sanitize(self)
    }
}

impl Document for Workspace {
    const KIND: &'static str = "Workspace";

    fn normalize(mut self) -> Self {
        self.solution_space = self.solution_space.map(sanitize);
        self
    }
}

/// Parse an untyped value into a typed document.
pub fn validate<T: Document>(raw: &Value) -> Result<T> {
    if !raw.is_object() {
        return Err(CompanionError::MalformedDocument(format!(
            "{} must be an object, got {}",
            T::KIND,
            kind_of(raw)
        )));
    }

    T::deserialize(raw)
        .map(Document::normalize)
        .map_err(|e| CompanionError::MalformedDocument(format!("{}: {e}", T::KIND)))
}

/// Parse a problem space.
pub fn validate_problem_space(raw: &Value) -> Result<ProblemSpace> {
    validate(raw)
}

/// Parse a solution space, dropping duplicate candidate ids.
pub fn validate_solution_space(raw: &Value) -> Result<SolutionSpace> {
    validate(raw)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
