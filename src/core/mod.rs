//! Core types shared across the companion: configuration and errors.

mod config;
mod error;

pub use config::{AiConfig, ClaudeConfig, Config, LimitsConfig, OllamaConfig, StorageConfig};
pub use error::{CompanionError, Result};
