//! Configuration management for the companion.
//!
//! Handles loading and saving configuration from TOML files.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::RuntimeConfig;
use crate::store::VersionScheme;
use crate::workflow::WorkflowSettings;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Snapshot storage settings
    pub storage: StorageConfig,

    /// Reasoner settings
    pub ai: AiConfig,

    /// Workflow policy limits
    pub limits: LimitsConfig,
}

/// Snapshot storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one sub-directory per workspace (`~` is expanded)
    pub root: String,

    /// How new version identifiers are minted
    pub version_scheme: VersionScheme,
}

/// Reasoner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Reasoner provider (ollama, claude)
    pub provider: String,

    /// Model override applied to every step
    pub model: Option<String>,

    /// Sampling temperature
    pub temperature: f32,

    /// Deadline for a single pipeline step, in seconds
    pub timeout_secs: u64,

    /// Ask the other provider when the configured one fails
    pub fallback: bool,

    /// Ollama-specific settings
    pub ollama: OllamaConfig,

    /// Claude-specific settings
    pub claude: ClaudeConfig,
}

/// Ollama configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Ollama server URL
    pub base_url: String,

    /// Model to use
    pub model: String,
}

/// Claude configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaudeConfig {
    /// Model to use
    pub model: String,

    /// Maximum tokens per response
    pub max_tokens: u32,
}

/// Policy limits enforced by the workflow callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum number of solution candidates per workspace
    pub max_candidates: usize,

    /// How much of each candidate's model text is shown as a negative example
    pub model_summary_chars: usize,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Looks for config in:
    /// 1. `.companion.toml` in current directory
    /// 2. `~/.config/companion/config.toml`
    /// 3. Falls back to defaults
    ///
    /// Environment overrides are applied on top of whichever source won.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_file_or_default()?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_file_or_default() -> anyhow::Result<Self> {
        // Try local config first
        let local_config = PathBuf::from(".companion.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        // Try global config
        if let Some(global_config) = Self::config_path() {
            if global_config.exists() {
                return Self::load_from_file(&global_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the global config file.
    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;

        Ok(())
    }

    /// Apply `COMPANION_WORKSPACES`, `OLLAMA_HOST` and `OLLAMA_MODEL`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(root) = std::env::var("COMPANION_WORKSPACES") {
            self.storage.root = root;
        }
        if let Ok(host) = std::env::var("OLLAMA_HOST") {
            self.ai.ollama.base_url = host;
        }
        if let Ok(model) = std::env::var("OLLAMA_MODEL") {
            self.ai.ollama.model = model;
        }
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(crate::APP_NAME))
    }

    /// Get the global config file path.
    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("config.toml"))
    }

    /// Resolve the workspaces root directory.
    pub fn workspaces_root(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.storage.root).into_owned())
    }

    /// Build the runtime parameters threaded through every pipeline step.
    pub fn runtime(&self) -> RuntimeConfig {
        let mut runtime = RuntimeConfig::default()
            .with_provider(&self.ai.provider)
            .with_temperature(self.ai.temperature);

        if let Some(ref model) = self.ai.model {
            runtime = runtime.with_model(model);
        }
        if self.ai.timeout_secs > 0 {
            runtime = runtime.with_step_timeout(Duration::from_secs(self.ai.timeout_secs));
        }

        runtime
    }

    /// Build workflow settings from storage and limit configuration.
    pub fn workflow_settings(&self) -> WorkflowSettings {
        WorkflowSettings {
            version_scheme: self.storage.version_scheme,
            max_candidates: self.limits.max_candidates,
            model_summary_chars: self.limits.model_summary_chars,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { root: "workspaces".to_string(), version_scheme: VersionScheme::Sequential }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: None,
            temperature: 0.1,
            timeout_secs: 300,
            fallback: false,
            ollama: OllamaConfig::default(),
            claude: ClaudeConfig::default(),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self { base_url: "http://localhost:11434".to_string(), model: "gemma3:27b".to_string() }
    }
}

impl Default for ClaudeConfig {
    fn default() -> Self {
        Self { model: "claude-sonnet-4-20250514".to_string(), max_tokens: 4096 }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self { max_candidates: 10, model_summary_chars: 200 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.storage.root, "workspaces");
        assert_eq!(config.storage.version_scheme, VersionScheme::Sequential);
        assert_eq!(config.ai.provider, "ollama");
        assert!(!config.ai.fallback);
        assert_eq!(config.limits.max_candidates, 10);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("[storage]"));
        assert!(toml_str.contains("[ai.ollama]"));
        assert!(toml_str.contains("[limits]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [storage]
            root = "/tmp/designs"
            version_scheme = "random"

            [ai]
            provider = "claude"
            temperature = 0.4
            timeout_secs = 30
            fallback = true

            [limits]
            max_candidates = 5
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.storage.root, "/tmp/designs");
        assert_eq!(config.storage.version_scheme, VersionScheme::Random);
        assert_eq!(config.ai.provider, "claude");
        assert!(config.ai.fallback);
        assert_eq!(config.limits.max_candidates, 5);
        // Untouched sections keep their defaults
        assert_eq!(config.limits.model_summary_chars, 200);
        assert_eq!(config.ai.ollama.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_workspaces_root_expands_tilde() {
        let mut config = Config::default();
        config.storage.root = "~/designs".to_string();
        let root = config.workspaces_root();
        assert!(!root.to_string_lossy().starts_with('~'));
        assert!(root.ends_with("designs"));
    }

    #[test]
    fn test_runtime_from_config() {
        let mut config = Config::default();
        config.ai.model = Some("llama3.2".to_string());
        config.ai.timeout_secs = 12;

        let runtime = config.runtime();
        assert_eq!(runtime.model(), Some("llama3.2"));
        assert_eq!(runtime.provider(), Some("ollama"));
        assert_eq!(runtime.step_timeout(), Some(Duration::from_secs(12)));
    }

    #[test]
    fn test_zero_timeout_disables_deadline() {
        let mut config = Config::default();
        config.ai.timeout_secs = 0;
        assert_eq!(config.runtime().step_timeout(), None);
    }

    #[test]
    #[serial_test::serial]
    fn test_env_overrides() {
        std::env::set_var("COMPANION_WORKSPACES", "/srv/companion");
        std::env::set_var("OLLAMA_MODEL", "qwen2.5");

        let mut config = Config::default();
        config.apply_env_overrides();

        std::env::remove_var("COMPANION_WORKSPACES");
        std::env::remove_var("OLLAMA_MODEL");

        assert_eq!(config.storage.root, "/srv/companion");
        assert_eq!(config.ai.ollama.model, "qwen2.5");
    }
}
