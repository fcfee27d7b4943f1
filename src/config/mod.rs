//! Configuration management for crewline

use crate::core::{AgentType, RunOptions};
use crate::llm::GenerateOptions;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "CREWLINE_CONFIG";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub coordination: CoordinationConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8765,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CoordinationConfig {
    pub max_iterations: u32,
    pub max_feedback_rounds: u32,
    /// Per agent call
    pub agent_timeout_secs: u64,
    /// Wall-clock budget for starting invocations, unlimited when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_budget_secs: Option<u64>,
    /// Sequential role order keyed by task type
    pub pipelines: BTreeMap<String, Vec<AgentType>>,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            max_feedback_rounds: 3,
            agent_timeout_secs: 120,
            time_budget_secs: None,
            pipelines: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    /// "openai" for any OpenAI-compatible endpoint, "sim" for the offline model
    pub provider: String,
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: Some("OPENAI_API_KEY".to_string()),
            temperature: 0.7,
            max_tokens: 2048,
            request_timeout_secs: 60,
        }
    }
}

impl LlmConfig {
    pub fn generate_options(&self) -> GenerateOptions {
        GenerateOptions {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

impl Config {
    /// Load from `$CREWLINE_CONFIG`, else the default location, else defaults
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if !path.is_empty() {
                return Self::load_from(path);
            }
        }

        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(config_path)
        } else {
            Ok(Config::default())
        }
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "crewline") {
            let config_dir = proj_dirs.config_dir();
            std::fs::create_dir_all(config_dir)?;
            Ok(config_dir.join("config.toml"))
        } else {
            Ok(PathBuf::from("config.toml"))
        }
    }

    /// Save configuration to the given path
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = self.to_toml()?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write {}", path.as_ref().display()))?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    /// Run limits from the config, with per-request overrides applied
    pub fn run_options(
        &self,
        max_iterations: Option<u32>,
        max_feedback_rounds: Option<u32>,
    ) -> RunOptions {
        let c = &self.coordination;
        let mut options = RunOptions::default()
            .with_max_iterations(max_iterations.unwrap_or(c.max_iterations))
            .with_max_feedback_rounds(max_feedback_rounds.unwrap_or(c.max_feedback_rounds))
            .with_agent_timeout(Duration::from_secs(c.agent_timeout_secs));
        if let Some(secs) = c.time_budget_secs {
            options = options.with_time_budget(Duration::from_secs(secs));
        }
        options
    }

    /// Configured pipelines in the form the coordinator takes
    pub fn pipelines(&self) -> std::collections::HashMap<String, Vec<AgentType>> {
        self.coordination
            .pipelines
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
