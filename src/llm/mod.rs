//! Language-model client boundary
//!
//! Role agents talk to a model only through [`LlmClient`]. Two clients ship:
//! an OpenAI-compatible HTTP client and a deterministic offline simulator.

mod error;
mod openai_compat;
mod sim;
mod types;

pub use error::LlmError;
pub use openai_compat::OpenAiCompatClient;
pub use sim::SimLlm;
pub use types::{GenerateOptions, Message, Prompt, Role};

use crate::config::LlmConfig;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// A text-generation backend
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Provider name, for logs and the agents listing
    fn name(&self) -> &str;

    /// Model identifier sent to the provider
    fn model(&self) -> &str;

    /// Generate a completion for the prompt
    async fn generate(&self, prompt: &Prompt, options: &GenerateOptions)
        -> Result<String, LlmError>;
}

/// Create the client named by `config.provider`
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    match config.provider.as_str() {
        "openai" | "openai_compat" => {
            let client = OpenAiCompatClient::from_config(config)?;
            Ok(Arc::new(client))
        }
        "sim" => Ok(Arc::new(SimLlm::new())),
        other => anyhow::bail!(
            "Unknown LLM provider: {}. Supported: openai, sim",
            other
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_sim_client() {
        let config = LlmConfig {
            provider: "sim".to_string(),
            ..LlmConfig::default()
        };
        let client = create_client(&config).unwrap();
        assert_eq!(client.name(), "sim");
    }

    #[test]
    fn rejects_unknown_provider() {
        let config = LlmConfig {
            provider: "carrier-pigeon".to_string(),
            ..LlmConfig::default()
        };
        let err = create_client(&config).err().unwrap();
        assert!(err.to_string().contains("Unknown LLM provider"));
    }
}
