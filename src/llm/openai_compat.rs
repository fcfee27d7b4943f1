//! Client for any API that follows the OpenAI chat completions format
//!
//! SECURITY: the API key is only sent to the configured base URL.

use super::{GenerateOptions, LlmClient, LlmError, Message, Prompt};
use crate::config::LlmConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub struct OpenAiCompatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompatClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            model: model.into(),
        }
    }

    /// Build from the `[llm]` config section. The key is read from the
    /// environment variable named by `api_key_env`.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = match config.api_key_env.as_deref() {
            Some(var) if !var.is_empty() => Some(std::env::var(var).map_err(|_| {
                LlmError::NotConfigured(format!("{} environment variable not set", var))
            })?),
            _ => None,
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| LlmError::Other(e.into()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
        })
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        prompt: &Prompt,
        options: &GenerateOptions,
    ) -> Result<String, LlmError> {
        tracing::debug!(
            target: "llm",
            model = %self.model,
            messages = prompt.messages.len(),
            "Sending chat request"
        );

        let request = ChatRequest {
            model: &self.model,
            messages: &prompt.messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        let mut http_req = self.client.post(self.endpoint()).json(&request);
        if let Some(key) = &self.api_key {
            http_req = http_req.bearer_auth(key);
        }

        let response = http_req
            .send()
            .await
            .map_err(LlmError::from_network_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::from_http_status(status, error_text));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| LlmError::InvalidResponse("response has no message content".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn parses_first_choice() {
        let app = Router::new().route(
            "/chat/completions",
            post(|Json(body): Json<Value>| async move {
                let echoed = body["messages"][1]["content"].as_str().unwrap_or("").to_string();
                Json(json!({
                    "choices": [{ "message": { "role": "assistant", "content": format!("echo: {}", echoed) } }]
                }))
            }),
        );
        let base = serve(app).await;

        let client = OpenAiCompatClient::new(base, "test-model");
        let text = client
            .generate(&Prompt::new("sys", "hello"), &GenerateOptions::default())
            .await
            .unwrap();
        assert_eq!(text, "echo: hello");
    }

    #[tokio::test]
    async fn maps_rate_limit_status() {
        let app = Router::new().route(
            "/chat/completions",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        );
        let base = serve(app).await;

        let client = OpenAiCompatClient::new(base, "test-model").with_api_key("k");
        let err = client
            .generate(&Prompt::new("sys", "hello"), &GenerateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::RateLimited(ref m) if m == "slow down"));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn empty_content_is_invalid() {
        let app = Router::new().route(
            "/chat/completions",
            post(|| async { Json(json!({ "choices": [] })) }),
        );
        let base = serve(app).await;

        let client = OpenAiCompatClient::new(base, "test-model");
        let err = client
            .generate(&Prompt::new("sys", "hello"), &GenerateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
    }

    #[test]
    fn missing_key_env_is_not_configured() {
        let config = LlmConfig {
            api_key_env: Some("CREWLINE_TEST_KEY_THAT_IS_NOT_SET".to_string()),
            ..LlmConfig::default()
        };
        let err = OpenAiCompatClient::from_config(&config).err().unwrap();
        assert!(matches!(err, LlmError::NotConfigured(_)));
    }
}
