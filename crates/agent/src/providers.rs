//! HTTP clients for the supported model providers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use ordermate_core::config::{LlmConfig, LlmProvider};

use crate::llm::{ChatMessage, ChatRole, CompletionRequest, LlmClient, LlmError};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub fn client_from_config(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    let http = Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs.max(1)))
        .build()
        .map_err(|error| LlmError::NotConfigured(format!("http client: {error}")))?;

    let client: Arc<dyn LlmClient> = match config.provider {
        LlmProvider::OpenAi => Arc::new(OpenAiCompatibleClient {
            http,
            endpoint: chat_endpoint(config.base_url.as_deref().unwrap_or(OPENAI_BASE_URL)),
            api_key: Some(required_key(config)?),
            model: config.model.clone(),
        }),
        LlmProvider::Ollama => Arc::new(OpenAiCompatibleClient {
            http,
            endpoint: ollama_endpoint(config.base_url.as_deref().unwrap_or(OLLAMA_BASE_URL)),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }),
        LlmProvider::Anthropic => Arc::new(AnthropicClient {
            http,
            endpoint: format!(
                "{}/messages",
                config.base_url.as_deref().unwrap_or(ANTHROPIC_BASE_URL).trim_end_matches('/')
            ),
            api_key: required_key(config)?,
            model: config.model.clone(),
        }),
    };
    Ok(client)
}

fn required_key(config: &LlmConfig) -> Result<SecretString, LlmError> {
    config
        .api_key
        .clone()
        .filter(|key| !key.expose_secret().trim().is_empty())
        .ok_or_else(|| {
            LlmError::NotConfigured(format!("{} requires llm.api_key", config.provider.as_str()))
        })
}

fn chat_endpoint(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

fn ollama_endpoint(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with("/v1") {
        chat_endpoint(base)
    } else {
        chat_endpoint(&format!("{base}/v1"))
    }
}

fn transport_error(error: reqwest::Error) -> LlmError {
    if error.is_timeout() {
        LlmError::Timeout(0)
    } else {
        LlmError::Transport(error.to_string())
    }
}

/// OpenAI chat completions, also spoken by Ollama's `/v1` surface.
pub struct OpenAiCompatibleClient {
    http: Client,
    endpoint: String,
    api_key: Option<SecretString>,
    model: String,
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let body = OpenAiRequest {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let mut call = self.http.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            call = call.bearer_auth(key.expose_secret());
        }

        let response = call.send().await.map_err(transport_error)?;
        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(LlmError::from_status(status.as_u16(), &text));
        }

        let parsed: OpenAiResponse = serde_json::from_str(&text)
            .map_err(|error| LlmError::InvalidResponse(error.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| LlmError::InvalidResponse("no choices in completion".to_string()))
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

pub struct AnthropicClient {
    http: Client,
    endpoint: String,
    api_key: SecretString,
    model: String,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "String::is_empty")]
    system: String,
    messages: Vec<AnthropicMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicBlock>,
}

#[derive(Deserialize)]
struct AnthropicBlock {
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        // System turns are hoisted; the messages API takes them separately.
        let system = request
            .messages
            .iter()
            .filter(|message| message.role == ChatRole::System)
            .map(|message| message.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let messages = request
            .messages
            .iter()
            .filter_map(|message| match message.role {
                ChatRole::System => None,
                ChatRole::User => Some(AnthropicMessage { role: "user", content: &message.content }),
                ChatRole::Assistant => {
                    Some(AnthropicMessage { role: "assistant", content: &message.content })
                }
            })
            .collect();

        let body = AnthropicRequest {
            model: &self.model,
            system,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(LlmError::from_status(status.as_u16(), &text));
        }

        let parsed: AnthropicResponse = serde_json::from_str(&text)
            .map_err(|error| LlmError::InvalidResponse(error.to_string()))?;
        let content = parsed
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");
        if content.trim().is_empty() {
            return Err(LlmError::InvalidResponse("empty message content".to_string()));
        }
        Ok(content.trim().to_string())
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
