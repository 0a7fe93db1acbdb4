use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use ragcrew_core::config::LlmConfig;
use ragcrew_core::error::{Error, Result};
use ragcrew_core::traits::Generator;

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: String,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
///
/// Each prompt is sent as a single user turn after the configured system
/// prompt; the first choice's content is the completion.
pub struct OpenAiChatClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    system_prompt: String,
}

impl OpenAiChatClient {
    pub fn new(cfg: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(cfg.timeout_secs.map(Duration::from_secs))
            .build()
            .map_err(|e| Error::Connection(format!("llm client: {e}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", cfg.base_url.trim_end_matches('/')),
            api_key: cfg.api_key.clone(),
            model: cfg.model_name.clone(),
            system_prompt: cfg.system_prompt.clone(),
        })
    }
}

impl Generator for OpenAiChatClient {
    fn generate(&self, prompt: &str) -> Result<String> {
        debug!(model = %self.model, chars = prompt.chars().count(), "chat completion request");
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage { role: "system", content: &self.system_prompt },
                ChatMessage { role: "user", content: prompt },
            ],
        };
        let mut request = self.client.post(&self.endpoint).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }
        let response = request.send().map_err(|e| Error::Generation(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().unwrap_or_default();
            return Err(Error::Generation(format!("status {status}: {raw}")));
        }
        let parsed: ChatResponse =
            response.json().map_err(|e| Error::Generation(format!("invalid response body: {e}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::EmptyResponse(self.model.clone()))
    }
}
