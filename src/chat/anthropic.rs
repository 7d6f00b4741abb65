use super::{ChatClient, ChatMessage, History, check_status};
use crate::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-haiku-4-5-20251001";
const API_VERSION: &str = "2023-06-01";
const SYSTEM_PROMPT: &str = "You are a helpful assistant";
const MAX_TOKENS: u32 = 1024;

/// Anthropic Messages API client.
#[derive(Debug)]
pub struct AnthropicChat {
    client: reqwest::Client,
    base_url: String,
    model: String,
    history: History,
}

impl AnthropicChat {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            history: History::new(SYSTEM_PROMPT),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// The system prompt travels outside the message list.
    pub fn request_body(&self, messages: &[ChatMessage], max_tokens: u32) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "system": self.history.system(),
            "messages": messages,
        })
    }

    async fn post(&self, api_key: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        Ok(resp.json().await?)
    }

    /// Verify the API key with a minimal request.
    pub async fn verify_api_key(&self, api_key: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": 4,
            "messages": [
                { "role": "user", "content": "Reply with OK" }
            ]
        });
        self.post(api_key, &body).await?;
        Ok("API key valid".to_string())
    }
}

impl Default for AnthropicChat {
    fn default() -> Self {
        Self::new()
    }
}

/// Text of the first content block.
pub fn reply_text(resp: &serde_json::Value) -> Result<String> {
    resp["content"]
        .as_array()
        .and_then(|arr| arr.first())
        .and_then(|block| block["text"].as_str())
        .map(str::to_string)
        .ok_or_else(|| Error::MalformedResponse("no text in API response".to_string()))
}

impl ChatClient for AnthropicChat {
    async fn send_message(&self, api_key: &str, text: &str) -> Result<String> {
        let body = self.request_body(&self.history.with_user(text), MAX_TOKENS);
        let resp = self.post(api_key, &body).await?;
        let reply = reply_text(&resp)?;
        self.history.record(text, &reply);
        Ok(reply)
    }

    fn clear_history(&self) {
        self.history.clear();
    }
}
