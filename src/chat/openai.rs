use super::{ChatClient, ChatMessage, History, Role, check_status};
use crate::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
const SYSTEM_PROMPT: &str = "You are a helpful assistant";
const TEMPERATURE: f64 = 0.5;

/// OpenAI-compatible `/chat/completions` client.
#[derive(Debug)]
pub struct OpenAiChat {
    client: reqwest::Client,
    base_url: String,
    model: String,
    history: History,
}

impl OpenAiChat {
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

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    pub fn request_body(&self, messages: &[ChatMessage]) -> serde_json::Value {
        let mut all = Vec::with_capacity(messages.len() + 1);
        all.push(ChatMessage::new(Role::System, self.history.system()));
        all.extend_from_slice(messages);
        serde_json::json!({
            "model": self.model,
            "temperature": TEMPERATURE,
            "messages": all,
        })
    }

    async fn post(&self, api_key: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        let resp = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", api_key))
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

impl Default for OpenAiChat {
    fn default() -> Self {
        Self::new()
    }
}

/// Text of the first choice.
pub fn reply_text(resp: &serde_json::Value) -> Result<String> {
    resp["choices"]
        .as_array()
        .and_then(|arr| arr.first())
        .and_then(|choice| choice["message"]["content"].as_str())
        .map(str::to_string)
        .ok_or_else(|| Error::MalformedResponse("no message content in choices".to_string()))
}

impl ChatClient for OpenAiChat {
    async fn send_message(&self, api_key: &str, text: &str) -> Result<String> {
        let body = self.request_body(&self.history.with_user(text));
        let resp = self.post(api_key, &body).await?;
        let reply = reply_text(&resp)?;
        self.history.record(text, &reply);
        Ok(reply)
    }

    fn clear_history(&self) {
        self.history.clear();
    }
}
