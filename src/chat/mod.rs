pub mod anthropic;
pub mod keyring;
pub mod openai;

use std::future::Future;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub use anthropic::AnthropicChat;
pub use openai::OpenAiChat;

/// A chat completion endpoint that remembers the conversation so far.
pub trait ChatClient: Send + Sync + 'static {
    /// Send one user turn and return the full reply text.
    fn send_message(
        &self,
        api_key: &str,
        text: &str,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Forget every earlier turn.
    fn clear_history(&self);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    OpenAi,
    Anthropic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Conversation turns sent along with every request.
#[derive(Debug)]
pub struct History {
    system: String,
    turns: Mutex<Vec<ChatMessage>>,
}

impl History {
    pub fn new(system: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            turns: Mutex::new(Vec::new()),
        }
    }

    fn turns(&self) -> MutexGuard<'_, Vec<ChatMessage>> {
        self.turns.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn system(&self) -> &str {
        &self.system
    }

    /// Earlier turns followed by a new user message.
    pub fn with_user(&self, text: &str) -> Vec<ChatMessage> {
        let mut messages = self.turns().clone();
        messages.push(ChatMessage::new(Role::User, text));
        messages
    }

    /// Keep a completed exchange.
    pub fn record(&self, user: &str, assistant: &str) {
        let mut turns = self.turns();
        turns.push(ChatMessage::new(Role::User, user));
        turns.push(ChatMessage::new(Role::Assistant, assistant));
    }

    pub fn clear(&self) {
        self.turns().clear();
    }

    pub fn len(&self) -> usize {
        self.turns().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Turn a non-2xx response into an error carrying the status and body.
pub(crate) async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    if status == 401 {
        return Err(Error::InvalidApiKey);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(Error::Api { status, body })
}

/// Either supported backend, picked at runtime from settings.
#[derive(Debug)]
pub enum AnyChat {
    OpenAi(OpenAiChat),
    Anthropic(AnthropicChat),
}

impl AnyChat {
    pub fn new(provider: Provider, base_url: Option<&str>, model: Option<&str>) -> Self {
        match provider {
            Provider::OpenAi => {
                let mut chat = OpenAiChat::new();
                if let Some(url) = base_url {
                    chat = chat.with_base_url(url);
                }
                if let Some(model) = model {
                    chat = chat.with_model(model);
                }
                Self::OpenAi(chat)
            }
            Provider::Anthropic => {
                let mut chat = AnthropicChat::new();
                if let Some(url) = base_url {
                    chat = chat.with_base_url(url);
                }
                if let Some(model) = model {
                    chat = chat.with_model(model);
                }
                Self::Anthropic(chat)
            }
        }
    }

    /// Check the key with a minimal request.
    pub async fn verify_api_key(&self, api_key: &str) -> Result<String> {
        match self {
            Self::OpenAi(chat) => chat.verify_api_key(api_key).await,
            Self::Anthropic(chat) => chat.verify_api_key(api_key).await,
        }
    }
}

impl ChatClient for AnyChat {
    async fn send_message(&self, api_key: &str, text: &str) -> Result<String> {
        match self {
            Self::OpenAi(chat) => chat.send_message(api_key, text).await,
            Self::Anthropic(chat) => chat.send_message(api_key, text).await,
        }
    }

    fn clear_history(&self) {
        match self {
            Self::OpenAi(chat) => chat.clear_history(),
            Self::Anthropic(chat) => chat.clear_history(),
        }
    }
}

/// One-shot HTTP responder for exercising the clients without a network.
#[cfg(test)]
pub(crate) mod testing {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve `responses` in order, one per connection, returning the raw requests.
    pub async fn serve(responses: Vec<(u16, String)>) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let mut requests = Vec::new();
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                requests.push(read_request(&mut socket).await);
                let reply = format!(
                    "HTTP/1.1 {} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
            }
            requests
        });
        (url, handle)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (k, v) = l.split_once(':')?;
                        k.eq_ignore_ascii_case("content-length")
                            .then(|| v.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// A client that ignores proxy settings from the environment.
    pub fn client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    /// The JSON body of a raw request.
    pub fn body_of(request: &str) -> serde_json::Value {
        let (_, body) = request.split_once("\r\n\r\n").unwrap();
        serde_json::from_str(body).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_keeps_turn_order() {
        let history = History::new("You are a helpful assistant");
        history.record("hi", "hello");
        let messages = history.with_user("again");
        assert_eq!(
            messages,
            vec![
                ChatMessage::new(Role::User, "hi"),
                ChatMessage::new(Role::Assistant, "hello"),
                ChatMessage::new(Role::User, "again"),
            ]
        );
        history.clear();
        assert!(history.is_empty());
    }

    #[test]
    fn provider_names_are_lowercase() {
        assert_eq!(serde_json::to_string(&Provider::OpenAi).unwrap(), "\"openai\"");
        assert_eq!(
            serde_json::from_str::<Provider>("\"anthropic\"").unwrap(),
            Provider::Anthropic
        );
    }
}
