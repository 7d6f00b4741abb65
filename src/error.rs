use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("reminder store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("access to reminders was denied")]
    AccessDenied,

    #[error("unknown calendar: {0}")]
    UnknownCalendar(String),

    #[error("failed to queue reminder after {queued} queued: {reason}")]
    Queue { queued: usize, reason: String },

    #[error("failed to commit reminders: {0}")]
    Commit(String),

    #[error("chat request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("chat API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid API key")]
    InvalidApiKey,

    #[error("malformed chat response: {0}")]
    MalformedResponse(String),

    #[error("drop payload could not be read: {0}")]
    Payload(String),

    #[error("keyring: {0}")]
    Keyring(String),

    #[error("settings: {0}")]
    Settings(#[from] serde_json::Error),
}
