use thiserror::Error;

#[derive(Error, Debug)]
pub enum CortexError {
    #[error("Conversation not found: {0}")]
    NotFound(String),

    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Invalid conversation id: {0:?}")]
    InvalidId(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CortexError {
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote(message.into())
    }

    /// True for failures of the remote provider call.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

impl From<reqwest::Error> for CortexError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Remote(format!("request timed out: {e}"))
        } else {
            Self::Remote(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, CortexError>;
