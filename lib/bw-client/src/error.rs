use thiserror::Error;

/// Message the backend uses for a missing object.
pub const NOT_FOUND_MESSAGE: &str = "Not found.";

#[derive(Debug, Error)]
pub enum BwError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed backend response: {0}")]
    Decode(String),

    #[error("Backend error: {message}")]
    Backend { message: String },

    #[error("Object not found")]
    NotFound,

    #[error("Attachment not found")]
    AttachmentNotFound,

    #[error("{transport} client doesn't support {operation}")]
    Unsupported {
        operation: &'static str,
        transport: &'static str,
    },

    #[error("Attachment state inconsistent: {0}")]
    ConsistencyViolation(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid object: {0}")]
    InvalidObject(String),

    #[error("Client configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BwError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Maps the backend's "Not found." failure onto [`BwError::NotFound`].
    ///
    /// Only lookups use this; deletes keep the generic failure on the REST transport.
    pub fn recognize_not_found(self) -> Self {
        match self {
            Self::Backend { message } if message == NOT_FOUND_MESSAGE => Self::NotFound,
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

impl From<serde_json::Error> for BwError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

impl From<reqwest::Error> for BwError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}
