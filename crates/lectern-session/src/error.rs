use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session expired: {0}")]
    Expired(String),

    #[error("Session limit reached ({limit} sessions)")]
    Full { limit: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No free session code after {attempts} attempts")]
    CodeExhausted { attempts: usize },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SessionError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
