/// Shared error type used across all LearnHub crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    /// 401/403 from the backend, or an operation that needs a credential
    /// was attempted without one.
    #[error("auth: {0}")]
    Auth(String),

    /// Any other 4xx. `message` is the server-provided text when one could
    /// be extracted from the body.
    #[error("validation ({status}): {}", .message.as_deref().unwrap_or("request rejected"))]
    Validation {
        status: u16,
        message: Option<String>,
    },

    #[error("server ({status}): {}", .message.as_deref().unwrap_or("internal error"))]
    Server {
        status: u16,
        message: Option<String>,
    },

    #[error("credential store: {0}")]
    Credential(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// The human-readable message the backend attached to this error, if any.
    ///
    /// Transport and local errors have none; callers substitute their own
    /// per-operation fallback.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Error::Validation { message, .. } | Error::Server { message, .. } => {
                message.as_deref()
            }
            Error::Auth(msg) if !msg.is_empty() => Some(msg.as_str()),
            _ => None,
        }
    }

    /// True for 401/403 responses and missing-credential errors.
    pub fn is_auth(&self) -> bool {
        matches!(self, Error::Auth(_))
    }

    /// True for failures that never reached an HTTP response.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Http(_) | Error::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
