use thiserror::Error;

/// Auth error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Sign-in failed: {0}")]
    SignIn(String),

    #[error("Device code expired")]
    DeviceCodeExpired,

    #[error("Access denied")]
    AccessDenied,

    #[error("Token refresh failed: {0}")]
    Refresh(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type AuthResult<T> = std::result::Result<T, AuthError>;
