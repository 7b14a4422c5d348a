use thiserror::Error;

/// Entry API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Authorization failed and the retry-once policy is exhausted; the
    /// persisted session has been cleared.
    #[error("authorization failed")]
    Unauthorized,

    #[error("api error: {status} - {message}")]
    Api { status: u16, message: String },
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
