use thiserror::Error;

#[derive(Debug, Error)]
pub enum TracepipeError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("internal channel closed")]
    ChannelClosed,
    #[error("background task failed: {0}")]
    Background(String),
}

/// Failure of a single batch delivery, produced by the retry executor.
///
/// `retryable` reflects the classification of the last attempt; `exhausted`
/// is set when the full retry budget was spent. The worker uses both to decide
/// between head re-enqueue (retryable exhaustion) and drop (terminal reject).
#[derive(Debug, Error)]
#[error("batch delivery failed: {message}")]
pub struct DeliveryError {
    /// HTTP status of the last response, if one was received.
    pub status: Option<u16>,
    pub retryable: bool,
    pub exhausted: bool,
    pub message: String,
}

impl DeliveryError {
    pub(crate) fn from_status(status: u16, message: impl Into<String>) -> Self {
        let retryable = status == 429 || (500..600).contains(&status);
        Self {
            status: Some(status),
            retryable,
            exhausted: false,
            message: format!("[{status}] {}", message.into()),
        }
    }

    pub(crate) fn network(message: impl Into<String>) -> Self {
        Self {
            status: None,
            retryable: true,
            exhausted: false,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TracepipeError>;
