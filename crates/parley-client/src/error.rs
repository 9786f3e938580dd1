use thiserror::Error;

/// Client-side failures. REST failures surface to the UI as transient
/// notifications and trigger local rollback; they never crash the cache.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server rejected request: {0}")]
    Rejected(String),

    #[error("not connected")]
    NotConnected,
}
