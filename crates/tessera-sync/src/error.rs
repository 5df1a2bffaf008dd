use thiserror::Error;

use tessera_core::ModelError;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("a session token is required to start collaboration")]
    MissingSessionToken,
    #[error("collaboration is already active")]
    AlreadyActive,
    #[error("collaboration is not active")]
    NotActive,
    #[error("collaboration needs a running tokio runtime")]
    NoRuntime,
    #[error("sync request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("sync endpoint answered with status {0}")]
    Status(u16),
    #[error("sync request timed out after {0} ms")]
    Timeout(u64),
    #[error("malformed {event} payload: {source}")]
    Payload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Model(#[from] ModelError),
}
