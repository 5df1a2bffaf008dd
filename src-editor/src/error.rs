use std::path::PathBuf;

use thiserror::Error;

use tessera_core::ModelError;
use tessera_suggest::SuggestError;
use tessera_sync::SyncError;

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("there are no proposed changes to apply")]
    NothingPending,

    #[error(transparent)]
    Suggest(#[from] SuggestError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("settings: {0}")]
    Settings(String),
}

impl EditorError {
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| EditorError::Io { path, source }
    }
}
