use thiserror::Error;

use tessera_core::ModelError;

#[derive(Debug, Error)]
pub enum SuggestError {
    #[error("AI is not configured: set a provider, a model and an API key")]
    NotConfigured,

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("build LLM: {0}")]
    Build(String),

    #[error("chat: {0}")]
    Chat(String),

    #[error("the AI service did not answer within {0} seconds")]
    Timeout(u64),

    #[error("LLM returned empty text")]
    EmptyResponse,

    #[error("class '{0}' does not exist")]
    ClassNotFound(String),

    #[error("class '{0}' already exists")]
    DuplicateClass(String),

    #[error(transparent)]
    Model(#[from] ModelError),
}
