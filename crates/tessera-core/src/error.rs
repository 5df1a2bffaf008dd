use thiserror::Error;

/// Reasons a mutation could not be applied to a [`crate::DiagramModel`].
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("relationship not found: {0}")]
    RelationshipNotFound(String),

    #[error("a cell with id '{0}' already exists")]
    DuplicateId(String),

    #[error("relationship '{relationship}' references missing element '{endpoint}'")]
    DanglingEndpoint { relationship: String, endpoint: String },

    #[error("invalid diagram json: {0}")]
    Json(String),
}

impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}
