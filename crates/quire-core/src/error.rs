pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("output model JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Hook(#[from] HookError),
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("element not found: {id}")]
    ElementNotFound { id: String },

    #[error("invalid element id {id:?}: {message}")]
    InvalidId { id: String, message: String },

    #[error("HTML rewrite failed: {message}")]
    Rewrite { message: String },
}

/// Failure raised by a registered mount, unmount or save hook.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("hook produced invalid output: {0}")]
    Json(#[from] serde_json::Error),
}

impl HookError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}
