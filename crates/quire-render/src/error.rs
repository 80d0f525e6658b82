use quire_core::{DocumentError, HookError};

pub type Result<T> = std::result::Result<T, RenderError>;

/// A registered hook failed while the engine was running it.
#[derive(Debug, thiserror::Error)]
#[error("hook `{hook}` failed: {source}")]
pub struct HookFailure {
    pub hook: String,
    #[source]
    pub source: HookError,
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Hook(#[from] HookFailure),
}

#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("{count} chart draw(s) still pending; settle the output before saving")]
    PendingDraws { count: usize },

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Hook(#[from] HookFailure),

    #[cfg(feature = "raster")]
    #[error(transparent)]
    Raster(#[from] crate::raster::RasterError),

    #[error("raster chart snapshots need the `raster` feature")]
    RasterUnavailable,

    #[error("failed to serialize saved output: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    #[error("invalid chart spec: {message}")]
    InvalidSpec { message: String },

    #[error("unsupported mark type: {mark}")]
    UnsupportedMark { mark: String },

    #[error("mark refers to unknown data table `{name}`")]
    MissingData { name: String },

    #[error("chart container {id} is not in the document")]
    ContainerMissing { id: String },

    #[error("draw failed: {message}")]
    Draw { message: String },

    #[error(transparent)]
    Document(#[from] DocumentError),
}

#[derive(Debug, thiserror::Error)]
pub enum TypesetError {
    #[error("typesetter is misconfigured: {message}")]
    Config { message: String },

    #[error("{message}")]
    Source { message: String },
}
