//! Errors surfaced by a [`crate::backend::RenderBackend`].

use thiserror::Error;

/// Fatal-to-the-flame device failures. The driver never retries one of
/// these; it logs the assembled program source (if relevant) and relies on
/// the client's callback to cancel the task.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("program build failed: {cause}")]
    ProgramBuild { source_dump: String, cause: String },

    #[error("buffer map failed: {0}")]
    BufferMap(String),

    #[error("no matching device available: {0}")]
    Unavailable(String),

    #[error("kernel launch failed: {0}")]
    Launch(String),
}
