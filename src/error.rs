//! Errors surfaced at the service boundary.
//!
//! Internals use `anyhow`; the service classifies failures into
//! [`CrmError`] so the HTTP layer can pick a status code and the CLI can
//! print something useful.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrmError {
    /// The caller sent something unusable. Nothing was read or written.
    #[error("{0}")]
    InvalidInput(String),

    /// Reading or writing the collection files failed.
    #[error("store error: {0:#}")]
    Store(anyhow::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl CrmError {
    pub fn invalid(message: impl Into<String>) -> Self {
        CrmError::InvalidInput(message.into())
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, CrmError::InvalidInput(_))
    }
}
