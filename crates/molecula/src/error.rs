//! Error types for the client facade.

use molecula_core::CoreError;
use thiserror::Error;

use crate::sink::SinkError;

/// Errors that can occur while composing or submitting molecules.
#[derive(Debug, Error)]
pub enum SdkError {
    /// Construction, signing or validation failed.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// The ledger sink failed.
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// The signing position already signed a different molecule.
    #[error("position {position} already signed molecule {existing}")]
    Conflict { position: String, existing: String },

    /// Molecule not found.
    #[error("molecule not found: {0}")]
    NotFound(String),

    /// Invalid operation.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

/// Result type for facade operations.
pub type Result<T> = std::result::Result<T, SdkError>;
