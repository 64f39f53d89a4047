//! Error types for moralgraph.
//!
//! Library crates use [`MoralGraphError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! The variants mirror the pipeline stages, because the stage an error comes
//! from decides its fate: fetch and scoring errors are skippable per-URL in
//! batch/RSS mode, persistence errors roll back the whole batch, and
//! projection errors abort the rest of the run without undoing what was
//! already sent to the graph store.

use std::path::PathBuf;

/// Top-level error type for all moralgraph operations.
#[derive(Debug, thiserror::Error)]
pub enum MoralGraphError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/parse failure while fetching one article.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Scoring engine failure for one article.
    #[error("scoring error: {0}")]
    Scoring(String),

    /// Relational store failure. The batch transaction is rolled back.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Graph store update failure. Already-sent facts are not retracted.
    #[error("projection error: {0}")]
    Projection(String),

    /// Data validation error (missing identifier, malformed URL, etc.).
    /// Raised before any side effect.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, MoralGraphError>;

impl MoralGraphError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error may be skipped for a single unit in batch/RSS mode.
    ///
    /// Only stage-local fetch and scoring failures qualify; everything else
    /// propagates to the caller.
    pub fn is_skippable(&self) -> bool {
        matches!(self, Self::Fetch(_) | Self::Scoring(_))
    }
}
