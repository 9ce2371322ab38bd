//! Error taxonomy shared across all semdex components.
//!
//! Callers are expected to match on the variants: batch import captures
//! per-file errors into its report, everything else propagates the first
//! error encountered.

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed caller input (empty query, non-positive limit, empty text
    /// to translate). Never retried.
    #[error("validation: {0}")]
    Validation(String),

    /// A referenced resource (file, directory, or document row) is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// An upstream embedding/translation call failed. For the translation
    /// provider this is raised only after the failover sequence has run.
    #[error("{provider} provider error (status {status}): {message}")]
    Provider {
        provider: &'static str,
        status: u16,
        message: String,
    },

    /// The embedding provider returned a vector whose length does not match
    /// the configured dimensionality. Fatal to the current operation.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}
