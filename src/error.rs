//! Error taxonomy for the attention pipeline.
//!
//! Quality and artifact problems are never surfaced here — they are data
//! (see [`crate::condition::QualityReport`]) so that a live stream keeps
//! producing output on poor-quality epochs. Everything in this enum is a
//! genuine caller-facing failure.

/// Common result type for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the attention pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid filter or band parameters, fatal at construction.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Numerical failure inside feature computation. The epoch's result is
    /// discarded; retrying or skipping is the caller's responsibility.
    #[error("feature extraction failed: {0}")]
    Extraction(String),

    /// Prediction requested before any training call.
    #[error("classifier has not been trained")]
    NotTrained,

    /// Malformed training batch (length mismatch, single-class labels, ...).
    #[error("invalid training batch: {0}")]
    Training(String),
}
