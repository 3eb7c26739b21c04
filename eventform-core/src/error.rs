//! Error types for eventform-core.
//!
//! Only construction-time problems and caller contract violations are
//! errors. Data anomalies (hits on unknown planes, undersized clusters,
//! clusters without a coincidence partner) are counted in the statistics
//! types instead.

use thiserror::Error;

/// Result type alias for eventform operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for eventform operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Clusters handed to a matcher for a plane it does not serve.
    #[error("plane {0} is not part of this matcher")]
    UnknownPlane(u8),

    /// Chrono merger misuse.
    #[error("merge error: {0}")]
    Merge(#[from] MergeError),
}

/// Configuration validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Pipelines need an x and a y plane, and at most a z plane.
    #[error("a pipeline needs 2 or 3 planes, got {0}")]
    PlaneCount(usize),

    /// The same plane identifier was configured twice.
    #[error("plane {0} is configured more than once")]
    DuplicatePlane(u8),

    /// A merger with no input streams.
    #[error("chrono merger needs at least one source")]
    NoSources,
}

/// Chrono merger errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    /// Source id outside the configured range.
    #[error("unknown source {source_id} (merger has {sources} sources)")]
    UnknownSource { source_id: usize, sources: usize },
}
