//! Error types for seatmap.
//!
//! Only conditions that abort a pipeline run are errors. Per-record problems
//! (malformed rows, duplicate postcodes, unresolved area names) are counted in
//! the statistics report instead, and lookup misses are plain `NotFound`
//! outcomes.

use std::path::PathBuf;

use thiserror::Error;

/// Failures reading one of the pipeline inputs.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Source unavailable: {path}: {reason}")]
    Unavailable {
        path: PathBuf,
        reason: String,
    },

    #[error("Source {path} has no column matching '{column}'")]
    MissingColumn {
        path: PathBuf,
        column: String,
    },

    #[error("Failed reading {path} at row {row}: {reason}")]
    Read {
        path: PathBuf,
        row: u64,
        reason: String,
    },

    #[error("Read from {path} timed out after {timeout_ms}ms")]
    Timeout {
        path: PathBuf,
        timeout_ms: u64,
    },

    #[error("Failed to decode {path}: {reason}")]
    Decode {
        path: PathBuf,
        reason: String,
    },
}

/// Data integrity violations that make a run meaningless.
#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("Active representatives '{first}' and '{second}' both hold area '{area}'")]
    DuplicateRepresentativeArea {
        area: String,
        first: String,
        second: String,
    },

    #[error("Representative roster has no active representatives")]
    EmptyRoster,

    #[error("Alias '{from}' is defined more than once")]
    DuplicateAlias {
        from: String,
    },

    #[error("Alias entry has an empty name")]
    EmptyAliasName,
}

/// Failures writing the published documents.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Failed to write {path}: {reason}")]
    Io {
        path: PathBuf,
        reason: String,
    },

    #[error("Failed to serialize output: {reason}")]
    Serialize {
        reason: String,
    },
}

/// Invalid pipeline configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration field '{field}': {reason}")]
    Invalid {
        field: String,
        reason: String,
    },
}

/// Top-level error type for seatmap.
#[derive(Debug, Error)]
pub enum SeatmapError {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl SeatmapError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if an input could not be read.
    #[must_use]
    pub const fn is_source(&self) -> bool {
        matches!(self, Self::Source(_))
    }

    /// Returns true if the inputs were readable but inconsistent.
    #[must_use]
    pub const fn is_integrity(&self) -> bool {
        matches!(self, Self::Integrity(_))
    }

    /// Returns true if the run completed but could not be published.
    #[must_use]
    pub const fn is_publish(&self) -> bool {
        matches!(self, Self::Publish(_))
    }

    /// Returns true if rerunning unchanged could succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Source(e) => matches!(e, SourceError::Timeout { .. } | SourceError::Read { .. }),
            Self::Publish(e) => matches!(e, PublishError::Io { .. }),
            Self::Integrity(_) | Self::Config(_) | Self::Internal { .. } => false,
        }
    }
}

/// Result type alias for seatmap operations.
pub type SeatmapResult<T> = Result<T, SeatmapError>;
