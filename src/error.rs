//! Error types for `vindex-core`.
//!
//! A single error enum crosses every public API boundary. Each variant
//! carries a stable numbered code (`VIDX-NNN`) and classifies as
//! `Recoverable` or `Fatal` via [`Error::kind`].

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Whether an error should be treated as recoverable by the caller or as
/// an internal invariant violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller can retry, fix input, or otherwise continue.
    Recoverable,
    /// An internal invariant was violated; the operation aborted.
    Fatal,
}

/// Errors that can occur in `vindex-core` operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid argument (VIDX-001).
    #[error("[VIDX-001] Invalid argument: {0}")]
    InvalidArgument(String),

    /// Vector dimension mismatch (VIDX-002).
    #[error("[VIDX-002] Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Actual dimension.
        actual: usize,
    },

    /// Required meta parameter missing (VIDX-003).
    #[error("[VIDX-003] Missing required parameter '{key}' in section '{section}'")]
    MissingParam {
        /// Section name (common/index/search/extra).
        section: &'static str,
        /// Parameter key.
        key: String,
    },

    /// A meta parameter had the wrong type or an out-of-range value (VIDX-004).
    #[error("[VIDX-004] Invalid parameter '{key}': {reason}")]
    InvalidParam {
        /// Parameter key.
        key: String,
        /// Human-readable reason.
        reason: String,
    },

    /// Builder/searcher state machine violation (VIDX-005).
    #[error("[VIDX-005] Invalid state transition: {0}")]
    InvalidState(String),

    /// I/O error (VIDX-006).
    #[error("[VIDX-006] I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Codec/serialization error (VIDX-007).
    #[error("[VIDX-007] Codec error: {0}")]
    Codec(String),

    /// Configuration error (VIDX-008).
    #[error("[VIDX-008] Configuration error: {0}")]
    Config(String),

    /// Index file or in-memory structure is corrupted beyond repair (VIDX-009).
    #[error("[VIDX-009] Index corrupted: {0}")]
    IndexCorrupted(String),

    /// Unsupported combination of metric/index-family/search mode (VIDX-010).
    #[error("[VIDX-010] Unsupported operation: {0}")]
    Unsupported(String),

    /// Id-filter misuse, e.g. malformed range or oversized bitmap (VIDX-011).
    #[error("[VIDX-011] Id filter error: {0}")]
    IdFilter(String),

    /// Cache capacity or key misuse (VIDX-012).
    #[error("[VIDX-012] Cache error: {0}")]
    Cache(String),

    /// Internal invariant violated; always fatal (VIDX-013).
    #[error("[VIDX-013] Internal invariant violated: {0}")]
    Internal(String),
}

impl Error {
    /// Returns the stable error code, e.g. `"VIDX-001"`.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "VIDX-001",
            Self::DimensionMismatch { .. } => "VIDX-002",
            Self::MissingParam { .. } => "VIDX-003",
            Self::InvalidParam { .. } => "VIDX-004",
            Self::InvalidState(_) => "VIDX-005",
            Self::Io(_) => "VIDX-006",
            Self::Codec(_) => "VIDX-007",
            Self::Config(_) => "VIDX-008",
            Self::IndexCorrupted(_) => "VIDX-009",
            Self::Unsupported(_) => "VIDX-010",
            Self::IdFilter(_) => "VIDX-011",
            Self::Cache(_) => "VIDX-012",
            Self::Internal(_) => "VIDX-013",
        }
    }

    /// Classifies the error as recoverable or fatal.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::IndexCorrupted(_) | Self::Internal(_) => ErrorKind::Fatal,
            _ => ErrorKind::Recoverable,
        }
    }

    /// Returns true if this error is recoverable.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Recoverable)
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(err: rmp_serde::encode::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(err: rmp_serde::decode::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
