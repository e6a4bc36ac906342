//! Error types for the relay protocol library.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Errors produced while framing, decoding or classifying protocol input.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// I/O error during reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A line was not valid UTF-8.
    #[error("invalid UTF-8 in line at byte {byte_pos}")]
    InvalidUtf8 {
        /// Byte position where UTF-8 validation failed.
        byte_pos: usize,
    },

    /// A line exceeded the configured maximum length.
    #[error("line too long: {actual} bytes (limit: {limit})")]
    LineTooLong {
        /// Bytes buffered so far.
        actual: usize,
        /// Maximum allowed length.
        limit: usize,
    },

    /// A datacenter wire message could not be decoded or encoded.
    #[error("malformed wire message: {0}")]
    Json(#[from] serde_json::Error),

    /// The first line of a connection named no known role.
    #[error("unknown endpoint role: {0:?}")]
    UnknownRole(String),
}

impl ProtocolError {
    /// Static label for metrics and structured logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::InvalidUtf8 { .. } => "invalid_utf8",
            Self::LineTooLong { .. } => "line_too_long",
            Self::Json(_) => "json",
            Self::UnknownRole(_) => "unknown_role",
        }
    }
}
