//! Shared error type across wlfuzz crates.

use thiserror::Error;

/// Stable error codes, used in diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Length/opcode inconsistency in a wire message.
    ProtocolFormat,
    /// Sync ring full.
    CorrelationOverflow,
    /// Writing to the transport failed.
    TransportWrite,
    /// Bad pass arguments or config file.
    Configuration,
    /// Logic error inside the proxy.
    Internal,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::ProtocolFormat => "PROTOCOL_FORMAT",
            ErrorCode::CorrelationOverflow => "CORRELATION_OVERFLOW",
            ErrorCode::TransportWrite => "TRANSPORT_WRITE",
            ErrorCode::Configuration => "CONFIGURATION",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, WlFuzzError>;

/// Unified error type used by core and proxy.
#[derive(Debug, Error)]
pub enum WlFuzzError {
    #[error("protocol format: {0}")]
    ProtocolFormat(String),
    #[error("correlation overflow: {capacity} sync callbacks already pending")]
    CorrelationOverflow { capacity: usize },
    #[error("transport write failed: {0}")]
    TransportWrite(#[from] std::io::Error),
    #[error("configuration: {0}")]
    Configuration(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl WlFuzzError {
    pub fn code(&self) -> ErrorCode {
        match self {
            WlFuzzError::ProtocolFormat(_) => ErrorCode::ProtocolFormat,
            WlFuzzError::CorrelationOverflow { .. } => ErrorCode::CorrelationOverflow,
            WlFuzzError::TransportWrite(_) => ErrorCode::TransportWrite,
            WlFuzzError::Configuration(_) => ErrorCode::Configuration,
            WlFuzzError::Internal(_) => ErrorCode::Internal,
        }
    }
}
