//! Error types for labgrader-state

use thiserror::Error;

/// Errors raised by the spreadsheet and source-hosting collaborators.
///
/// Adapters map their own failures into this type; the grading core
/// propagates it unchanged as a transport error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Network or HTTP-level failure (includes adapter-imposed timeouts)
    #[error("transport failure talking to {service}: {message}")]
    Transport { service: String, message: String },

    /// The remote answered with something the adapter could not interpret
    #[error("unexpected response from {service}: {message}")]
    Protocol { service: String, message: String },

    /// A1 range could not be parsed
    #[error(transparent)]
    InvalidRange(#[from] A1Error),

    /// Sheet (tab) does not exist in the spreadsheet
    #[error("sheet not found: {sheet}")]
    SheetNotFound { sheet: String },

    /// Compare-then-write found a different value than expected
    #[error("cell {cell} changed underneath: expected {expected:?}, found {found:?}")]
    CompareFailed {
        cell: String,
        expected: String,
        found: String,
    },
}

impl GatewayError {
    /// Shorthand for a transport failure.
    pub fn transport(service: &str, message: impl std::fmt::Display) -> Self {
        GatewayError::Transport {
            service: service.to_string(),
            message: message.to_string(),
        }
    }

    /// Shorthand for a protocol failure.
    pub fn protocol(service: &str, message: impl std::fmt::Display) -> Self {
        GatewayError::Protocol {
            service: service.to_string(),
            message: message.to_string(),
        }
    }
}

/// Errors produced while parsing A1 notation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum A1Error {
    #[error("invalid A1 range {range:?}: {reason}")]
    Malformed { range: String, reason: String },

    #[error("column index must be >= 1")]
    ZeroColumn,
}
