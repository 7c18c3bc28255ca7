//! Error types for the core peripheral and notification model.

use thiserror::Error;

/// Result type alias for payload operations.
pub type Result<T> = std::result::Result<T, PayloadError>;

/// Failures while turning a peripheral into wire fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    /// The message carried no peripheral.
    #[error("missing peripheral")]
    MissingPeripheral,

    /// The declared kind does not match the concrete variant.
    #[error("unable to serialize peripheral {key}: kind {kind} does not match its variant")]
    KindMismatch {
        /// Unique key of the offending peripheral
        key: String,
        /// Declared kind tag
        kind: String,
    },

    /// A proximity string that is not one of the four known classes.
    #[error("unknown proximity: {0}")]
    UnknownProximity(String),
}

/// Event name that is neither `found` nor `lost`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported event name: {0:?}")]
pub struct UnsupportedEventName(pub String);
