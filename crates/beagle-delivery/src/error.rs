//! Error types for peripheral event dispatch.
//!
//! Errors fall in two tiers. Call rejections (`UnsupportedEventName`,
//! `QueueFull`, `DispatcherClosed`) are returned from `Dispatcher::send`
//! before any work is scheduled. Everything else happens per subscriber and
//! is captured in a `DeliveryOutcome` instead of being returned.

use std::{any::Any, fmt, time::Duration};

use beagle_core::{PayloadError, UnsupportedEventName};
use thiserror::Error;

/// Result type alias for delivery operations.
pub type Result<T> = std::result::Result<T, DeliveryError>;

/// Error conditions of the dispatcher and its transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// Message event name is neither `found` nor `lost`.
    #[error("unsupported event name: {name:?}")]
    UnsupportedEventName {
        /// The rejected event name
        name: String,
    },

    /// The dispatch queue has no free slot.
    #[error("dispatch queue is full ({capacity} pending messages)")]
    QueueFull {
        /// Configured queue capacity
        capacity: usize,
    },

    /// The dispatcher has been shut down.
    #[error("dispatcher is shut down")]
    DispatcherClosed,

    /// Endpoint method is not a valid HTTP method.
    #[error("unsupported http method {method:?} for endpoint {endpoint}")]
    UnsupportedHttpMethod {
        /// Configured method
        method: String,
        /// Endpoint name
        endpoint: String,
    },

    /// Peripheral missing or its kind does not match its variant.
    #[error("unable to serialize peripheral: {reason}")]
    UnableToSerializePeripheral {
        /// What went wrong
        reason: String,
    },

    /// Endpoint is configured without a URL.
    #[error("endpoint {endpoint} has an empty url")]
    EmptyEndpointUrl {
        /// Endpoint name
        endpoint: String,
    },

    /// The outbound request could not be built.
    #[error("failed to create a new request: {message}")]
    RequestCreation {
        /// Underlying error message
        message: String,
    },

    /// The transport failed to reach the endpoint or got a non-2xx answer.
    #[error("failed to reach out the endpoint: {message}")]
    Transport {
        /// Underlying error message
        message: String,
        /// HTTP status when the endpoint answered
        status_code: Option<u16>,
    },

    /// Transport could not be configured.
    #[error("invalid transport configuration: {message}")]
    Configuration {
        /// Configuration error message
        message: String,
    },

    /// A worker task panicked.
    #[error("dispatch worker {worker_id} panicked: {error}")]
    WorkerPanic {
        /// Worker index
        worker_id: usize,
        /// Join error text
        error: String,
    },

    /// Workers did not finish within the shutdown timeout.
    #[error("dispatcher shutdown timed out after {timeout:?}")]
    ShutdownTimeout {
        /// The timeout that elapsed
        timeout: Duration,
    },
}

impl DeliveryError {
    /// Creates a request construction error.
    pub fn request_creation(message: impl Into<String>) -> Self {
        Self::RequestCreation { message: message.into() }
    }

    /// Creates a transport error without a status code.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport { message: message.into(), status_code: None }
    }

    /// Creates a transport error for a non-2xx response.
    pub fn http_status(status_code: u16) -> Self {
        Self::Transport {
            message: format!("endpoint responded with HTTP {status_code}"),
            status_code: Some(status_code),
        }
    }

    /// Creates a transport error from a panic raised while sending.
    pub(crate) fn transport_panic(payload: &(dyn Any + Send)) -> Self {
        Self::transport(format!("transport panicked: {}", panic_message(payload)))
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// True for errors returned synchronously from `send`.
    pub fn is_call_rejection(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedEventName { .. } | Self::QueueFull { .. } | Self::DispatcherClosed
        )
    }
}

impl From<PayloadError> for DeliveryError {
    fn from(error: PayloadError) -> Self {
        Self::UnableToSerializePeripheral { reason: error.to_string() }
    }
}

impl From<UnsupportedEventName> for DeliveryError {
    fn from(error: UnsupportedEventName) -> Self {
        Self::UnsupportedEventName { name: error.0 }
    }
}

/// Coarse classification used as a structured log field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Message refused by `send`.
    Rejection,
    /// Peripheral could not be turned into fields.
    Serialization,
    /// Endpoint or transport misconfigured.
    Configuration,
    /// Request building failed.
    Request,
    /// Network or HTTP failure.
    Transport,
    /// Worker lifecycle problem.
    Lifecycle,
}

impl From<&DeliveryError> for ErrorCategory {
    fn from(error: &DeliveryError) -> Self {
        match error {
            DeliveryError::UnsupportedEventName { .. }
            | DeliveryError::QueueFull { .. }
            | DeliveryError::DispatcherClosed => Self::Rejection,
            DeliveryError::UnableToSerializePeripheral { .. } => Self::Serialization,
            DeliveryError::UnsupportedHttpMethod { .. }
            | DeliveryError::EmptyEndpointUrl { .. }
            | DeliveryError::Configuration { .. } => Self::Configuration,
            DeliveryError::RequestCreation { .. } => Self::Request,
            DeliveryError::Transport { .. } => Self::Transport,
            DeliveryError::WorkerPanic { .. } | DeliveryError::ShutdownTimeout { .. } => {
                Self::Lifecycle
            },
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejection => write!(f, "rejection"),
            Self::Serialization => write!(f, "serialization"),
            Self::Configuration => write!(f, "configuration"),
            Self::Request => write!(f, "request"),
            Self::Transport => write!(f, "transport"),
            Self::Lifecycle => write!(f, "lifecycle"),
        }
    }
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}
