//! Error types for the object-store client.

use prism_auth::{SigningError, Verb};

use crate::request::RequestState;

/// Local validation failures. These never reach the network.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// Credentials or bucket are incomplete.
    #[error(transparent)]
    Signing(#[from] SigningError),

    /// The object key exceeds the maximum length.
    #[error("object key is {len} bytes, maximum is {max}")]
    KeyTooLong {
        /// Length of the rejected key.
        len: usize,
        /// Maximum accepted length.
        max: usize,
    },

    /// The composed URL exceeds the maximum length.
    #[error("request URL is {len} bytes, maximum is {max}")]
    UrlTooLong {
        /// Length of the rejected URL.
        len: usize,
        /// Maximum accepted length.
        max: usize,
    },

    /// `get` was handed an output buffer that already holds data.
    #[error("output buffer must be empty")]
    OutputNotEmpty,
}

/// Errors returned by the object-store client.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The request was rejected before any network activity.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// An operation was invoked while the request was not idle.
    #[error("request is {0:?}, expected Idle")]
    InvalidState(RequestState),

    /// No destination is registered under this identifier.
    #[error("unknown destination: {0}")]
    UnknownDestination(String),

    /// A destination is already registered under this identifier.
    #[error("destination {0} already created")]
    DuplicateDestination(String),

    /// Connection, DNS, timeout or stream failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The exchange finished with a status other than the one expected.
    #[error("{verb} returned status {actual}, expected {expected}")]
    UnexpectedStatus {
        /// Request verb.
        verb: Verb,
        /// Status expected for this verb.
        expected: u16,
        /// Status returned by the server.
        actual: u16,
    },

    /// The request was cancelled.
    #[error("request cancelled")]
    Cancelled,
}

/// Errors from loading a destination profiles file.
#[derive(Debug, thiserror::Error)]
pub enum ProfilesError {
    /// The file could not be read.
    #[error("failed to read profiles file: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid JSON of the expected shape.
    #[error("failed to parse profiles file: {0}")]
    Parse(#[from] serde_json::Error),
}
