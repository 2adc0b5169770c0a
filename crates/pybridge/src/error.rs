use std::result::Result as StdResult;

use thiserror::Error;

use crate::wire::RemoteFailure;

#[derive(Error, Debug, Clone)]
/// Error type for bridge operations.
pub enum Error {
    /// Worker could not be launched or did not answer its startup probe.
    #[error("worker startup failed: {message}")]
    Startup {
        /// Error message details.
        message: String,
    },

    /// The evaluation channel is gone and will not come back.
    #[error("transport closed: {reason}")]
    TransportClosed {
        /// Why the session was marked closed.
        reason: String,
    },

    /// The remote interpreter raised an exception while evaluating.
    #[error("remote evaluation failed: {kind}: {message}")]
    RemoteEval {
        /// Remote exception type name, verbatim (e.g. `AttributeError`).
        kind: String,
        /// Remote exception message, verbatim.
        message: String,
        /// Remote traceback text, when the worker captured one.
        traceback: Option<String>,
    },

    /// A reply payload did not carry the tag the caller's type requires.
    #[error("decode error: expected {expected}, got {actual}")]
    Decode {
        /// Kind the typed accessor asked for.
        expected: String,
        /// Tag or shape actually present in the payload.
        actual: String,
    },

    /// Declared operation with no wire support.
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
}

impl Error {
    /// Create a Startup error.
    pub fn startup(message: impl Into<String>) -> Self {
        Self::Startup {
            message: message.into(),
        }
    }

    /// Create a TransportClosed error.
    pub fn closed(reason: impl Into<String>) -> Self {
        Self::TransportClosed {
            reason: reason.into(),
        }
    }

    /// Create a Decode error.
    pub fn decode(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::Decode {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl From<RemoteFailure> for Error {
    fn from(failure: RemoteFailure) -> Self {
        Self::RemoteEval {
            kind: failure.kind,
            message: failure.message,
            traceback: failure.traceback,
        }
    }
}

/// Result alias using the crate error type.
pub type Result<T> = StdResult<T, Error>;
