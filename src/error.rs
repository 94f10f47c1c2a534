//! Error types for Sentrix.
//!
//! Errors are strongly typed using `thiserror`, grouped by the taxonomy in
//! the design document: fatal backend errors initiate shutdown, the rest are
//! logged and absorbed at the boundary where they occur. No error variant
//! here is meant to propagate across the reactor boundary as a panic.

use thiserror::Error;

/// A fatal error from either backing service (store or broker). Always
/// initiates an orderly stop.
#[derive(Debug, Error)]
pub enum FatalError {
    /// The key-value store connection failed in a way that cannot be
    /// recovered by waiting for reconnect.
    #[error("key-value store connection error: {0}")]
    Store(String),

    /// The broker connection failed in a way that cannot be recovered by
    /// waiting for reconnect.
    #[error("broker connection error: {0}")]
    Broker(String),
}

/// Handler execution failed for one handler. Other handlers are unaffected.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler's subprocess could not be spawned or its I/O failed.
    #[error("handler '{handler}' subprocess failed: {reason}")]
    Spawn { handler: String, reason: String },

    /// A TCP handler failed to connect, write, or timed out.
    #[error("handler '{handler}' tcp dispatch failed: {reason}")]
    Tcp { handler: String, reason: String },

    /// A UDP handler failed to send.
    #[error("handler '{handler}' udp dispatch failed: {reason}")]
    Udp { handler: String, reason: String },

    /// An amqp handler failed to publish.
    #[error("handler '{handler}' amqp publish failed: {reason}")]
    Amqp { handler: String, reason: String },

    /// An extension handler raised.
    #[error("handler '{handler}' extension raised: {reason}")]
    Extension { handler: String, reason: String },
}

/// A mutator failed. The event is skipped for that handler only.
#[derive(Debug, Error)]
pub enum MutatorError {
    /// The mutator subprocess exited non-zero.
    #[error("mutator '{mutator}' exited with status {status}")]
    NonZeroExit { mutator: String, status: i32 },

    /// The mutator subprocess could not be run.
    #[error("mutator '{mutator}' failed to run: {reason}")]
    Spawn { mutator: String, reason: String },

    /// An extension mutator raised.
    #[error("mutator '{mutator}' extension raised: {reason}")]
    Extension { mutator: String, reason: String },
}

/// A named configuration element (handler, filter, mutator) could not be
/// found. Treated as "absent", never a hard failure.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("unknown handler: {0}")]
    Handler(String),
    #[error("unknown filter: {0}")]
    Filter(String),
    #[error("unknown mutator: {0}")]
    Mutator(String),
}

/// Top-level error type for Sentrix.
#[derive(Debug, Error)]
pub enum SentrixError {
    /// Fatal backend error; the reactor is initiating stop.
    #[error("fatal error: {0}")]
    Fatal(#[from] FatalError),

    /// Handler dispatch error for a single handler.
    #[error("handler error: {0}")]
    Handler(#[from] HandlerError),

    /// Mutator dispatch error.
    #[error("mutator error: {0}")]
    Mutator(#[from] MutatorError),

    /// Configuration lookup miss.
    #[error("lookup error: {0}")]
    Lookup(#[from] LookupError),

    /// A broker or store message failed to parse as JSON. Logged and
    /// dropped (acked) to avoid poison-message loops.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// Sandboxed predicate evaluation failed.
    #[error("sandbox error: {0}")]
    Sandbox(#[from] crate::sandbox::SandboxError),

    /// Configuration file could not be loaded or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Catch-all internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SentrixError {
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// True if this error is fatal and should initiate stop.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

/// Result type alias for Sentrix operations.
pub type SentrixResult<T> = Result<T, SentrixError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_error_is_fatal() {
        let err: SentrixError = FatalError::Store("disconnected".into()).into();
        assert!(err.is_fatal());
        assert!(format!("{err}").contains("disconnected"));
    }

    #[test]
    fn handler_error_is_not_fatal() {
        let err: SentrixError = HandlerError::Spawn {
            handler: "mailer".into(),
            reason: "enoent".into(),
        }
        .into();
        assert!(!err.is_fatal());
    }

    #[test]
    fn lookup_error_display() {
        let err = LookupError::Filter("business_hours".into());
        assert!(format!("{err}").contains("business_hours"));
    }
}
