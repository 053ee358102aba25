//! The error type every [`Deferred`](crate::Deferred) rejects with.
//!
//! Rejections produced by the combinators themselves (timeouts, malformed
//! sequences, captured panics) and rejections supplied by callers share one
//! enum so they can flow through the same chains. Caller reasons are stored
//! behind an [`Arc`], which keeps [`Error`] cheap to clone while preserving the
//! identity of the original reason.

use std::{any::Any, sync::Arc};

/// A caller-supplied rejection reason.
pub type Reason = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Message used by [`timeout`](crate::Deferred::timeout) when no other reason is given.
pub const DEFAULT_TIMEOUT_MESSAGE: &str = "Request timed out";

/// Reasons a deferred value can be rejected with.
#[derive(Clone, Debug, thiserror::Error)]
pub enum Error {
    /// A combinator was handed an argument of the wrong shape.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Rejected by caller code with the given reason.
    #[error(transparent)]
    Rejected(Reason),

    /// Rejected without any reason.
    #[error("rejected without a reason")]
    Empty,

    /// The deadline of a [`timeout`](crate::Deferred::timeout) elapsed first.
    #[error("{message}")]
    Timeout { message: String },

    /// Caller code panicked while being invoked synchronously.
    #[error("panicked: {0}")]
    Panicked(String),

    /// The [`Resolver`](crate::Resolver) was dropped without settling.
    #[error("resolver dropped before settling")]
    Abandoned,

    /// Every candidate passed to [`any`](crate::Deferred::any) was rejected.
    #[error("all {} candidates were rejected", .0.len())]
    Aggregate(Vec<Error>),
}

impl Error {
    /// Wraps any error as a caller-supplied rejection reason.
    pub fn reason(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::Rejected(Arc::new(error))
    }

    /// Creates a timeout error carrying `message`.
    pub fn timeout(message: impl Into<String>) -> Self {
        Error::Timeout {
            message: message.into(),
        }
    }

    /// Returns the exact reason this error was rejected with.
    ///
    /// `None` for [`Error::Empty`] and for errors raised by the crate itself.
    #[must_use]
    pub fn cause(&self) -> Option<&Reason> {
        match self {
            Error::Rejected(reason) => Some(reason),
            _ => None,
        }
    }

    /// Returns `true` if this is a [`Error::Timeout`].
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Attempts to view the caller-supplied reason as a concrete error type.
    #[must_use]
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.cause().and_then(|reason| reason.downcast_ref::<E>())
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Error::Panicked(message)
    }
}
