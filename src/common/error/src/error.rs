//! Core error types for linkage.

use thiserror::Error;

/// Result type alias using `LinkageError`.
pub type LinkageResult<T> = std::result::Result<T, LinkageError>;

/// Core error type for query optimization.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LinkageError {
    /// No index owns the named field.
    #[error("UnknownField: {0}")]
    UnknownField(String),

    /// No canonical link exists for a bare index name.
    #[error("UnknownIndex: {0}")]
    UnknownIndex(String),

    /// No chain of links connects the two indices.
    #[error("UnreachablePath: no path from {from} to {to}")]
    UnreachablePath {
        /// Index the path starts from.
        from: String,
        /// Index the path should reach.
        to: String,
    },

    /// A join path ran out of hops before the expansion chain was complete.
    #[error("MalformedPath: {0}")]
    MalformedPath(String),

    /// The merger found grouped expansions under a node it cannot combine.
    #[error("UnsupportedContainer: {0}")]
    UnsupportedContainer(String),

    /// The input tree is structurally invalid.
    #[error("InvalidQuery: {0}")]
    InvalidQuery(String),

    /// Configuration could not be loaded or is inconsistent.
    #[error("ConfigError: {0}")]
    Config(String),

    /// JSON serialization error.
    #[error("SerdeJsonError: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// Internal error (broken tree invariant).
    #[error("InternalError: {0}")]
    Internal(String),
}

impl LinkageError {
    /// Create a new `UnknownField` error.
    pub fn unknown_field<S: Into<String>>(field: S) -> Self {
        Self::UnknownField(field.into())
    }

    /// Create a new `UnknownIndex` error.
    pub fn unknown_index<S: Into<String>>(index: S) -> Self {
        Self::UnknownIndex(index.into())
    }

    /// Create a new `UnreachablePath` error.
    pub fn unreachable<F: Into<String>, T: Into<String>>(from: F, to: T) -> Self {
        Self::UnreachablePath {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Create a new `MalformedPath` error.
    pub fn malformed_path<S: Into<String>>(msg: S) -> Self {
        Self::MalformedPath(msg.into())
    }

    /// Create a new `UnsupportedContainer` error.
    pub fn unsupported_container<S: Into<String>>(kind: S) -> Self {
        Self::UnsupportedContainer(kind.into())
    }

    /// Create a new `InvalidQuery` error.
    pub fn invalid_query<S: Into<String>>(msg: S) -> Self {
        Self::InvalidQuery(msg.into())
    }

    /// Create a new `Config` error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new `InternalError`.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error rejects the query rather than signalling a defect.
    ///
    /// Rejections surface to the caller as a query-compilation failure;
    /// everything else points at inconsistent metadata or a bug.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::UnknownField(_)
                | Self::UnknownIndex(_)
                | Self::UnreachablePath { .. }
                | Self::InvalidQuery(_)
        )
    }
}

/// Ensure a condition holds, returning an `InternalError` if not.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $variant:ident: $($msg:tt)*) => {
        if !$cond {
            return Err($crate::LinkageError::$variant(format!($($msg)*)));
        }
    };
    ($cond:expr, $msg:expr) => {
        if !$cond {
            return Err($crate::LinkageError::Internal($msg.to_string()));
        }
    };
}

/// Return early with an `InternalError`.
#[macro_export]
macro_rules! internal_err {
    ($($arg:tt)*) => {
        return Err($crate::LinkageError::Internal(format!($($arg)*)))
    };
}
