//! Error types for the Speed render backend
//!
//! Errors fall into three tiers:
//! - validation errors, raised before any native call is issued
//! - recoverable native conditions (timeouts, suboptimal results), which are
//!   logged as warnings and never surface as `Error`
//! - fatal native conditions, after which the affected object should be torn down

use std::fmt;

/// Result type for render backend operations
pub type Result<T> = std::result::Result<T, Error>;

/// Render backend errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Operation not allowed in the current state (e.g. recording-only call while idle)
    InvalidOperation(String),

    /// Argument rejected before reaching the native API
    InvalidArgument(String),

    /// Copy/upload/map region outside of the resource capacity
    OutOfBounds(String),

    /// Resource belongs to a different backend
    BackendMismatch(String),

    /// Invalid resource (texture not materialized, wrong usage, ...)
    InvalidResource(String),

    /// Bounded wait elapsed while the device was expected to make progress
    Timeout(String),

    /// Backend-specific error (native API failure)
    BackendError(String),

    /// Out of GPU or host memory
    OutOfMemory,

    /// Initialization failed (instance, device, allocator, surface)
    InitializationFailed(String),
}

impl Error {
    /// Returns true for errors raised by argument/state validation.
    ///
    /// Validation errors never leave partial native state behind.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidOperation(_)
                | Error::InvalidArgument(_)
                | Error::OutOfBounds(_)
                | Error::BackendMismatch(_)
                | Error::InvalidResource(_)
        )
    }

    /// Returns true for errors reported by the native API or the device.
    pub fn is_fatal(&self) -> bool {
        !self.is_validation()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidOperation(msg) => write!(f, "Invalid operation: {}", msg),
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::OutOfBounds(msg) => write!(f, "Out of bounds: {}", msg),
            Error::BackendMismatch(msg) => write!(f, "Backend mismatch: {}", msg),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::Timeout(msg) => write!(f, "Timeout: {}", msg),
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
