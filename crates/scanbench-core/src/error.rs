//! Error handling for ScanBench
//!
//! Provides error types for all layers of the engine:
//! - Scan errors (aggregate state machine violations)
//! - Validation errors (bad configuration, reported before a scan starts)
//! - Hardware errors (motion/acquisition port failures)
//! - Executor errors (worker lifecycle problems)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

use crate::status::ScanStatus;

/// Scan aggregate error type
///
/// Represents illegal operations on the scan aggregate. An
/// `InvalidStateTransition` raised by anything other than the executor's
/// completion race is a programming error, not a runtime condition.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScanError {
    /// An operation was attempted in a state that does not permit it
    #[error("Cannot {attempted} while scan is {current}")]
    InvalidStateTransition {
        /// The scan status at the time of the call.
        current: ScanStatus,
        /// The operation that was attempted.
        attempted: &'static str,
    },

    /// A point result arrived with the wrong index
    #[error("Out-of-order point append: expected index {expected}, got {got}")]
    OutOfOrderPoint {
        /// The index the aggregate expected next.
        expected: usize,
        /// The index that was supplied.
        got: usize,
    },

    /// The expected point count may only be set once, before acquisition
    #[error("Expected point count already set to {current}")]
    ExpectedPointsAlreadySet {
        /// The previously configured count.
        current: usize,
    },

    /// The operation is only meaningful for the other scan variant
    #[error("Operation {attempted} is not supported for this scan kind")]
    KindMismatch {
        /// The operation that was attempted.
        attempted: &'static str,
    },
}

/// Configuration validation error
///
/// Collects every violated constraint so the caller can report them all at
/// once. A scan whose configuration fails validation never starts.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid scan configuration: {}", errors.join("; "))]
pub struct ValidationError {
    /// Human-readable descriptions of each violated constraint.
    pub errors: Vec<String>,
}

impl ValidationError {
    /// Create a validation error from a list of constraint violations
    pub fn new(errors: Vec<String>) -> Self {
        Self { errors }
    }

    /// Create a validation error for a single violated constraint
    pub fn single(error: impl Into<String>) -> Self {
        Self {
            errors: vec![error.into()],
        }
    }
}

/// Hardware communication error type
///
/// Surfaced from the motion or acquisition port. Fail-fast: there is no
/// built-in retry, and the executor routes these to `fail()` on the
/// aggregate.
#[derive(Error, Debug, Clone)]
pub enum HardwareError {
    /// The motion port rejected or failed a motion segment
    #[error("Motion port error: {reason}")]
    Motion {
        /// The reason reported by the motion hardware.
        reason: String,
    },

    /// The acquisition port failed to deliver a sample
    #[error("Acquisition port error: {reason}")]
    Acquisition {
        /// The reason reported by the acquisition hardware.
        reason: String,
    },

    /// A port operation timed out
    #[error("Hardware operation timed out after {timeout_ms}ms")]
    Timeout {
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },
}

/// Executor error type
///
/// Worker lifecycle problems. `StopTimeout` is a reportable deadlock, not
/// something to ignore.
#[derive(Error, Debug, Clone)]
pub enum ExecutorError {
    /// A worker is already active for this executor instance
    #[error("An execution is already active for this executor")]
    Busy,

    /// Execution was requested with an empty motion list
    #[error("Cannot execute a scan without motions")]
    NoMotions,

    /// The worker thread did not exit within the bounded stop wait
    #[error("Worker thread did not exit within {timeout_ms}ms")]
    StopTimeout {
        /// The bounded wait in milliseconds.
        timeout_ms: u64,
    },
}

/// Main error type for ScanBench
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Scan aggregate error
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// Configuration validation error
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Hardware communication error
    #[error(transparent)]
    Hardware(#[from] HardwareError),

    /// Executor error
    #[error(transparent)]
    Executor(#[from] ExecutorError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a hardware communication error
    pub fn is_hardware_error(&self) -> bool {
        matches!(self, Error::Hardware(_))
    }

    /// Check if this is an aggregate state violation
    pub fn is_state_error(&self) -> bool {
        matches!(self, Error::Scan(ScanError::InvalidStateTransition { .. }))
    }

    /// Check if this is a validation error
    pub fn is_validation_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
