//! Error types for stepwise.
//!
//! All errors are strongly typed using thiserror. Tool and collaborator
//! failures are ordinary return values: the executor routes on them instead of
//! unwinding, so a failing tool never aborts a solve.

use thiserror::Error;

use crate::tools::Capability;

/// Validation errors raised while building inputs or configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Problem text cannot be empty")]
    EmptyProblemText,

    #[error("Confidence value {value} is out of range [0.0, 1.0]")]
    ConfidenceOutOfRange {
        value: f64,
    },

    #[error("Required field '{field}' is missing")]
    MissingField {
        field: String,
    },

    #[error("Invalid field '{field}': {reason}")]
    InvalidField {
        field: String,
        reason: String,
    },

    #[error("Capability '{name}' is already registered")]
    DuplicateCapability {
        name: String,
    },
}

/// Failure signal returned by a deterministic tool.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolFailure {
    #[error("bad input: {reason}")]
    BadInput {
        reason: String,
    },

    #[error("numeric error: {reason}")]
    Numeric {
        reason: String,
    },

    #[error("timed out after {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },

    #[error("capability '{capability}' is not registered")]
    Unavailable {
        capability: Capability,
    },

    #[error("tool crashed: {reason}")]
    Crashed {
        reason: String,
    },
}

impl ToolFailure {
    /// Creates a bad-input failure.
    #[must_use]
    pub fn bad_input(reason: impl Into<String>) -> Self {
        Self::BadInput {
            reason: reason.into(),
        }
    }

    /// Creates a numeric failure (division by zero, NaN, overflow).
    #[must_use]
    pub fn numeric(reason: impl Into<String>) -> Self {
        Self::Numeric {
            reason: reason.into(),
        }
    }
}

/// Failure signal returned by the creative-reasoning collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FallbackFailure {
    #[error("timed out after {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },

    #[error("collaborator unavailable: {reason}")]
    Unavailable {
        reason: String,
    },

    #[error("collaborator rejected the request: {reason}")]
    Rejected {
        reason: String,
    },

    #[error("malformed reply: {reason}")]
    Malformed {
        reason: String,
    },

    #[error("collaborator crashed: {reason}")]
    Crashed {
        reason: String,
    },
}

impl FallbackFailure {
    /// Creates a rejection failure.
    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }
}

/// Execution errors surfaced by the batch runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("Problem exceeded its budget of {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },

    #[error("Batch was cancelled before this problem started")]
    Cancelled,

    #[error("Execution path disconnected: {path}")]
    Disconnected {
        path: String,
    },

    #[error("Failed to spawn worker: {reason}")]
    WorkerSpawn {
        reason: String,
    },
}

/// Top-level error type for stepwise.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolveError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl SolveError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if the problem ran out of its batch budget.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Execution(ExecutionError::Timeout { .. }))
    }

    /// Returns true if the problem was skipped by a cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Execution(ExecutionError::Cancelled))
    }

    /// Returns true if resubmitting the same problem could succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) | Self::Internal { .. } => false,
            Self::Execution(e) => matches!(
                e,
                ExecutionError::Timeout { .. } | ExecutionError::Cancelled | ExecutionError::WorkerSpawn { .. }
            ),
        }
    }
}

/// Result type alias for stepwise operations.
pub type SolveResult<T> = Result<T, SolveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_confidence() {
        let err = ValidationError::ConfidenceOutOfRange { value: 1.5 };
        let msg = format!("{err}");
        assert!(msg.contains("1.5"));
        assert!(msg.contains("out of range"));
    }

    #[test]
    fn test_tool_failure_timeout() {
        let err = ToolFailure::Timeout { duration_ms: 3000 };
        assert_eq!(format!("{err}"), "timed out after 3000ms");
    }

    #[test]
    fn test_tool_failure_unavailable_names_capability() {
        let err = ToolFailure::Unavailable {
            capability: Capability::Geometry,
        };
        assert!(format!("{err}").contains("geometry"));
    }

    #[test]
    fn test_solve_error_from_validation() {
        let err: SolveError = ValidationError::EmptyProblemText.into();
        assert!(err.is_validation());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_solve_error_timeout_is_retryable() {
        let err: SolveError = ExecutionError::Timeout { duration_ms: 100 }.into();
        assert!(err.is_timeout());
        assert!(err.is_retryable());
        assert!(format!("{err}").contains("100ms"));
    }

    #[test]
    fn test_solve_error_internal() {
        let err = SolveError::internal("unexpected state");
        assert!(!err.is_retryable());
        assert!(format!("{err}").contains("unexpected state"));
    }

    #[test]
    fn test_cancelled() {
        let err: SolveError = ExecutionError::Cancelled.into();
        assert!(err.is_cancelled());
        assert!(!err.is_timeout());
    }
}
