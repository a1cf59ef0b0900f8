//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Deterministic business failures only: bad input, illegal lifecycle
/// transitions, conflicts. Failures of delegated collaborators (storage, email
/// dispatch, file extraction) are reported through [`ExternalFailure`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A date-like string could not be resolved to a calendar date.
    #[error("invalid date: {0}")]
    InvalidDate(String),

    /// One or more field checks failed. Always the full list, never just the first.
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// A lifecycle transition was attempted against an incompatible state.
    ///
    /// State is never mutated when this is returned.
    #[error("guard violation: {0}")]
    GuardViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested invoice does not exist (or is not visible to the owner).
    #[error("not found")]
    NotFound,

    /// A conflict occurred (stale version, duplicate invoice number).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn invalid_date(input: impl Into<String>) -> Self {
        Self::InvalidDate(input.into())
    }

    pub fn validation(errors: Vec<String>) -> Self {
        Self::Validation(errors)
    }

    pub fn guard(msg: impl Into<String>) -> Self {
        Self::GuardViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    pub fn is_guard_violation(&self) -> bool {
        matches!(self, Self::GuardViolation(_))
    }
}

/// Opaque failure reported by a delegated collaborator.
///
/// Surfaced to the caller as-is; nothing in the core retries it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{service} failed: {message}")]
pub struct ExternalFailure {
    pub service: &'static str,
    pub message: String,
}

impl ExternalFailure {
    pub fn new(service: &'static str, message: impl Into<String>) -> Self {
        Self {
            service,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_lists_every_message() {
        let err = DomainError::validation(vec![
            "Row 1: Missing Email".to_string(),
            "Row 1: Invalid amount".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "validation failed: Row 1: Missing Email; Row 1: Invalid amount"
        );
    }

    #[test]
    fn external_failure_names_the_service() {
        let err = ExternalFailure::new("notifier", "smtp timeout");
        assert_eq!(err.to_string(), "notifier failed: smtp timeout");
    }
}
