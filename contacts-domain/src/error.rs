//! Error types for domain operations

use thiserror::Error;

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

/// Failures raised by a [`ContactOperations`](crate::ContactOperations) implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// No contact exists with the given id
    #[error("Contact not found: {0}")]
    NotFound(i32),

    /// The command data was rejected by the domain layer
    #[error("Invalid contact: {0}")]
    Invalid(String),

    /// The persistence layer could not be reached
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl DomainError {
    /// Check if this error reports a missing contact
    pub fn is_not_found(&self) -> bool {
        matches!(self, DomainError::NotFound(_))
    }
}
