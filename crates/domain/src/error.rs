//! Domain error type.

use thiserror::Error;

/// Error returned when a business rule rejects an operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// The aggregate is in a state that does not allow the operation.
    #[error("{0}")]
    InvalidState(String),

    /// The operation's input breaks a rule.
    #[error("{0}")]
    InvalidArgument(String),
}

impl DomainError {
    pub fn state(message: impl Into<String>) -> Self {
        DomainError::InvalidState(message.into())
    }

    pub fn argument(message: impl Into<String>) -> Self {
        DomainError::InvalidArgument(message.into())
    }
}

/// Returns `InvalidState` with `message` unless `condition` holds.
pub fn ensure_state(condition: bool, message: impl Into<String>) -> Result<(), DomainError> {
    if condition {
        Ok(())
    } else {
        Err(DomainError::state(message))
    }
}

/// Returns `InvalidArgument` with `message` unless `condition` holds.
pub fn ensure_argument(condition: bool, message: impl Into<String>) -> Result<(), DomainError> {
    if condition {
        Ok(())
    } else {
        Err(DomainError::argument(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_helpers() {
        assert!(ensure_state(true, "x").is_ok());
        assert_eq!(
            ensure_state(false, "Subscription is not active"),
            Err(DomainError::InvalidState("Subscription is not active".into()))
        );
        assert_eq!(
            ensure_argument(false, "Capacity must be positive").unwrap_err().to_string(),
            "Capacity must be positive"
        );
    }
}
