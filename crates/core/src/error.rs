//! Run-level error taxonomy.

use crate::interrupt::Suspension;
use thiserror::Error;

/// Errors produced while executing an agent tree.
///
/// `Interrupted` is control flow rather than a failure: it carries every
/// suspension point raised below the node that returned it, and composite
/// agents pass it upward untouched apart from recording their own state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    #[error("Interrupted at {} point(s)", .0.points.len())]
    Interrupted(Box<Suspension>),

    #[error("Interrupt protocol error: {0}")]
    Protocol(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Checkpoint store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Max iterations ({0}) reached")]
    MaxIterations(usize),
}

impl AgentError {
    pub fn is_interrupt(&self) -> bool {
        matches!(self, AgentError::Interrupted(_))
    }

    pub fn suspension(&self) -> Option<&Suspension> {
        match self {
            AgentError::Interrupted(s) => Some(s),
            _ => None,
        }
    }
}

impl From<Suspension> for AgentError {
    fn from(suspension: Suspension) -> Self {
        AgentError::Interrupted(Box::new(suspension))
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(e: serde_json::Error) -> Self {
        AgentError::Serialization(e.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AgentError::Protocol("resumed with no data".to_string());
        assert_eq!(err.to_string(), "Interrupt protocol error: resumed with no data");

        let err = AgentError::MaxIterations(10);
        assert_eq!(err.to_string(), "Max iterations (10) reached");
    }

    #[test]
    fn test_interrupt_is_not_a_failure_kind() {
        let err = AgentError::from(Suspension::default());
        assert!(err.is_interrupt());
        assert!(err.suspension().is_some());
        assert!(!AgentError::Config("bad".into()).is_interrupt());
    }
}
