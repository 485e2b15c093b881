//! Engine error types.
//!
//! These errors represent session-start refusals, in-session programmer
//! errors, and submission persistence failures. Defined here so callers can
//! classify failures without string matching.

use thiserror::Error;

use crate::model::QuestionType;

/// Errors produced by the assessment session engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The referenced question bank does not exist.
    #[error("question bank not found: {0}")]
    BankNotFound(String),

    /// No questions remained after resolving the bank.
    #[error("question set for bank '{0}' is empty after resolution")]
    EmptyQuestionSet(String),

    /// A completed attempt already exists for this (user, test) pair.
    #[error("user '{user_id}' already completed test '{test_id}'")]
    AlreadyCompleted { user_id: String, test_id: String },

    /// An answer value's tag does not match the question's type. This is a
    /// programmer error in the calling layer, never a user-facing condition.
    #[error(
        "answer for question '{question_id}' has kind {given}, expected {expected}"
    )]
    TypeMismatch {
        question_id: String,
        expected: QuestionType,
        given: QuestionType,
    },

    /// The question id was never seeded into the answer store.
    #[error("unknown question id: {0}")]
    UnknownQuestion(String),

    /// The requested operation is not allowed in the session's current state.
    #[error("operation '{operation}' is not valid in state {state}")]
    InvalidTransition {
        operation: &'static str,
        state: &'static str,
    },

    /// The attempt write failed after exhausting retries. The computed score
    /// is retained by the session and a later submit retries the write.
    #[error("attempt write failed after {attempts} attempt(s): {source}")]
    Persistence {
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },
}

impl EngineError {
    /// Returns `true` for errors that refuse to start a session at the
    /// Ready boundary (as opposed to in-session or submission failures).
    pub fn is_fatal_at_load(&self) -> bool {
        matches!(
            self,
            EngineError::BankNotFound(_)
                | EngineError::EmptyQuestionSet(_)
                | EngineError::AlreadyCompleted { .. }
        )
    }

    /// Returns `true` if the failure is transient and worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::Persistence { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_failures_are_fatal() {
        assert!(EngineError::BankNotFound("b-1".into()).is_fatal_at_load());
        assert!(EngineError::EmptyQuestionSet("b-1".into()).is_fatal_at_load());
        assert!(EngineError::AlreadyCompleted {
            user_id: "u".into(),
            test_id: "t".into()
        }
        .is_fatal_at_load());
        assert!(!EngineError::UnknownQuestion("q".into()).is_fatal_at_load());
    }

    #[test]
    fn persistence_is_transient() {
        let err = EngineError::Persistence {
            attempts: 3,
            source: anyhow::anyhow!("disk full"),
        };
        assert!(err.is_transient());
        assert!(err.to_string().contains("after 3 attempt(s)"));
    }
}
