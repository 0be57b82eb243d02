//! Shared error types for the services crate.

use thiserror::Error;

use exam_core::model::{ConfigError, ResultError};
use storage::repository::StorageError;

use crate::exam::SessionPhase;

/// Errors raised by the configuration step before a session exists.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(
        "Only {available} questions available. Please reduce the number of questions or select different subjects/tags."
    )]
    InsufficientQuestions { requested: u32, available: u64 },
}

/// Errors emitted by `ExamController` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("exam session is {phase}, not active")]
    NotActive { phase: SessionPhase },
    #[error("exam session is {phase}, questions were already requested")]
    AlreadyLoaded { phase: SessionPhase },
    #[error(transparent)]
    Result(#[from] ResultError),
}

/// Errors emitted while preparing or loading an exam.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExamError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Repository(#[from] StorageError),
    #[error("no questions found for the selected criteria")]
    NoQuestionsAvailable,
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl ExamError {
    /// Text shown to the user when this error ends the current step.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(err) => err.to_string(),
            Self::Repository(_) | Self::NoQuestionsAvailable => {
                "Failed to load questions. Please try again with different criteria.".to_string()
            }
            Self::Session(err) => err.to_string(),
        }
    }
}

impl From<ConfigError> for ExamError {
    fn from(err: ConfigError) -> Self {
        Self::Validation(ValidationError::Config(err))
    }
}

/// Errors emitted by `ExamFlow` transitions.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FlowError {
    #[error("cannot {event} while {state}")]
    InvalidTransition {
        event: &'static str,
        state: &'static str,
    },
    #[error(transparent)]
    Exam(#[from] ExamError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_questions_names_available_maximum() {
        let err = ValidationError::InsufficientQuestions {
            requested: 10,
            available: 3,
        };
        assert!(err.to_string().starts_with("Only 3 questions available."));
    }

    #[test]
    fn load_failures_share_user_message() {
        let empty = ExamError::NoQuestionsAvailable.user_message();
        let storage =
            ExamError::Repository(StorageError::Connection("refused".into())).user_message();
        assert_eq!(empty, storage);
        assert!(empty.starts_with("Failed to load questions."));
    }

    #[test]
    fn session_error_names_phase() {
        let err = SessionError::NotActive {
            phase: SessionPhase::Submitted,
        };
        assert_eq!(err.to_string(), "exam session is submitted, not active");
    }
}
