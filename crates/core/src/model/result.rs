use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{AnswerStatus, AttemptId, OptionLabel, Question, UserAnswer};
use crate::timing::format_duration_secs;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResultError {
    #[error("ended_at is before started_at")]
    InvalidTimeRange,

    #[error("answer list length ({answers}) does not match question list length ({questions})")]
    LengthMismatch { questions: usize, answers: usize },

    #[error("answer at position {index} does not belong to the question at that position")]
    OrderMismatch { index: usize },

    #[error("too many questions for a single exam: {len}")]
    TooManyQuestions { len: usize },
}

/// One row of the per-question breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "DetailRepr")]
pub struct QuestionDetail {
    question: Question,
    user_answer: Option<OptionLabel>,
    is_correct: bool,
}

impl QuestionDetail {
    #[must_use]
    pub fn new(question: Question, user_answer: Option<OptionLabel>) -> Self {
        let is_correct = user_answer.is_some_and(|label| question.is_correct(label));
        Self {
            question,
            user_answer,
            is_correct,
        }
    }

    #[must_use]
    pub fn question(&self) -> &Question {
        &self.question
    }

    #[must_use]
    pub fn user_answer(&self) -> Option<OptionLabel> {
        self.user_answer
    }

    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.is_correct
    }

    #[must_use]
    pub fn status(&self) -> AnswerStatus {
        AnswerStatus::of(&self.question, self.user_answer)
    }
}

// Correctness is always re-derived; a stored flag is never trusted.
#[derive(Deserialize)]
struct DetailRepr {
    question: Question,
    user_answer: Option<OptionLabel>,
}

impl From<DetailRepr> for QuestionDetail {
    fn from(repr: DetailRepr) -> Self {
        QuestionDetail::new(repr.question, repr.user_answer)
    }
}

/// Frozen outcome of one exam attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExamResult {
    id: AttemptId,
    total_questions: u32,
    correct_answers: u32,
    percentage: f64,
    time_spent_secs: u64,
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
    details: Vec<QuestionDetail>,
}

impl ExamResult {
    /// Score a finished session from its question and answer lists.
    ///
    /// # Errors
    ///
    /// Returns `ResultError::LengthMismatch` or `ResultError::OrderMismatch` if the
    /// answer list does not line up with the question list, and
    /// `ResultError::InvalidTimeRange` if `ended_at` is before `started_at`.
    pub fn from_session(
        id: AttemptId,
        questions: &[Question],
        answers: &[UserAnswer],
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
    ) -> Result<Self, ResultError> {
        if questions.len() != answers.len() {
            return Err(ResultError::LengthMismatch {
                questions: questions.len(),
                answers: answers.len(),
            });
        }

        let mut details = Vec::with_capacity(questions.len());
        for (index, (question, answer)) in questions.iter().zip(answers).enumerate() {
            if question.id() != answer.question_id() {
                return Err(ResultError::OrderMismatch { index });
            }
            details.push(QuestionDetail::new(question.clone(), answer.selected()));
        }

        Self::from_details(id, started_at, ended_at, details)
    }

    /// Rebuild a result from its per-question details, recomputing every total.
    ///
    /// # Errors
    ///
    /// Returns `ResultError::InvalidTimeRange` if `ended_at` is before `started_at`.
    /// Returns `ResultError::TooManyQuestions` if the count cannot fit in `u32`.
    pub fn from_details(
        id: AttemptId,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        details: Vec<QuestionDetail>,
    ) -> Result<Self, ResultError> {
        if ended_at < started_at {
            return Err(ResultError::InvalidTimeRange);
        }

        let total_questions = u32::try_from(details.len())
            .map_err(|_| ResultError::TooManyQuestions { len: details.len() })?;
        let mut correct_answers = 0_u32;
        for detail in &details {
            if detail.is_correct() {
                correct_answers = correct_answers.saturating_add(1);
            }
        }

        let percentage = if total_questions > 0 {
            100.0 * f64::from(correct_answers) / f64::from(total_questions)
        } else {
            0.0
        };

        let time_spent_secs = u64::try_from((ended_at - started_at).num_seconds()).unwrap_or(0);

        Ok(Self {
            id,
            total_questions,
            correct_answers,
            percentage,
            time_spent_secs,
            started_at,
            ended_at,
            details,
        })
    }

    #[must_use]
    pub fn id(&self) -> AttemptId {
        self.id
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn correct_answers(&self) -> u32 {
        self.correct_answers
    }

    #[must_use]
    pub fn percentage(&self) -> f64 {
        self.percentage
    }

    #[must_use]
    pub fn time_spent_secs(&self) -> u64 {
        self.time_spent_secs
    }

    /// Long-form time spent, e.g. "12 minutes 5 seconds".
    #[must_use]
    pub fn time_spent(&self) -> String {
        format_duration_secs(self.time_spent_secs)
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn ended_at(&self) -> DateTime<Utc> {
        self.ended_at
    }

    #[must_use]
    pub fn details(&self) -> &[QuestionDetail] {
        &self.details
    }

    /// Incorrect and unanswered questions together.
    #[must_use]
    pub fn missed(&self) -> u32 {
        self.total_questions - self.correct_answers
    }

    #[must_use]
    pub fn unanswered(&self) -> usize {
        self.details
            .iter()
            .filter(|d| d.user_answer().is_none())
            .count()
    }
}
