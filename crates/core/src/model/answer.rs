use serde::{Deserialize, Serialize};

use crate::model::{OptionLabel, Question, QuestionId};

/// The user's selection for one question; `None` means unanswered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAnswer {
    question_id: QuestionId,
    selected: Option<OptionLabel>,
}

impl UserAnswer {
    #[must_use]
    pub fn unanswered(question_id: QuestionId) -> Self {
        Self {
            question_id,
            selected: None,
        }
    }

    #[must_use]
    pub fn question_id(&self) -> &QuestionId {
        &self.question_id
    }

    #[must_use]
    pub fn selected(&self) -> Option<OptionLabel> {
        self.selected
    }

    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.selected.is_some()
    }

    /// Record `option`, returning the previous selection.
    pub fn select(&mut self, option: OptionLabel) -> Option<OptionLabel> {
        self.selected.replace(option)
    }
}

/// Outcome of a single question once the exam is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerStatus {
    Correct,
    Incorrect,
    Unanswered,
}

impl AnswerStatus {
    #[must_use]
    pub fn of(question: &Question, selected: Option<OptionLabel>) -> Self {
        match selected {
            None => AnswerStatus::Unanswered,
            Some(label) if question.is_correct(label) => AnswerStatus::Correct,
            Some(_) => AnswerStatus::Incorrect,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_returns_previous_choice() {
        let mut answer = UserAnswer::unanswered(QuestionId::new("q1").unwrap());
        assert!(!answer.is_answered());
        assert_eq!(answer.select(OptionLabel::B), None);
        assert_eq!(answer.select(OptionLabel::D), Some(OptionLabel::B));
        assert_eq!(answer.selected(), Some(OptionLabel::D));
    }
}
