use std::collections::BTreeSet;
use std::sync::Arc;

use exam_core::model::{ExamConfig, Subject, TagName};
use storage::repository::QuestionRepository;

use crate::Clock;
use crate::analytics::{Analytics, ExamStarted, NoopAnalytics};
use crate::error::{ExamError, ValidationError};
use super::controller::ExamController;

/// Result of a capacity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity {
    pub requested: u32,
    pub available: u64,
}

impl Capacity {
    #[must_use]
    pub fn is_sufficient(&self) -> bool {
        self.available >= u64::from(self.requested)
    }
}

/// Configuration step: tag discovery, capacity validation and session start.
#[derive(Clone)]
pub struct ExamService {
    clock: Clock,
    questions: Arc<dyn QuestionRepository>,
    analytics: Arc<dyn Analytics>,
}

impl ExamService {
    #[must_use]
    pub fn new(clock: Clock, questions: Arc<dyn QuestionRepository>) -> Self {
        Self {
            clock,
            questions,
            analytics: Arc::new(NoopAnalytics),
        }
    }

    #[must_use]
    pub fn with_analytics(mut self, analytics: Arc<dyn Analytics>) -> Self {
        self.analytics = analytics;
        self
    }

    #[must_use]
    pub fn analytics(&self) -> Arc<dyn Analytics> {
        Arc::clone(&self.analytics)
    }

    /// Tags offered for the given subjects.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Repository` if the store cannot be queried.
    pub async fn available_tags(
        &self,
        subjects: &BTreeSet<Subject>,
    ) -> Result<Vec<TagName>, ExamError> {
        if subjects.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.questions.subject_tags(subjects).await?)
    }

    /// Count matching questions without fetching them.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Repository` if the count query fails.
    pub async fn check_capacity(&self, config: &ExamConfig) -> Result<Capacity, ExamError> {
        let available = self
            .questions
            .count_matching(config.subjects(), config.tags())
            .await?;
        tracing::debug!(
            requested = config.question_count(),
            available,
            "capacity checked"
        );
        Ok(Capacity {
            requested: config.question_count(),
            available,
        })
    }

    /// Confirm that enough questions exist for `config`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InsufficientQuestions` when fewer questions
    /// match than requested, or `ExamError::Repository` if the check fails.
    pub async fn validate(&self, config: &ExamConfig) -> Result<Capacity, ExamError> {
        let capacity = self.check_capacity(config).await?;
        if !capacity.is_sufficient() {
            return Err(ValidationError::InsufficientQuestions {
                requested: capacity.requested,
                available: capacity.available,
            }
            .into());
        }
        Ok(capacity)
    }

    /// Validate, announce and load a new session.
    ///
    /// Capacity check and fetch are independent queries, so a passing check can
    /// still be followed by `ExamError::NoQuestionsAvailable`.
    ///
    /// # Errors
    ///
    /// Returns `ExamError` for validation, repository or empty-sample failures.
    pub async fn start(&self, config: ExamConfig) -> Result<ExamController, ExamError> {
        self.validate(&config).await?;
        self.analytics
            .exam_started(&ExamStarted::from_config(&config));
        self.load(config).await
    }

    /// Load a session without validating or announcing it.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Repository` or `ExamError::NoQuestionsAvailable`.
    pub async fn load(&self, config: ExamConfig) -> Result<ExamController, ExamError> {
        let mut controller =
            ExamController::new(config, self.clock).with_analytics(Arc::clone(&self.analytics));
        controller.load(self.questions.as_ref()).await?;
        Ok(controller)
    }
}
