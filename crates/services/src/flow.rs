//! Explicit application state: configure, take, review.

use std::sync::Arc;

use exam_core::model::{ExamConfig, ExamResult};
use storage::repository::ResultRepository;

use crate::error::FlowError;
use crate::exam::{ExamController, ExamService, SessionPhase};

/// The step the application is on.
#[derive(Debug)]
pub enum FlowState {
    /// Picking subjects, tags and count. `previous` pre-fills the form after
    /// a cancelled exam.
    Configuring { previous: Option<ExamConfig> },
    InSession(ExamController),
    Reviewing {
        config: ExamConfig,
        result: ExamResult,
    },
}

impl FlowState {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Configuring { .. } => "configuring",
            Self::InSession(_) => "in session",
            Self::Reviewing { .. } => "reviewing",
        }
    }
}

/// Owns the current `FlowState` and performs the allowed transitions.
pub struct ExamFlow {
    exams: ExamService,
    history: Option<Arc<dyn ResultRepository>>,
    state: FlowState,
}

impl ExamFlow {
    #[must_use]
    pub fn new(exams: ExamService) -> Self {
        Self {
            exams,
            history: None,
            state: FlowState::Configuring { previous: None },
        }
    }

    /// Persist finished results to `history`.
    #[must_use]
    pub fn with_history(mut self, history: Arc<dyn ResultRepository>) -> Self {
        self.history = Some(history);
        self
    }

    #[must_use]
    pub fn state(&self) -> &FlowState {
        &self.state
    }

    #[must_use]
    pub fn session(&self) -> Option<&ExamController> {
        match &self.state {
            FlowState::InSession(controller) => Some(controller),
            _ => None,
        }
    }

    pub fn session_mut(&mut self) -> Option<&mut ExamController> {
        match &mut self.state {
            FlowState::InSession(controller) => Some(controller),
            _ => None,
        }
    }

    #[must_use]
    pub fn result(&self) -> Option<&ExamResult> {
        match &self.state {
            FlowState::Reviewing { result, .. } => Some(result),
            _ => None,
        }
    }

    fn invalid(&self, event: &'static str) -> FlowError {
        FlowError::InvalidTransition {
            event,
            state: self.state.name(),
        }
    }

    /// Configuring → InSession.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Exam` if validation or loading fails; the flow stays
    /// in `Configuring`.
    pub async fn start(&mut self, config: ExamConfig) -> Result<(), FlowError> {
        if !matches!(self.state, FlowState::Configuring { .. }) {
            return Err(self.invalid("start an exam"));
        }
        let controller = self.exams.start(config).await?;
        self.state = FlowState::InSession(controller);
        Ok(())
    }

    /// InSession (submitted) → Reviewing, recording the result in history.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::InvalidTransition` unless the session was submitted.
    pub async fn finish(&mut self) -> Result<&ExamResult, FlowError> {
        let FlowState::InSession(controller) = &self.state else {
            return Err(self.invalid("review results"));
        };
        let submitted = controller.phase() == SessionPhase::Submitted;
        let Some(result) = controller.result().filter(|_| submitted).cloned() else {
            return Err(self.invalid("review results"));
        };
        let config = controller.config().clone();

        if let Some(history) = &self.history {
            if let Err(err) = history.append_result(&result).await {
                tracing::warn!(error = %err, id = %result.id(), "failed to save exam result");
            }
        }

        self.state = FlowState::Reviewing { config, result };
        self.result().ok_or_else(|| self.invalid("review results"))
    }

    /// InSession → Configuring, abandoning the session.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::InvalidTransition` outside `InSession`.
    pub fn cancel(&mut self) -> Result<(), FlowError> {
        let FlowState::InSession(controller) = &mut self.state else {
            return Err(self.invalid("cancel the exam"));
        };
        controller.abandon();
        let previous = Some(controller.config().clone());
        self.state = FlowState::Configuring { previous };
        Ok(())
    }

    /// Reviewing → InSession with the same configuration and a fresh sample.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::InvalidTransition` outside `Reviewing`, or
    /// `FlowError::Exam` if loading fails; the flow then stays in `Reviewing`.
    pub async fn retake(&mut self) -> Result<(), FlowError> {
        let FlowState::Reviewing { config, .. } = &self.state else {
            return Err(self.invalid("retake the exam"));
        };
        let controller = self.exams.load(config.clone()).await?;
        self.exams.analytics().exam_retaken();
        self.state = FlowState::InSession(controller);
        Ok(())
    }

    /// Any state → Configuring with a blank form.
    pub fn new_exam(&mut self) {
        if let FlowState::InSession(controller) = &mut self.state {
            controller.abandon();
        }
        self.state = FlowState::Configuring { previous: None };
        self.exams.analytics().new_exam_started();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExamError;
    use crate::analytics::{AnalyticsEvent, RecordingAnalytics};
    use exam_core::model::{OptionLabel, Question, QuestionId, Subject, TagName};
    use exam_core::time::fixed_clock;
    use storage::repository::{InMemoryRepository, QuestionStore};

    fn config(count: u32) -> ExamConfig {
        ExamConfig::new([Subject::Biology], [TagName::new("cells").unwrap()], count).unwrap()
    }

    async fn flow(questions: usize) -> (ExamFlow, InMemoryRepository, RecordingAnalytics) {
        let repo = InMemoryRepository::new();
        for id in 0..questions {
            let question = Question::new(
                QuestionId::new(format!("b{id}")).unwrap(),
                Subject::Biology,
                format!("Question {id}"),
                ["1".into(), "2".into(), "3".into(), "4".into()],
                OptionLabel::A,
                [TagName::new("cells").unwrap()],
            )
            .unwrap();
            repo.upsert_question(&question).await.unwrap();
        }
        let recorder = RecordingAnalytics::new();
        let exams = ExamService::new(fixed_clock(), Arc::new(repo.clone()))
            .with_analytics(Arc::new(recorder.clone()));
        let flow = ExamFlow::new(exams).with_history(Arc::new(repo.clone()));
        (flow, repo, recorder)
    }

    #[tokio::test]
    async fn full_cycle_persists_and_retakes() {
        let (mut flow, repo, recorder) = flow(3).await;
        flow.start(config(2)).await.unwrap();

        let session = flow.session_mut().unwrap();
        session.force_submit().unwrap();
        let id = flow.finish().await.unwrap().id();
        assert!(flow.result().is_some());
        assert_eq!(repo.get_result(id).await.unwrap().total_questions(), 2);

        flow.retake().await.unwrap();
        assert!(flow.session().is_some_and(ExamController::is_active));

        flow.new_exam();
        assert!(matches!(
            flow.state(),
            FlowState::Configuring { previous: None }
        ));

        let events = recorder.events();
        assert!(matches!(events.first(), Some(AnalyticsEvent::ExamStarted(_))));
        assert!(events.contains(&AnalyticsEvent::ExamRetaken));
        assert_eq!(events.last(), Some(&AnalyticsEvent::NewExamStarted));
    }

    #[tokio::test]
    async fn failed_start_stays_configuring() {
        let (mut flow, _, _) = flow(1).await;
        let err = flow.start(config(5)).await.unwrap_err();
        assert!(matches!(err, FlowError::Exam(ExamError::Validation(_))));
        assert!(matches!(flow.state(), FlowState::Configuring { .. }));
    }

    #[tokio::test]
    async fn cancel_keeps_previous_config() {
        let (mut flow, _, _) = flow(2).await;
        flow.start(config(2)).await.unwrap();
        flow.cancel().unwrap();
        assert!(matches!(
            flow.state(),
            FlowState::Configuring { previous: Some(c) } if c.question_count() == 2
        ));
    }

    #[tokio::test]
    async fn out_of_order_events_are_rejected() {
        let (mut flow, _, _) = flow(2).await;
        assert!(matches!(
            flow.finish().await,
            Err(FlowError::InvalidTransition { .. })
        ));
        assert!(flow.cancel().is_err());
        assert!(flow.retake().await.is_err());

        flow.start(config(2)).await.unwrap();
        assert!(matches!(
            flow.start(config(2)).await,
            Err(FlowError::InvalidTransition { .. })
        ));
        assert!(matches!(
            flow.finish().await,
            Err(FlowError::InvalidTransition {
                state: "in session",
                ..
            })
        ));
    }
}
