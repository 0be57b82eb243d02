use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

use exam_core::model::{
    AttemptId, ExamConfig, ExamResult, OptionLabel, Question, UserAnswer,
};
use storage::repository::QuestionRepository;

use crate::Clock;
use crate::analytics::{Analytics, ExamCompleted, NoopAnalytics, QuestionAnswered};
use crate::error::{ExamError, SessionError};
use super::progress::ExamProgress;
use super::timer::{ExamTimer, TimerEvent, TimerHandle};

//
// ─── PHASE ─────────────────────────────────────────────────────────────────────
//

/// Lifecycle of a single exam attempt.
///
/// `Loading → Active → Submitted`, `Loading → Failed`, and
/// `Loading | Active → Abandoned`. Every phase but `Loading` and `Active` is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Loading,
    Active,
    Submitted,
    Failed,
    Abandoned,
}

impl SessionPhase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Active => "active",
            Self::Submitted => "submitted",
            Self::Failed => "failed",
            Self::Abandoned => "abandoned",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Loading | Self::Active)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of `ExamController::request_submit`.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Submitted(ExamResult),
    /// Some questions are unanswered; call `force_submit` to proceed.
    ConfirmationRequired { unanswered: usize },
}

//
// ─── CONTROLLER ────────────────────────────────────────────────────────────────
//

/// Drives one exam attempt from question load to submission.
///
/// All mutation goes through `&mut self`, so user commands and timer events
/// are applied in the order the owner feeds them in.
pub struct ExamController {
    config: ExamConfig,
    phase: SessionPhase,
    questions: Vec<Question>,
    answers: Vec<UserAnswer>,
    current: usize,
    total_secs: u32,
    remaining_secs: u32,
    low_time_warned: bool,
    started_at: Option<DateTime<Utc>>,
    result: Option<ExamResult>,
    timer: Option<TimerHandle>,
    analytics: Arc<dyn Analytics>,
    clock: Clock,
}

impl ExamController {
    /// Create a controller in the `Loading` phase.
    #[must_use]
    pub fn new(config: ExamConfig, clock: Clock) -> Self {
        let total_secs = config.duration_secs();
        Self {
            config,
            phase: SessionPhase::Loading,
            questions: Vec::new(),
            answers: Vec::new(),
            current: 0,
            total_secs,
            remaining_secs: total_secs,
            low_time_warned: false,
            started_at: None,
            result: None,
            timer: None,
            analytics: Arc::new(NoopAnalytics),
            clock,
        }
    }

    #[must_use]
    pub fn with_analytics(mut self, analytics: Arc<dyn Analytics>) -> Self {
        self.analytics = analytics;
        self
    }

    /// Build an `Active` controller over an already fetched question list.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::NoQuestionsAvailable` if `questions` is empty.
    pub fn from_questions(
        config: ExamConfig,
        questions: Vec<Question>,
        clock: Clock,
        analytics: Arc<dyn Analytics>,
    ) -> Result<Self, ExamError> {
        let mut controller = Self::new(config, clock).with_analytics(analytics);
        controller.accept_questions(questions)?;
        Ok(controller)
    }

    /// Fetch the question sample for this controller's configuration.
    ///
    /// On failure the controller moves to `Failed` and keeps no questions.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Repository` if the fetch fails,
    /// `ExamError::NoQuestionsAvailable` if it returns nothing, and
    /// `SessionError::AlreadyLoaded` if the controller is past `Loading`.
    pub async fn load(&mut self, repo: &dyn QuestionRepository) -> Result<(), ExamError> {
        if self.phase != SessionPhase::Loading {
            return Err(SessionError::AlreadyLoaded { phase: self.phase }.into());
        }

        let fetched = repo
            .sample(
                self.config.subjects(),
                self.config.tags(),
                self.config.question_count(),
            )
            .await;
        match fetched {
            Ok(questions) => self.accept_questions(questions),
            Err(err) => {
                tracing::warn!(error = %err, "failed to load exam questions");
                self.phase = SessionPhase::Failed;
                Err(err.into())
            }
        }
    }

    fn accept_questions(&mut self, questions: Vec<Question>) -> Result<(), ExamError> {
        if questions.is_empty() {
            tracing::warn!(
                requested = self.config.question_count(),
                "question sample came back empty"
            );
            self.phase = SessionPhase::Failed;
            return Err(ExamError::NoQuestionsAvailable);
        }

        self.answers = questions
            .iter()
            .map(|q| UserAnswer::unanswered(q.id().clone()))
            .collect();
        self.questions = questions;
        self.current = 0;
        self.started_at = Some(self.clock.now());
        self.phase = SessionPhase::Active;
        tracing::info!(
            questions = self.questions.len(),
            duration_secs = self.total_secs,
            "exam session loaded"
        );
        Ok(())
    }

    //
    // ─── ACCESSORS ─────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn config(&self) -> &ExamConfig {
        &self.config
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Active
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn answers(&self) -> &[UserAnswer] {
        &self.answers
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current)
    }

    #[must_use]
    pub fn current_answer(&self) -> Option<&UserAnswer> {
        self.answers.get(self.current)
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.iter().filter(|a| a.is_answered()).count()
    }

    #[must_use]
    pub fn unanswered_count(&self) -> usize {
        self.answers.len() - self.answered_count()
    }

    #[must_use]
    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    #[must_use]
    pub fn total_secs(&self) -> u32 {
        self.total_secs
    }

    #[must_use]
    pub fn low_time_warned(&self) -> bool {
        self.low_time_warned
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Seconds since the questions loaded, by the controller's clock.
    #[must_use]
    pub fn elapsed_secs(&self) -> u64 {
        self.started_at
            .map_or(0, |started| self.clock.seconds_since(started))
    }

    /// The frozen result once `Submitted`.
    #[must_use]
    pub fn result(&self) -> Option<&ExamResult> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn has_running_timer(&self) -> bool {
        self.timer.as_ref().is_some_and(|t| !t.is_finished())
    }

    #[must_use]
    pub fn progress(&self) -> ExamProgress {
        ExamProgress {
            current: self.current,
            total: self.questions.len(),
            answered: self.answered_count(),
            remaining_secs: self.remaining_secs,
            total_secs: self.total_secs,
        }
    }

    //
    // ─── ANSWERS & NAVIGATION ──────────────────────────────────────────────────
    //

    fn ensure_active(&self) -> Result<(), SessionError> {
        if self.phase == SessionPhase::Active {
            Ok(())
        } else {
            Err(SessionError::NotActive { phase: self.phase })
        }
    }

    /// Record `option` for the current question, replacing any earlier choice.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotActive` outside the `Active` phase.
    pub fn select_option(&mut self, option: OptionLabel) -> Result<(), SessionError> {
        self.ensure_active()?;
        let Some(answer) = self.answers.get_mut(self.current) else {
            return Err(SessionError::NotActive { phase: self.phase });
        };

        let previous = answer.select(option);
        if previous.is_none() {
            let question = &self.questions[self.current];
            self.analytics
                .question_answered(&QuestionAnswered::new(question, question.is_correct(option)));
        }
        tracing::debug!(index = self.current, option = %option, "answer recorded");
        Ok(())
    }

    /// Move to the next question. Returns `false` at the last question.
    pub fn next(&mut self) -> bool {
        if !self.is_active() || self.current + 1 >= self.questions.len() {
            return false;
        }
        self.current += 1;
        true
    }

    /// Move to the previous question. Returns `false` at the first question.
    pub fn previous(&mut self) -> bool {
        if !self.is_active() || self.current == 0 {
            return false;
        }
        self.current -= 1;
        true
    }

    /// Jump to `index`. Out-of-range indices are rejected and return `false`.
    pub fn jump_to(&mut self, index: usize) -> bool {
        if !self.is_active() || index >= self.questions.len() {
            tracing::debug!(index, "ignoring out-of-range jump");
            return false;
        }
        self.current = index;
        true
    }

    //
    // ─── SUBMISSION ────────────────────────────────────────────────────────────
    //

    /// Submit if every question is answered, otherwise ask for confirmation.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotActive` outside the `Active` phase.
    pub fn request_submit(&mut self) -> Result<SubmitOutcome, SessionError> {
        self.ensure_active()?;
        let unanswered = self.unanswered_count();
        if unanswered > 0 {
            return Ok(SubmitOutcome::ConfirmationRequired { unanswered });
        }
        self.submit().map(SubmitOutcome::Submitted)
    }

    /// Submit regardless of unanswered questions.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotActive` outside the `Active` phase, which
    /// includes any second submission.
    pub fn force_submit(&mut self) -> Result<ExamResult, SessionError> {
        self.ensure_active()?;
        self.submit()
    }

    /// Time ran out: submit without confirmation.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotActive` outside the `Active` phase.
    pub fn on_time_expired(&mut self) -> Result<ExamResult, SessionError> {
        self.ensure_active()?;
        self.remaining_secs = 0;
        tracing::info!(
            unanswered = self.unanswered_count(),
            "exam time expired, submitting"
        );
        self.submit()
    }

    fn submit(&mut self) -> Result<ExamResult, SessionError> {
        let started_at = self.started_at.unwrap_or_else(|| self.clock.now());
        let ended_at = self.clock.now().max(started_at);
        let result = ExamResult::from_session(
            AttemptId::generate(),
            &self.questions,
            &self.answers,
            started_at,
            ended_at,
        )?;

        self.phase = SessionPhase::Submitted;
        self.stop_timer();
        self.analytics
            .exam_completed(&ExamCompleted::from_result(&result));
        tracing::info!(
            id = %result.id(),
            correct = result.correct_answers(),
            total = result.total_questions(),
            "exam submitted"
        );
        self.result = Some(result.clone());
        Ok(result)
    }

    /// Leave the session without a result. Returns `false` if already terminal.
    pub fn abandon(&mut self) -> bool {
        if self.phase.is_terminal() {
            return false;
        }
        self.phase = SessionPhase::Abandoned;
        self.stop_timer();
        tracing::info!("exam session abandoned");
        true
    }

    //
    // ─── TIMER ─────────────────────────────────────────────────────────────────
    //

    /// Spawn the countdown for the remaining session time.
    ///
    /// The controller keeps the handle and cancels it on every terminal
    /// transition. Any previous countdown is cancelled first. Feed the
    /// received events to `handle_timer_event`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotActive` outside the `Active` phase.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start_timer(&mut self) -> Result<mpsc::UnboundedReceiver<TimerEvent>, SessionError> {
        self.ensure_active()?;
        self.stop_timer();
        let (handle, rx) = ExamTimer::spawn(self.remaining_secs);
        self.timer = Some(handle);
        Ok(rx)
    }

    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }

    /// Apply one countdown event.
    ///
    /// Returns the result when the event expired the session. A tick down to
    /// zero expires it at once, so no answer lands between that tick and
    /// `Expired`. Events arriving after the session left `Active` are ignored.
    ///
    /// # Errors
    ///
    /// Propagates `SessionError::Result` if the result cannot be built.
    pub fn handle_timer_event(
        &mut self,
        event: TimerEvent,
    ) -> Result<Option<ExamResult>, SessionError> {
        if !self.is_active() {
            return Ok(None);
        }
        match event {
            TimerEvent::Tick { remaining: 0 } | TimerEvent::Expired => {
                self.on_time_expired().map(Some)
            }
            TimerEvent::Tick { remaining } => {
                self.remaining_secs = remaining;
                Ok(None)
            }
            TimerEvent::LowTime => {
                self.low_time_warned = true;
                tracing::info!(remaining_secs = self.remaining_secs, "low time warning");
                Ok(None)
            }
        }
    }
}

impl fmt::Debug for ExamController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExamController")
            .field("phase", &self.phase)
            .field("questions_len", &self.questions.len())
            .field("current", &self.current)
            .field("answered", &self.answered_count())
            .field("remaining_secs", &self.remaining_secs)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{AnalyticsEvent, RecordingAnalytics};
    use async_trait::async_trait;
    use exam_core::model::{QuestionId, Subject, TagName};
    use exam_core::time::{fixed_clock, fixed_now};
    use std::collections::BTreeSet;
    use storage::repository::StorageError;

    fn config(count: u32) -> ExamConfig {
        ExamConfig::new(
            [Subject::Physics],
            [TagName::new("mechanics").unwrap()],
            count,
        )
        .unwrap()
    }

    fn question(id: usize) -> Question {
        Question::new(
            QuestionId::new(format!("q{id}")).unwrap(),
            Subject::Physics,
            format!("Question {id}"),
            ["w".into(), "x".into(), "y".into(), "z".into()],
            OptionLabel::B,
            [TagName::new("mechanics").unwrap()],
        )
        .unwrap()
    }

    fn active(count: usize) -> (ExamController, RecordingAnalytics) {
        let recorder = RecordingAnalytics::new();
        let controller = ExamController::from_questions(
            config(u32::try_from(count).unwrap()),
            (0..count).map(question).collect(),
            fixed_clock(),
            Arc::new(recorder.clone()),
        )
        .unwrap();
        (controller, recorder)
    }

    struct FailingRepo;

    #[async_trait]
    impl QuestionRepository for FailingRepo {
        async fn count_matching(
            &self,
            _subjects: &BTreeSet<Subject>,
            _tags: &BTreeSet<TagName>,
        ) -> Result<u64, StorageError> {
            Err(StorageError::Connection("offline".into()))
        }

        async fn sample(
            &self,
            _subjects: &BTreeSet<Subject>,
            _tags: &BTreeSet<TagName>,
            _count: u32,
        ) -> Result<Vec<Question>, StorageError> {
            Err(StorageError::Connection("offline".into()))
        }

        async fn subject_tags(
            &self,
            _subjects: &BTreeSet<Subject>,
        ) -> Result<Vec<TagName>, StorageError> {
            Err(StorageError::Connection("offline".into()))
        }
    }

    #[test]
    fn loads_into_active_with_unanswered_slots() {
        let (controller, _) = active(3);
        assert_eq!(controller.phase(), SessionPhase::Active);
        assert_eq!(controller.answers().len(), controller.questions().len());
        assert!(controller.answers().iter().all(|a| !a.is_answered()));
        assert_eq!(controller.current_index(), 0);
        assert_eq!(controller.started_at(), Some(fixed_now()));
        assert_eq!(controller.remaining_secs(), 1800);
        assert_eq!(controller.elapsed_secs(), 0);
    }

    #[test]
    fn empty_question_list_is_rejected() {
        let err = ExamController::from_questions(
            config(5),
            Vec::new(),
            fixed_clock(),
            Arc::new(NoopAnalytics),
        )
        .unwrap_err();
        assert!(matches!(err, ExamError::NoQuestionsAvailable));
    }

    #[tokio::test]
    async fn repository_failure_moves_to_failed() {
        let mut controller = ExamController::new(config(5), fixed_clock());
        let err = controller.load(&FailingRepo).await.unwrap_err();
        assert!(matches!(err, ExamError::Repository(_)));
        assert_eq!(controller.phase(), SessionPhase::Failed);
        assert!(controller.questions().is_empty());

        let again = controller.load(&FailingRepo).await.unwrap_err();
        assert!(matches!(
            again,
            ExamError::Session(SessionError::AlreadyLoaded { .. })
        ));
    }

    #[test]
    fn navigation_stays_in_bounds() {
        let (mut controller, _) = active(3);
        assert!(!controller.previous());
        assert_eq!(controller.current_index(), 0);

        assert!(controller.next());
        assert!(controller.next());
        assert!(!controller.next());
        assert_eq!(controller.current_index(), 2);

        assert!(!controller.jump_to(3));
        assert!(!controller.jump_to(usize::MAX));
        assert_eq!(controller.current_index(), 2);

        assert!(controller.jump_to(1));
        assert!(controller.jump_to(1));
        assert_eq!(controller.current_index(), 1);
        assert!(controller.previous());
        assert_eq!(controller.current_index(), 0);
    }

    #[test]
    fn analytics_fire_only_on_first_selection() {
        let (mut controller, recorder) = active(2);
        controller.select_option(OptionLabel::A).unwrap();
        controller.select_option(OptionLabel::B).unwrap();

        let events = recorder.events();
        assert_eq!(events.len(), 1);
        let AnalyticsEvent::QuestionAnswered(event) = &events[0] else {
            panic!("unexpected event {:?}", events[0]);
        };
        assert_eq!(event.question_id.as_str(), "q0");
        assert_eq!(event.subject, Subject::Physics);
        assert!(!event.is_correct);
        assert_eq!(
            controller.current_answer().unwrap().selected(),
            Some(OptionLabel::B)
        );
    }

    #[test]
    fn request_submit_asks_for_confirmation_when_unanswered() {
        let (mut controller, _) = active(3);
        controller.select_option(OptionLabel::B).unwrap();

        let outcome = controller.request_submit().unwrap();
        assert_eq!(outcome, SubmitOutcome::ConfirmationRequired { unanswered: 2 });
        assert!(controller.is_active());

        let result = controller.force_submit().unwrap();
        assert_eq!(result.total_questions(), 3);
        assert_eq!(result.correct_answers(), 1);
        assert_eq!(controller.phase(), SessionPhase::Submitted);
    }

    #[test]
    fn request_submit_submits_when_all_answered() {
        let (mut controller, recorder) = active(2);
        controller.select_option(OptionLabel::B).unwrap();
        controller.next();
        controller.select_option(OptionLabel::B).unwrap();

        let SubmitOutcome::Submitted(result) = controller.request_submit().unwrap() else {
            panic!("expected submission");
        };
        assert!((result.percentage() - 100.0).abs() < f64::EPSILON);
        assert_eq!(controller.result(), Some(&result));

        let completed = recorder
            .events()
            .into_iter()
            .filter(|e| matches!(e, AnalyticsEvent::ExamCompleted(_)))
            .count();
        assert_eq!(completed, 1);
    }

    #[test]
    fn submitted_session_rejects_mutation() {
        let (mut controller, recorder) = active(2);
        controller.force_submit().unwrap();

        assert!(matches!(
            controller.force_submit(),
            Err(SessionError::NotActive {
                phase: SessionPhase::Submitted
            })
        ));
        assert!(controller.select_option(OptionLabel::A).is_err());
        assert!(controller.request_submit().is_err());
        assert!(!controller.next());
        assert!(!controller.jump_to(1));
        assert!(!controller.abandon());
        assert_eq!(
            controller
                .handle_timer_event(TimerEvent::Expired)
                .unwrap(),
            None
        );

        let completed = recorder
            .events()
            .into_iter()
            .filter(|e| matches!(e, AnalyticsEvent::ExamCompleted(_)))
            .count();
        assert_eq!(completed, 1);
    }

    #[test]
    fn timer_events_update_remaining_and_expire() {
        let (mut controller, _) = active(3);
        controller.select_option(OptionLabel::B).unwrap();

        assert_eq!(
            controller
                .handle_timer_event(TimerEvent::Tick { remaining: 300 })
                .unwrap(),
            None
        );
        controller.handle_timer_event(TimerEvent::LowTime).unwrap();
        assert!(controller.low_time_warned());
        assert_eq!(controller.remaining_secs(), 300);

        let result = controller
            .handle_timer_event(TimerEvent::Expired)
            .unwrap()
            .expect("expiry submits");
        assert_eq!(result.unanswered(), 2);
        assert_eq!(controller.remaining_secs(), 0);
        assert_eq!(controller.phase(), SessionPhase::Submitted);
    }

    #[test]
    fn final_tick_submits_before_any_later_answer() {
        let (mut controller, recorder) = active(1);

        let result = controller
            .handle_timer_event(TimerEvent::Tick { remaining: 0 })
            .unwrap()
            .expect("reaching zero submits");
        assert_eq!(result.unanswered(), 1);
        assert_eq!(controller.phase(), SessionPhase::Submitted);
        assert_eq!(controller.remaining_secs(), 0);

        assert!(matches!(
            controller.select_option(OptionLabel::B),
            Err(SessionError::NotActive { .. })
        ));
        assert_eq!(
            controller.handle_timer_event(TimerEvent::Expired).unwrap(),
            None
        );
        assert_eq!(controller.result().unwrap().correct_answers(), 0);
        let completed = recorder
            .events()
            .iter()
            .filter(|e| matches!(e, AnalyticsEvent::ExamCompleted(_)))
            .count();
        assert_eq!(completed, 1);
    }

    #[test]
    fn abandon_is_terminal() {
        let (mut controller, _) = active(2);
        assert!(controller.abandon());
        assert_eq!(controller.phase(), SessionPhase::Abandoned);
        assert!(controller.force_submit().is_err());
        assert!(controller.result().is_none());
    }

    #[test]
    fn progress_reports_counts_and_time() {
        let (mut controller, _) = active(4);
        controller.select_option(OptionLabel::A).unwrap();
        controller
            .handle_timer_event(TimerEvent::Tick { remaining: 900 })
            .unwrap();

        let progress = controller.progress();
        assert_eq!(progress.total, 4);
        assert_eq!(progress.answered, 1);
        assert!((progress.percent_complete() - 25.0).abs() < f64::EPSILON);
        assert!((progress.time_percent_left() - 50.0).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn submission_cancels_running_timer() {
        let (mut controller, _) = active(2);
        let mut rx = controller.start_timer().unwrap();
        let first = rx.recv().await.unwrap();
        controller.handle_timer_event(first).unwrap();
        assert!(controller.has_running_timer());

        controller.force_submit().unwrap();
        assert!(!controller.has_running_timer());
        assert_eq!(rx.recv().await, None);
    }
}
