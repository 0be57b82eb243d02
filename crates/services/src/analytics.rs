//! Fire-and-forget usage analytics.
//!
//! Every method has a no-op default so sinks only implement what they record.
//! Implementations must not panic or block; nothing they do can affect an exam.

use std::sync::{Arc, Mutex};

use exam_core::model::{ExamConfig, ExamResult, Question, QuestionId, Subject};

/// Payload of `exam_started`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamStarted {
    pub subjects: String,
    pub tags: String,
    pub question_count: u32,
}

impl ExamStarted {
    #[must_use]
    pub fn from_config(config: &ExamConfig) -> Self {
        let subjects: Vec<&str> = config.subjects().iter().map(|s| s.as_str()).collect();
        let tags: Vec<&str> = config.tags().iter().map(|t| t.as_str()).collect();
        Self {
            subjects: subjects.join(","),
            tags: tags.join(","),
            question_count: config.question_count(),
        }
    }
}

/// Payload of `question_answered`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionAnswered {
    pub question_id: QuestionId,
    pub subject: Subject,
    pub is_correct: bool,
}

impl QuestionAnswered {
    #[must_use]
    pub fn new(question: &Question, is_correct: bool) -> Self {
        Self {
            question_id: question.id().clone(),
            subject: question.subject(),
            is_correct,
        }
    }
}

/// Payload of `exam_completed`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExamCompleted {
    pub total_questions: u32,
    pub correct_answers: u32,
    pub percentage: f64,
    pub time_spent: String,
}

impl ExamCompleted {
    #[must_use]
    pub fn from_result(result: &ExamResult) -> Self {
        Self {
            total_questions: result.total_questions(),
            correct_answers: result.correct_answers(),
            percentage: result.percentage(),
            time_spent: result.time_spent(),
        }
    }
}

/// Analytics capability injected into the session controller and flow.
pub trait Analytics: Send + Sync {
    fn exam_started(&self, _event: &ExamStarted) {}
    fn question_answered(&self, _event: &QuestionAnswered) {}
    fn exam_completed(&self, _event: &ExamCompleted) {}
    fn exam_retaken(&self) {}
    fn new_exam_started(&self) {}
    fn report_printed(&self) {}
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAnalytics;

impl Analytics for NoopAnalytics {}

/// Emits every event as a structured `tracing` event under the `analytics` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAnalytics;

impl Analytics for TracingAnalytics {
    fn exam_started(&self, event: &ExamStarted) {
        tracing::info!(
            target: "analytics",
            subjects = %event.subjects,
            tags = %event.tags,
            question_count = event.question_count,
            "exam_started"
        );
    }

    fn question_answered(&self, event: &QuestionAnswered) {
        tracing::info!(
            target: "analytics",
            question_id = %event.question_id,
            subject = %event.subject,
            is_correct = event.is_correct,
            "question_answered"
        );
    }

    fn exam_completed(&self, event: &ExamCompleted) {
        tracing::info!(
            target: "analytics",
            total_questions = event.total_questions,
            correct_answers = event.correct_answers,
            percentage = event.percentage,
            time_spent = %event.time_spent,
            "exam_completed"
        );
    }

    fn exam_retaken(&self) {
        tracing::info!(target: "analytics", "exam_retaken");
    }

    fn new_exam_started(&self) {
        tracing::info!(target: "analytics", "new_exam_started");
    }

    fn report_printed(&self) {
        tracing::info!(target: "analytics", "report_printed");
    }
}

/// One recorded analytics event.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalyticsEvent {
    ExamStarted(ExamStarted),
    QuestionAnswered(QuestionAnswered),
    ExamCompleted(ExamCompleted),
    ExamRetaken,
    NewExamStarted,
    ReportPrinted,
}

/// Keeps events in memory, in emission order.
#[derive(Debug, Clone, Default)]
pub struct RecordingAnalytics {
    events: Arc<Mutex<Vec<AnalyticsEvent>>>,
}

impl RecordingAnalytics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<AnalyticsEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    fn push(&self, event: AnalyticsEvent) {
        // A poisoned lock only loses the event.
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl Analytics for RecordingAnalytics {
    fn exam_started(&self, event: &ExamStarted) {
        self.push(AnalyticsEvent::ExamStarted(event.clone()));
    }

    fn question_answered(&self, event: &QuestionAnswered) {
        self.push(AnalyticsEvent::QuestionAnswered(event.clone()));
    }

    fn exam_completed(&self, event: &ExamCompleted) {
        self.push(AnalyticsEvent::ExamCompleted(event.clone()));
    }

    fn exam_retaken(&self) {
        self.push(AnalyticsEvent::ExamRetaken);
    }

    fn new_exam_started(&self) {
        self.push(AnalyticsEvent::NewExamStarted);
    }

    fn report_printed(&self) {
        self.push(AnalyticsEvent::ReportPrinted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::{Subject, TagName};

    #[test]
    fn exam_started_joins_sorted_selection() {
        let config = ExamConfig::new(
            [Subject::Physics, Subject::Chemistry],
            [TagName::new("optics").unwrap(), TagName::new("atoms").unwrap()],
            5,
        )
        .unwrap();
        let event = ExamStarted::from_config(&config);
        assert_eq!(event.subjects, "physics,chemistry");
        assert_eq!(event.tags, "atoms,optics");
        assert_eq!(event.question_count, 5);
    }

    #[test]
    fn recording_keeps_order() {
        let recorder = RecordingAnalytics::new();
        let sink: Arc<dyn Analytics> = Arc::new(recorder.clone());
        sink.new_exam_started();
        sink.report_printed();
        NoopAnalytics.exam_retaken();
        assert_eq!(
            recorder.events(),
            vec![AnalyticsEvent::NewExamStarted, AnalyticsEvent::ReportPrinted]
        );
    }
}
