#![forbid(unsafe_code)]

pub mod analytics;
pub mod error;
pub mod exam;
pub mod flow;
pub mod history;
pub mod report;

pub use exam_core::Clock;

pub use analytics::{Analytics, NoopAnalytics, RecordingAnalytics, TracingAnalytics};
pub use error::{ExamError, FlowError, SessionError, ValidationError};
pub use exam::{
    Capacity, ExamController, ExamProgress, ExamService, ExamTimer, SessionPhase, SubmitOutcome,
    TimerEvent, TimerHandle,
};
pub use flow::{ExamFlow, FlowState};
pub use history::ResultHistoryService;
pub use report::{PerformanceBand, ResultFilter, ResultOverview, StatusFilter};
