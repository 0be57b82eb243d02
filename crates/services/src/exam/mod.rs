mod controller;
mod progress;
mod timer;
mod workflow;

// Public API of the exam subsystem.
pub use crate::error::{ExamError, SessionError, ValidationError};
pub use controller::{ExamController, SessionPhase, SubmitOutcome};
pub use progress::ExamProgress;
pub use timer::{Countdown, ExamTimer, TICK_PERIOD, TimerEvent, TimerHandle};
pub use workflow::{Capacity, ExamService};
