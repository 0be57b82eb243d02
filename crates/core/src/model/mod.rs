mod answer;
mod config;
mod ids;
mod question;
mod result;
mod subject;
mod tag;

pub use answer::{AnswerStatus, UserAnswer};
pub use config::{ConfigError, ExamConfig};
pub use ids::{AttemptId, ParseIdError, QuestionId};
pub use question::{Difficulty, ImageRef, InvalidOptionLabel, OptionLabel, Question, QuestionError};
pub use result::{ExamResult, QuestionDetail, ResultError};
pub use subject::{Subject, UnknownSubject};
pub use tag::{TagError, TagName};
