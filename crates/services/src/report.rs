//! Result presentation helpers: filtering, summary metrics, printable and JSON
//! reports.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::fmt::{self, Write as _};
use std::str::FromStr;

use exam_core::model::{AnswerStatus, ExamResult, OptionLabel, QuestionDetail, Subject};
use thiserror::Error;

use crate::analytics::Analytics;

//
// ─── FILTERING ─────────────────────────────────────────────────────────────────
//

/// Status filter for the question breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Correct,
    /// Answered and wrong.
    Incorrect,
    Unanswered,
}

impl StatusFilter {
    #[must_use]
    pub fn accepts(self, status: AnswerStatus) -> bool {
        match self {
            Self::All => true,
            Self::Correct => status == AnswerStatus::Correct,
            Self::Incorrect => status == AnswerStatus::Incorrect,
            Self::Unanswered => status == AnswerStatus::Unanswered,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown status filter: {0}")]
pub struct UnknownStatusFilter(pub String);

impl FromStr for StatusFilter {
    type Err = UnknownStatusFilter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "correct" => Ok(Self::Correct),
            "incorrect" => Ok(Self::Incorrect),
            "unanswered" => Ok(Self::Unanswered),
            other => Err(UnknownStatusFilter(other.to_string())),
        }
    }
}

/// Search and filter criteria for the question-by-question breakdown.
///
/// An empty `search` and an empty `subjects` set match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultFilter {
    pub search: String,
    pub subjects: BTreeSet<Subject>,
    pub status: StatusFilter,
}

impl ResultFilter {
    #[must_use]
    pub fn matches(&self, detail: &QuestionDetail) -> bool {
        let question = detail.question();
        let needle = self.search.trim().to_lowercase();
        let text_ok = needle.is_empty() || question.text().to_lowercase().contains(&needle);
        let subject_ok = self.subjects.is_empty() || self.subjects.contains(&question.subject());
        text_ok && subject_ok && self.status.accepts(detail.status())
    }

    /// Matching details with their zero-based position in the exam.
    #[must_use]
    pub fn apply<'a>(&self, result: &'a ExamResult) -> Vec<(usize, &'a QuestionDetail)> {
        result
            .details()
            .iter()
            .enumerate()
            .filter(|(_, detail)| self.matches(detail))
            .collect()
    }
}

//
// ─── SUMMARY ───────────────────────────────────────────────────────────────────
//

/// Qualitative performance label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceBand {
    Excellent,
    Good,
    Average,
    NeedsImprovement,
}

impl PerformanceBand {
    #[must_use]
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 80.0 {
            Self::Excellent
        } else if percentage >= 60.0 {
            Self::Good
        } else if percentage >= 40.0 {
            Self::Average
        } else {
            Self::NeedsImprovement
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Average => "Average",
            Self::NeedsImprovement => "Needs Improvement",
        }
    }
}

impl fmt::Display for PerformanceBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Letter grade for a percentage score.
#[must_use]
pub fn letter_grade(percentage: f64) -> char {
    match percentage {
        p if p >= 90.0 => 'A',
        p if p >= 80.0 => 'B',
        p if p >= 70.0 => 'C',
        p if p >= 60.0 => 'D',
        p if p >= 40.0 => 'E',
        _ => 'F',
    }
}

/// Per-subject tally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectBreakdown {
    pub subject: Subject,
    pub total: u32,
    pub correct: u32,
    pub unanswered: u32,
}

/// Summary metrics shown above the breakdown.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultOverview {
    pub percentage: f64,
    pub grade: char,
    pub band: PerformanceBand,
    pub correct: u32,
    pub incorrect_or_unanswered: u32,
    pub unanswered: u32,
    pub time_spent: String,
    pub subjects: Vec<SubjectBreakdown>,
}

impl ResultOverview {
    #[must_use]
    pub fn from_result(result: &ExamResult) -> Self {
        let mut subjects: Vec<SubjectBreakdown> = Vec::new();
        let mut unanswered = 0_u32;
        for detail in result.details() {
            let subject = detail.question().subject();
            let index = match subjects.iter().position(|b| b.subject == subject) {
                Some(index) => index,
                None => {
                    subjects.push(SubjectBreakdown {
                        subject,
                        total: 0,
                        correct: 0,
                        unanswered: 0,
                    });
                    subjects.len() - 1
                }
            };
            let entry = &mut subjects[index];
            entry.total += 1;
            match detail.status() {
                AnswerStatus::Correct => entry.correct += 1,
                AnswerStatus::Unanswered => {
                    entry.unanswered += 1;
                    unanswered += 1;
                }
                AnswerStatus::Incorrect => {}
            }
        }
        subjects.sort_by_key(|b| b.subject);

        let percentage = result.percentage();
        Self {
            percentage,
            grade: letter_grade(percentage),
            band: PerformanceBand::from_percentage(percentage),
            correct: result.correct_answers(),
            incorrect_or_unanswered: result.missed(),
            unanswered,
            time_spent: result.time_spent(),
            subjects,
        }
    }
}

//
// ─── REPORTS ───────────────────────────────────────────────────────────────────
//

fn format_date(at: DateTime<Utc>) -> String {
    at.format("%B %-d, %Y %H:%M UTC").to_string()
}

/// Plain-text printable report.
#[must_use]
pub fn render_printable(result: &ExamResult, generated_at: DateTime<Utc>) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_printable(&mut out, result, generated_at);
    out
}

fn write_printable(
    out: &mut String,
    result: &ExamResult,
    generated_at: DateTime<Utc>,
) -> fmt::Result {
    writeln!(out, "Exam Results Report")?;
    writeln!(out, "Generated on {}", format_date(generated_at))?;
    writeln!(out)?;
    writeln!(out, "Result Summary")?;
    writeln!(
        out,
        "Score: {:.1}% ({} out of {})",
        result.percentage(),
        result.correct_answers(),
        result.total_questions()
    )?;
    writeln!(out, "Exam Date: {}", format_date(result.started_at()))?;
    writeln!(out, "Time Spent: {}", result.time_spent())?;
    writeln!(out)?;
    writeln!(out, "Total Questions: {}", result.total_questions())?;
    writeln!(out, "Correct Answers: {}", result.correct_answers())?;
    writeln!(out, "Incorrect/Unanswered: {}", result.missed())?;
    writeln!(out)?;
    writeln!(out, "Question Details")?;

    for (index, detail) in result.details().iter().enumerate() {
        let question = detail.question();
        writeln!(out)?;
        write!(out, "Question {} [{}]", index + 1, question.subject().label())?;
        if let Some(difficulty) = question.difficulty() {
            write!(out, " [{}]", difficulty.label())?;
        }
        writeln!(out)?;
        writeln!(out, "{}", question.text())?;
        if let Some(image) = question.image() {
            writeln!(out, "Image: {image}")?;
        }
        for label in OptionLabel::ALL {
            let mark = if label == question.correct_option() {
                " ✓"
            } else if detail.user_answer() == Some(label) {
                " ✗"
            } else {
                ""
            };
            writeln!(out, "  {}. {}{mark}", label.upper(), question.option(label))?;
        }
        match detail.status() {
            AnswerStatus::Unanswered => writeln!(out, "Not answered")?,
            AnswerStatus::Correct => writeln!(out, "Correct")?,
            AnswerStatus::Incorrect => writeln!(
                out,
                "Incorrect. Correct answer: {}",
                question.correct_option().upper()
            )?,
        }
        let tags: Vec<&str> = question.tags().iter().map(|t| t.as_str()).collect();
        writeln!(out, "Tags: {}", tags.join(", "))?;
    }
    Ok(())
}

/// Render the printable report and record that it was printed.
#[must_use]
pub fn print_report(
    result: &ExamResult,
    generated_at: DateTime<Utc>,
    analytics: &dyn Analytics,
) -> String {
    let report = render_printable(result, generated_at);
    analytics.report_printed();
    report
}

/// Pretty JSON export of a result.
///
/// # Errors
///
/// Returns `serde_json::Error` if serialization fails.
pub fn to_json(result: &ExamResult) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(result)
}
