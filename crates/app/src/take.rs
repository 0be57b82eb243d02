//! Interactive exam in the terminal.

use std::io::Write as _;

use anyhow::{Context, anyhow};
use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};

use exam_core::model::{ExamConfig, ExamResult, OptionLabel};
use exam_core::timing::{LOW_TIME_WARNING_SECS, format_clock, format_duration_secs};
use services::report::{ResultOverview, print_report};
use services::{
    Analytics, ExamController, ExamError, ExamFlow, FlowError, SubmitOutcome, TimerEvent,
};

/// One line of user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Select(OptionLabel),
    Next,
    Previous,
    /// Zero-based target; the user types it one-based.
    Jump(usize),
    Submit,
    Confirm,
    Quit,
    Help,
}

/// Parse a command line. Returns `None` for anything unrecognized.
pub fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    let mut parts = line.split_whitespace();
    let head = parts.next()?.to_ascii_lowercase();
    let command = match head.as_str() {
        "n" | "next" => Command::Next,
        "p" | "prev" | "previous" => Command::Previous,
        "g" | "go" => {
            let n: usize = parts.next()?.parse().ok()?;
            Command::Jump(n.checked_sub(1)?)
        }
        "s" | "submit" => Command::Submit,
        "y" | "yes" => Command::Confirm,
        "q" | "quit" => Command::Quit,
        "h" | "help" | "?" => Command::Help,
        other => Command::Select(other.parse().ok()?),
    };
    if parts.next().is_some() {
        return None;
    }
    Some(command)
}

const HELP: &str = "commands: a-d select, n next, p previous, g <n> go to question, s submit, q quit";

enum Ending {
    Submitted,
    Abandoned { elapsed_secs: u64 },
}

/// Run one exam from validation to the printed report.
pub async fn run(
    mut flow: ExamFlow,
    config: ExamConfig,
    analytics: &dyn Analytics,
) -> anyhow::Result<()> {
    if let Err(err) = flow.start(config).await {
        return Err(match err {
            FlowError::Exam(err) => anyhow!(exam_message(&err)),
            other => other.into(),
        });
    }

    let ending = {
        let session = flow
            .session_mut()
            .context("exam session did not start")?;
        drive(session).await?
    };

    match ending {
        Ending::Abandoned { elapsed_secs } => {
            flow.cancel()?;
            println!("Exam cancelled after {}.", format_duration_secs(elapsed_secs));
        }
        Ending::Submitted => {
            let result = flow.finish().await?;
            print_summary(result);
            println!();
            print!("{}", print_report(result, Utc::now(), analytics));
        }
    }
    Ok(())
}

fn exam_message(err: &ExamError) -> String {
    match err {
        ExamError::Repository(inner) => format!("{} ({inner})", err.user_message()),
        _ => err.user_message(),
    }
}

async fn drive(session: &mut ExamController) -> anyhow::Result<Ending> {
    let mut timer = session.start_timer()?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut confirming = false;

    println!(
        "{} questions, {} to finish. {HELP}",
        session.question_count(),
        format_clock(session.total_secs())
    );
    show_question(session);

    loop {
        tokio::select! {
            // Timer first: time running out wins over a pending answer.
            biased;

            Some(event) = timer.recv() => {
                if event == TimerEvent::LowTime {
                    println!(
                        "\n** Only {} minutes remaining! **",
                        LOW_TIME_WARNING_SECS / 60
                    );
                    prompt(session);
                }
                if session.handle_timer_event(event)?.is_some() {
                    println!("\nTime is up. Your exam was submitted automatically.");
                    return Ok(Ending::Submitted);
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    return Ok(abandon(session));
                };
                let Some(command) = parse_command(&line) else {
                    println!("unrecognized input. {HELP}");
                    prompt(session);
                    continue;
                };
                let was_confirming = std::mem::take(&mut confirming);
                match command {
                    Command::Select(option) => {
                        session.select_option(option)?;
                        show_question(session);
                    }
                    Command::Next => {
                        if !session.next() {
                            println!("already at the last question");
                        }
                        show_question(session);
                    }
                    Command::Previous => {
                        if !session.previous() {
                            println!("already at the first question");
                        }
                        show_question(session);
                    }
                    Command::Jump(index) => {
                        if !session.jump_to(index) {
                            println!("no question {}", index + 1);
                        }
                        show_question(session);
                    }
                    Command::Submit => match session.request_submit()? {
                        SubmitOutcome::Submitted(_) => return Ok(Ending::Submitted),
                        SubmitOutcome::ConfirmationRequired { unanswered } => {
                            println!(
                                "You have {unanswered} unanswered question(s). Type y to submit anyway, anything else to keep going."
                            );
                            confirming = true;
                            prompt(session);
                        }
                    },
                    Command::Confirm if was_confirming => {
                        session.force_submit()?;
                        return Ok(Ending::Submitted);
                    }
                    Command::Confirm => {
                        println!("nothing to confirm");
                        prompt(session);
                    }
                    Command::Quit => {
                        return Ok(abandon(session));
                    }
                    Command::Help => {
                        println!("{HELP}");
                        prompt(session);
                    }
                }
            }
        }
    }
}

fn abandon(session: &mut ExamController) -> Ending {
    let elapsed_secs = session.elapsed_secs();
    session.abandon();
    Ending::Abandoned { elapsed_secs }
}

fn show_question(session: &ExamController) {
    let (Some(question), Some(answer)) = (session.current_question(), session.current_answer())
    else {
        return;
    };
    println!();
    print!(
        "Question {} of {} [{}]",
        session.current_index() + 1,
        session.question_count(),
        question.subject().label()
    );
    if let Some(difficulty) = question.difficulty() {
        print!(" [{}]", difficulty.label());
    }
    println!();
    println!("{}", question.text());
    if let Some(image) = question.image() {
        println!("(image: {image})");
    }
    for label in OptionLabel::ALL {
        let marker = if answer.selected() == Some(label) { '*' } else { ' ' };
        println!(" {marker} {}. {}", label.upper(), question.option(label));
    }
    prompt(session);
}

fn prompt(session: &ExamController) {
    let progress = session.progress();
    print!(
        "[{} left | {}/{} answered] > ",
        format_clock(progress.remaining_secs),
        progress.answered,
        progress.total
    );
    // Prompt visibility only.
    let _ = std::io::stdout().flush();
}

fn print_summary(result: &ExamResult) {
    let overview = ResultOverview::from_result(result);
    println!();
    println!(
        "Score: {:.1}%  Grade: {}  ({})",
        overview.percentage, overview.grade, overview.band
    );
    println!(
        "Correct: {}  Incorrect/Unanswered: {}  Unanswered: {}  Time: {}",
        overview.correct, overview.incorrect_or_unanswered, overview.unanswered, overview.time_spent
    );
    for subject in &overview.subjects {
        println!(
            "  {:<12} {}/{} correct, {} unanswered",
            subject.subject.label(),
            subject.correct,
            subject.total,
            subject.unanswered
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_selection_case_insensitively() {
        assert_eq!(parse_command("b"), Some(Command::Select(OptionLabel::B)));
        assert_eq!(parse_command(" D "), Some(Command::Select(OptionLabel::D)));
        assert_eq!(parse_command("e"), None);
    }

    #[test]
    fn jump_is_one_based() {
        assert_eq!(parse_command("g 3"), Some(Command::Jump(2)));
        assert_eq!(parse_command("go 1"), Some(Command::Jump(0)));
        assert_eq!(parse_command("g 0"), None);
        assert_eq!(parse_command("g -1"), None);
        assert_eq!(parse_command("g"), None);
    }

    #[test]
    fn parses_control_commands() {
        assert_eq!(parse_command("n"), Some(Command::Next));
        assert_eq!(parse_command("prev"), Some(Command::Previous));
        assert_eq!(parse_command("s"), Some(Command::Submit));
        assert_eq!(parse_command("y"), Some(Command::Confirm));
        assert_eq!(parse_command("q"), Some(Command::Quit));
        assert_eq!(parse_command("?"), Some(Command::Help));
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("n n"), None);
    }
}
