//! Generated sample question bank for local databases.

use anyhow::Context;

use exam_core::model::{Difficulty, OptionLabel, Question, QuestionId, Subject, TagName};
use storage::repository::QuestionStore;

const PHYSICS_TAGS: [&str; 3] = ["mechanics", "kinematics", "electricity"];
const CHEMISTRY_TAGS: [&str; 2] = ["stoichiometry", "gases"];
const MATHEMATICS_TAGS: [&str; 3] = ["arithmetic", "algebra", "geometry"];
const BIOLOGY_TAGS: [&str; 2] = ["cells", "genetics"];

/// Build `per_subject` questions for every subject.
///
/// Output is deterministic, so reseeding replaces rows instead of duplicating them.
pub fn sample_bank(per_subject: u32) -> anyhow::Result<Vec<Question>> {
    let mut bank = Vec::new();
    for subject in Subject::ALL {
        for n in 1..=per_subject {
            bank.push(generate(subject, n)?);
        }
    }
    Ok(bank)
}

/// Upsert the sample bank, returning how many questions were written.
pub async fn seed(store: &dyn QuestionStore, per_subject: u32) -> anyhow::Result<usize> {
    let bank = sample_bank(per_subject)?;
    for question in &bank {
        store
            .upsert_question(question)
            .await
            .with_context(|| format!("storing question {}", question.id()))?;
    }
    tracing::info!(questions = bank.len(), "seeded question bank");
    Ok(bank.len())
}

struct Draft {
    text: String,
    answer: i64,
    distractors: [i64; 3],
    tag: &'static str,
    unit: &'static str,
}

fn generate(subject: Subject, n: u32) -> Result<Question, exam_core::Error> {
    let k = i64::from(n);
    let pick = |tags: &[&'static str]| tags[n as usize % tags.len()];
    let draft = match subject {
        Subject::Physics => match pick(&PHYSICS_TAGS) {
            "mechanics" => Draft {
                text: format!(
                    "A {k} kg block accelerates at 3 m/s². What net force acts on it?"
                ),
                answer: 3 * k,
                distractors: [k + 3, 3 * k + 3, 6 * k],
                tag: "mechanics",
                unit: " N",
            },
            "kinematics" => Draft {
                text: format!(
                    "A cart moves at a constant {k} m/s for 5 s. How far does it travel?"
                ),
                answer: 5 * k,
                distractors: [k + 5, 5 * k - 1, 5 * k + 5],
                tag: "kinematics",
                unit: " m",
            },
            _ => Draft {
                text: format!("A {k} Ω resistor carries 2 A. What is the voltage across it?"),
                answer: 2 * k,
                distractors: [2 * k + 2, 4 * k, 2 * k - 1],
                tag: "electricity",
                unit: " V",
            },
        },
        Subject::Chemistry => match pick(&CHEMISTRY_TAGS) {
            "stoichiometry" => Draft {
                text: format!("How many grams do {k} mol of water (18 g/mol) weigh?"),
                answer: 18 * k,
                distractors: [18 + k, 9 * k, 36 * k],
                tag: "stoichiometry",
                unit: " g",
            },
            _ => Draft {
                text: format!(
                    "A gas at constant temperature is compressed from {} L to {k} L. By what factor does its pressure rise?",
                    4 * k
                ),
                answer: 4,
                distractors: [2, 8, 16],
                tag: "gases",
                unit: "×",
            },
        },
        Subject::Mathematics => match pick(&MATHEMATICS_TAGS) {
            "arithmetic" => Draft {
                text: format!("What is {k} × {}?", k + 7),
                answer: k * (k + 7),
                distractors: [k * (k + 6), k + k + 7, (k + 1) * (k + 7)],
                tag: "arithmetic",
                unit: "",
            },
            "algebra" => Draft {
                text: format!("Solve for x: 3x + {k} = {}", 3 * (k + 2) + k),
                answer: k + 2,
                distractors: [k + 1, k + 3, 2 * k + 3],
                tag: "algebra",
                unit: "",
            },
            _ => Draft {
                text: format!("What is the perimeter of a square with side {k} cm?"),
                answer: 4 * k,
                distractors: [k * k + 1, 2 * k, 4 * k + 4],
                tag: "geometry",
                unit: " cm",
            },
        },
        Subject::Biology => match pick(&BIOLOGY_TAGS) {
            "cells" => Draft {
                text: format!(
                    "A cell with {} chromosomes divides by mitosis. How many chromosomes does each daughter cell have?",
                    2 * k
                ),
                answer: 2 * k,
                distractors: [k, 4 * k, 2 * k + 1],
                tag: "cells",
                unit: "",
            },
            _ => Draft {
                text: format!(
                    "A diploid cell has {} chromosomes. How many does each gamete carry?",
                    2 * k
                ),
                answer: k,
                distractors: [2 * k, 3 * k, 4 * k],
                tag: "genetics",
                unit: "",
            },
        },
    };

    let correct = OptionLabel::ALL[n as usize % OptionLabel::ALL.len()];
    let mut distractors = draft.distractors.iter();
    let options: [String; 4] = OptionLabel::ALL.map(|label| {
        let value = if label == correct {
            draft.answer
        } else {
            distractors.next().copied().unwrap_or(draft.answer + 100)
        };
        format!("{value}{}", draft.unit)
    });
    let difficulty = match n % 3 {
        0 => Difficulty::Hard,
        1 => Difficulty::Easy,
        _ => Difficulty::Medium,
    };

    let question = Question::new(
        QuestionId::new(format!("{}-{n:03}", subject.as_str()))?,
        subject,
        draft.text,
        options,
        correct,
        [TagName::new(draft.tag)?],
    )?
    .with_difficulty(Some(difficulty));
    Ok(question)
}
