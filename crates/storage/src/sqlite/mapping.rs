use exam_core::model::{
    Difficulty, OptionLabel, Question, QuestionDetail, QuestionId, Subject, TagName,
};
use sqlx::Row;

use crate::repository::StorageError;

pub(crate) const QUESTION_COLUMNS: &str = "id, question_text, question_image, option_a, option_b, \
     option_c, option_d, correct_option, tags, difficulty_level";

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn tags_to_json(tags: &[TagName]) -> Result<String, StorageError> {
    let raw: Vec<&str> = tags.iter().map(TagName::as_str).collect();
    serde_json::to_string(&raw).map_err(ser)
}

pub(crate) fn tags_from_json(raw: &str) -> Result<Vec<TagName>, StorageError> {
    let values: Vec<String> = serde_json::from_str(raw).map_err(ser)?;
    values.into_iter().map(|v| TagName::new(v).map_err(ser)).collect()
}

pub(crate) fn parse_option(s: &str) -> Result<OptionLabel, StorageError> {
    s.parse().map_err(ser)
}

pub(crate) fn parse_difficulty(s: Option<String>) -> Result<Option<Difficulty>, StorageError> {
    s.map(|raw| raw.parse::<Difficulty>().map_err(ser)).transpose()
}

pub(crate) fn map_question_row(
    row: &sqlx::sqlite::SqliteRow,
    subject: Subject,
) -> Result<Question, StorageError> {
    let id = QuestionId::new(row.try_get::<String, _>("id").map_err(ser)?).map_err(ser)?;
    let options = [
        row.try_get::<String, _>("option_a").map_err(ser)?,
        row.try_get::<String, _>("option_b").map_err(ser)?,
        row.try_get::<String, _>("option_c").map_err(ser)?,
        row.try_get::<String, _>("option_d").map_err(ser)?,
    ];
    let correct = parse_option(&row.try_get::<String, _>("correct_option").map_err(ser)?)?;
    let tags = tags_from_json(&row.try_get::<String, _>("tags").map_err(ser)?)?;
    let difficulty = parse_difficulty(row.try_get("difficulty_level").map_err(ser)?)?;

    let question = Question::new(
        id,
        subject,
        row.try_get::<String, _>("question_text").map_err(ser)?,
        options,
        correct,
        tags,
    )
    .map_err(ser)?
    .with_difficulty(difficulty);

    let image: Option<String> = row.try_get("question_image").map_err(ser)?;
    Ok(question.with_stored_image(image.as_deref()))
}

pub(crate) fn details_to_json(details: &[QuestionDetail]) -> Result<String, StorageError> {
    serde_json::to_string(details).map_err(ser)
}

pub(crate) fn details_from_json(raw: &str) -> Result<Vec<QuestionDetail>, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

pub(crate) fn count_to_u32(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

/// `NOT EXISTS` clause keeping rows whose every tag is in the bound list.
///
/// Placeholders are numbered from `first_param`.
pub(crate) fn tags_within_clause(tag_count: usize, first_param: usize) -> String {
    if tag_count == 0 {
        return "json_array_length(q.tags) = 0".to_string();
    }
    let placeholders: Vec<String> = (0..tag_count)
        .map(|i| format!("?{}", first_param + i))
        .collect();
    format!(
        "NOT EXISTS (SELECT 1 FROM json_each(q.tags) t WHERE t.value NOT IN ({}))",
        placeholders.join(", ")
    )
}
