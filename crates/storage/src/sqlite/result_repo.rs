use exam_core::model::{AttemptId, ExamResult};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{count_to_u32, details_from_json, details_to_json};
use crate::repository::{ResultListItem, ResultRepository, StorageError};

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn parse_attempt_id(raw: &str) -> Result<AttemptId, StorageError> {
    raw.parse().map_err(ser)
}

#[async_trait::async_trait]
impl ResultRepository for SqliteRepository {
    async fn append_result(&self, result: &ExamResult) -> Result<AttemptId, StorageError> {
        let outcome = sqlx::query(
            r"
            INSERT INTO exam_results (
                id, started_at, ended_at, total_questions, correct_answers, percentage, details
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(result.id().to_string())
        .bind(result.started_at())
        .bind(result.ended_at())
        .bind(i64::from(result.total_questions()))
        .bind(i64::from(result.correct_answers()))
        .bind(result.percentage())
        .bind(details_to_json(result.details())?)
        .execute(&self.pool)
        .await;

        match outcome {
            Ok(_) => Ok(result.id()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StorageError::Conflict)
            }
            Err(e) => Err(StorageError::Connection(e.to_string())),
        }
    }

    async fn get_result(&self, id: AttemptId) -> Result<ExamResult, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, started_at, ended_at, details
            FROM exam_results
            WHERE id = ?1
            ",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?
        .ok_or(StorageError::NotFound)?;

        let details = details_from_json(&row.try_get::<String, _>("details").map_err(ser)?)?;
        ExamResult::from_details(
            parse_attempt_id(&row.try_get::<String, _>("id").map_err(ser)?)?,
            row.try_get("started_at").map_err(ser)?,
            row.try_get("ended_at").map_err(ser)?,
            details,
        )
        .map_err(ser)
    }

    async fn list_results(&self, limit: u32) -> Result<Vec<ResultListItem>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, started_at, ended_at, total_questions, correct_answers, percentage
            FROM exam_results
            ORDER BY ended_at DESC, rowid DESC
            LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(ResultListItem {
                id: parse_attempt_id(&row.try_get::<String, _>("id").map_err(ser)?)?,
                started_at: row.try_get("started_at").map_err(ser)?,
                ended_at: row.try_get("ended_at").map_err(ser)?,
                total_questions: count_to_u32(
                    "total_questions",
                    row.try_get("total_questions").map_err(ser)?,
                )?,
                correct_answers: count_to_u32(
                    "correct_answers",
                    row.try_get("correct_answers").map_err(ser)?,
                )?,
                percentage: row.try_get("percentage").map_err(ser)?,
            });
        }
        Ok(items)
    }
}
