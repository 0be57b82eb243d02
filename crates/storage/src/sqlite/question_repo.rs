use std::collections::BTreeSet;

use exam_core::model::{Question, Subject, TagName};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{QUESTION_COLUMNS, map_question_row, tags_from_json, tags_to_json, tags_within_clause};
use crate::repository::{QuestionRepository, QuestionStore, StorageError, shuffle_take};

fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

impl SqliteRepository {
    async fn matching_in(
        &self,
        subject: Subject,
        tags: &BTreeSet<TagName>,
    ) -> Result<Vec<Question>, StorageError> {
        let sql = format!(
            "SELECT {QUESTION_COLUMNS} FROM {table} q WHERE {filter} ORDER BY q.id",
            table = subject.as_str(),
            filter = tags_within_clause(tags.len(), 1),
        );
        let mut q = sqlx::query(&sql);
        for tag in tags {
            q = q.bind(tag.as_str());
        }
        let rows = q.fetch_all(&self.pool).await.map_err(conn)?;

        let mut questions = Vec::with_capacity(rows.len());
        for row in rows {
            questions.push(map_question_row(&row, subject)?);
        }
        Ok(questions)
    }
}

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn count_matching(
        &self,
        subjects: &BTreeSet<Subject>,
        tags: &BTreeSet<TagName>,
    ) -> Result<u64, StorageError> {
        let mut total = 0_u64;
        for subject in subjects {
            let sql = format!(
                "SELECT COUNT(*) AS n FROM {table} q WHERE {filter}",
                table = subject.as_str(),
                filter = tags_within_clause(tags.len(), 1),
            );
            let mut q = sqlx::query(&sql);
            for tag in tags {
                q = q.bind(tag.as_str());
            }
            let row = q.fetch_one(&self.pool).await.map_err(conn)?;
            let n: i64 = row
                .try_get("n")
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            total += u64::try_from(n)
                .map_err(|_| StorageError::Serialization(format!("invalid count: {n}")))?;
        }
        tracing::debug!(?subjects, tag_count = tags.len(), total, "counted matching questions");
        Ok(total)
    }

    async fn sample(
        &self,
        subjects: &BTreeSet<Subject>,
        tags: &BTreeSet<TagName>,
        count: u32,
    ) -> Result<Vec<Question>, StorageError> {
        let mut pool = Vec::new();
        for subject in subjects {
            pool.extend(self.matching_in(*subject, tags).await?);
        }
        let matched = pool.len();
        let sample = shuffle_take(pool, count, &mut rand::rng());
        tracing::debug!(matched, sampled = sample.len(), "sampled questions");
        Ok(sample)
    }

    async fn subject_tags(
        &self,
        subjects: &BTreeSet<Subject>,
    ) -> Result<Vec<TagName>, StorageError> {
        let mut tags = BTreeSet::new();
        for subject in subjects {
            let rows = sqlx::query(&format!("SELECT tags FROM {}", subject.as_str()))
                .fetch_all(&self.pool)
                .await
                .map_err(conn)?;
            for row in rows {
                let raw: String = row
                    .try_get("tags")
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                tags.extend(tags_from_json(&raw)?);
            }
        }
        Ok(tags.into_iter().collect())
    }
}

#[async_trait::async_trait]
impl QuestionStore for SqliteRepository {
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let sql = format!(
            r"
            INSERT INTO {table} ({QUESTION_COLUMNS})
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(id) DO UPDATE SET
                question_text = excluded.question_text,
                question_image = excluded.question_image,
                option_a = excluded.option_a,
                option_b = excluded.option_b,
                option_c = excluded.option_c,
                option_d = excluded.option_d,
                correct_option = excluded.correct_option,
                tags = excluded.tags,
                difficulty_level = excluded.difficulty_level
            ",
            table = question.subject().as_str(),
        );
        let [a, b, c, d] = question.options();

        sqlx::query(&sql)
            .bind(question.id().as_str())
            .bind(question.text())
            .bind(question.image().map(|u| u.as_str()))
            .bind(a.as_str())
            .bind(b.as_str())
            .bind(c.as_str())
            .bind(d.as_str())
            .bind(question.correct_option().as_str())
            .bind(tags_to_json(question.tags())?)
            .bind(question.difficulty().map(|d| d.as_str()))
            .execute(&self.pool)
            .await
            .map_err(conn)?;

        Ok(())
    }
}
