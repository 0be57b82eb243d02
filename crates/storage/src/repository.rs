use async_trait::async_trait;
use chrono::{DateTime, Utc};
use exam_core::model::{AttemptId, ExamResult, Question, Subject, TagName};
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Read contract of the question store.
///
/// A question matches a selection when its subject is selected and every tag
/// it carries is among the selected tags.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Number of questions matching the selection, summed over subjects.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on transport or query failure.
    async fn count_matching(
        &self,
        subjects: &BTreeSet<Subject>,
        tags: &BTreeSet<TagName>,
    ) -> Result<u64, StorageError>;

    /// Random sample of at most `count` matching questions, shuffled across
    /// all selected subjects together.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on transport or query failure.
    async fn sample(
        &self,
        subjects: &BTreeSet<Subject>,
        tags: &BTreeSet<TagName>,
        count: u32,
    ) -> Result<Vec<Question>, StorageError>;

    /// Sorted, de-duplicated tags used by questions in `subjects`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on transport or query failure.
    async fn subject_tags(&self, subjects: &BTreeSet<Subject>)
    -> Result<Vec<TagName>, StorageError>;
}

/// Write contract for stores that accept new questions.
#[async_trait]
pub trait QuestionStore: Send + Sync {
    /// Insert or replace a question in its subject's table.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError>;
}

/// Listing row for a persisted exam result.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultListItem {
    pub id: AttemptId,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub percentage: f64,
}

impl ResultListItem {
    #[must_use]
    pub fn from_result(result: &ExamResult) -> Self {
        Self {
            id: result.id(),
            started_at: result.started_at(),
            ended_at: result.ended_at(),
            total_questions: result.total_questions(),
            correct_answers: result.correct_answers(),
            percentage: result.percentage(),
        }
    }
}

/// History of completed exams.
#[async_trait]
pub trait ResultRepository: Send + Sync {
    /// Persist a completed result.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if a result with the same id exists.
    async fn append_result(&self, result: &ExamResult) -> Result<AttemptId, StorageError>;

    /// Fetch a result by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_result(&self, id: AttemptId) -> Result<ExamResult, StorageError>;

    /// Most recent results first, at most `limit` rows.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on query failure.
    async fn list_results(&self, limit: u32) -> Result<Vec<ResultListItem>, StorageError>;
}

/// Shuffle `pool` uniformly and keep the first `count` questions.
pub fn shuffle_take<R: Rng + ?Sized>(
    mut pool: Vec<Question>,
    count: u32,
    rng: &mut R,
) -> Vec<Question> {
    pool.shuffle(rng);
    pool.truncate(usize::try_from(count).unwrap_or(usize::MAX));
    pool
}

/// Sorted union of the tags carried by `questions`.
pub fn collect_tags<'a>(questions: impl IntoIterator<Item = &'a Question>) -> Vec<TagName> {
    let tags: BTreeSet<TagName> = questions
        .into_iter()
        .flat_map(|q| q.tags().iter().cloned())
        .collect();
    tags.into_iter().collect()
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    questions: Arc<Mutex<HashMap<Subject, Vec<Question>>>>,
    results: Arc<Mutex<Vec<ExamResult>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn matching(
        &self,
        subjects: &BTreeSet<Subject>,
        tags: &BTreeSet<TagName>,
    ) -> Result<Vec<Question>, StorageError> {
        let guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(subjects
            .iter()
            .filter_map(|subject| guard.get(subject))
            .flatten()
            .filter(|q| q.tags_within(tags))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn count_matching(
        &self,
        subjects: &BTreeSet<Subject>,
        tags: &BTreeSet<TagName>,
    ) -> Result<u64, StorageError> {
        let matching = self.matching(subjects, tags)?;
        Ok(matching.len() as u64)
    }

    async fn sample(
        &self,
        subjects: &BTreeSet<Subject>,
        tags: &BTreeSet<TagName>,
        count: u32,
    ) -> Result<Vec<Question>, StorageError> {
        let pool = self.matching(subjects, tags)?;
        Ok(shuffle_take(pool, count, &mut rand::rng()))
    }

    async fn subject_tags(
        &self,
        subjects: &BTreeSet<Subject>,
    ) -> Result<Vec<TagName>, StorageError> {
        let guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(collect_tags(
            subjects
                .iter()
                .filter_map(|subject| guard.get(subject))
                .flatten(),
        ))
    }
}

#[async_trait]
impl QuestionStore for InMemoryRepository {
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let mut guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let table = guard.entry(question.subject()).or_default();
        match table.iter_mut().find(|q| q.id() == question.id()) {
            Some(existing) => *existing = question.clone(),
            None => table.push(question.clone()),
        }
        Ok(())
    }
}

#[async_trait]
impl ResultRepository for InMemoryRepository {
    async fn append_result(&self, result: &ExamResult) -> Result<AttemptId, StorageError> {
        let mut guard = self
            .results
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if guard.iter().any(|r| r.id() == result.id()) {
            return Err(StorageError::Conflict);
        }
        guard.push(result.clone());
        Ok(result.id())
    }

    async fn get_result(&self, id: AttemptId) -> Result<ExamResult, StorageError> {
        let guard = self
            .results
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard
            .iter()
            .find(|r| r.id() == id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn list_results(&self, limit: u32) -> Result<Vec<ResultListItem>, StorageError> {
        let guard = self
            .results
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut items: Vec<ResultListItem> =
            guard.iter().rev().map(ResultListItem::from_result).collect();
        items.sort_by(|a, b| b.ended_at.cmp(&a.ended_at));
        items.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(items)
    }
}

/// Aggregates the question source and optional result history behind trait
/// objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub questions: Arc<dyn QuestionRepository>,
    pub results: Option<Arc<dyn ResultRepository>>,
}

impl Storage {
    #[must_use]
    pub fn from_in_memory(repo: InMemoryRepository) -> Self {
        let questions: Arc<dyn QuestionRepository> = Arc::new(repo.clone());
        let results: Arc<dyn ResultRepository> = Arc::new(repo);
        Self {
            questions,
            results: Some(results),
        }
    }
}
