use std::sync::Arc;

use exam_core::model::{AttemptId, ExamResult};
use storage::repository::{ResultListItem, ResultRepository, StorageError};

/// Read access to previously completed exams.
#[derive(Clone)]
pub struct ResultHistoryService {
    results: Arc<dyn ResultRepository>,
}

impl ResultHistoryService {
    #[must_use]
    pub fn new(results: Arc<dyn ResultRepository>) -> Self {
        Self { results }
    }

    /// Most recent results, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the history cannot be read.
    pub async fn recent(&self, limit: u32) -> Result<Vec<ResultListItem>, StorageError> {
        self.results.list_results(limit).await
    }

    /// A single result with its full question breakdown.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no such result exists.
    pub async fn get(&self, id: AttemptId) -> Result<ExamResult, StorageError> {
        self.results.get_result(id).await
    }
}
