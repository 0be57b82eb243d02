use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::model::{Subject, TagName};
use crate::timing::exam_duration_secs;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("please select at least one subject")]
    NoSubjects,

    #[error("please select at least one tag")]
    NoTags,

    #[error("number of questions must be at least 1")]
    ZeroQuestions,
}

/// What the user asked for: subjects, tags and how many questions.
///
/// Built once by the configuration step and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ConfigRepr", into = "ConfigRepr")]
pub struct ExamConfig {
    subjects: BTreeSet<Subject>,
    tags: BTreeSet<TagName>,
    question_count: u32,
}

impl ExamConfig {
    /// Validate and build a configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if no subject or tag is selected or the count is zero.
    pub fn new(
        subjects: impl IntoIterator<Item = Subject>,
        tags: impl IntoIterator<Item = TagName>,
        question_count: u32,
    ) -> Result<Self, ConfigError> {
        let subjects: BTreeSet<Subject> = subjects.into_iter().collect();
        let tags: BTreeSet<TagName> = tags.into_iter().collect();

        if subjects.is_empty() {
            return Err(ConfigError::NoSubjects);
        }
        if tags.is_empty() {
            return Err(ConfigError::NoTags);
        }
        if question_count == 0 {
            return Err(ConfigError::ZeroQuestions);
        }

        Ok(Self {
            subjects,
            tags,
            question_count,
        })
    }

    #[must_use]
    pub fn subjects(&self) -> &BTreeSet<Subject> {
        &self.subjects
    }

    #[must_use]
    pub fn tags(&self) -> &BTreeSet<TagName> {
        &self.tags
    }

    #[must_use]
    pub fn question_count(&self) -> u32 {
        self.question_count
    }

    /// Session length for this configuration, in seconds.
    #[must_use]
    pub fn duration_secs(&self) -> u32 {
        exam_duration_secs(self.question_count)
    }
}

#[derive(Serialize, Deserialize)]
struct ConfigRepr {
    subjects: BTreeSet<Subject>,
    tags: BTreeSet<TagName>,
    question_count: u32,
}

impl TryFrom<ConfigRepr> for ExamConfig {
    type Error = ConfigError;

    fn try_from(repr: ConfigRepr) -> Result<Self, Self::Error> {
        Self::new(repr.subjects, repr.tags, repr.question_count)
    }
}

impl From<ExamConfig> for ConfigRepr {
    fn from(config: ExamConfig) -> Self {
        Self {
            subjects: config.subjects,
            tags: config.tags,
            question_count: config.question_count,
        }
    }
}
