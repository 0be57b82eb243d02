//! Client for a PostgREST-style hosted question store (one table per subject).

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use exam_core::model::{Question, Subject, TagName};
use reqwest::header::CONTENT_RANGE;
use serde::Deserialize;

use crate::repository::{QuestionRepository, Storage, StorageError, shuffle_take};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Read-only question repository backed by a remote REST endpoint.
#[derive(Clone)]
pub struct RestRepository {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl RestRepository {
    /// Build a client for `base_url` (the project root, without `/rest/v1`).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    fn table_url(&self, subject: Subject) -> String {
        format!("{}/rest/v1/{}", self.base_url, subject.as_str())
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, StorageError> {
        let response = self
            .authed(request)
            .send()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Connection(format!(
                "question store responded with status {status}"
            )));
        }
        Ok(response)
    }
}

/// PostgREST array literal for a `cd` (contained-by) filter: `cd.{"a","b"}`.
pub(crate) fn contained_by_filter(tags: &BTreeSet<TagName>) -> String {
    let quoted: Vec<String> = tags
        .iter()
        .map(|tag| {
            let escaped = tag.as_str().replace('\\', "\\\\").replace('"', "\\\"");
            format!("\"{escaped}\"")
        })
        .collect();
    format!("cd.{{{}}}", quoted.join(","))
}

/// Total from a `Content-Range` header such as `0-9/42` or `*/42`.
pub(crate) fn content_range_total(header: &str) -> Option<u64> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}

#[derive(Deserialize)]
struct TagsRow {
    // PostgREST sends `null` for an unset array column.
    #[serde(default)]
    tags: Option<Vec<String>>,
}

#[async_trait]
impl QuestionRepository for RestRepository {
    async fn count_matching(
        &self,
        subjects: &BTreeSet<Subject>,
        tags: &BTreeSet<TagName>,
    ) -> Result<u64, StorageError> {
        let filter = contained_by_filter(tags);
        let mut total = 0_u64;
        for subject in subjects {
            let request = self
                .client
                .head(self.table_url(*subject))
                .query(&[("select", "*"), ("tags", filter.as_str())])
                .header("Prefer", "count=exact");
            let response = self.send(request).await?;
            let count = response
                .headers()
                .get(CONTENT_RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(content_range_total)
                .ok_or_else(|| {
                    StorageError::Serialization(format!(
                        "missing or invalid content-range for {subject}"
                    ))
                })?;
            total += count;
        }
        tracing::debug!(?subjects, total, "counted matching questions remotely");
        Ok(total)
    }

    async fn sample(
        &self,
        subjects: &BTreeSet<Subject>,
        tags: &BTreeSet<TagName>,
        count: u32,
    ) -> Result<Vec<Question>, StorageError> {
        let filter = contained_by_filter(tags);
        let mut pool = Vec::new();
        for subject in subjects {
            let request = self
                .client
                .get(self.table_url(*subject))
                .query(&[("select", "*"), ("tags", filter.as_str())]);
            let rows: Vec<serde_json::Map<String, serde_json::Value>> = self
                .send(request)
                .await?
                .json()
                .await
                .map_err(|e| StorageError::Serialization(e.to_string()))?;

            for mut row in rows {
                // Rows do not carry their subject; the table does.
                row.insert(
                    "subject".to_string(),
                    serde_json::Value::String(subject.as_str().to_string()),
                );
                let question: Question = serde_json::from_value(serde_json::Value::Object(row))
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                pool.push(question);
            }
        }
        Ok(shuffle_take(pool, count, &mut rand::rng()))
    }

    async fn subject_tags(
        &self,
        subjects: &BTreeSet<Subject>,
    ) -> Result<Vec<TagName>, StorageError> {
        let mut tags = BTreeSet::new();
        for subject in subjects {
            let request = self
                .client
                .get(self.table_url(*subject))
                .query(&[("select", "tags")]);
            let rows: Vec<TagsRow> = self
                .send(request)
                .await?
                .json()
                .await
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            tags.extend(
                rows.into_iter()
                    .flat_map(|row| row.tags.unwrap_or_default())
                    .filter_map(|raw| TagName::new(raw).ok()),
            );
        }
        Ok(tags.into_iter().collect())
    }
}

impl Storage {
    /// Build a `Storage` reading questions from a remote REST store.
    ///
    /// The remote store is read-only, so result history is disabled.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the HTTP client cannot be built.
    pub fn rest(base_url: &str, api_key: &str) -> Result<Self, StorageError> {
        let repo = RestRepository::new(base_url, api_key)?;
        let questions: Arc<dyn QuestionRepository> = Arc::new(repo);
        Ok(Self {
            questions,
            results: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tag(name: &str) -> TagName {
        TagName::new(name).unwrap()
    }

    fn row(id: &str, tags: &[&str]) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "question_text": format!("Question {id}"),
            "question_image": null,
            "option_a": "a",
            "option_b": "b",
            "option_c": "c",
            "option_d": "d",
            "correct_option": "b",
            "tags": tags,
            "difficulty_level": "medium"
        })
    }

    #[test]
    fn filter_quotes_and_escapes_tags() {
        let tags = BTreeSet::from([tag("mechanics"), tag("say \"hi\"")]);
        assert_eq!(
            contained_by_filter(&tags),
            r#"cd.{"mechanics","say \"hi\""}"#
        );
    }

    #[test]
    fn parses_content_range() {
        assert_eq!(content_range_total("0-9/42"), Some(42));
        assert_eq!(content_range_total("*/7"), Some(7));
        assert_eq!(content_range_total("0-9/*"), None);
        assert_eq!(content_range_total("garbage"), None);
    }

    #[tokio::test]
    async fn count_sums_subjects_from_content_range() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/rest/v1/physics"))
            .and(query_param("tags", r#"cd.{"mechanics"}"#))
            .and(header("apikey", "anon-key"))
            .and(header("Prefer", "count=exact"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-range", "*/4"))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/rest/v1/chemistry"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-range", "*/3"))
            .mount(&server)
            .await;

        let repo = RestRepository::new(server.uri(), "anon-key").unwrap();
        let total = repo
            .count_matching(
                &BTreeSet::from([Subject::Physics, Subject::Chemistry]),
                &BTreeSet::from([tag("mechanics")]),
            )
            .await
            .unwrap();
        assert_eq!(total, 7);
    }

    #[tokio::test]
    async fn sample_attaches_subject_and_truncates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/physics"))
            .and(query_param("select", "*"))
            .and(header("Authorization", "Bearer anon-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                row("p1", &["mechanics"]),
                row("p2", &["mechanics"]),
                row("p3", &[]),
            ])))
            .mount(&server)
            .await;

        let repo = RestRepository::new(format!("{}/", server.uri()), "anon-key").unwrap();
        let sample = repo
            .sample(
                &BTreeSet::from([Subject::Physics]),
                &BTreeSet::from([tag("mechanics")]),
                2,
            )
            .await
            .unwrap();
        assert_eq!(sample.len(), 2);
        assert!(sample.iter().all(|q| q.subject() == Subject::Physics));
    }

    #[tokio::test]
    async fn sample_keeps_rows_with_relative_image_and_null_tags() {
        let server = MockServer::start().await;
        let mut relative = row("p1", &["mechanics"]);
        relative["question_image"] = serde_json::json!("images/ramp.png");
        let mut untagged = row("p2", &[]);
        untagged["tags"] = serde_json::Value::Null;
        Mock::given(method("GET"))
            .and(path("/rest/v1/physics"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!([relative, untagged])),
            )
            .mount(&server)
            .await;

        let repo = RestRepository::new(server.uri(), "anon-key").unwrap();
        let mut sample = repo
            .sample(
                &BTreeSet::from([Subject::Physics]),
                &BTreeSet::from([tag("mechanics")]),
                5,
            )
            .await
            .unwrap();
        sample.sort_by(|a, b| a.id().cmp(b.id()));
        assert_eq!(sample.len(), 2);
        assert_eq!(
            sample[0].image().map(|image| image.as_str()),
            Some("images/ramp.png")
        );
        assert!(sample[1].tags().is_empty());
    }

    #[tokio::test]
    async fn server_error_maps_to_connection_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/biology"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let repo = RestRepository::new(server.uri(), "anon-key").unwrap();
        let err = repo
            .sample(
                &BTreeSet::from([Subject::Biology]),
                &BTreeSet::from([tag("cells")]),
                5,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Connection(_)));
    }

    #[tokio::test]
    async fn malformed_row_maps_to_serialization_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/physics"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([{ "id": "p1", "question_text": "" }])),
            )
            .mount(&server)
            .await;

        let repo = RestRepository::new(server.uri(), "anon-key").unwrap();
        let err = repo
            .sample(
                &BTreeSet::from([Subject::Physics]),
                &BTreeSet::from([tag("mechanics")]),
                5,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
    }

    #[tokio::test]
    async fn subject_tags_merge_and_skip_blank() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/physics"))
            .and(query_param("select", "tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "tags": ["optics", "mechanics"] },
                { "tags": ["mechanics", " "] },
                { "tags": [] },
                { "tags": null },
                {}
            ])))
            .mount(&server)
            .await;

        let repo = RestRepository::new(server.uri(), "anon-key").unwrap();
        let tags = repo
            .subject_tags(&BTreeSet::from([Subject::Physics]))
            .await
            .unwrap();
        assert_eq!(tags, vec![tag("mechanics"), tag("optics")]);
    }
}
