use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

use crate::model::{QuestionId, Subject, TagName};

//
// ─── OPTION LABELS ─────────────────────────────────────────────────────────────
//

/// Label of one of the four answer options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionLabel {
    A,
    B,
    C,
    D,
}

impl OptionLabel {
    pub const ALL: [OptionLabel; 4] = [OptionLabel::A, OptionLabel::B, OptionLabel::C, OptionLabel::D];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OptionLabel::A => "a",
            OptionLabel::B => "b",
            OptionLabel::C => "c",
            OptionLabel::D => "d",
        }
    }

    #[must_use]
    pub fn index(self) -> usize {
        match self {
            OptionLabel::A => 0,
            OptionLabel::B => 1,
            OptionLabel::C => 2,
            OptionLabel::D => 3,
        }
    }

    /// Uppercase form used in reports ("A".."D").
    #[must_use]
    pub fn upper(self) -> char {
        match self {
            OptionLabel::A => 'A',
            OptionLabel::B => 'B',
            OptionLabel::C => 'C',
            OptionLabel::D => 'D',
        }
    }
}

impl fmt::Display for OptionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid option label: {0}")]
pub struct InvalidOptionLabel(pub String);

impl FromStr for OptionLabel {
    type Err = InvalidOptionLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" => Ok(OptionLabel::A),
            "b" => Ok(OptionLabel::B),
            "c" => Ok(OptionLabel::C),
            "d" => Ok(OptionLabel::D),
            _ => Err(InvalidOptionLabel(s.to_string())),
        }
    }
}

//
// ─── DIFFICULTY ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = QuestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(QuestionError::InvalidDifficulty(other.to_string())),
        }
    }
}

//
// ─── IMAGE REFERENCE ───────────────────────────────────────────────────────────
//

/// Where a question's illustration lives.
///
/// Stores hold either an absolute URL or a path relative to their own asset
/// root; both are passed through to whoever renders the question.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImageRef {
    Url(Url),
    Path(String),
}

impl ImageRef {
    /// # Errors
    ///
    /// Returns `QuestionError::InvalidImage` for a blank reference, one with
    /// inner whitespace or control characters, or a malformed absolute URL.
    pub fn parse(raw: &str) -> Result<Self, QuestionError> {
        let raw = raw.trim();
        if raw.is_empty() || raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(QuestionError::InvalidImage(raw.to_owned()));
        }
        match Url::parse(raw) {
            Ok(url) => Ok(Self::Url(url)),
            Err(url::ParseError::RelativeUrlWithoutBase) => Ok(Self::Path(raw.to_owned())),
            Err(e) => Err(QuestionError::InvalidImage(format!("{raw}: {e}"))),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Url(url) => url.as_str(),
            Self::Path(path) => path,
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text cannot be empty")]
    EmptyText,

    #[error("option {0} text cannot be empty")]
    EmptyOption(OptionLabel),

    #[error("invalid image reference: {0}")]
    InvalidImage(String),

    #[error("invalid difficulty: {0}")]
    InvalidDifficulty(String),
}

/// A multiple-choice question with four labelled options.
///
/// Immutable once built; storage adapters construct it through `Question::new`
/// so every instance in the system has passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "QuestionRepr", into = "QuestionRepr")]
pub struct Question {
    id: QuestionId,
    subject: Subject,
    text: String,
    image: Option<ImageRef>,
    options: [String; 4],
    correct: OptionLabel,
    tags: Vec<TagName>,
    difficulty: Option<Difficulty>,
}

impl Question {
    /// Build a validated question.
    ///
    /// Duplicate tags are collapsed, keeping first occurrence order.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::EmptyText` or `QuestionError::EmptyOption` when
    /// the question or any option text is blank.
    pub fn new(
        id: QuestionId,
        subject: Subject,
        text: impl Into<String>,
        options: [String; 4],
        correct: OptionLabel,
        tags: impl IntoIterator<Item = TagName>,
    ) -> Result<Self, QuestionError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(QuestionError::EmptyText);
        }
        for label in OptionLabel::ALL {
            if options[label.index()].trim().is_empty() {
                return Err(QuestionError::EmptyOption(label));
            }
        }

        let mut unique = Vec::new();
        for tag in tags {
            if !unique.contains(&tag) {
                unique.push(tag);
            }
        }

        Ok(Self {
            id,
            subject,
            text,
            image: None,
            options,
            correct,
            tags: unique,
            difficulty: None,
        })
    }

    /// Attach an image reference (absolute URL or store-relative path).
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::InvalidImage` if `image` does not parse.
    pub fn with_image(mut self, image: &str) -> Result<Self, QuestionError> {
        self.image = Some(ImageRef::parse(image)?);
        Ok(self)
    }

    /// Attach `image` if it parses; otherwise log it and keep the question
    /// without one. Blank values mean no image.
    #[must_use]
    pub fn with_stored_image(self, image: Option<&str>) -> Self {
        let Some(raw) = image.map(str::trim).filter(|raw| !raw.is_empty()) else {
            return self;
        };
        match ImageRef::parse(raw) {
            Ok(parsed) => Self {
                image: Some(parsed),
                ..self
            },
            Err(err) => {
                tracing::warn!(question = %self.id, error = %err, "dropping unusable image reference");
                self
            }
        }
    }

    #[must_use]
    pub fn with_difficulty(mut self, difficulty: Option<Difficulty>) -> Self {
        self.difficulty = difficulty;
        self
    }

    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn subject(&self) -> Subject {
        self.subject
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn image(&self) -> Option<&ImageRef> {
        self.image.as_ref()
    }

    #[must_use]
    pub fn option(&self, label: OptionLabel) -> &str {
        &self.options[label.index()]
    }

    #[must_use]
    pub fn options(&self) -> &[String; 4] {
        &self.options
    }

    #[must_use]
    pub fn correct_option(&self) -> OptionLabel {
        self.correct
    }

    #[must_use]
    pub fn tags(&self) -> &[TagName] {
        &self.tags
    }

    #[must_use]
    pub fn difficulty(&self) -> Option<Difficulty> {
        self.difficulty
    }

    #[must_use]
    pub fn is_correct(&self, selected: OptionLabel) -> bool {
        self.correct == selected
    }

    /// Containment rule of the question store: every tag on this question
    /// must be among `selected`.
    #[must_use]
    pub fn tags_within(&self, selected: &BTreeSet<TagName>) -> bool {
        self.tags.iter().all(|tag| selected.contains(tag))
    }
}

/// Flat wire shape, mirroring the store's row columns.
#[derive(Serialize, Deserialize)]
struct QuestionRepr {
    id: QuestionId,
    subject: Subject,
    question_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    question_image: Option<String>,
    option_a: String,
    option_b: String,
    option_c: String,
    option_d: String,
    correct_option: OptionLabel,
    #[serde(default)]
    tags: Option<Vec<TagName>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    difficulty_level: Option<Difficulty>,
}

impl TryFrom<QuestionRepr> for Question {
    type Error = QuestionError;

    fn try_from(repr: QuestionRepr) -> Result<Self, Self::Error> {
        let question = Question::new(
            repr.id,
            repr.subject,
            repr.question_text,
            [repr.option_a, repr.option_b, repr.option_c, repr.option_d],
            repr.correct_option,
            repr.tags.unwrap_or_default(),
        )?
        .with_difficulty(repr.difficulty_level)
        .with_stored_image(repr.question_image.as_deref());
        Ok(question)
    }
}

impl From<Question> for QuestionRepr {
    fn from(q: Question) -> Self {
        let [option_a, option_b, option_c, option_d] = q.options;
        Self {
            id: q.id,
            subject: q.subject,
            question_text: q.text,
            question_image: q.image.map(|image| image.to_string()),
            option_a,
            option_b,
            option_c,
            option_d,
            correct_option: q.correct,
            tags: Some(q.tags),
            difficulty_level: q.difficulty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(name: &str) -> TagName {
        TagName::new(name).unwrap()
    }

    fn options() -> [String; 4] {
        ["1".into(), "2".into(), "3".into(), "4".into()]
    }

    #[test]
    fn rejects_blank_text_and_options() {
        let id = QuestionId::new("q1").unwrap();
        let err = Question::new(id.clone(), Subject::Physics, " ", options(), OptionLabel::A, [])
            .unwrap_err();
        assert_eq!(err, QuestionError::EmptyText);

        let mut opts = options();
        opts[2] = String::new();
        let err = Question::new(id, Subject::Physics, "Q", opts, OptionLabel::A, []).unwrap_err();
        assert_eq!(err, QuestionError::EmptyOption(OptionLabel::C));
    }

    #[test]
    fn collapses_duplicate_tags() {
        let q = Question::new(
            QuestionId::new("q1").unwrap(),
            Subject::Physics,
            "Q",
            options(),
            OptionLabel::B,
            [tag("optics"), tag("waves"), tag("optics")],
        )
        .unwrap();
        assert_eq!(q.tags(), &[tag("optics"), tag("waves")]);
        assert!(q.is_correct(OptionLabel::B));
        assert!(!q.is_correct(OptionLabel::A));
    }

    #[test]
    fn tag_containment_requires_every_question_tag() {
        let q = Question::new(
            QuestionId::new("q1").unwrap(),
            Subject::Physics,
            "Q",
            options(),
            OptionLabel::A,
            [tag("mechanics"), tag("kinematics")],
        )
        .unwrap();
        let both = BTreeSet::from([tag("mechanics"), tag("kinematics"), tag("optics")]);
        let one = BTreeSet::from([tag("mechanics")]);
        assert!(q.tags_within(&both));
        assert!(!q.tags_within(&one));
    }

    #[test]
    fn image_accepts_urls_and_relative_paths() {
        let q = Question::new(
            QuestionId::new("q1").unwrap(),
            Subject::Biology,
            "Q",
            options(),
            OptionLabel::A,
            [],
        )
        .unwrap();
        assert!(q.clone().with_image("not a url").is_err());
        assert!(q.clone().with_image("  ").is_err());

        let relative = q.clone().with_image("images/ramp.png").unwrap();
        assert_eq!(
            relative.image(),
            Some(&ImageRef::Path("images/ramp.png".into()))
        );

        let q = q.with_image("https://cdn.example.com/cell.png").unwrap();
        let Some(ImageRef::Url(url)) = q.image() else {
            panic!("expected an absolute url");
        };
        assert_eq!(url.host_str(), Some("cdn.example.com"));
    }

    #[test]
    fn store_row_keeps_relative_image_and_null_tags() {
        let row = serde_json::json!({
            "id": "p-2",
            "subject": "physics",
            "question_text": "Which force acts along the ramp?",
            "question_image": "images/ramp.png",
            "option_a": "Friction",
            "option_b": "Gravity",
            "option_c": "Normal",
            "option_d": "Tension",
            "correct_option": "b",
            "tags": null,
            "difficulty_level": null
        });
        let q: Question = serde_json::from_value(row).unwrap();
        assert_eq!(q.image().map(ImageRef::as_str), Some("images/ramp.png"));
        assert!(q.tags().is_empty());

        let back = serde_json::to_value(&q).unwrap();
        assert_eq!(back["question_image"], "images/ramp.png");
        assert_eq!(back["tags"], serde_json::json!([]));
    }

    #[test]
    fn unusable_stored_image_is_dropped_not_fatal() {
        let q = Question::new(
            QuestionId::new("q1").unwrap(),
            Subject::Chemistry,
            "Q",
            options(),
            OptionLabel::A,
            [],
        )
        .unwrap()
        .with_stored_image(Some("broken path.png"));
        assert!(q.image().is_none());
    }

    #[test]
    fn deserializes_store_row_shape() {
        let json = r#"{
            "id": "p-1",
            "subject": "physics",
            "question_text": "Unit of force?",
            "question_image": "",
            "option_a": "Newton",
            "option_b": "Joule",
            "option_c": "Watt",
            "option_d": "Pascal",
            "correct_option": "a",
            "tags": ["mechanics"],
            "difficulty_level": "easy"
        }"#;
        let q: Question = serde_json::from_str(json).unwrap();
        assert_eq!(q.subject(), Subject::Physics);
        assert_eq!(q.option(OptionLabel::A), "Newton");
        assert_eq!(q.difficulty(), Some(Difficulty::Easy));
        assert!(q.image().is_none());
    }

    #[test]
    fn option_labels_parse_case_insensitively() {
        assert_eq!("C".parse::<OptionLabel>().unwrap(), OptionLabel::C);
        assert!("e".parse::<OptionLabel>().is_err());
    }
}
