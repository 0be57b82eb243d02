use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Topic label on a question, as stored (trimmed, non-empty).
///
/// Ordered so tag selections can live in a `BTreeSet`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TagName(String);

impl TagName {
    /// # Errors
    ///
    /// Returns `TagError::EmptyName` for a blank name.
    pub fn new(value: impl Into<String>) -> Result<Self, TagError> {
        let mut name = value.into();
        let end = name.trim_end().len();
        name.truncate(end);
        let start = name.len() - name.trim_start().len();
        name.drain(..start);
        if name.is_empty() {
            Err(TagError::EmptyName)
        } else {
            Ok(Self(name))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TagName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TagName {
    type Err = TagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for TagName {
    type Error = TagError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TagName> for String {
    fn from(tag: TagName) -> Self {
        tag.0
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TagError {
    #[error("tag cannot be blank")]
    EmptyName,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_rejects_empty() {
        assert_eq!(TagName::new("  mechanics ").unwrap().as_str(), "mechanics");
        assert_eq!(TagName::new(" \t").unwrap_err(), TagError::EmptyName);
    }

    #[test]
    fn parses_and_orders() {
        let a: TagName = "algebra".parse().unwrap();
        let g: TagName = " geometry".parse().unwrap();
        assert!(a < g);
        assert_eq!(g.to_string(), "geometry");
    }
}
