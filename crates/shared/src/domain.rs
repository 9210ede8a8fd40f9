use std::{cmp::Ordering, fmt, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Client-generated primary key of a record in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: RecordId,
    pub name: String,
    pub age: u32,
    pub image_path: Option<PathBuf>,
}

impl UserRecord {
    pub fn new(id: RecordId, name: impl Into<String>, age: u32) -> Self {
        Self {
            id,
            name: name.into(),
            age,
            image_path: None,
        }
    }

    pub fn with_image_path(mut self, image_path: impl Into<PathBuf>) -> Self {
        self.image_path = Some(image_path.into());
        self
    }

    /// Case-insensitive substring match against the display name.
    pub fn name_matches(&self, search_text: &str) -> bool {
        if search_text.is_empty() {
            return true;
        }
        self.name
            .to_lowercase()
            .contains(&search_text.to_lowercase())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("age {0:?} is not a non-negative integer")]
    InvalidAge(String),
}

/// Validated form input, ready to become a [`UserRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEntry {
    pub name: String,
    pub age: u32,
}

impl UserEntry {
    /// Validates raw text as typed. Neither field is trimmed.
    pub fn parse(name: &str, age_text: &str) -> Result<Self, ValidationError> {
        let age = age_text
            .parse::<u32>()
            .map_err(|_| ValidationError::InvalidAge(age_text.to_string()))?;
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        Ok(Self {
            name: name.to_string(),
            age,
        })
    }

    pub fn into_record(self, id: RecordId) -> UserRecord {
        UserRecord::new(id, self.name, self.age)
    }
}

pub fn compare_by_name(a: &UserRecord, b: &UserRecord) -> Ordering {
    a.name
        .to_lowercase()
        .cmp(&b.name.to_lowercase())
        .then_with(|| a.id.cmp(&b.id))
}

/// Sorts records by case-insensitive name, ascending.
pub fn sort_by_name(records: &mut [UserRecord]) {
    records.sort_by(compare_by_name);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, name: &str) -> UserRecord {
        UserRecord::new(RecordId::from(id), name, 1)
    }

    #[test]
    fn parses_valid_entry_without_trimming() {
        let entry = UserEntry::parse("Alice", "30").expect("entry");
        assert_eq!(entry.name, "Alice");
        assert_eq!(entry.age, 30);

        assert_eq!(
            UserEntry::parse("Alice", " 30"),
            Err(ValidationError::InvalidAge(" 30".into()))
        );
    }

    #[test]
    fn rejects_empty_name_and_bad_age() {
        assert_eq!(UserEntry::parse("", "30"), Err(ValidationError::EmptyName));
        assert!(matches!(
            UserEntry::parse("Bob", "thirty"),
            Err(ValidationError::InvalidAge(_))
        ));
        assert!(matches!(
            UserEntry::parse("Bob", "-4"),
            Err(ValidationError::InvalidAge(_))
        ));
        assert!(matches!(
            UserEntry::parse("Bob", ""),
            Err(ValidationError::InvalidAge(_))
        ));
    }

    #[test]
    fn sorts_case_insensitively() {
        let mut records = vec![record("1", "bob"), record("2", "Anna"), record("3", "carl")];
        sort_by_name(&mut records);
        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["Anna", "bob", "carl"]);
    }

    #[test]
    fn name_match_ignores_case() {
        assert!(record("1", "Alice").name_matches("ali"));
        assert!(record("1", "MALIK").name_matches("ali"));
        assert!(!record("1", "Bob").name_matches("ali"));
        assert!(record("1", "Bob").name_matches(""));
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(RecordId::generate(), RecordId::generate());
    }
}
