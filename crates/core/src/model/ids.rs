use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised when building identifiers and keys.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("{0} must not be blank")]
    Blank(&'static str),
}

/// Suffix used for the capstone-project key of a course.
pub const PROJECT_SUFFIX: &str = "project";

fn non_blank(kind: &'static str, raw: impl Into<String>) -> Result<String, IdError> {
    let raw = raw.into();
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(IdError::Blank(kind));
    }
    if trimmed.len() == raw.len() {
        Ok(raw)
    } else {
        Ok(trimmed.to_owned())
    }
}

/// Opaque identity issued by the authentication provider.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Creates a new `UserId`.
    ///
    /// # Errors
    ///
    /// Returns `IdError::Blank` if the identity is empty or whitespace.
    pub fn new(raw: impl Into<String>) -> Result<Self, IdError> {
        non_blank("user id", raw).map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Catalog identifier of a course, e.g. `frontend-development`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourseId(String);

impl CourseId {
    /// Creates a new `CourseId`.
    ///
    /// # Errors
    ///
    /// Returns `IdError::Blank` if the id is empty or whitespace.
    pub fn new(raw: impl Into<String>) -> Result<Self, IdError> {
        non_blank("course id", raw).map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identifier of a module, unique within its course.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    /// Creates a new `ModuleId`.
    ///
    /// # Errors
    ///
    /// Returns `IdError::Blank` if the id is empty or whitespace.
    pub fn new(raw: impl Into<String>) -> Result<Self, IdError> {
        non_blank("module id", raw).map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Flat lookup key into the progress table.
///
/// A key names a whole course (`"{course}"`), one of its modules
/// (`"{course}-{module}"`), or its capstone project (`"{course}-project"`).
/// The namespace is flat: the key does not remember which shape built it.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CourseKey(String);

impl CourseKey {
    /// Wraps an already-composed key.
    ///
    /// Surrounding whitespace is trimmed, so `" rust"` and `"rust"` name the
    /// same key. Keys read back from either replica go through the same
    /// normalisation.
    ///
    /// # Errors
    ///
    /// Returns `IdError::Blank` if the key is empty or whitespace.
    pub fn new(raw: impl Into<String>) -> Result<Self, IdError> {
        non_blank("course key", raw).map(Self)
    }

    /// Key tracking the course as a whole (enrollment and overall completion).
    #[must_use]
    pub fn course(course: &CourseId) -> Self {
        Self(course.0.clone())
    }

    /// Key tracking a single module of a course.
    #[must_use]
    pub fn module(course: &CourseId, module: &ModuleId) -> Self {
        Self(format!("{}-{}", course.0, module.0))
    }

    /// Key tracking the capstone project of a course.
    #[must_use]
    pub fn project(course: &CourseId) -> Self {
        Self(format!("{}-{PROJECT_SUFFIX}", course.0))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CourseKey {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CourseKey> for String {
    fn from(key: CourseKey) -> Self {
        key.0
    }
}

impl FromStr for CourseKey {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl FromStr for UserId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl FromStr for CourseId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// ─── Debug / Display ──────────────────────────────────────────────────────────

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

impl fmt::Debug for CourseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CourseId({})", self.0)
    }
}

impl fmt::Debug for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleId({})", self.0)
    }
}

impl fmt::Debug for CourseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CourseKey({})", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for CourseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for CourseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Builds a catalog slug from a course name and its provider.
///
/// Both parts are lower-cased and every whitespace run becomes a single `-`.
#[must_use]
pub fn course_slug(name: &str, provider: &str) -> String {
    fn slug(part: &str) -> String {
        part.to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-")
    }
    format!("{}-{}", slug(name), slug(provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_keys_follow_flat_namespace() {
        let course = CourseId::new("frontend-development").unwrap();
        let module = ModuleId::new("m1").unwrap();

        assert_eq!(CourseKey::course(&course).as_str(), "frontend-development");
        assert_eq!(
            CourseKey::module(&course, &module).as_str(),
            "frontend-development-m1"
        );
        assert_eq!(
            CourseKey::project(&course).as_str(),
            "frontend-development-project"
        );
    }

    #[test]
    fn blank_ids_are_rejected() {
        assert_eq!(CourseKey::new("   ").unwrap_err(), IdError::Blank("course key"));
        assert!(UserId::new("").is_err());
        assert!(ModuleId::new("\t").is_err());
    }

    #[test]
    fn keys_are_trimmed() {
        let key = CourseKey::new("  data-science ").unwrap();
        assert_eq!(key.as_str(), "data-science");
    }

    #[test]
    fn padded_and_bare_keys_are_the_same_key() {
        assert_eq!(
            CourseKey::new(" rust").unwrap(),
            CourseKey::new("rust").unwrap()
        );
        let parsed: CourseKey = serde_json::from_str("\"rust \"").unwrap();
        assert_eq!(parsed, CourseKey::new("rust").unwrap());
    }

    #[test]
    fn course_key_rejects_blank_json() {
        let parsed: Result<CourseKey, _> = serde_json::from_str("\"  \"");
        assert!(parsed.is_err());
    }

    #[test]
    fn slug_collapses_whitespace() {
        assert_eq!(
            course_slug("Intro to  Data Science", "Open University"),
            "intro-to-data-science-open-university"
        );
    }
}
