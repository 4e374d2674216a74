//! Person model.
//!
//! A person is the local stand-in for an external user account. Persons
//! administer and join organizations and can be wrapped by an owner.

use super::{now_epoch_ms, EpochMs};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable person identifier.
pub type PersonId = Uuid;

pub const MAX_USERNAME_CHARS: usize = 150;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w.@+-]+$").expect("valid username regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersonValidationError {
    NilUuid,
    EmptyUsername,
    UsernameTooLong { chars: usize },
    /// Username contains characters outside letters, digits and `@.+-_`.
    InvalidUsername(String),
}

impl Display for PersonValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilUuid => write!(f, "person uuid must not be nil"),
            Self::EmptyUsername => write!(f, "username must not be empty"),
            Self::UsernameTooLong { chars } => write!(
                f,
                "username has {chars} characters; at most {MAX_USERNAME_CHARS} allowed"
            ),
            Self::InvalidUsername(value) => write!(
                f,
                "username `{value}` may only contain letters, digits and @/./+/-/_"
            ),
        }
    }
}

impl Error for PersonValidationError {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub uuid: PersonId,
    pub username: String,
    pub created_at: EpochMs,
}

impl Person {
    /// Creates a person with a generated id after validating the username.
    pub fn new(username: impl Into<String>) -> Result<Self, PersonValidationError> {
        let person = Self {
            uuid: Uuid::new_v4(),
            username: username.into().trim().to_string(),
            created_at: now_epoch_ms(),
        };
        person.validate()?;
        Ok(person)
    }

    pub fn validate(&self) -> Result<(), PersonValidationError> {
        if self.uuid.is_nil() {
            return Err(PersonValidationError::NilUuid);
        }
        if self.username.is_empty() {
            return Err(PersonValidationError::EmptyUsername);
        }
        let chars = self.username.chars().count();
        if chars > MAX_USERNAME_CHARS {
            return Err(PersonValidationError::UsernameTooLong { chars });
        }
        if !USERNAME_RE.is_match(&self.username) {
            return Err(PersonValidationError::InvalidUsername(self.username.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Person, PersonValidationError, MAX_USERNAME_CHARS};

    #[test]
    fn new_trims_and_accepts_punctuated_usernames() {
        let person = Person::new("  alice.smith+tools@home ").unwrap();
        assert_eq!(person.username, "alice.smith+tools@home");
        assert!(!person.uuid.is_nil());
    }

    #[test]
    fn rejects_blank_and_spaced_usernames() {
        assert_eq!(
            Person::new("   ").unwrap_err(),
            PersonValidationError::EmptyUsername
        );
        assert!(matches!(
            Person::new("alice smith").unwrap_err(),
            PersonValidationError::InvalidUsername(_)
        ));
    }

    #[test]
    fn rejects_overlong_usernames() {
        let name = "a".repeat(MAX_USERNAME_CHARS + 1);
        assert_eq!(
            Person::new(name).unwrap_err(),
            PersonValidationError::UsernameTooLong {
                chars: MAX_USERNAME_CHARS + 1
            }
        );
    }
}
