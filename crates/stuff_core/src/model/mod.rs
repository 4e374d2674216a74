//! Domain model for items, owners and their temporal links.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Own entity-level validation rules (names, usernames, item types).
//!
//! # Invariants
//! - Every entity is identified by a stable, non-nil UUID.
//! - Timestamps are Unix epoch milliseconds.
//! - Owners reference exactly one party; the type system rules out
//!   "both" and "neither".

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod item;
pub mod link;
pub mod organization;
pub mod owner;
pub mod person;

use item::ItemValidationError;
use organization::OrganizationValidationError;
use owner::OwnerValidationError;
use person::PersonValidationError;

/// Unix epoch milliseconds.
pub type EpochMs = i64;

/// Returns the current wall-clock time in epoch milliseconds.
pub fn now_epoch_ms() -> EpochMs {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Any entity-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Person(PersonValidationError),
    Organization(OrganizationValidationError),
    Owner(OwnerValidationError),
    Item(ItemValidationError),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Person(err) => write!(f, "{err}"),
            Self::Organization(err) => write!(f, "{err}"),
            Self::Owner(err) => write!(f, "{err}"),
            Self::Item(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ValidationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Person(err) => Some(err),
            Self::Organization(err) => Some(err),
            Self::Owner(err) => Some(err),
            Self::Item(err) => Some(err),
        }
    }
}

impl From<PersonValidationError> for ValidationError {
    fn from(value: PersonValidationError) -> Self {
        Self::Person(value)
    }
}

impl From<OrganizationValidationError> for ValidationError {
    fn from(value: OrganizationValidationError) -> Self {
        Self::Organization(value)
    }
}

impl From<OwnerValidationError> for ValidationError {
    fn from(value: OwnerValidationError) -> Self {
        Self::Owner(value)
    }
}

impl From<ItemValidationError> for ValidationError {
    fn from(value: ItemValidationError) -> Self {
        Self::Item(value)
    }
}
