//! Item domain model.
//!
//! # Responsibility
//! - Define the physical object record and its type vocabulary.
//! - Validate item fields before persistence.
//!
//! # Invariants
//! - `kind` is one of the known `ItemType` values; unknown type text is a
//!   validation error, never silently mapped.
//! - `value_cents` fits 11 decimal digits with 2 fractional digits.
//! - `is_disposed` only ever goes from `false` to `true` through the service.
//!
//! Current owner and holder are not fields: they are read from the link
//! ledger (see `repo::ledger_repo`).

use super::{now_epoch_ms, EpochMs};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Stable item identifier.
pub type ItemId = Uuid;

pub const MAX_ITEM_NAME_CHARS: usize = 255;
/// 999,999,999.99 expressed in cents.
pub const MAX_VALUE_CENTS: i64 = 99_999_999_999;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Book,
    #[default]
    Other,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Book => "book",
            Self::Other => "other",
        }
    }
}

impl FromStr for ItemType {
    type Err = ItemValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "book" => Ok(Self::Book),
            "other" => Ok(Self::Other),
            other => Err(ItemValidationError::UnknownType(other.to_string())),
        }
    }
}

impl Display for ItemType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relative reference to a stored image asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ImageRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemValidationError {
    NilUuid,
    UnknownType(String),
    BlankName,
    NameTooLong { chars: usize },
    ValueOutOfRange { cents: i64 },
}

impl Display for ItemValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilUuid => write!(f, "item uuid must not be nil"),
            Self::UnknownType(value) => write!(f, "unknown item type `{value}`"),
            Self::BlankName => write!(f, "item name must not be blank"),
            Self::NameTooLong { chars } => write!(
                f,
                "item name has {chars} characters; at most {MAX_ITEM_NAME_CHARS} allowed"
            ),
            Self::ValueOutOfRange { cents } => write!(
                f,
                "item value {cents} cents is outside 0..={MAX_VALUE_CENTS}"
            ),
        }
    }
}

impl Error for ItemValidationError {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub uuid: ItemId,
    /// Serialized as `type` to match the storage column.
    #[serde(rename = "type")]
    pub kind: ItemType,
    pub name: String,
    pub description: String,
    pub image: Option<ImageRef>,
    /// Monetary value in cents.
    pub value_cents: i64,
    pub is_disposed: bool,
    pub created_at: EpochMs,
    pub updated_at: EpochMs,
}

impl Item {
    /// Creates an unsaved item with a generated id.
    ///
    /// Validation runs at save time, so an invalid name is only reported by
    /// `validate()` or the repository.
    pub fn new(kind: ItemType, name: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), kind, name)
    }

    /// Creates an unsaved item with a caller-provided id.
    pub fn with_id(uuid: ItemId, kind: ItemType, name: impl Into<String>) -> Self {
        let now = now_epoch_ms();
        Self {
            uuid,
            kind,
            name: name.into(),
            description: String::new(),
            image: None,
            value_cents: 0,
            is_disposed: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_value_cents(mut self, value_cents: i64) -> Self {
        self.value_cents = value_cents;
        self
    }

    pub fn validate(&self) -> Result<(), ItemValidationError> {
        if self.uuid.is_nil() {
            return Err(ItemValidationError::NilUuid);
        }
        if self.name.trim().is_empty() {
            return Err(ItemValidationError::BlankName);
        }
        let chars = self.name.chars().count();
        if chars > MAX_ITEM_NAME_CHARS {
            return Err(ItemValidationError::NameTooLong { chars });
        }
        if !(0..=MAX_VALUE_CENTS).contains(&self.value_cents) {
            return Err(ItemValidationError::ValueOutOfRange {
                cents: self.value_cents,
            });
        }
        Ok(())
    }

    /// Returns whether the item is still in circulation.
    pub fn is_active(&self) -> bool {
        !self.is_disposed
    }
}
