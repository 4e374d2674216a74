//! Organization model.
//!
//! # Invariants
//! - `name` is non-blank after trim and at most 255 characters.
//! - `admin` need not be a member.

use super::person::PersonId;
use super::{now_epoch_ms, EpochMs};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable organization identifier.
pub type OrganizationId = Uuid;

pub const MAX_ORGANIZATION_NAME_CHARS: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrganizationValidationError {
    NilUuid,
    BlankName,
    NameTooLong { chars: usize },
}

impl Display for OrganizationValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilUuid => write!(f, "organization uuid must not be nil"),
            Self::BlankName => write!(f, "organization name must not be blank"),
            Self::NameTooLong { chars } => write!(
                f,
                "organization name has {chars} characters; at most {MAX_ORGANIZATION_NAME_CHARS} allowed"
            ),
        }
    }
}

impl Error for OrganizationValidationError {}

/// Named group with one administrator. Members are stored separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub uuid: OrganizationId,
    pub name: String,
    pub admin: PersonId,
    pub created_at: EpochMs,
}

impl Organization {
    pub fn new(
        name: impl Into<String>,
        admin: PersonId,
    ) -> Result<Self, OrganizationValidationError> {
        let organization = Self {
            uuid: Uuid::new_v4(),
            name: name.into().trim().to_string(),
            admin,
            created_at: now_epoch_ms(),
        };
        organization.validate()?;
        Ok(organization)
    }

    pub fn validate(&self) -> Result<(), OrganizationValidationError> {
        if self.uuid.is_nil() {
            return Err(OrganizationValidationError::NilUuid);
        }
        if self.name.trim().is_empty() {
            return Err(OrganizationValidationError::BlankName);
        }
        let chars = self.name.chars().count();
        if chars > MAX_ORGANIZATION_NAME_CHARS {
            return Err(OrganizationValidationError::NameTooLong { chars });
        }
        Ok(())
    }
}
