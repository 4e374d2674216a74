//! Owner model.
//!
//! # Responsibility
//! - Represent the party that can own or hold items.
//! - Reject persisted shapes that reference both or neither party.
//!
//! # Invariants
//! - An owner wraps exactly one `Party`; the discriminator never changes.
//! - A person or organization backs at most one owner (enforced in storage).

use super::organization::OrganizationId;
use super::person::PersonId;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable owner identifier. Ledger rows point at owners, never at parties.
pub type OwnerId = Uuid;

/// The party an owner stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Party {
    Person(PersonId),
    Organization(OrganizationId),
}

impl Party {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Person(_) => "person",
            Self::Organization(_) => "organization",
        }
    }
}

impl Display for Party {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Person(id) => write!(f, "person:{id}"),
            Self::Organization(id) => write!(f, "organization:{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerValidationError {
    NilUuid,
    /// Both a person and an organization reference were present.
    BothParties,
    /// Neither a person nor an organization reference was present.
    NoParty,
}

impl Display for OwnerValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilUuid => write!(f, "owner uuid must not be nil"),
            Self::BothParties => write!(f, "owner can't be both person and organization"),
            Self::NoParty => write!(f, "owner must be either person or organization"),
        }
    }
}

impl Error for OwnerValidationError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Owner {
    pub uuid: OwnerId,
    pub party: Party,
}

impl Owner {
    pub fn new(party: Party) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            party,
        }
    }

    pub fn for_person(person: PersonId) -> Self {
        Self::new(Party::Person(person))
    }

    pub fn for_organization(organization: OrganizationId) -> Self {
        Self::new(Party::Organization(organization))
    }

    /// Rebuilds an owner from the nullable storage columns.
    ///
    /// # Errors
    /// - `BothParties` / `NoParty` when the columns break mutual exclusion.
    pub fn from_columns(
        uuid: OwnerId,
        person: Option<PersonId>,
        organization: Option<OrganizationId>,
    ) -> Result<Self, OwnerValidationError> {
        if uuid.is_nil() {
            return Err(OwnerValidationError::NilUuid);
        }
        let party = match (person, organization) {
            (Some(person), None) => Party::Person(person),
            (None, Some(organization)) => Party::Organization(organization),
            (Some(_), Some(_)) => return Err(OwnerValidationError::BothParties),
            (None, None) => return Err(OwnerValidationError::NoParty),
        };
        Ok(Self { uuid, party })
    }

    pub fn is_user(&self) -> bool {
        matches!(self.party, Party::Person(_))
    }

    pub fn is_organization(&self) -> bool {
        matches!(self.party, Party::Organization(_))
    }

    pub fn person(&self) -> Option<PersonId> {
        match self.party {
            Party::Person(id) => Some(id),
            Party::Organization(_) => None,
        }
    }

    pub fn organization(&self) -> Option<OrganizationId> {
        match self.party {
            Party::Organization(id) => Some(id),
            Party::Person(_) => None,
        }
    }
}
