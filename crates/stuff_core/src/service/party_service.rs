//! Person, organization and owner use-case service.
//!
//! # Responsibility
//! - Register persons and organizations and manage membership.
//! - Create owners for exactly one party.
//!
//! # Invariants
//! - Usernames are unique.
//! - A party is backed by at most one owner.
//! - Organizations carry no ownership logic of their own.

use crate::model::organization::{Organization, OrganizationId, OrganizationValidationError};
use crate::model::owner::{Owner, OwnerId, Party};
use crate::model::person::{Person, PersonId, PersonValidationError};
use crate::repo::party_repo::PartyRepository;
use crate::repo::RepoError;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum PartyServiceError {
    InvalidPerson(PersonValidationError),
    InvalidOrganization(OrganizationValidationError),
    UsernameTaken(String),
    PersonNotFound(PersonId),
    OrganizationNotFound(OrganizationId),
    OwnerNotFound(OwnerId),
    /// The party is already backed by another owner.
    OwnerAlreadyExists { party: Party, owner_uuid: OwnerId },
    Repo(RepoError),
}

impl Display for PartyServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPerson(err) => write!(f, "{err}"),
            Self::InvalidOrganization(err) => write!(f, "{err}"),
            Self::UsernameTaken(username) => write!(f, "username already taken: {username}"),
            Self::PersonNotFound(id) => write!(f, "person not found: {id}"),
            Self::OrganizationNotFound(id) => write!(f, "organization not found: {id}"),
            Self::OwnerNotFound(id) => write!(f, "owner not found: {id}"),
            Self::OwnerAlreadyExists { party, owner_uuid } => {
                write!(f, "{party} already has owner {owner_uuid}")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PartyServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidPerson(err) => Some(err),
            Self::InvalidOrganization(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for PartyServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<PersonValidationError> for PartyServiceError {
    fn from(value: PersonValidationError) -> Self {
        Self::InvalidPerson(value)
    }
}

impl From<OrganizationValidationError> for PartyServiceError {
    fn from(value: OrganizationValidationError) -> Self {
        Self::InvalidOrganization(value)
    }
}

pub type PartyServiceResult<T> = Result<T, PartyServiceError>;

/// Party service facade over repository implementations.
pub struct PartyService<R: PartyRepository> {
    repo: R,
}

impl<R: PartyRepository> PartyService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Registers a person under a unique username.
    pub fn create_person(&self, username: impl Into<String>) -> PartyServiceResult<Person> {
        let person = Person::new(username)?;
        if self
            .repo
            .find_person_by_username(&person.username)?
            .is_some()
        {
            return Err(PartyServiceError::UsernameTaken(person.username));
        }
        self.repo.create_person(&person)?;
        info!("event=person_create module=party_service status=ok person={}", person.uuid);
        Ok(person)
    }

    pub fn get_person(&self, id: PersonId) -> PartyServiceResult<Person> {
        self.repo
            .get_person(id)?
            .ok_or(PartyServiceError::PersonNotFound(id))
    }

    pub fn find_person(&self, username: &str) -> PartyServiceResult<Option<Person>> {
        Ok(self.repo.find_person_by_username(username)?)
    }

    /// Creates an organization administered by `admin`.
    ///
    /// The administrator is not added as a member.
    pub fn create_organization(
        &self,
        name: impl Into<String>,
        admin: PersonId,
    ) -> PartyServiceResult<Organization> {
        let organization = Organization::new(name, admin)?;
        self.ensure_person(admin)?;
        self.repo.create_organization(&organization)?;
        info!(
            "event=organization_create module=party_service status=ok organization={} admin={admin}",
            organization.uuid
        );
        Ok(organization)
    }

    pub fn get_organization(&self, id: OrganizationId) -> PartyServiceResult<Organization> {
        self.repo
            .get_organization(id)?
            .ok_or(PartyServiceError::OrganizationNotFound(id))
    }

    pub fn rename_organization(
        &self,
        id: OrganizationId,
        name: impl Into<String>,
    ) -> PartyServiceResult<Organization> {
        let mut organization = self.get_organization(id)?;
        organization.name = name.into().trim().to_string();
        organization.validate()?;
        self.repo.update_organization(&organization)?;
        Ok(organization)
    }

    /// Hands the administrator role to another person.
    pub fn set_admin(
        &self,
        id: OrganizationId,
        admin: PersonId,
    ) -> PartyServiceResult<Organization> {
        let mut organization = self.get_organization(id)?;
        self.ensure_person(admin)?;
        organization.admin = admin;
        self.repo.update_organization(&organization)?;
        Ok(organization)
    }

    /// Adds a member. Returns `false` when the person already was one.
    pub fn add_member(
        &self,
        organization: OrganizationId,
        person: PersonId,
    ) -> PartyServiceResult<bool> {
        self.get_organization(organization)?;
        self.ensure_person(person)?;
        Ok(self.repo.add_member(organization, person)?)
    }

    /// Removes a member. Returns `false` when the person was not one.
    pub fn remove_member(
        &self,
        organization: OrganizationId,
        person: PersonId,
    ) -> PartyServiceResult<bool> {
        self.get_organization(organization)?;
        Ok(self.repo.remove_member(organization, person)?)
    }

    pub fn members(&self, organization: OrganizationId) -> PartyServiceResult<Vec<Person>> {
        self.get_organization(organization)?;
        Ok(self.repo.list_members(organization)?)
    }

    pub fn member_count(&self, organization: OrganizationId) -> PartyServiceResult<u32> {
        self.get_organization(organization)?;
        Ok(self.repo.member_count(organization)?)
    }

    pub fn create_owner_for_person(&self, person: PersonId) -> PartyServiceResult<Owner> {
        self.ensure_person(person)?;
        self.create_owner(Party::Person(person))
    }

    pub fn create_owner_for_organization(
        &self,
        organization: OrganizationId,
    ) -> PartyServiceResult<Owner> {
        self.get_organization(organization)?;
        self.create_owner(Party::Organization(organization))
    }

    pub fn get_owner(&self, id: OwnerId) -> PartyServiceResult<Owner> {
        self.repo
            .get_owner(id)?
            .ok_or(PartyServiceError::OwnerNotFound(id))
    }

    pub fn owner_for_party(&self, party: &Party) -> PartyServiceResult<Option<Owner>> {
        Ok(self.repo.find_owner_by_party(party)?)
    }

    /// Username or organization name behind an owner.
    pub fn display_name(&self, id: OwnerId) -> PartyServiceResult<String> {
        let owner = self.get_owner(id)?;
        match owner.party {
            Party::Person(person) => Ok(self.get_person(person)?.username),
            Party::Organization(organization) => Ok(self.get_organization(organization)?.name),
        }
    }

    fn create_owner(&self, party: Party) -> PartyServiceResult<Owner> {
        if let Some(existing) = self.repo.find_owner_by_party(&party)? {
            return Err(PartyServiceError::OwnerAlreadyExists {
                party,
                owner_uuid: existing.uuid,
            });
        }
        let owner = Owner::new(party);
        self.repo.create_owner(&owner)?;
        info!(
            "event=owner_create module=party_service status=ok owner={} party_kind={}",
            owner.uuid,
            party.label()
        );
        Ok(owner)
    }

    fn ensure_person(&self, id: PersonId) -> PartyServiceResult<()> {
        self.get_person(id).map(|_| ())
    }
}
