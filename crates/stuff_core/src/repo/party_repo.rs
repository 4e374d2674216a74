//! Person, organization and owner repository contracts and SQLite
//! implementation.
//!
//! # Invariants
//! - Owner rows decode through `Owner::from_columns`, so a row carrying both
//!   or neither party reference is reported as a validation error.
//! - Membership writes are idempotent.

use super::{ensure_connection_ready, parse_optional_uuid, parse_uuid, RepoError, RepoResult};
use crate::model::now_epoch_ms;
use crate::model::organization::{Organization, OrganizationId};
use crate::model::owner::{Owner, OwnerId, Party};
use crate::model::person::{Person, PersonId};
use rusqlite::{params, Connection, OptionalExtension, Row};

const PERSON_SELECT_SQL: &str = "SELECT uuid, username, created_at FROM persons";
const ORGANIZATION_SELECT_SQL: &str = "SELECT uuid, name, admin_uuid, created_at FROM organizations";
const OWNER_SELECT_SQL: &str = "SELECT uuid, person_uuid, organization_uuid FROM owners";

/// Repository interface for persons, organizations and owners.
pub trait PartyRepository {
    fn create_person(&self, person: &Person) -> RepoResult<PersonId>;
    fn get_person(&self, id: PersonId) -> RepoResult<Option<Person>>;
    fn find_person_by_username(&self, username: &str) -> RepoResult<Option<Person>>;

    fn create_organization(&self, organization: &Organization) -> RepoResult<OrganizationId>;
    /// Persists name and administrator changes.
    fn update_organization(&self, organization: &Organization) -> RepoResult<()>;
    fn get_organization(&self, id: OrganizationId) -> RepoResult<Option<Organization>>;
    /// Returns `true` when the person was not a member before.
    fn add_member(&self, organization: OrganizationId, person: PersonId) -> RepoResult<bool>;
    /// Returns `true` when a membership row was removed.
    fn remove_member(&self, organization: OrganizationId, person: PersonId) -> RepoResult<bool>;
    /// Lists members ordered by username.
    fn list_members(&self, organization: OrganizationId) -> RepoResult<Vec<Person>>;
    fn member_count(&self, organization: OrganizationId) -> RepoResult<u32>;

    fn create_owner(&self, owner: &Owner) -> RepoResult<OwnerId>;
    fn get_owner(&self, id: OwnerId) -> RepoResult<Option<Owner>>;
    fn find_owner_by_party(&self, party: &Party) -> RepoResult<Option<Owner>>;
}

/// SQLite-backed party repository.
pub struct SqlitePartyRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePartyRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            &["persons", "organizations", "organization_members", "owners"],
        )?;
        Ok(Self { conn })
    }
}

impl PartyRepository for SqlitePartyRepository<'_> {
    fn create_person(&self, person: &Person) -> RepoResult<PersonId> {
        person.validate()?;
        self.conn.execute(
            "INSERT INTO persons (uuid, username, created_at) VALUES (?1, ?2, ?3);",
            params![person.uuid.to_string(), person.username, person.created_at],
        )?;
        Ok(person.uuid)
    }

    fn get_person(&self, id: PersonId) -> RepoResult<Option<Person>> {
        self.conn
            .query_row(
                &format!("{PERSON_SELECT_SQL} WHERE uuid = ?1;"),
                [id.to_string()],
                read_person_columns,
            )
            .optional()?
            .map(decode_person)
            .transpose()
    }

    fn find_person_by_username(&self, username: &str) -> RepoResult<Option<Person>> {
        self.conn
            .query_row(
                &format!("{PERSON_SELECT_SQL} WHERE username = ?1;"),
                [username.trim()],
                read_person_columns,
            )
            .optional()?
            .map(decode_person)
            .transpose()
    }

    fn create_organization(&self, organization: &Organization) -> RepoResult<OrganizationId> {
        organization.validate()?;
        self.conn.execute(
            "INSERT INTO organizations (uuid, name, admin_uuid, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4);",
            params![
                organization.uuid.to_string(),
                organization.name,
                organization.admin.to_string(),
                organization.created_at,
            ],
        )?;
        Ok(organization.uuid)
    }

    fn update_organization(&self, organization: &Organization) -> RepoResult<()> {
        organization.validate()?;
        let changed = self.conn.execute(
            "UPDATE organizations
             SET
                name = ?1,
                admin_uuid = ?2,
                updated_at = ?3
             WHERE uuid = ?4;",
            params![
                organization.name,
                organization.admin.to_string(),
                now_epoch_ms(),
                organization.uuid.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(organization.uuid));
        }
        Ok(())
    }

    fn get_organization(&self, id: OrganizationId) -> RepoResult<Option<Organization>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ORGANIZATION_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_organization_row(row)?));
        }
        Ok(None)
    }

    fn add_member(&self, organization: OrganizationId, person: PersonId) -> RepoResult<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO organization_members (organization_uuid, person_uuid)
             VALUES (?1, ?2);",
            params![organization.to_string(), person.to_string()],
        )?;
        Ok(inserted > 0)
    }

    fn remove_member(&self, organization: OrganizationId, person: PersonId) -> RepoResult<bool> {
        let removed = self.conn.execute(
            "DELETE FROM organization_members
             WHERE organization_uuid = ?1 AND person_uuid = ?2;",
            params![organization.to_string(), person.to_string()],
        )?;
        Ok(removed > 0)
    }

    fn list_members(&self, organization: OrganizationId) -> RepoResult<Vec<Person>> {
        let mut stmt = self.conn.prepare(
            "SELECT p.uuid, p.username, p.created_at
             FROM persons p
             INNER JOIN organization_members m ON m.person_uuid = p.uuid
             WHERE m.organization_uuid = ?1
             ORDER BY p.username ASC, p.uuid ASC;",
        )?;
        let rows = stmt.query_map([organization.to_string()], read_person_columns)?;
        let mut members = Vec::new();
        for row in rows {
            members.push(decode_person(row?)?);
        }
        Ok(members)
    }

    fn member_count(&self, organization: OrganizationId) -> RepoResult<u32> {
        let count: u32 = self.conn.query_row(
            "SELECT COUNT(*) FROM organization_members WHERE organization_uuid = ?1;",
            [organization.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn create_owner(&self, owner: &Owner) -> RepoResult<OwnerId> {
        self.conn.execute(
            "INSERT INTO owners (uuid, person_uuid, organization_uuid) VALUES (?1, ?2, ?3);",
            params![
                owner.uuid.to_string(),
                owner.person().map(|id| id.to_string()),
                owner.organization().map(|id| id.to_string()),
            ],
        )?;
        Ok(owner.uuid)
    }

    fn get_owner(&self, id: OwnerId) -> RepoResult<Option<Owner>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{OWNER_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_owner_row(row)?));
        }
        Ok(None)
    }

    fn find_owner_by_party(&self, party: &Party) -> RepoResult<Option<Owner>> {
        let (column, id) = match party {
            Party::Person(id) => ("person_uuid", id),
            Party::Organization(id) => ("organization_uuid", id),
        };
        let mut stmt = self
            .conn
            .prepare(&format!("{OWNER_SELECT_SQL} WHERE {column} = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_owner_row(row)?));
        }
        Ok(None)
    }
}

type PersonColumns = (String, String, i64);

fn read_person_columns(row: &Row<'_>) -> rusqlite::Result<PersonColumns> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn decode_person((uuid, username, created_at): PersonColumns) -> RepoResult<Person> {
    let person = Person {
        uuid: parse_uuid(&uuid, "persons.uuid")?,
        username,
        created_at,
    };
    person.validate()?;
    Ok(person)
}

fn parse_organization_row(row: &Row<'_>) -> RepoResult<Organization> {
    let uuid_text: String = row.get("uuid")?;
    let admin_text: String = row.get("admin_uuid")?;
    let organization = Organization {
        uuid: parse_uuid(&uuid_text, "organizations.uuid")?,
        name: row.get("name")?,
        admin: parse_uuid(&admin_text, "organizations.admin_uuid")?,
        created_at: row.get("created_at")?,
    };
    organization.validate()?;
    Ok(organization)
}

fn parse_owner_row(row: &Row<'_>) -> RepoResult<Owner> {
    let uuid_text: String = row.get("uuid")?;
    let uuid = parse_uuid(&uuid_text, "owners.uuid")?;
    let person = parse_optional_uuid(row.get("person_uuid")?, "owners.person_uuid")?;
    let organization =
        parse_optional_uuid(row.get("organization_uuid")?, "owners.organization_uuid")?;
    Ok(Owner::from_columns(uuid, person, organization)?)
}
