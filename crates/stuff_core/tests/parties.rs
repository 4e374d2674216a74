use stuff_core::db::open_db_in_memory;
use stuff_core::{
    now_epoch_ms, Owner, OwnerValidationError, Party, PartyRepository, PartyService,
    PartyServiceError, PersonValidationError, RepoError, SqlitePartyRepository, ValidationError,
};
use uuid::Uuid;

#[test]
fn usernames_are_unique_and_validated() {
    let conn = open_db_in_memory().unwrap();
    let parties = PartyService::new(SqlitePartyRepository::try_new(&conn).unwrap());

    let alice = parties.create_person("  alice  ").unwrap();
    assert_eq!(alice.username, "alice");
    assert_eq!(parties.find_person("alice").unwrap(), Some(alice.clone()));
    assert_eq!(parties.get_person(alice.uuid).unwrap(), alice);

    assert!(matches!(
        parties.create_person("alice").unwrap_err(),
        PartyServiceError::UsernameTaken(name) if name == "alice"
    ));
    assert!(matches!(
        parties.create_person("not allowed").unwrap_err(),
        PartyServiceError::InvalidPerson(PersonValidationError::InvalidUsername(_))
    ));
    assert!(parties.find_person("nobody").unwrap().is_none());
}

#[test]
fn organization_admin_is_not_a_member() {
    let conn = open_db_in_memory().unwrap();
    let parties = PartyService::new(SqlitePartyRepository::try_new(&conn).unwrap());
    let alice = parties.create_person("alice").unwrap();
    let bob = parties.create_person("bob").unwrap();
    let carol = parties.create_person("carol").unwrap();

    let club = parties.create_organization(" Tool Club ", alice.uuid).unwrap();
    assert_eq!(club.name, "Tool Club");
    assert_eq!(club.admin, alice.uuid);
    assert_eq!(parties.member_count(club.uuid).unwrap(), 0);

    assert!(parties.add_member(club.uuid, carol.uuid).unwrap());
    assert!(parties.add_member(club.uuid, bob.uuid).unwrap());
    assert!(!parties.add_member(club.uuid, bob.uuid).unwrap());
    assert_eq!(parties.member_count(club.uuid).unwrap(), 2);

    let names: Vec<String> = parties
        .members(club.uuid)
        .unwrap()
        .into_iter()
        .map(|person| person.username)
        .collect();
    assert_eq!(names, vec!["bob".to_string(), "carol".to_string()]);

    assert!(parties.remove_member(club.uuid, bob.uuid).unwrap());
    assert!(!parties.remove_member(club.uuid, bob.uuid).unwrap());
    assert_eq!(parties.member_count(club.uuid).unwrap(), 1);
}

#[test]
fn organization_rename_and_admin_change_persist() {
    let conn = open_db_in_memory().unwrap();
    let parties = PartyService::new(SqlitePartyRepository::try_new(&conn).unwrap());
    let alice = parties.create_person("alice").unwrap();
    let bob = parties.create_person("bob").unwrap();
    let club = parties.create_organization("Club", alice.uuid).unwrap();

    parties.rename_organization(club.uuid, "Garden Club").unwrap();
    parties.set_admin(club.uuid, bob.uuid).unwrap();

    let loaded = parties.get_organization(club.uuid).unwrap();
    assert_eq!(loaded.name, "Garden Club");
    assert_eq!(loaded.admin, bob.uuid);

    assert!(matches!(
        parties.rename_organization(club.uuid, "  ").unwrap_err(),
        PartyServiceError::InvalidOrganization(_)
    ));
    assert!(matches!(
        parties.set_admin(club.uuid, Uuid::new_v4()).unwrap_err(),
        PartyServiceError::PersonNotFound(_)
    ));
    assert!(matches!(
        parties
            .create_organization("Ghost club", Uuid::new_v4())
            .unwrap_err(),
        PartyServiceError::PersonNotFound(_)
    ));
}

#[test]
fn organization_update_stamps_millisecond_time() {
    let conn = open_db_in_memory().unwrap();
    let parties = PartyService::new(SqlitePartyRepository::try_new(&conn).unwrap());
    let alice = parties.create_person("alice").unwrap();
    let club = parties.create_organization("Club", alice.uuid).unwrap();

    let before = now_epoch_ms();
    parties.rename_organization(club.uuid, "Book Club").unwrap();
    let after = now_epoch_ms();

    let updated_at: i64 = conn
        .query_row(
            "SELECT updated_at FROM organizations WHERE uuid = ?1;",
            [club.uuid.to_string()],
            |row| row.get(0),
        )
        .unwrap();
    assert!((before..=after).contains(&updated_at));
}

#[test]
fn owner_wraps_exactly_one_party() {
    let conn = open_db_in_memory().unwrap();
    let parties = PartyService::new(SqlitePartyRepository::try_new(&conn).unwrap());
    let alice = parties.create_person("alice").unwrap();
    let club = parties.create_organization("Club", alice.uuid).unwrap();

    let person_owner = parties.create_owner_for_person(alice.uuid).unwrap();
    assert!(person_owner.is_user());
    assert!(!person_owner.is_organization());
    assert_eq!(person_owner.person(), Some(alice.uuid));

    let club_owner = parties.create_owner_for_organization(club.uuid).unwrap();
    assert!(club_owner.is_organization());
    assert_eq!(club_owner.organization(), Some(club.uuid));

    assert_eq!(parties.get_owner(person_owner.uuid).unwrap(), person_owner);
    assert_eq!(
        parties
            .owner_for_party(&Party::Organization(club.uuid))
            .unwrap(),
        Some(club_owner)
    );
    assert_eq!(parties.display_name(person_owner.uuid).unwrap(), "alice");
    assert_eq!(parties.display_name(club_owner.uuid).unwrap(), "Club");
}

#[test]
fn second_owner_for_same_party_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let parties = PartyService::new(SqlitePartyRepository::try_new(&conn).unwrap());
    let alice = parties.create_person("alice").unwrap();
    let first = parties.create_owner_for_person(alice.uuid).unwrap();

    match parties.create_owner_for_person(alice.uuid).unwrap_err() {
        PartyServiceError::OwnerAlreadyExists { party, owner_uuid } => {
            assert_eq!(party, Party::Person(alice.uuid));
            assert_eq!(owner_uuid, first.uuid);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(matches!(
        parties.create_owner_for_person(Uuid::new_v4()).unwrap_err(),
        PartyServiceError::PersonNotFound(_)
    ));
}

#[test]
fn owner_rows_breaking_exclusivity_fail_to_decode() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePartyRepository::try_new(&conn).unwrap();
    conn.execute_batch(
        "PRAGMA ignore_check_constraints = ON;
         INSERT INTO persons (uuid, username, created_at)
         VALUES ('11111111-1111-4111-8111-111111111111', 'alice', 0);
         INSERT INTO organizations (uuid, name, admin_uuid, created_at, updated_at)
         VALUES ('22222222-2222-4222-8222-222222222222', 'Club',
                 '11111111-1111-4111-8111-111111111111', 0, 0);
         INSERT INTO owners (uuid, person_uuid, organization_uuid, created_at)
         VALUES ('33333333-3333-4333-8333-333333333333',
                 '11111111-1111-4111-8111-111111111111',
                 '22222222-2222-4222-8222-222222222222', 0);
         INSERT INTO owners (uuid, person_uuid, organization_uuid, created_at)
         VALUES ('44444444-4444-4444-8444-444444444444', NULL, NULL, 0);
         PRAGMA ignore_check_constraints = OFF;",
    )
    .unwrap();

    let both = Uuid::parse_str("33333333-3333-4333-8333-333333333333").unwrap();
    assert!(matches!(
        repo.get_owner(both).unwrap_err(),
        RepoError::Validation(ValidationError::Owner(OwnerValidationError::BothParties))
    ));
    let neither = Uuid::parse_str("44444444-4444-4444-8444-444444444444").unwrap();
    assert!(matches!(
        repo.get_owner(neither).unwrap_err(),
        RepoError::Validation(ValidationError::Owner(OwnerValidationError::NoParty))
    ));
}

#[test]
fn owner_from_columns_enforces_exclusivity() {
    let id = Uuid::new_v4();
    let person = Uuid::new_v4();
    let organization = Uuid::new_v4();

    assert_eq!(
        Owner::from_columns(id, Some(person), None).unwrap().party,
        Party::Person(person)
    );
    assert_eq!(
        Owner::from_columns(id, Some(person), Some(organization)).unwrap_err(),
        OwnerValidationError::BothParties
    );
    assert_eq!(
        Owner::from_columns(id, None, None).unwrap_err(),
        OwnerValidationError::NoParty
    );
}

#[test]
fn party_serializes_as_tagged_object() {
    let id = Uuid::parse_str("11111111-1111-4111-8111-111111111111").unwrap();
    let json = serde_json::to_value(Party::Organization(id)).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "kind": "organization",
            "id": "11111111-1111-4111-8111-111111111111"
        })
    );
}
