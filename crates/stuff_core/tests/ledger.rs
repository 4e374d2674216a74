use rusqlite::Connection;
use stuff_core::db::{open_db, open_db_in_memory};
use stuff_core::{
    Item, ItemId, ItemRepository, ItemType, LedgerError, LinkChange, LinkKind, LinkLedger,
    OwnerId, PartyService, SqliteItemRepository, SqliteLinkLedger, SqlitePartyRepository,
};

const CREATED_AT: i64 = 1_000;

fn owner(conn: &Connection, username: &str) -> OwnerId {
    let parties = PartyService::new(SqlitePartyRepository::try_new(conn).unwrap());
    let person = parties.create_person(username).unwrap();
    parties.create_owner_for_person(person.uuid).unwrap().uuid
}

fn item_owned_by(conn: &Connection, owner: OwnerId) -> ItemId {
    let repo = SqliteItemRepository::try_new(conn).unwrap();
    let mut item = Item::new(ItemType::Other, "Drill");
    item.created_at = CREATED_AT;
    item.updated_at = CREATED_AT;
    repo.create_item(&item, owner).unwrap()
}

#[test]
fn created_item_has_one_open_row_per_kind() {
    let conn = open_db_in_memory().unwrap();
    let alice = owner(&conn, "alice");
    let item = item_owned_by(&conn, alice);
    let ledger = SqliteLinkLedger::try_new(&conn).unwrap();

    for kind in [LinkKind::Ownership, LinkKind::Possession] {
        let current = ledger.get_current(item, kind).unwrap().unwrap();
        assert_eq!(current.counterparty, alice);
        assert_eq!(current.start_at, CREATED_AT);
        assert!(current.is_current());
        assert_eq!(ledger.history(item, kind).unwrap().len(), 1);
    }
}

#[test]
fn open_fails_while_current_row_exists() {
    let conn = open_db_in_memory().unwrap();
    let alice = owner(&conn, "alice");
    let bob = owner(&conn, "bob");
    let item = item_owned_by(&conn, alice);
    let ledger = SqliteLinkLedger::try_new(&conn).unwrap();

    let err = ledger
        .open(item, LinkKind::Possession, bob, CREATED_AT + 10)
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::CurrentExists { item_uuid, kind: LinkKind::Possession } if item_uuid == item
    ));

    ledger
        .close_current(item, LinkKind::Possession, CREATED_AT + 10)
        .unwrap();
    let opened = ledger
        .open(item, LinkKind::Possession, bob, CREATED_AT + 10)
        .unwrap();
    assert_eq!(opened.counterparty, bob);
    assert_eq!(ledger.history(item, LinkKind::Possession).unwrap().len(), 2);
}

#[test]
fn close_current_without_open_row_is_noop() {
    let conn = open_db_in_memory().unwrap();
    let alice = owner(&conn, "alice");
    let item = item_owned_by(&conn, alice);
    let ledger = SqliteLinkLedger::try_new(&conn).unwrap();

    let closed = ledger
        .close_current(item, LinkKind::Ownership, CREATED_AT + 5)
        .unwrap()
        .unwrap();
    assert_eq!(closed.end_at, Some(CREATED_AT + 5));

    assert!(ledger
        .close_current(item, LinkKind::Ownership, CREATED_AT + 6)
        .unwrap()
        .is_none());
    let history = ledger.history(item, LinkKind::Ownership).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].end_at, Some(CREATED_AT + 5));
}

#[test]
fn closing_before_start_is_rejected_and_nothing_changes() {
    let conn = open_db_in_memory().unwrap();
    let alice = owner(&conn, "alice");
    let item = item_owned_by(&conn, alice);
    let ledger = SqliteLinkLedger::try_new(&conn).unwrap();

    let err = ledger
        .close_current(item, LinkKind::Ownership, CREATED_AT - 1)
        .unwrap_err();
    match err {
        LedgerError::InvalidInterval {
            start_at, end_at, ..
        } => {
            assert_eq!(start_at, CREATED_AT);
            assert_eq!(end_at, CREATED_AT - 1);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(ledger
        .get_current(item, LinkKind::Ownership)
        .unwrap()
        .is_some());
}

#[test]
fn replace_current_reports_each_outcome() {
    let conn = open_db_in_memory().unwrap();
    let alice = owner(&conn, "alice");
    let bob = owner(&conn, "bob");
    let item = item_owned_by(&conn, alice);
    let ledger = SqliteLinkLedger::try_new(&conn).unwrap();

    let unchanged = ledger
        .replace_current(item, LinkKind::Possession, alice, CREATED_AT + 1)
        .unwrap();
    assert!(matches!(unchanged, LinkChange::Unchanged(_)));
    assert!(!unchanged.wrote_history());

    let replaced = ledger
        .replace_current(item, LinkKind::Possession, bob, CREATED_AT + 2)
        .unwrap();
    match &replaced {
        LinkChange::Replaced { closed, opened } => {
            assert_eq!(closed.counterparty, alice);
            assert_eq!(closed.end_at, Some(CREATED_AT + 2));
            assert_eq!(opened.counterparty, bob);
            assert_eq!(opened.start_at, CREATED_AT + 2);
        }
        other => panic!("unexpected change: {other:?}"),
    }
    assert_eq!(replaced.current().unwrap().counterparty, bob);

    ledger
        .close_current(item, LinkKind::Possession, CREATED_AT + 3)
        .unwrap();
    let opened = ledger
        .replace_current(item, LinkKind::Possession, alice, CREATED_AT + 4)
        .unwrap();
    assert!(matches!(opened, LinkChange::Opened(ref link) if link.counterparty == alice));

    let history = ledger.history(item, LinkKind::Possession).unwrap();
    let holders: Vec<OwnerId> = history.iter().map(|link| link.counterparty).collect();
    assert_eq!(holders, vec![alice, bob, alice]);
    assert_eq!(history.iter().filter(|link| link.is_current()).count(), 1);
}

#[test]
fn get_at_uses_half_open_intervals() {
    let conn = open_db_in_memory().unwrap();
    let alice = owner(&conn, "alice");
    let bob = owner(&conn, "bob");
    let item = item_owned_by(&conn, alice);
    let ledger = SqliteLinkLedger::try_new(&conn).unwrap();

    ledger
        .replace_current(item, LinkKind::Ownership, bob, 2_000)
        .unwrap();

    let at = |t: i64| {
        ledger
            .get_at(item, LinkKind::Ownership, t)
            .unwrap()
            .map(|link| {
                assert!(link.contains(t), "{link} does not contain {t}");
                link.counterparty
            })
    };
    assert_eq!(at(CREATED_AT - 1), None);
    assert_eq!(at(CREATED_AT), Some(alice));
    assert_eq!(at(1_999), Some(alice));
    assert_eq!(at(2_000), Some(bob));
    assert_eq!(at(i64::MAX), Some(bob));
}

#[test]
fn items_with_current_follows_open_rows_only() {
    let conn = open_db_in_memory().unwrap();
    let alice = owner(&conn, "alice");
    let bob = owner(&conn, "bob");
    let first = item_owned_by(&conn, alice);
    let second = item_owned_by(&conn, alice);
    let ledger = SqliteLinkLedger::try_new(&conn).unwrap();

    ledger
        .replace_current(second, LinkKind::Possession, bob, CREATED_AT + 1)
        .unwrap();

    let mut owned = ledger
        .items_with_current(LinkKind::Ownership, alice)
        .unwrap();
    owned.sort();
    let mut expected = vec![first, second];
    expected.sort();
    assert_eq!(owned, expected);
    assert_eq!(
        ledger
            .items_with_current(LinkKind::Possession, alice)
            .unwrap(),
        vec![first]
    );
    assert_eq!(
        ledger
            .items_with_current(LinkKind::Possession, bob)
            .unwrap(),
        vec![second]
    );
}

#[test]
fn multiple_open_rows_are_reported_as_integrity_error() {
    let conn = open_db_in_memory().unwrap();
    let alice = owner(&conn, "alice");
    let bob = owner(&conn, "bob");
    let item = item_owned_by(&conn, alice);

    conn.execute_batch("DROP INDEX idx_item_links_single_current;")
        .unwrap();
    conn.execute(
        "INSERT INTO item_links (uuid, item_uuid, kind, owner_uuid, start_at, end_at)
         VALUES ('corrupt', ?1, 'ownership', ?2, ?3, NULL);",
        rusqlite::params![item.to_string(), bob.to_string(), CREATED_AT + 1],
    )
    .unwrap();

    let ledger = SqliteLinkLedger::try_new(&conn).unwrap();
    let err = ledger.get_current(item, LinkKind::Ownership).unwrap_err();
    assert!(matches!(
        err,
        LedgerError::MultipleCurrent { count: 2, kind: LinkKind::Ownership, .. }
    ));

    let err = ledger
        .replace_current(item, LinkKind::Ownership, alice, CREATED_AT + 2)
        .unwrap_err();
    assert!(matches!(err, LedgerError::MultipleCurrent { .. }));
}

#[test]
fn concurrent_writers_keep_single_open_row() {
    const ROUNDS: usize = 20;
    const AT: i64 = 5_000;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stuff.sqlite3");
    let (item, alice, bob) = {
        let conn = open_db(&path).unwrap();
        let alice = owner(&conn, "alice");
        let bob = owner(&conn, "bob");
        (item_owned_by(&conn, alice), alice, bob)
    };

    let written: usize = std::thread::scope(|scope| {
        let workers: Vec<_> = [alice, bob, alice, bob]
            .into_iter()
            .map(|holder| {
                let path = path.clone();
                scope.spawn(move || {
                    let conn = open_db(&path).unwrap();
                    let ledger = SqliteLinkLedger::try_new(&conn).unwrap();
                    (0..ROUNDS)
                        .filter(|_| {
                            ledger
                                .replace_current(item, LinkKind::Possession, holder, AT)
                                .unwrap()
                                .wrote_history()
                        })
                        .count()
                })
            })
            .collect();
        workers.into_iter().map(|worker| worker.join().unwrap()).sum()
    });

    let conn = open_db(&path).unwrap();
    let ledger = SqliteLinkLedger::try_new(&conn).unwrap();
    let history = ledger.history(item, LinkKind::Possession).unwrap();
    assert_eq!(history.len(), 1 + written);
    assert_eq!(history.iter().filter(|link| link.is_current()).count(), 1);
    for pair in history.windows(2) {
        assert_ne!(pair[0].counterparty, pair[1].counterparty);
    }
}

#[test]
fn dispose_item_closes_both_kinds_in_one_step() {
    let conn = open_db_in_memory().unwrap();
    let alice = owner(&conn, "alice");
    let bob = owner(&conn, "bob");
    let item = item_owned_by(&conn, alice);
    let ledger = SqliteLinkLedger::try_new(&conn).unwrap();
    ledger
        .replace_current(item, LinkKind::Possession, bob, CREATED_AT + 1)
        .unwrap();

    assert!(ledger.dispose_item(item, CREATED_AT + 2).unwrap());
    for kind in [LinkKind::Ownership, LinkKind::Possession] {
        assert!(ledger.get_current(item, kind).unwrap().is_none());
        let history = ledger.history(item, kind).unwrap();
        assert_eq!(history.last().unwrap().end_at, Some(CREATED_AT + 2));
    }
    let disposed: i64 = conn
        .query_row(
            "SELECT is_disposed FROM items WHERE uuid = ?1;",
            [item.to_string()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(disposed, 1);

    assert!(!ledger.dispose_item(item, CREATED_AT + 3).unwrap());
    assert_eq!(
        ledger
            .history(item, LinkKind::Ownership)
            .unwrap()
            .last()
            .unwrap()
            .end_at,
        Some(CREATED_AT + 2)
    );
}

#[test]
fn failed_dispose_leaves_item_untouched() {
    let conn = open_db_in_memory().unwrap();
    let alice = owner(&conn, "alice");
    let item = item_owned_by(&conn, alice);
    let ledger = SqliteLinkLedger::try_new(&conn).unwrap();

    let err = ledger.dispose_item(item, CREATED_AT - 1).unwrap_err();
    assert!(matches!(err, LedgerError::InvalidInterval { .. }));
    for kind in [LinkKind::Ownership, LinkKind::Possession] {
        assert!(ledger.get_current(item, kind).unwrap().is_some());
    }
    assert!(ledger.dispose_item(item, CREATED_AT + 1).unwrap());
}

#[test]
fn disposed_item_rejects_new_links() {
    let conn = open_db_in_memory().unwrap();
    let alice = owner(&conn, "alice");
    let bob = owner(&conn, "bob");
    let item = item_owned_by(&conn, alice);
    let ledger = SqliteLinkLedger::try_new(&conn).unwrap();
    ledger.dispose_item(item, CREATED_AT + 1).unwrap();

    assert!(matches!(
        ledger
            .replace_current(item, LinkKind::Possession, bob, CREATED_AT + 2)
            .unwrap_err(),
        LedgerError::ItemDisposed(id) if id == item
    ));
    assert!(matches!(
        ledger
            .open(item, LinkKind::Ownership, alice, CREATED_AT + 2)
            .unwrap_err(),
        LedgerError::ItemDisposed(_)
    ));
    assert!(matches!(
        ledger
            .replace_current(uuid::Uuid::new_v4(), LinkKind::Possession, bob, CREATED_AT + 2)
            .unwrap_err(),
        LedgerError::Repo(stuff_core::RepoError::NotFound(_))
    ));
    assert!(ledger
        .items_with_current(LinkKind::Possession, alice)
        .unwrap()
        .is_empty());
}

#[test]
fn ledger_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();
    assert!(SqliteLinkLedger::try_new(&conn).is_err());
}
