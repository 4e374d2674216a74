//! CLI entry point.
//!
//! # Responsibility
//! - Print core linkage info (`stuff_cli`).
//! - Run a lend/return/dispose walkthrough against a database
//!   (`stuff_cli demo [db_path]`).

use log::info;
use rusqlite::Connection;
use std::error::Error;
use std::path::PathBuf;
use stuff_core::{
    CoreConfig, Item, ItemService, ItemType, OwnerId, OwnerService, PartyService,
    SqliteItemRepository, SqliteLinkLedger, SqlitePartyRepository,
};

fn main() -> Result<(), Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        None => {
            println!("stuff_core ping={}", stuff_core::ping());
            println!("stuff_core version={}", stuff_core::core_version());
            Ok(())
        }
        Some("demo") => {
            let mut config = CoreConfig::from_env();
            if let Some(path) = args.next() {
                config.db_path = Some(PathBuf::from(path));
            }
            config.init_logging()?;
            let conn = config.open_database()?;
            run_demo(&conn)
        }
        Some(other) => Err(format!("unknown command `{other}`; expected `demo [db_path]`").into()),
    }
}

fn run_demo(conn: &Connection) -> Result<(), Box<dyn Error>> {
    let parties = PartyService::new(SqlitePartyRepository::try_new(conn)?);
    let items = ItemService::new(
        SqliteItemRepository::try_new(conn)?,
        SqliteLinkLedger::try_new(conn)?,
        SqlitePartyRepository::try_new(conn)?,
    );
    let views = OwnerService::new(
        SqliteItemRepository::try_new(conn)?,
        SqliteLinkLedger::try_new(conn)?,
        SqlitePartyRepository::try_new(conn)?,
    );

    let alice = owner_for(&parties, "alice")?;
    let bob = owner_for(&parties, "bob")?;

    let drill = items.create_item(
        &Item::new(ItemType::Other, "Drill").with_description("Cordless, two batteries"),
        alice,
    )?;
    info!("event=demo module=cli status=ok step=create item={}", drill.uuid);
    println!("created {} owned by {}", drill.name, parties.display_name(alice)?);

    items.set_holder(drill.uuid, bob)?;
    println!(
        "lent to {}: alice lent={} bob borrowed={}",
        parties.display_name(bob)?,
        views.lent_items(alice)?.len(),
        views.borrowed_items(bob)?.len()
    );

    items.return_to_owner(drill.uuid)?;
    println!(
        "returned: alice lent={} bob borrowed={}",
        views.lent_items(alice)?.len(),
        views.borrowed_items(bob)?.len()
    );

    let disposed = items.dispose(drill.uuid)?;
    println!(
        "disposed={} owner={:?} holder={:?}",
        disposed.is_disposed,
        items.owner(drill.uuid)?,
        items.holder(drill.uuid)?
    );

    for link in items
        .ownership_history(drill.uuid)?
        .into_iter()
        .chain(items.possession_history(drill.uuid)?)
    {
        println!("  {link}");
    }
    Ok(())
}

fn owner_for(
    parties: &PartyService<SqlitePartyRepository<'_>>,
    username: &str,
) -> Result<OwnerId, Box<dyn Error>> {
    let person = match parties.find_person(username)? {
        Some(person) => person,
        None => parties.create_person(username)?,
    };
    let owner = match parties.owner_for_party(&stuff_core::Party::Person(person.uuid))? {
        Some(owner) => owner,
        None => parties.create_owner_for_person(person.uuid)?,
    };
    Ok(owner.uuid)
}
