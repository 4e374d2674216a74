//! Item repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD APIs over the `items` table.
//! - Create an item together with its initial ownership and possession
//!   links in one transaction.
//!
//! # Invariants
//! - Write paths call `Item::validate()` before SQL mutations.
//! - `update_item` never touches `is_disposed`; disposal goes through
//!   `LinkLedger::dispose_item` only.

use super::ledger_repo::insert_open_link;
use super::{
    bool_to_int, ensure_connection_ready, int_to_bool, parse_uuid, RepoError, RepoResult,
};
use crate::model::item::{ImageRef, Item, ItemId, ItemType};
use crate::model::link::LinkKind;
use crate::model::owner::OwnerId;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};

const ITEM_SELECT_SQL: &str = "SELECT
    uuid,
    type,
    name,
    description,
    image_ref,
    value_cents,
    is_disposed,
    created_at,
    updated_at
FROM items";

/// Query options for listing items.
#[derive(Debug, Clone, Default)]
pub struct ItemListQuery {
    pub kind: Option<ItemType>,
    pub include_disposed: bool,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for item records.
pub trait ItemRepository {
    /// Inserts the item plus open ownership and possession links for `owner`.
    fn create_item(&self, item: &Item, owner: OwnerId) -> RepoResult<ItemId>;
    /// Updates descriptive fields; `NotFound` when the row is missing.
    fn update_item(&self, item: &Item) -> RepoResult<()>;
    fn get_item(&self, id: ItemId) -> RepoResult<Option<Item>>;
    fn list_items(&self, query: &ItemListQuery) -> RepoResult<Vec<Item>>;
}

/// SQLite-backed item repository.
pub struct SqliteItemRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteItemRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["items", "item_links"])?;
        Ok(Self { conn })
    }
}

impl ItemRepository for SqliteItemRepository<'_> {
    fn create_item(&self, item: &Item, owner: OwnerId) -> RepoResult<ItemId> {
        item.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO items (
                uuid,
                type,
                name,
                description,
                image_ref,
                value_cents,
                is_disposed,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                item.uuid.to_string(),
                item.kind.as_str(),
                item.name.as_str(),
                item.description.as_str(),
                item.image.as_ref().map(ImageRef::as_str),
                item.value_cents,
                bool_to_int(item.is_disposed),
                item.created_at,
                item.updated_at,
            ],
        )?;
        for kind in [LinkKind::Ownership, LinkKind::Possession] {
            insert_open_link(&tx, item.uuid, kind, owner, item.created_at)?;
        }
        tx.commit()?;

        Ok(item.uuid)
    }

    fn update_item(&self, item: &Item) -> RepoResult<()> {
        item.validate()?;

        let changed = self.conn.execute(
            "UPDATE items
             SET
                type = ?1,
                name = ?2,
                description = ?3,
                image_ref = ?4,
                value_cents = ?5,
                updated_at = ?6
             WHERE uuid = ?7;",
            params![
                item.kind.as_str(),
                item.name.as_str(),
                item.description.as_str(),
                item.image.as_ref().map(ImageRef::as_str),
                item.value_cents,
                item.updated_at,
                item.uuid.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(item.uuid));
        }
        Ok(())
    }

    fn get_item(&self, id: ItemId) -> RepoResult<Option<Item>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ITEM_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_item_row(row)?));
        }
        Ok(None)
    }

    fn list_items(&self, query: &ItemListQuery) -> RepoResult<Vec<Item>> {
        let mut sql = format!("{ITEM_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if !query.include_disposed {
            sql.push_str(" AND is_disposed = 0");
        }
        if let Some(kind) = query.kind {
            sql.push_str(" AND type = ?");
            bind_values.push(Value::Text(kind.as_str().to_string()));
        }

        sql.push_str(" ORDER BY name COLLATE NOCASE ASC, uuid ASC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_item_row(row)?);
        }
        Ok(items)
    }
}

fn parse_item_row(row: &Row<'_>) -> RepoResult<Item> {
    let uuid_text: String = row.get("uuid")?;
    let type_text: String = row.get("type")?;
    let kind = type_text.parse::<ItemType>()?;

    let item = Item {
        uuid: parse_uuid(&uuid_text, "items.uuid")?,
        kind,
        name: row.get("name")?,
        description: row.get("description")?,
        image: row.get::<_, Option<String>>("image_ref")?.map(ImageRef::new),
        value_cents: row.get("value_cents")?,
        is_disposed: int_to_bool(row.get("is_disposed")?, "items.is_disposed")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    item.validate()?;
    Ok(item)
}
