//! Temporal link ledger: append-only ownership and possession history.
//!
//! # Responsibility
//! - Keep, per item and `LinkKind`, a sequence of non-overlapping intervals.
//! - Run every read-modify-write on the current interval inside one
//!   IMMEDIATE transaction scoped to the (item, kind) pair.
//!
//! # Invariants
//! - At most one row per (item, kind) has `end_at IS NULL`. A second open
//!   row is a data-integrity error (`LedgerError::MultipleCurrent`), logged
//!   and surfaced, never resolved silently.
//! - Rows are never deleted. Closing sets `end_at` once.
//! - `end_at >= start_at` for every closed row.
//! - Disposed items never gain an open row. The disposed flag is read inside
//!   the same transaction that would open one.

use super::{ensure_connection_ready, int_to_bool, parse_uuid, RepoError, RepoResult};
use crate::model::item::ItemId;
use crate::model::link::{LinkKind, TemporalLink};
use crate::model::owner::OwnerId;
use crate::model::EpochMs;
use log::{debug, error, info};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const LINK_SELECT_SQL: &str = "SELECT
    uuid,
    item_uuid,
    kind,
    owner_uuid,
    start_at,
    end_at
FROM item_links";

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug)]
pub enum LedgerError {
    Repo(RepoError),
    /// More than one open row for one (item, kind).
    MultipleCurrent {
        item_uuid: ItemId,
        kind: LinkKind,
        count: usize,
    },
    /// `open` was called while a current row still exists.
    CurrentExists { item_uuid: ItemId, kind: LinkKind },
    /// The item was disposed; no link may be opened on it.
    ItemDisposed(ItemId),
    /// Closing time lies before the interval start.
    InvalidInterval {
        link_uuid: Uuid,
        start_at: EpochMs,
        end_at: EpochMs,
    },
}

impl Display for LedgerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::MultipleCurrent {
                item_uuid,
                kind,
                count,
            } => write!(
                f,
                "data integrity violation: {count} current {kind} links for item {item_uuid}"
            ),
            Self::CurrentExists { item_uuid, kind } => write!(
                f,
                "item {item_uuid} already has a current {kind} link; close it first"
            ),
            Self::ItemDisposed(item_uuid) => write!(f, "item {item_uuid} is disposed"),
            Self::InvalidInterval {
                link_uuid,
                start_at,
                end_at,
            } => write!(
                f,
                "link {link_uuid} cannot end at {end_at} before its start {start_at}"
            ),
        }
    }
}

impl Error for LedgerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for LedgerError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<rusqlite::Error> for LedgerError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(value.into())
    }
}

/// Outcome of a counterparty assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkChange {
    /// The counterparty already matched; nothing was written.
    Unchanged(TemporalLink),
    /// No current row existed; a new one was opened.
    Opened(TemporalLink),
    /// The current row was closed and a new one opened.
    Replaced {
        closed: TemporalLink,
        opened: TemporalLink,
    },
    /// The current row was closed without replacement.
    Closed(TemporalLink),
    /// There was no current row and nothing to open.
    Empty,
}

impl LinkChange {
    /// Current link after the change, if any.
    pub fn current(&self) -> Option<&TemporalLink> {
        match self {
            Self::Unchanged(link) | Self::Opened(link) => Some(link),
            Self::Replaced { opened, .. } => Some(opened),
            Self::Closed(_) | Self::Empty => None,
        }
    }

    pub fn wrote_history(&self) -> bool {
        !matches!(self, Self::Unchanged(_) | Self::Empty)
    }
}

/// Interval-tracking store for item links, parameterized by `LinkKind`.
pub trait LinkLedger {
    /// Returns the unique open row, or `None`.
    fn get_current(&self, item: ItemId, kind: LinkKind) -> LedgerResult<Option<TemporalLink>>;
    /// Closes the open row at `at`; returns the closed row, `None` when absent.
    fn close_current(
        &self,
        item: ItemId,
        kind: LinkKind,
        at: EpochMs,
    ) -> LedgerResult<Option<TemporalLink>>;
    /// Opens a new row. Fails when a current row still exists.
    fn open(
        &self,
        item: ItemId,
        kind: LinkKind,
        counterparty: OwnerId,
        at: EpochMs,
    ) -> LedgerResult<TemporalLink>;
    /// Atomically points the (item, kind) pair at `counterparty`.
    fn replace_current(
        &self,
        item: ItemId,
        kind: LinkKind,
        counterparty: OwnerId,
        at: EpochMs,
    ) -> LedgerResult<LinkChange>;
    /// All rows for the pair, oldest first.
    fn history(&self, item: ItemId, kind: LinkKind) -> LedgerResult<Vec<TemporalLink>>;
    /// Row whose `[start_at, end_at)` contains `at`.
    fn get_at(
        &self,
        item: ItemId,
        kind: LinkKind,
        at: EpochMs,
    ) -> LedgerResult<Option<TemporalLink>>;
    /// Closes every open row of the item and flags it disposed, in one
    /// transaction. Returns `false` when the item already was disposed.
    fn dispose_item(&self, item: ItemId, at: EpochMs) -> LedgerResult<bool>;
    /// Items whose current row of `kind` points at `counterparty`.
    fn items_with_current(
        &self,
        kind: LinkKind,
        counterparty: OwnerId,
    ) -> LedgerResult<Vec<ItemId>>;
}

/// SQLite-backed link ledger over the `item_links` table.
pub struct SqliteLinkLedger<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLinkLedger<'conn> {
    /// Creates ledger from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["items", "owners", "item_links"])?;
        Ok(Self { conn })
    }

    fn begin(&self) -> LedgerResult<Transaction<'conn>> {
        Ok(Transaction::new_unchecked(
            self.conn,
            TransactionBehavior::Immediate,
        )?)
    }
}

impl LinkLedger for SqliteLinkLedger<'_> {
    fn get_current(&self, item: ItemId, kind: LinkKind) -> LedgerResult<Option<TemporalLink>> {
        load_current(self.conn, item, kind)
    }

    fn close_current(
        &self,
        item: ItemId,
        kind: LinkKind,
        at: EpochMs,
    ) -> LedgerResult<Option<TemporalLink>> {
        let tx = self.begin()?;
        let Some(current) = load_current(&tx, item, kind)? else {
            return Ok(None);
        };
        let closed = close_link(&tx, current, at)?;
        tx.commit()?;
        info!(
            "event=link_close module=ledger status=ok item={item} kind={kind} counterparty={}",
            closed.counterparty
        );
        Ok(Some(closed))
    }

    fn open(
        &self,
        item: ItemId,
        kind: LinkKind,
        counterparty: OwnerId,
        at: EpochMs,
    ) -> LedgerResult<TemporalLink> {
        let tx = self.begin()?;
        ensure_item_active(&tx, item)?;
        if load_current(&tx, item, kind)?.is_some() {
            return Err(LedgerError::CurrentExists {
                item_uuid: item,
                kind,
            });
        }
        let opened = insert_open_link(&tx, item, kind, counterparty, at)?;
        tx.commit()?;
        info!(
            "event=link_open module=ledger status=ok item={item} kind={kind} counterparty={counterparty}"
        );
        Ok(opened)
    }

    fn replace_current(
        &self,
        item: ItemId,
        kind: LinkKind,
        counterparty: OwnerId,
        at: EpochMs,
    ) -> LedgerResult<LinkChange> {
        let tx = self.begin()?;
        ensure_item_active(&tx, item)?;
        let change = match load_current(&tx, item, kind)? {
            Some(current) if current.counterparty == counterparty => {
                debug!(
                    "event=link_replace module=ledger status=unchanged item={item} kind={kind} counterparty={counterparty}"
                );
                return Ok(LinkChange::Unchanged(current));
            }
            Some(current) => {
                let closed = close_link(&tx, current, at)?;
                let opened = insert_open_link(&tx, item, kind, counterparty, at)?;
                LinkChange::Replaced { closed, opened }
            }
            None => LinkChange::Opened(insert_open_link(&tx, item, kind, counterparty, at)?),
        };
        tx.commit()?;
        info!(
            "event=link_replace module=ledger status=ok item={item} kind={kind} counterparty={counterparty}"
        );
        Ok(change)
    }

    fn history(&self, item: ItemId, kind: LinkKind) -> LedgerResult<Vec<TemporalLink>> {
        let mut stmt = self.conn.prepare(&format!(
            "{LINK_SELECT_SQL}
             WHERE item_uuid = ?1 AND kind = ?2
             ORDER BY start_at ASC, rowid ASC;"
        ))?;
        let mut rows = stmt.query(params![item.to_string(), kind.as_str()])?;
        let mut links = Vec::new();
        while let Some(row) = rows.next()? {
            links.push(parse_link_row(row)?);
        }
        Ok(links)
    }

    fn get_at(
        &self,
        item: ItemId,
        kind: LinkKind,
        at: EpochMs,
    ) -> LedgerResult<Option<TemporalLink>> {
        let mut stmt = self.conn.prepare(&format!(
            "{LINK_SELECT_SQL}
             WHERE item_uuid = ?1
               AND kind = ?2
               AND start_at <= ?3
               AND (end_at IS NULL OR end_at > ?3)
             ORDER BY start_at DESC, rowid DESC
             LIMIT 1;"
        ))?;
        let mut rows = stmt.query(params![item.to_string(), kind.as_str(), at])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_link_row(row)?));
        }
        Ok(None)
    }

    fn dispose_item(&self, item: ItemId, at: EpochMs) -> LedgerResult<bool> {
        let tx = self.begin()?;
        if load_disposed(&tx, item)? {
            return Ok(false);
        }
        for kind in [LinkKind::Possession, LinkKind::Ownership] {
            if let Some(current) = load_current(&tx, item, kind)? {
                close_link(&tx, current, at)?;
            }
        }
        tx.execute(
            "UPDATE items
             SET
                is_disposed = 1,
                updated_at = ?1
             WHERE uuid = ?2;",
            params![at, item.to_string()],
        )?;
        tx.commit()?;
        info!("event=item_dispose module=ledger status=ok item={item}");
        Ok(true)
    }

    fn items_with_current(
        &self,
        kind: LinkKind,
        counterparty: OwnerId,
    ) -> LedgerResult<Vec<ItemId>> {
        let mut stmt = self.conn.prepare(
            "SELECT item_uuid
             FROM item_links
             WHERE kind = ?1
               AND owner_uuid = ?2
               AND end_at IS NULL
             ORDER BY start_at ASC, item_uuid ASC;",
        )?;
        let mut rows = stmt.query(params![kind.as_str(), counterparty.to_string()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            let text: String = row.get(0)?;
            items.push(parse_uuid(&text, "item_links.item_uuid")?);
        }
        Ok(items)
    }
}

/// Inserts a new open link. Callers hold the transaction and have already
/// checked that no current row exists.
pub(crate) fn insert_open_link(
    conn: &Connection,
    item: ItemId,
    kind: LinkKind,
    counterparty: OwnerId,
    at: EpochMs,
) -> RepoResult<TemporalLink> {
    let link = TemporalLink::open(item, kind, counterparty, at);
    conn.execute(
        "INSERT INTO item_links (uuid, item_uuid, kind, owner_uuid, start_at, end_at)
         VALUES (?1, ?2, ?3, ?4, ?5, NULL);",
        params![
            link.uuid.to_string(),
            item.to_string(),
            kind.as_str(),
            counterparty.to_string(),
            link.start_at,
        ],
    )?;
    Ok(link)
}

fn load_disposed(conn: &Connection, item: ItemId) -> LedgerResult<bool> {
    let flag: Option<i64> = conn
        .query_row(
            "SELECT is_disposed FROM items WHERE uuid = ?1;",
            [item.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    match flag {
        Some(flag) => Ok(int_to_bool(flag, "items.is_disposed")?),
        None => Err(RepoError::NotFound(item).into()),
    }
}

fn ensure_item_active(conn: &Connection, item: ItemId) -> LedgerResult<()> {
    if load_disposed(conn, item)? {
        return Err(LedgerError::ItemDisposed(item));
    }
    Ok(())
}

fn load_current(
    conn: &Connection,
    item: ItemId,
    kind: LinkKind,
) -> LedgerResult<Option<TemporalLink>> {
    let mut stmt = conn.prepare(&format!(
        "{LINK_SELECT_SQL}
         WHERE item_uuid = ?1 AND kind = ?2 AND end_at IS NULL
         ORDER BY start_at ASC, rowid ASC;"
    ))?;
    let mut rows = stmt.query(params![item.to_string(), kind.as_str()])?;
    let mut current = Vec::new();
    while let Some(row) = rows.next()? {
        current.push(parse_link_row(row)?);
    }

    if current.len() > 1 {
        error!(
            "event=ledger_integrity module=ledger status=error error_code=multiple_current item={item} kind={kind} count={}",
            current.len()
        );
        return Err(LedgerError::MultipleCurrent {
            item_uuid: item,
            kind,
            count: current.len(),
        });
    }
    Ok(current.pop())
}

fn close_link(
    conn: &Connection,
    mut link: TemporalLink,
    at: EpochMs,
) -> LedgerResult<TemporalLink> {
    if at < link.start_at {
        return Err(LedgerError::InvalidInterval {
            link_uuid: link.uuid,
            start_at: link.start_at,
            end_at: at,
        });
    }
    conn.execute(
        "UPDATE item_links SET end_at = ?1 WHERE uuid = ?2 AND end_at IS NULL;",
        params![at, link.uuid.to_string()],
    )?;
    link.end_at = Some(at);
    Ok(link)
}

fn parse_link_row(row: &Row<'_>) -> RepoResult<TemporalLink> {
    let uuid_text: String = row.get("uuid")?;
    let item_text: String = row.get("item_uuid")?;
    let owner_text: String = row.get("owner_uuid")?;
    let kind_text: String = row.get("kind")?;
    let kind = LinkKind::parse(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid link kind `{kind_text}` in item_links.kind"))
    })?;

    Ok(TemporalLink {
        uuid: parse_uuid(&uuid_text, "item_links.uuid")?,
        item_uuid: parse_uuid(&item_text, "item_links.item_uuid")?,
        kind,
        counterparty: parse_uuid(&owner_text, "item_links.owner_uuid")?,
        start_at: row.get("start_at")?,
        end_at: row.get("end_at")?,
    })
}
