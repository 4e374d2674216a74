//! Owner item views derived from the link ledger.
//!
//! # Invariants
//! - Views are recomputed from current ledger rows on every call.
//! - `borrowed = held - owned` and `lent = owned - held`, keeping the order
//!   of the left-hand view.

use crate::model::item::{Item, ItemId};
use crate::model::link::LinkKind;
use crate::model::owner::OwnerId;
use crate::repo::item_repo::ItemRepository;
use crate::repo::ledger_repo::{LedgerError, LinkLedger};
use crate::repo::party_repo::PartyRepository;
use crate::repo::RepoError;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum OwnerServiceError {
    OwnerNotFound(OwnerId),
    Ledger(LedgerError),
    Repo(RepoError),
}

impl Display for OwnerServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OwnerNotFound(id) => write!(f, "owner not found: {id}"),
            Self::Ledger(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for OwnerServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::OwnerNotFound(_) => None,
            Self::Ledger(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for OwnerServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<LedgerError> for OwnerServiceError {
    fn from(value: LedgerError) -> Self {
        Self::Ledger(value)
    }
}

pub type OwnerServiceResult<T> = Result<T, OwnerServiceError>;

/// Read-only owner views: owned, held, borrowed and lent items.
pub struct OwnerService<I: ItemRepository, L: LinkLedger, P: PartyRepository> {
    items: I,
    ledger: L,
    parties: P,
}

impl<I: ItemRepository, L: LinkLedger, P: PartyRepository> OwnerService<I, L, P> {
    pub fn new(items: I, ledger: L, parties: P) -> Self {
        Self {
            items,
            ledger,
            parties,
        }
    }

    /// Items whose current owner is `owner`.
    pub fn owned_items(&self, owner: OwnerId) -> OwnerServiceResult<Vec<Item>> {
        let owned = self.current_ids(owner, LinkKind::Ownership)?;
        self.load(owned)
    }

    /// Items currently held by `owner`.
    pub fn held_items(&self, owner: OwnerId) -> OwnerServiceResult<Vec<Item>> {
        let held = self.current_ids(owner, LinkKind::Possession)?;
        self.load(held)
    }

    /// Items held by `owner` but owned by someone else (or nobody).
    pub fn borrowed_items(&self, owner: OwnerId) -> OwnerServiceResult<Vec<Item>> {
        let held = self.current_ids(owner, LinkKind::Possession)?;
        let owned = self.current_ids(owner, LinkKind::Ownership)?;
        self.load(difference(held, &owned))
    }

    /// Items owned by `owner` but held by someone else (or nobody).
    pub fn lent_items(&self, owner: OwnerId) -> OwnerServiceResult<Vec<Item>> {
        let owned = self.current_ids(owner, LinkKind::Ownership)?;
        let held = self.current_ids(owner, LinkKind::Possession)?;
        self.load(difference(owned, &held))
    }

    fn current_ids(&self, owner: OwnerId, kind: LinkKind) -> OwnerServiceResult<Vec<ItemId>> {
        if self.parties.get_owner(owner)?.is_none() {
            return Err(OwnerServiceError::OwnerNotFound(owner));
        }
        Ok(self.ledger.items_with_current(kind, owner)?)
    }

    fn load(&self, ids: Vec<ItemId>) -> OwnerServiceResult<Vec<Item>> {
        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            let item = self.items.get_item(id)?.ok_or_else(|| {
                RepoError::InvalidData(format!("item_links references missing item {id}"))
            })?;
            items.push(item);
        }
        Ok(items)
    }
}

fn difference(left: Vec<ItemId>, right: &[ItemId]) -> Vec<ItemId> {
    let exclude: HashSet<&ItemId> = right.iter().collect();
    left.into_iter().filter(|id| !exclude.contains(id)).collect()
}
