//! Item use-case service: owner/holder assignment over the link ledger.
//!
//! # Responsibility
//! - Create items fully owned and held by their initial owner.
//! - Expose owner/holder as read, set and clear operations.
//! - Dispose items by closing both current links.
//!
//! # Invariants
//! - Assigning the current counterparty writes no history row.
//! - Owner changes never touch possession history and vice versa.
//! - Disposed items have no current links, and no operation reopens them.

use crate::model::item::{Item, ItemId, ItemValidationError};
use crate::model::link::{LinkKind, TemporalLink};
use crate::model::owner::OwnerId;
use crate::model::{now_epoch_ms, EpochMs, ValidationError};
use crate::repo::item_repo::{ItemListQuery, ItemRepository};
use crate::repo::ledger_repo::{LedgerError, LinkChange, LinkLedger};
use crate::repo::party_repo::PartyRepository;
use crate::repo::RepoError;
use crate::storage::image_store::{ImageStore, ImageStoreError};
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum ItemServiceError {
    InvalidItem(ItemValidationError),
    ItemNotFound(ItemId),
    OwnerNotFound(OwnerId),
    /// Owner/holder changes are rejected once an item is disposed.
    ItemDisposed(ItemId),
    Ledger(LedgerError),
    Repo(RepoError),
    Image(ImageStoreError),
}

impl Display for ItemServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidItem(err) => write!(f, "{err}"),
            Self::ItemNotFound(id) => write!(f, "item not found: {id}"),
            Self::OwnerNotFound(id) => write!(f, "owner not found: {id}"),
            Self::ItemDisposed(id) => write!(f, "item is disposed: {id}"),
            Self::Ledger(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Image(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ItemServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidItem(err) => Some(err),
            Self::Ledger(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Image(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ItemServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(ValidationError::Item(err)) => Self::InvalidItem(err),
            other => Self::Repo(other),
        }
    }
}

impl From<LedgerError> for ItemServiceError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::ItemDisposed(id) => Self::ItemDisposed(id),
            other => Self::Ledger(other),
        }
    }
}

impl From<ItemValidationError> for ItemServiceError {
    fn from(value: ItemValidationError) -> Self {
        Self::InvalidItem(value)
    }
}

impl From<ImageStoreError> for ItemServiceError {
    fn from(value: ImageStoreError) -> Self {
        Self::Image(value)
    }
}

pub type ItemServiceResult<T> = Result<T, ItemServiceError>;

/// Item service facade over item, ledger and party repositories.
pub struct ItemService<I: ItemRepository, L: LinkLedger, P: PartyRepository> {
    items: I,
    ledger: L,
    parties: P,
}

impl<I: ItemRepository, L: LinkLedger, P: PartyRepository> ItemService<I, L, P> {
    pub fn new(items: I, ledger: L, parties: P) -> Self {
        Self {
            items,
            ledger,
            parties,
        }
    }

    /// Persists `item`, owned and held by `owner` from now on.
    ///
    /// `created_at` and `updated_at` are stamped here; caller values are
    /// ignored.
    ///
    /// # Errors
    /// - `InvalidItem` when validation fails; nothing is written.
    /// - `OwnerNotFound` when `owner` is unknown.
    pub fn create_item(&self, item: &Item, owner: OwnerId) -> ItemServiceResult<Item> {
        item.validate()?;
        self.ensure_owner(owner)?;
        let mut stamped = item.clone();
        stamped.created_at = now_epoch_ms();
        stamped.updated_at = stamped.created_at;
        let id = self.items.create_item(&stamped, owner)?;
        info!("event=item_create module=item_service status=ok item={id} owner={owner}");
        self.get_item(id)
    }

    pub fn get_item(&self, id: ItemId) -> ItemServiceResult<Item> {
        self.items
            .get_item(id)?
            .ok_or(ItemServiceError::ItemNotFound(id))
    }

    pub fn list_items(&self, query: &ItemListQuery) -> ItemServiceResult<Vec<Item>> {
        Ok(self.items.list_items(query)?)
    }

    /// Persists descriptive changes (type, name, description, value, image).
    ///
    /// The disposed flag is never changed here.
    pub fn update_details(&self, item: &Item) -> ItemServiceResult<Item> {
        item.validate()?;
        self.get_item(item.uuid)?;
        let mut updated = item.clone();
        updated.updated_at = now_epoch_ms();
        self.items.update_item(&updated)?;
        self.get_item(item.uuid)
    }

    /// Stores image bytes and records the returned reference on the item.
    pub fn attach_image<S: ImageStore>(
        &self,
        store: &S,
        id: ItemId,
        file_name: &str,
        bytes: &[u8],
    ) -> ItemServiceResult<Item> {
        let mut item = self.get_item(id)?;
        item.image = Some(store.store(file_name, bytes)?);
        self.update_details(&item)
    }

    pub fn owner(&self, id: ItemId) -> ItemServiceResult<Option<OwnerId>> {
        self.current_counterparty(id, LinkKind::Ownership)
    }

    pub fn holder(&self, id: ItemId) -> ItemServiceResult<Option<OwnerId>> {
        self.current_counterparty(id, LinkKind::Possession)
    }

    /// Transfers ownership. No-op when `owner` already owns the item.
    pub fn set_owner(&self, id: ItemId, owner: OwnerId) -> ItemServiceResult<LinkChange> {
        self.assign(id, LinkKind::Ownership, owner)
    }

    /// Hands the item to `holder`. No-op when `holder` already has it.
    pub fn set_holder(&self, id: ItemId, holder: OwnerId) -> ItemServiceResult<LinkChange> {
        self.assign(id, LinkKind::Possession, holder)
    }

    /// Leaves the item ownerless. No-op when it already is.
    pub fn clear_owner(&self, id: ItemId) -> ItemServiceResult<LinkChange> {
        self.get_item(id)?;
        self.clear(id, LinkKind::Ownership, now_epoch_ms())
    }

    /// Leaves the item without holder. No-op when it already is.
    pub fn clear_holder(&self, id: ItemId) -> ItemServiceResult<LinkChange> {
        self.get_item(id)?;
        self.clear(id, LinkKind::Possession, now_epoch_ms())
    }

    /// Gives the item back to its current owner.
    ///
    /// An ownerless item has nobody to return to, so its holder is cleared.
    pub fn return_to_owner(&self, id: ItemId) -> ItemServiceResult<LinkChange> {
        self.ensure_not_disposed(id)?;
        match self.owner(id)? {
            Some(owner) => self.set_holder(id, owner),
            None => {
                warn!("event=item_return module=item_service status=ownerless item={id}");
                self.clear(id, LinkKind::Possession, now_epoch_ms())
            }
        }
    }

    /// Closes holder and owner links and flags the item disposed, atomically.
    ///
    /// Disposing an already disposed item changes nothing.
    pub fn dispose(&self, id: ItemId) -> ItemServiceResult<Item> {
        let item = self.get_item(id)?;
        if item.is_disposed {
            return Ok(item);
        }
        if !self.ledger.dispose_item(id, now_epoch_ms())? {
            debug!("event=item_dispose module=item_service status=unchanged item={id}");
        }
        self.get_item(id)
    }

    pub fn ownership_history(&self, id: ItemId) -> ItemServiceResult<Vec<TemporalLink>> {
        self.get_item(id)?;
        Ok(self.ledger.history(id, LinkKind::Ownership)?)
    }

    pub fn possession_history(&self, id: ItemId) -> ItemServiceResult<Vec<TemporalLink>> {
        self.get_item(id)?;
        Ok(self.ledger.history(id, LinkKind::Possession)?)
    }

    /// Owner at a past (or present) instant.
    pub fn owner_at(&self, id: ItemId, at: EpochMs) -> ItemServiceResult<Option<OwnerId>> {
        self.get_item(id)?;
        Ok(self
            .ledger
            .get_at(id, LinkKind::Ownership, at)?
            .map(|link| link.counterparty))
    }

    /// Holder at a past (or present) instant.
    pub fn holder_at(&self, id: ItemId, at: EpochMs) -> ItemServiceResult<Option<OwnerId>> {
        self.get_item(id)?;
        Ok(self
            .ledger
            .get_at(id, LinkKind::Possession, at)?
            .map(|link| link.counterparty))
    }

    fn current_counterparty(
        &self,
        id: ItemId,
        kind: LinkKind,
    ) -> ItemServiceResult<Option<OwnerId>> {
        self.get_item(id)?;
        Ok(self
            .ledger
            .get_current(id, kind)?
            .map(|link| link.counterparty))
    }

    fn assign(
        &self,
        id: ItemId,
        kind: LinkKind,
        counterparty: OwnerId,
    ) -> ItemServiceResult<LinkChange> {
        self.ensure_not_disposed(id)?;
        self.ensure_owner(counterparty)?;
        let change = self
            .ledger
            .replace_current(id, kind, counterparty, now_epoch_ms())?;
        if change.wrote_history() {
            info!(
                "event=item_assign module=item_service status=ok item={id} role={} to={counterparty}",
                kind.counterparty_role()
            );
        }
        Ok(change)
    }

    fn clear(&self, id: ItemId, kind: LinkKind, at: EpochMs) -> ItemServiceResult<LinkChange> {
        Ok(match self.ledger.close_current(id, kind, at)? {
            Some(closed) => LinkChange::Closed(closed),
            None => LinkChange::Empty,
        })
    }

    fn ensure_not_disposed(&self, id: ItemId) -> ItemServiceResult<()> {
        if self.get_item(id)?.is_disposed {
            return Err(ItemServiceError::ItemDisposed(id));
        }
        Ok(())
    }

    fn ensure_owner(&self, id: OwnerId) -> ItemServiceResult<()> {
        match self.parties.get_owner(id)? {
            Some(_) => Ok(()),
            None => Err(ItemServiceError::OwnerNotFound(id)),
        }
    }
}
