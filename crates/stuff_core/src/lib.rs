//! Core domain logic for Stuff: who owns and who holds which item, and when.
//! This crate is the single source of truth for ledger invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod storage;

pub use config::CoreConfig;
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::item::{ImageRef, Item, ItemId, ItemType, ItemValidationError};
pub use model::link::{LinkId, LinkKind, TemporalLink};
pub use model::organization::{Organization, OrganizationId, OrganizationValidationError};
pub use model::owner::{Owner, OwnerId, OwnerValidationError, Party};
pub use model::person::{Person, PersonId, PersonValidationError};
pub use model::{now_epoch_ms, EpochMs, ValidationError};
pub use repo::item_repo::{ItemListQuery, ItemRepository, SqliteItemRepository};
pub use repo::ledger_repo::{LedgerError, LedgerResult, LinkChange, LinkLedger, SqliteLinkLedger};
pub use repo::party_repo::{PartyRepository, SqlitePartyRepository};
pub use repo::{RepoError, RepoResult};
pub use service::item_service::{ItemService, ItemServiceError};
pub use service::owner_service::{OwnerService, OwnerServiceError};
pub use service::party_service::{PartyService, PartyServiceError};
pub use storage::image_store::{FsImageStore, ImageStore, ImageStoreError};

/// Minimal health-check API for host integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
