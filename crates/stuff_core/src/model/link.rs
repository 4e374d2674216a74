//! Temporal item links.
//!
//! Ownership and possession share one interval shape and differ only in the
//! role of the counterparty, so both are a `TemporalLink` tagged with a
//! `LinkKind`.
//!
//! # Invariants
//! - `end_at = None` marks the current link for its (item, kind).
//! - A closed link satisfies `end_at >= start_at`.
//! - Intervals are half-open: `[start_at, end_at)`.

use super::item::ItemId;
use super::owner::OwnerId;
use super::EpochMs;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type LinkId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    /// Who owns the item.
    Ownership,
    /// Who physically holds the item.
    Possession,
}

impl LinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ownership => "ownership",
            Self::Possession => "possession",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ownership" => Some(Self::Ownership),
            "possession" => Some(Self::Possession),
            _ => None,
        }
    }

    /// Role name of the counterparty for this kind.
    pub fn counterparty_role(&self) -> &'static str {
        match self {
            Self::Ownership => "owner",
            Self::Possession => "holder",
        }
    }
}

impl Display for LinkKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalLink {
    pub uuid: LinkId,
    pub item_uuid: ItemId,
    pub kind: LinkKind,
    /// Owner for `Ownership`, holder for `Possession`.
    pub counterparty: OwnerId,
    pub start_at: EpochMs,
    pub end_at: Option<EpochMs>,
}

impl TemporalLink {
    /// Builds a new open link starting at `start_at`.
    pub fn open(
        item_uuid: ItemId,
        kind: LinkKind,
        counterparty: OwnerId,
        start_at: EpochMs,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            item_uuid,
            kind,
            counterparty,
            start_at,
            end_at: None,
        }
    }

    pub fn is_current(&self) -> bool {
        self.end_at.is_none()
    }

    /// Returns whether `at` falls inside `[start_at, end_at)`.
    pub fn contains(&self, at: EpochMs) -> bool {
        self.start_at <= at && self.end_at.map_or(true, |end| at < end)
    }
}

impl Display for TemporalLink {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} @ {} [{} - ",
            self.kind, self.item_uuid, self.counterparty, self.start_at
        )?;
        match self.end_at {
            Some(end) => write!(f, "{end}]"),
            None => write!(f, "]"),
        }
    }
}
