//! Store abstraction over the relational backend.
//!
//! Every mutating method is one transactional unit: the balance change, the
//! journal entry describing it, and any position row it belongs to commit or
//! roll back together.

use crate::domain::{
    Account, AccountId, Decimal, EntryId, EntryStatus, LedgerEntry, Position, PositionId,
    PositionStatus, TimeMs, TradableConfig, TradableId,
};
use crate::engine::wallet::WalletError;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub mod memory;

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("corrupt record: {0}")]
    Corrupt(String),
    #[error("account not found: {0}")]
    AccountNotFound(AccountId),
    #[error("account already exists: {0}")]
    AccountExists(AccountId),
    #[error(transparent)]
    Wallet(#[from] WalletError),
}

/// Terminal transition for one position plus the credit that goes with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionClose {
    pub position_id: PositionId,
    pub status: PositionStatus,
    pub realized_pnl: Decimal,
    pub closed_at: TimeMs,
    pub credit: LedgerEntry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseResult {
    /// This caller won the `active -> terminal` transition.
    Closed { position: Position, account: Account },
    /// Someone else already moved the position out of `active`.
    AlreadyClosed(PositionStatus),
    Missing,
}

/// Administrator decision on a pending deposit or withdrawal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Approve,
    Reject { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveResult {
    Resolved { entry: LedgerEntry, account: Account },
    AlreadyResolved(EntryStatus),
    Missing,
}

#[async_trait]
pub trait Store: Send + Sync + fmt::Debug {
    async fn create_account(&self, account: &Account) -> Result<(), StoreError>;

    async fn get_account(&self, id: &AccountId) -> Result<Option<Account>, StoreError>;

    async fn upsert_tradable(&self, config: &TradableConfig) -> Result<(), StoreError>;

    async fn get_tradable(&self, id: &TradableId) -> Result<Option<TradableConfig>, StoreError>;

    async fn list_tradables(&self) -> Result<Vec<TradableConfig>, StoreError>;

    async fn get_position(&self, id: &PositionId) -> Result<Option<Position>, StoreError>;

    /// Active positions ordered by `(opened_at, id)`.
    async fn list_active_positions(&self) -> Result<Vec<Position>, StoreError>;

    async fn list_positions(&self, owner: &AccountId) -> Result<Vec<Position>, StoreError>;

    /// Reserve funds, journal the movement and create the position.
    ///
    /// `funding` must be a completed debit owned by the position's owner.
    /// Returns the account after the reservation.
    async fn open_position(
        &self,
        position: &Position,
        funding: &LedgerEntry,
    ) -> Result<Account, StoreError>;

    /// Compare-and-swap `active -> close.status`, then credit and journal.
    async fn close_position(&self, close: &PositionClose) -> Result<CloseResult, StoreError>;

    /// Apply completed entries for one owner atomically.
    async fn post_entries(
        &self,
        owner: &AccountId,
        entries: &[LedgerEntry],
    ) -> Result<Account, StoreError>;

    /// Record a pending request. No balance moves until it is resolved.
    async fn append_pending_entry(&self, entry: &LedgerEntry) -> Result<EntryId, StoreError>;

    /// Compare-and-swap `pending -> completed|rejected`; approval applies the movement.
    async fn resolve_pending_entry(
        &self,
        id: &EntryId,
        resolution: &Resolution,
        at: TimeMs,
    ) -> Result<ResolveResult, StoreError>;

    async fn get_ledger_entry(&self, id: &EntryId) -> Result<Option<LedgerEntry>, StoreError>;

    /// Entries for `owner` in journal order.
    async fn list_ledger_entries(&self, owner: &AccountId) -> Result<Vec<LedgerEntry>, StoreError>;
}
