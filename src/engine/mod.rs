//! Settlement engine: wallet ledger, outcome resolution, position lifecycle,
//! maturity scheduling and the transaction journal.

use crate::domain::{
    AccountId, Decimal, EntryId, PositionId, PositionStatus, TimeMs, TradableId, Wallet,
};
use crate::engine::wallet::WalletError;
use crate::store::StoreError;
use thiserror::Error;

pub mod clock;
pub mod journal;
pub mod lifecycle;
pub mod outcome;
pub mod scheduler;
pub mod wallet;

pub use clock::{Clock, ManualClock, SystemClock};
pub use journal::{ResolveOutcome, TransactionJournal};
pub use lifecycle::{time_remaining_ms, CloseOutcome, OpenRequest, PositionLifecycle, PositionView};
pub use outcome::{MarketSimulator, OutcomeResolver, PnlOverflow, RandomWalk};
pub use scheduler::{MaturityScheduler, SchedulerConfig, TickReport};

/// Per-operation failures. Nothing here is fatal to the process.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("insufficient funds in {wallet} wallet: requested {requested}, available {available}")]
    InsufficientFunds {
        wallet: Wallet,
        requested: Decimal,
        available: Decimal,
    },
    #[error("exposure {amount} outside allowed range [{min}, {max}]")]
    InvalidExposure {
        amount: Decimal,
        min: Decimal,
        max: Decimal,
    },
    #[error("leverage {leverage} outside allowed range [1, {max}]")]
    InvalidLeverage { leverage: Decimal, max: Decimal },
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("position {id} is {status}, expected active")]
    InvalidTransition {
        id: PositionId,
        status: PositionStatus,
    },
    #[error("position {id} was closed concurrently as {status}")]
    ConcurrentSettlementLost {
        id: PositionId,
        status: PositionStatus,
    },
    #[error("position {id} does not mature until {closes_at}")]
    NotMatured { id: PositionId, closes_at: TimeMs },
    #[error("position {id} reached maturity at {closes_at} and can no longer be cancelled")]
    MaturityReached { id: PositionId, closes_at: TimeMs },
    #[error("unsupported operation: {0}")]
    Unsupported(String),
    #[error("account not found: {0}")]
    AccountNotFound(AccountId),
    #[error("account already exists: {0}")]
    AccountExists(AccountId),
    #[error("tradable not found: {0}")]
    TradableNotFound(TradableId),
    #[error("position not found: {0}")]
    PositionNotFound(PositionId),
    #[error("ledger entry not found: {0}")]
    EntryNotFound(EntryId),
    #[error("invalid tradable config: {0}")]
    InvalidConfig(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Wallet(WalletError::InsufficientFunds {
                wallet,
                requested,
                available,
            }) => EngineError::InsufficientFunds {
                wallet,
                requested,
                available,
            },
            StoreError::Wallet(other) => EngineError::InvalidAmount(other.to_string()),
            StoreError::AccountNotFound(id) => EngineError::AccountNotFound(id),
            StoreError::AccountExists(id) => EngineError::AccountExists(id),
            StoreError::Unavailable(msg) | StoreError::Corrupt(msg) => {
                EngineError::StoreUnavailable(msg)
            }
        }
    }
}

impl From<PnlOverflow> for EngineError {
    fn from(err: PnlOverflow) -> Self {
        EngineError::InvalidAmount(err.to_string())
    }
}
