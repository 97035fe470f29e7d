pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod store;

pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    Account, AccountId, Decimal, EntryId, LedgerEntry, Position, PositionId, PositionStatus,
    TimeMs, TradableConfig, TradableId, Wallet,
};
pub use engine::{
    EngineError, MaturityScheduler, OutcomeResolver, PositionLifecycle, TransactionJournal,
};
pub use error::AppError;
pub use store::{MemoryStore, Store, StoreError};
