//! Domain types for the position settlement engine.
//!
//! This module provides:
//! - Lossless money handling via the Decimal wrapper
//! - Identifiers and the Wallet sub-balance selector
//! - Account, TradableConfig, Position and LedgerEntry records

pub mod account;
pub mod decimal;
pub mod ledger_entry;
pub mod position;
pub mod primitives;
pub mod tradable;

pub use account::Account;
pub use decimal::{Decimal, MONEY_SCALE};
pub use ledger_entry::{EntryKind, EntryStatus, LedgerEntry};
pub use position::{Position, PositionStatus, PositionTerms};
pub use primitives::{
    AccountId, EntryId, IdParseError, PositionId, TimeMs, TradableId, Wallet, MS_PER_MINUTE,
};
pub use tradable::{OutcomeMode, TradableConfig, TradableConfigError, TradableKind};
