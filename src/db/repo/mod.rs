//! SQLite-backed [`Store`].
//!
//! Methods are organized across submodules by table:
//! - `accounts.rs` - account rows and the per-account write lock
//! - `tradables.rs` - administrator configuration
//! - `positions.rs` - open and close transactions
//! - `journal.rs` - ledger entries and pending-request resolution
//!
//! Every multi-write operation runs in one transaction whose first statement
//! is a write, so the transaction holds SQLite's writer lock before it reads
//! any balance it is about to change.

mod accounts;
mod journal;
mod positions;
mod tradables;

use crate::domain::{
    Account, AccountId, EntryId, LedgerEntry, Position, PositionId, TimeMs, TradableConfig,
    TradableId,
};
use crate::store::{CloseResult, PositionClose, Resolution, ResolveResult, Store, StoreError};
use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::fmt;
use std::str::FromStr;

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_) => StoreError::Corrupt(err.to_string()),
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

/// Repository for database operations.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Parse a TEXT column through `FromStr`, reporting bad data as corruption
/// rather than substituting a default.
fn parse_text<T>(row: &SqliteRow, column: &str) -> Result<T, StoreError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw: String = row.try_get(column)?;
    raw.parse::<T>()
        .map_err(|e| StoreError::Corrupt(format!("{} = {:?}: {}", column, raw, e)))
}

fn parse_opt_text<T>(row: &SqliteRow, column: &str) -> Result<Option<T>, StoreError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|raw| {
        raw.parse::<T>()
            .map_err(|e| StoreError::Corrupt(format!("{} = {:?}: {}", column, raw, e)))
    })
    .transpose()
}

fn time_col(row: &SqliteRow, column: &str) -> Result<TimeMs, StoreError> {
    Ok(TimeMs::new(row.try_get::<i64, _>(column)?))
}

fn opt_time_col(row: &SqliteRow, column: &str) -> Result<Option<TimeMs>, StoreError> {
    Ok(row.try_get::<Option<i64>, _>(column)?.map(TimeMs::new))
}

#[async_trait]
impl Store for Repository {
    async fn create_account(&self, account: &Account) -> Result<(), StoreError> {
        self.insert_account(account).await
    }

    async fn get_account(&self, id: &AccountId) -> Result<Option<Account>, StoreError> {
        self.find_account(id).await
    }

    async fn upsert_tradable(&self, config: &TradableConfig) -> Result<(), StoreError> {
        self.save_tradable(config).await
    }

    async fn get_tradable(&self, id: &TradableId) -> Result<Option<TradableConfig>, StoreError> {
        self.find_tradable(id).await
    }

    async fn list_tradables(&self) -> Result<Vec<TradableConfig>, StoreError> {
        self.all_tradables().await
    }

    async fn get_position(&self, id: &PositionId) -> Result<Option<Position>, StoreError> {
        self.find_position(id).await
    }

    async fn list_active_positions(&self) -> Result<Vec<Position>, StoreError> {
        self.active_positions().await
    }

    async fn list_positions(&self, owner: &AccountId) -> Result<Vec<Position>, StoreError> {
        self.positions_for(owner).await
    }

    async fn open_position(
        &self,
        position: &Position,
        funding: &LedgerEntry,
    ) -> Result<Account, StoreError> {
        self.open_position_tx(position, funding).await
    }

    async fn close_position(&self, close: &PositionClose) -> Result<CloseResult, StoreError> {
        self.close_position_tx(close).await
    }

    async fn post_entries(
        &self,
        owner: &AccountId,
        entries: &[LedgerEntry],
    ) -> Result<Account, StoreError> {
        self.post_entries_tx(owner, entries).await
    }

    async fn append_pending_entry(&self, entry: &LedgerEntry) -> Result<EntryId, StoreError> {
        self.insert_pending_entry(entry).await
    }

    async fn resolve_pending_entry(
        &self,
        id: &EntryId,
        resolution: &Resolution,
        at: TimeMs,
    ) -> Result<ResolveResult, StoreError> {
        self.resolve_pending_tx(id, resolution, at).await
    }

    async fn get_ledger_entry(&self, id: &EntryId) -> Result<Option<LedgerEntry>, StoreError> {
        self.find_entry(id).await
    }

    async fn list_ledger_entries(&self, owner: &AccountId) -> Result<Vec<LedgerEntry>, StoreError> {
        self.entries_for(owner).await
    }
}
