//! In-process store for tests and embedding without a database.

use super::{CloseResult, PositionClose, Resolution, ResolveResult, Store, StoreError};
use crate::domain::{
    Account, AccountId, EntryId, EntryStatus, LedgerEntry, Position, PositionId, PositionStatus,
    TimeMs, TradableConfig, TradableId,
};
use crate::engine::wallet;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Inner {
    accounts: HashMap<AccountId, Account>,
    tradables: HashMap<TradableId, TradableConfig>,
    positions: HashMap<PositionId, Position>,
    entries: Vec<LedgerEntry>,
}

/// Store backed by a single mutex; every method is trivially atomic.
///
/// `fail_writes` makes every mutating call return `StoreError::Unavailable`
/// without touching state, for exercising retry paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store poisoned".to_string()))
    }

    fn lock_for_write(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        self.lock()
    }
}

fn sorted_positions<'a>(iter: impl Iterator<Item = &'a Position>) -> Vec<Position> {
    let mut positions: Vec<Position> = iter.cloned().collect();
    positions.sort_by(|a, b| a.opened_at.cmp(&b.opened_at).then_with(|| a.id.cmp(&b.id)));
    positions
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_account(&self, account: &Account) -> Result<(), StoreError> {
        let mut inner = self.lock_for_write()?;
        if inner.accounts.contains_key(&account.id) {
            return Err(StoreError::AccountExists(account.id.clone()));
        }
        inner.accounts.insert(account.id.clone(), account.clone());
        Ok(())
    }

    async fn get_account(&self, id: &AccountId) -> Result<Option<Account>, StoreError> {
        Ok(self.lock()?.accounts.get(id).cloned())
    }

    async fn upsert_tradable(&self, config: &TradableConfig) -> Result<(), StoreError> {
        let mut inner = self.lock_for_write()?;
        inner.tradables.insert(config.id.clone(), config.clone());
        Ok(())
    }

    async fn get_tradable(&self, id: &TradableId) -> Result<Option<TradableConfig>, StoreError> {
        Ok(self.lock()?.tradables.get(id).cloned())
    }

    async fn list_tradables(&self) -> Result<Vec<TradableConfig>, StoreError> {
        let mut tradables: Vec<TradableConfig> = self.lock()?.tradables.values().cloned().collect();
        tradables.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(tradables)
    }

    async fn get_position(&self, id: &PositionId) -> Result<Option<Position>, StoreError> {
        Ok(self.lock()?.positions.get(id).cloned())
    }

    async fn list_active_positions(&self) -> Result<Vec<Position>, StoreError> {
        let inner = self.lock()?;
        Ok(sorted_positions(
            inner.positions.values().filter(|p| p.is_active()),
        ))
    }

    async fn list_positions(&self, owner: &AccountId) -> Result<Vec<Position>, StoreError> {
        let inner = self.lock()?;
        Ok(sorted_positions(
            inner.positions.values().filter(|p| &p.owner == owner),
        ))
    }

    async fn open_position(
        &self,
        position: &Position,
        funding: &LedgerEntry,
    ) -> Result<Account, StoreError> {
        let mut inner = self.lock_for_write()?;
        let account = inner
            .accounts
            .get_mut(&position.owner)
            .ok_or_else(|| StoreError::AccountNotFound(position.owner.clone()))?;
        wallet::apply_entries(account, std::slice::from_ref(funding))?;
        let account = account.clone();
        inner.entries.push(funding.clone());
        inner.positions.insert(position.id, position.clone());
        Ok(account)
    }

    async fn close_position(&self, close: &PositionClose) -> Result<CloseResult, StoreError> {
        let mut guard = self.lock_for_write()?;
        let inner = &mut *guard;
        let Some(position) = inner.positions.get_mut(&close.position_id) else {
            return Ok(CloseResult::Missing);
        };
        if position.status != PositionStatus::Active {
            return Ok(CloseResult::AlreadyClosed(position.status));
        }
        let account = inner
            .accounts
            .get_mut(&position.owner)
            .ok_or_else(|| StoreError::AccountNotFound(position.owner.clone()))?;
        wallet::apply_entries(account, std::slice::from_ref(&close.credit))?;

        position.status = close.status;
        position.realized_pnl = Some(close.realized_pnl);
        position.closed_at = Some(close.closed_at);
        inner.entries.push(close.credit.clone());

        Ok(CloseResult::Closed {
            position: position.clone(),
            account: account.clone(),
        })
    }

    async fn post_entries(
        &self,
        owner: &AccountId,
        entries: &[LedgerEntry],
    ) -> Result<Account, StoreError> {
        let mut inner = self.lock_for_write()?;
        let account = inner
            .accounts
            .get_mut(owner)
            .ok_or_else(|| StoreError::AccountNotFound(owner.clone()))?;
        wallet::apply_entries(account, entries)?;
        let account = account.clone();
        inner.entries.extend(entries.iter().cloned());
        Ok(account)
    }

    async fn append_pending_entry(&self, entry: &LedgerEntry) -> Result<EntryId, StoreError> {
        let mut inner = self.lock_for_write()?;
        if !inner.accounts.contains_key(&entry.owner) {
            return Err(StoreError::AccountNotFound(entry.owner.clone()));
        }
        inner.entries.push(entry.clone());
        Ok(entry.id)
    }

    async fn resolve_pending_entry(
        &self,
        id: &EntryId,
        resolution: &Resolution,
        at: TimeMs,
    ) -> Result<ResolveResult, StoreError> {
        let mut guard = self.lock_for_write()?;
        let inner = &mut *guard;
        let Some(entry) = inner.entries.iter_mut().find(|e| &e.id == id) else {
            return Ok(ResolveResult::Missing);
        };
        if entry.status != EntryStatus::Pending {
            return Ok(ResolveResult::AlreadyResolved(entry.status));
        }
        let account = inner
            .accounts
            .get_mut(&entry.owner)
            .ok_or_else(|| StoreError::AccountNotFound(entry.owner.clone()))?;

        match resolution {
            Resolution::Approve => {
                wallet::apply_entries(account, std::slice::from_ref(entry))?;
                entry.status = EntryStatus::Completed;
            }
            Resolution::Reject { reason } => {
                entry.status = EntryStatus::Rejected;
                entry.rejection_reason = Some(reason.clone());
            }
        }
        entry.resolved_at = Some(at);

        Ok(ResolveResult::Resolved {
            entry: entry.clone(),
            account: account.clone(),
        })
    }

    async fn get_ledger_entry(&self, id: &EntryId) -> Result<Option<LedgerEntry>, StoreError> {
        Ok(self.lock()?.entries.iter().find(|e| &e.id == id).cloned())
    }

    async fn list_ledger_entries(&self, owner: &AccountId) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(self
            .lock()?
            .entries
            .iter()
            .filter(|e| &e.owner == owner)
            .cloned()
            .collect())
    }
}
