//! Transaction journal: wallet transfers and administrator-approved
//! deposit/withdrawal requests.
//!
//! Entries written here are either `completed` immediately (transfers) or
//! `pending` until an administrator resolves them.

use super::{Clock, EngineError};
use crate::domain::{
    Account, AccountId, Decimal, EntryId, EntryKind, EntryStatus, LedgerEntry, Wallet,
};
use crate::store::{Resolution, ResolveResult, Store};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    Resolved { entry: LedgerEntry, account: Account },
    /// The entry had already been approved or rejected.
    AlreadyResolved(EntryStatus),
}

#[derive(Debug, Clone)]
pub struct TransactionJournal {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl TransactionJournal {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn create_account(&self, id: AccountId) -> Result<Account, EngineError> {
        let account = Account::open(id, self.clock.now());
        self.store.create_account(&account).await?;
        info!(owner = %account.id, "Account created");
        Ok(account)
    }

    pub async fn account(&self, id: &AccountId) -> Result<Account, EngineError> {
        self.store
            .get_account(id)
            .await?
            .ok_or_else(|| EngineError::AccountNotFound(id.clone()))
    }

    /// Move funds between two of the owner's own wallets.
    ///
    /// Journals a debit and a credit entry; both commit or neither does.
    pub async fn transfer(
        &self,
        owner: &AccountId,
        from: Wallet,
        to: Wallet,
        amount: Decimal,
    ) -> Result<Account, EngineError> {
        require_positive(amount)?;
        if from == to {
            return Err(EngineError::InvalidAmount(format!(
                "cannot transfer from {} wallet to itself",
                from
            )));
        }

        let now = self.clock.now();
        let description = format!("Transfer {} from {} to {}", amount, from, to);
        let entries = [
            LedgerEntry::completed(
                owner.clone(),
                EntryKind::Transfer,
                from,
                -amount,
                description.clone(),
                now,
            ),
            LedgerEntry::completed(
                owner.clone(),
                EntryKind::Transfer,
                to,
                amount,
                description,
                now,
            ),
        ];
        let account = self.store.post_entries(owner, &entries).await?;

        info!(
            owner = %owner,
            from = %from,
            to = %to,
            amount = %amount,
            "Wallet transfer committed"
        );
        Ok(account)
    }

    /// Record a deposit request. The deposit wallet is credited on approval.
    pub async fn request_deposit(
        &self,
        owner: &AccountId,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<LedgerEntry, EngineError> {
        require_positive(amount)?;
        let entry = LedgerEntry::pending(
            owner.clone(),
            EntryKind::Deposit,
            Wallet::Deposit,
            amount,
            description.unwrap_or_else(|| format!("Deposit of {}", amount)),
            self.clock.now(),
        );
        self.append_pending(entry).await
    }

    /// Record a withdrawal request against `wallet`.
    ///
    /// The balance is checked now for early feedback and again when an
    /// administrator approves, since it may have moved in between.
    pub async fn request_withdrawal(
        &self,
        owner: &AccountId,
        wallet: Wallet,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<LedgerEntry, EngineError> {
        require_positive(amount)?;
        let account = self.account(owner).await?;
        let available = account.balance(wallet);
        if amount > available {
            return Err(EngineError::InsufficientFunds {
                wallet,
                requested: amount,
                available,
            });
        }
        let entry = LedgerEntry::pending(
            owner.clone(),
            EntryKind::Withdrawal,
            wallet,
            -amount,
            description.unwrap_or_else(|| format!("Withdrawal of {} from {}", amount, wallet)),
            self.clock.now(),
        );
        self.append_pending(entry).await
    }

    pub async fn approve(&self, id: &EntryId) -> Result<ResolveOutcome, EngineError> {
        self.resolve(id, Resolution::Approve).await
    }

    pub async fn reject(&self, id: &EntryId, reason: String) -> Result<ResolveOutcome, EngineError> {
        let reason = reason.trim().to_string();
        if reason.is_empty() {
            return Err(EngineError::InvalidAmount(
                "rejection reason must not be empty".to_string(),
            ));
        }
        self.resolve(id, Resolution::Reject { reason }).await
    }

    pub async fn entry(&self, id: &EntryId) -> Result<LedgerEntry, EngineError> {
        self.store
            .get_ledger_entry(id)
            .await?
            .ok_or(EngineError::EntryNotFound(*id))
    }

    /// The owner's journal, oldest first.
    pub async fn history(&self, owner: &AccountId) -> Result<Vec<LedgerEntry>, EngineError> {
        self.account(owner).await?;
        Ok(self.store.list_ledger_entries(owner).await?)
    }

    async fn append_pending(&self, entry: LedgerEntry) -> Result<LedgerEntry, EngineError> {
        self.store.append_pending_entry(&entry).await?;
        info!(
            entry_id = %entry.id,
            owner = %entry.owner,
            kind = %entry.kind,
            amount = %entry.amount,
            "Pending request recorded"
        );
        Ok(entry)
    }

    async fn resolve(
        &self,
        id: &EntryId,
        resolution: Resolution,
    ) -> Result<ResolveOutcome, EngineError> {
        let entry = self.entry(id).await?;
        if !matches!(entry.kind, EntryKind::Deposit | EntryKind::Withdrawal) {
            return Err(EngineError::Unsupported(format!(
                "{} entries are not resolved by an administrator",
                entry.kind
            )));
        }

        match self
            .store
            .resolve_pending_entry(id, &resolution, self.clock.now())
            .await?
        {
            ResolveResult::Resolved { entry, account } => {
                info!(
                    entry_id = %entry.id,
                    owner = %entry.owner,
                    status = %entry.status,
                    amount = %entry.amount,
                    total_balance = %account.total_balance(),
                    "Pending request resolved"
                );
                Ok(ResolveOutcome::Resolved { entry, account })
            }
            ResolveResult::AlreadyResolved(status) => {
                debug!(entry_id = %id, status = %status, "Entry already resolved, nothing to do");
                Ok(ResolveOutcome::AlreadyResolved(status))
            }
            ResolveResult::Missing => Err(EngineError::EntryNotFound(*id)),
        }
    }
}

fn require_positive(amount: Decimal) -> Result<(), EngineError> {
    if amount.is_positive() && amount <= Decimal::max_amount() {
        Ok(())
    } else {
        Err(EngineError::InvalidAmount(format!(
            "amount must be within (0, {}], got {}",
            Decimal::max_amount(),
            amount
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TimeMs;
    use crate::engine::ManualClock;
    use crate::store::MemoryStore;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    async fn journal() -> (TransactionJournal, Arc<MemoryStore>, AccountId) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(TimeMs::new(10_000)));
        let journal = TransactionJournal::new(store.clone(), clock);
        let owner = AccountId::new("bob");
        journal.create_account(owner.clone()).await.unwrap();
        (journal, store, owner)
    }

    async fn fund_deposit(journal: &TransactionJournal, owner: &AccountId, amount: &str) {
        let entry = journal.request_deposit(owner, d(amount), None).await.unwrap();
        journal.approve(&entry.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_deposit_moves_nothing_until_approved() {
        let (journal, _, owner) = journal().await;
        let entry = journal
            .request_deposit(&owner, d("500"), Some("wire".to_string()))
            .await
            .unwrap();
        assert_eq!(entry.status, EntryStatus::Pending);
        assert_eq!(journal.account(&owner).await.unwrap().deposit_balance, d("0"));

        let outcome = journal.approve(&entry.id).await.unwrap();
        let ResolveOutcome::Resolved { entry, account } = outcome else {
            panic!("expected resolution");
        };
        assert_eq!(entry.status, EntryStatus::Completed);
        assert_eq!(account.deposit_balance, d("500"));
    }

    #[tokio::test]
    async fn test_double_approval_credits_once() {
        let (journal, _, owner) = journal().await;
        let entry = journal.request_deposit(&owner, d("100"), None).await.unwrap();
        journal.approve(&entry.id).await.unwrap();
        let second = journal.approve(&entry.id).await.unwrap();
        assert_eq!(second, ResolveOutcome::AlreadyResolved(EntryStatus::Completed));
        assert_eq!(journal.account(&owner).await.unwrap().deposit_balance, d("100"));
    }

    #[tokio::test]
    async fn test_rejection_keeps_balance_and_reason() {
        let (journal, _, owner) = journal().await;
        let entry = journal.request_deposit(&owner, d("100"), None).await.unwrap();
        let outcome = journal
            .reject(&entry.id, "unverified source".to_string())
            .await
            .unwrap();
        let ResolveOutcome::Resolved { entry, account } = outcome else {
            panic!("expected resolution");
        };
        assert_eq!(entry.status, EntryStatus::Rejected);
        assert_eq!(entry.rejection_reason.as_deref(), Some("unverified source"));
        assert_eq!(account.total_balance(), d("0"));
    }

    #[tokio::test]
    async fn test_transfer_writes_two_entries() {
        let (journal, _, owner) = journal().await;
        fund_deposit(&journal, &owner, "300").await;

        let account = journal
            .transfer(&owner, Wallet::Deposit, Wallet::Trading, d("120"))
            .await
            .unwrap();
        assert_eq!(account.deposit_balance, d("180"));
        assert_eq!(account.trading_balance, d("120"));
        assert_eq!(account.total_balance(), d("300"));

        let history = journal.history(&owner).await.unwrap();
        let transfers: Vec<_> = history
            .iter()
            .filter(|e| e.kind == EntryKind::Transfer)
            .collect();
        assert_eq!(transfers.len(), 2);
        assert_eq!(transfers.iter().map(|e| e.amount).sum::<Decimal>(), d("0"));
    }

    #[tokio::test]
    async fn test_transfer_overdraw_is_rejected_without_entries() {
        let (journal, store, owner) = journal().await;
        fund_deposit(&journal, &owner, "50").await;
        let before = store.list_ledger_entries(&owner).await.unwrap().len();

        let result = journal
            .transfer(&owner, Wallet::Deposit, Wallet::Trading, d("60"))
            .await;
        assert!(matches!(result, Err(EngineError::InsufficientFunds { .. })));
        assert_eq!(store.list_ledger_entries(&owner).await.unwrap().len(), before);
    }

    #[tokio::test]
    async fn test_transfer_to_same_wallet_is_invalid() {
        let (journal, _, owner) = journal().await;
        let result = journal
            .transfer(&owner, Wallet::Profit, Wallet::Profit, d("1"))
            .await;
        assert!(matches!(result, Err(EngineError::InvalidAmount(_))));
    }

    #[tokio::test]
    async fn test_withdrawal_approval_rechecks_balance() {
        let (journal, _, owner) = journal().await;
        fund_deposit(&journal, &owner, "100").await;

        let withdrawal = journal
            .request_withdrawal(&owner, Wallet::Deposit, d("80"), None)
            .await
            .unwrap();
        journal
            .transfer(&owner, Wallet::Deposit, Wallet::Trading, d("50"))
            .await
            .unwrap();

        let result = journal.approve(&withdrawal.id).await;
        assert!(matches!(result, Err(EngineError::InsufficientFunds { .. })));
        assert_eq!(
            journal.entry(&withdrawal.id).await.unwrap().status,
            EntryStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_withdrawal_request_over_balance_is_refused() {
        let (journal, _, owner) = journal().await;
        let result = journal
            .request_withdrawal(&owner, Wallet::Profit, d("1"), None)
            .await;
        assert!(matches!(result, Err(EngineError::InsufficientFunds { .. })));
    }

    #[tokio::test]
    async fn test_oversized_amounts_are_invalid() {
        let (journal, _, owner) = journal().await;
        let huge = d("79228162514264337593543950335");
        let result = journal.request_deposit(&owner, huge, None).await;
        assert!(matches!(result, Err(EngineError::InvalidAmount(_))));
        tokio_test::assert_err!(
            journal
                .transfer(&owner, Wallet::Deposit, Wallet::Trading, huge)
                .await
        );
        tokio_test::assert_ok!(
            journal
                .request_deposit(&owner, Decimal::max_amount(), None)
                .await
        );
    }

    #[tokio::test]
    async fn test_approval_past_balance_limit_leaves_entry_pending() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(TimeMs::new(10_000)));
        let journal = TransactionJournal::new(store.clone(), clock);
        let owner = AccountId::new("whale");
        let mut account = Account::open(owner.clone(), TimeMs::new(0));
        account.deposit_balance = Decimal::max_balance();
        store.create_account(&account).await.unwrap();

        let entry = journal.request_deposit(&owner, d("1"), None).await.unwrap();
        let result = journal.approve(&entry.id).await;
        assert!(matches!(result, Err(EngineError::InvalidAmount(_))));
        assert_eq!(
            journal.entry(&entry.id).await.unwrap().status,
            EntryStatus::Pending
        );

        // The store keeps serving requests afterwards.
        let after = tokio_test::assert_ok!(journal.account(&owner).await);
        assert_eq!(after.deposit_balance, Decimal::max_balance());
        let rejected = journal.reject(&entry.id, "over limit".to_string()).await;
        assert!(matches!(rejected, Ok(ResolveOutcome::Resolved { .. })));
    }

    #[tokio::test]
    async fn test_transfer_entries_cannot_be_approved() {
        let (journal, store, owner) = journal().await;
        fund_deposit(&journal, &owner, "10").await;
        journal
            .transfer(&owner, Wallet::Deposit, Wallet::Trading, d("10"))
            .await
            .unwrap();
        let transfer = store
            .list_ledger_entries(&owner)
            .await
            .unwrap()
            .into_iter()
            .find(|e| e.kind == EntryKind::Transfer)
            .unwrap();
        assert!(matches!(
            journal.approve(&transfer.id).await,
            Err(EngineError::Unsupported(_))
        ));
    }
}
