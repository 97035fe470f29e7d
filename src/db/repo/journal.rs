//! Ledger entries: completed postings and pending deposit/withdrawal requests.

use crate::domain::{Account, AccountId, EntryId, EntryStatus, LedgerEntry, TimeMs};
use crate::engine::wallet;
use crate::store::{Resolution, ResolveResult, StoreError};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

use super::accounts::{lock_account, read_account, write_balances};
use super::{opt_time_col, parse_text, time_col, Repository};

const ENTRY_COLUMNS: &str = "id, owner, kind, wallet, amount, status, description, created_at, \
     rejection_reason, resolved_at";

fn entry_from_row(row: &SqliteRow) -> Result<LedgerEntry, StoreError> {
    Ok(LedgerEntry {
        id: parse_text(row, "id")?,
        owner: AccountId::new(row.try_get::<String, _>("owner")?),
        kind: parse_text(row, "kind")?,
        wallet: parse_text(row, "wallet")?,
        amount: parse_text(row, "amount")?,
        status: parse_text(row, "status")?,
        description: row.try_get("description")?,
        created_at: time_col(row, "created_at")?,
        rejection_reason: row.try_get("rejection_reason")?,
        resolved_at: opt_time_col(row, "resolved_at")?,
    })
}

pub(super) async fn insert_entry(
    conn: &mut SqliteConnection,
    entry: &LedgerEntry,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO ledger_entries
        (id, owner, kind, wallet, amount, status, description, created_at, rejection_reason, resolved_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(entry.id.to_string())
    .bind(entry.owner.as_str())
    .bind(entry.kind.as_str())
    .bind(entry.wallet.as_str())
    .bind(entry.amount.to_canonical_string())
    .bind(entry.status.as_str())
    .bind(&entry.description)
    .bind(entry.created_at.as_ms())
    .bind(entry.rejection_reason.as_deref())
    .bind(entry.resolved_at.map(|t| t.as_ms()))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn fetch_entry(
    conn: &mut SqliteConnection,
    id: &EntryId,
) -> Result<Option<LedgerEntry>, StoreError> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM ledger_entries WHERE id = ?",
        ENTRY_COLUMNS
    ))
    .bind(id.to_string())
    .fetch_optional(&mut *conn)
    .await?;
    row.as_ref().map(entry_from_row).transpose()
}

impl Repository {
    /// Apply completed entries for one owner and journal them atomically.
    pub async fn post_entries_tx(
        &self,
        owner: &AccountId,
        entries: &[LedgerEntry],
    ) -> Result<Account, StoreError> {
        let mut tx = self.pool.begin().await?;

        let mut account = lock_account(&mut *tx, owner).await?;
        wallet::apply_entries(&mut account, entries)?;
        write_balances(&mut *tx, &account).await?;
        for entry in entries {
            insert_entry(&mut *tx, entry).await?;
        }

        tx.commit().await?;
        Ok(account)
    }

    /// Append a pending request. Fails with `AccountNotFound` for an unknown owner.
    pub async fn insert_pending_entry(&self, entry: &LedgerEntry) -> Result<EntryId, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO ledger_entries
            (id, owner, kind, wallet, amount, status, description, created_at, rejection_reason, resolved_at)
            SELECT ?, ?, ?, ?, ?, ?, ?, ?, NULL, NULL
            WHERE EXISTS (SELECT 1 FROM accounts WHERE id = ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.owner.as_str())
        .bind(entry.kind.as_str())
        .bind(entry.wallet.as_str())
        .bind(entry.amount.to_canonical_string())
        .bind(EntryStatus::Pending.as_str())
        .bind(&entry.description)
        .bind(entry.created_at.as_ms())
        .bind(entry.owner.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AccountNotFound(entry.owner.clone()));
        }
        Ok(entry.id)
    }

    /// Compare-and-swap a pending entry to its resolved status.
    ///
    /// An approval applies the movement in the same transaction; if the
    /// wallet ledger refuses it the entry stays pending.
    pub async fn resolve_pending_tx(
        &self,
        id: &EntryId,
        resolution: &Resolution,
        at: TimeMs,
    ) -> Result<ResolveResult, StoreError> {
        let (status, reason) = match resolution {
            Resolution::Approve => (EntryStatus::Completed, None),
            Resolution::Reject { reason } => (EntryStatus::Rejected, Some(reason.as_str())),
        };

        let mut tx = self.pool.begin().await?;

        let swapped = sqlx::query(
            r#"
            UPDATE ledger_entries
            SET status = ?, rejection_reason = ?, resolved_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(status.as_str())
        .bind(reason)
        .bind(at.as_ms())
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

        let current = fetch_entry(&mut *tx, id).await?;
        if swapped.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(match current {
                Some(entry) => ResolveResult::AlreadyResolved(entry.status),
                None => ResolveResult::Missing,
            });
        }
        let entry = current.ok_or_else(|| {
            StoreError::Corrupt(format!("ledger entry {} vanished mid-resolve", id))
        })?;

        let account = match resolution {
            Resolution::Approve => {
                let mut account = lock_account(&mut *tx, &entry.owner).await?;
                wallet::apply_entries(&mut account, std::slice::from_ref(&entry))?;
                write_balances(&mut *tx, &account).await?;
                account
            }
            Resolution::Reject { .. } => read_account(&mut *tx, &entry.owner).await?,
        };

        tx.commit().await?;
        Ok(ResolveResult::Resolved { entry, account })
    }

    pub async fn find_entry(&self, id: &EntryId) -> Result<Option<LedgerEntry>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        fetch_entry(&mut *conn, id).await
    }

    /// Entries for `owner` in the order they were journaled.
    pub async fn entries_for(&self, owner: &AccountId) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM ledger_entries WHERE owner = ? ORDER BY seq ASC",
            ENTRY_COLUMNS
        ))
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(entry_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::setup_test_db;
    use super::*;
    use crate::domain::{Decimal, EntryKind, Wallet};
    use crate::store::Store;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    async fn with_account(repo: &Repository) -> AccountId {
        let account = Account::open(AccountId::new("carol"), TimeMs::new(0));
        repo.insert_account(&account).await.unwrap();
        account.id
    }

    fn deposit(owner: &AccountId, amount: &str) -> LedgerEntry {
        LedgerEntry::pending(
            owner.clone(),
            EntryKind::Deposit,
            Wallet::Deposit,
            d(amount),
            "wire",
            TimeMs::new(1),
        )
    }

    #[tokio::test]
    async fn test_pending_entry_requires_account() {
        let (repo, _temp) = setup_test_db().await;
        let result = repo
            .append_pending_entry(&deposit(&AccountId::new("ghost"), "1"))
            .await;
        assert!(matches!(result, Err(StoreError::AccountNotFound(_))));
    }

    #[tokio::test]
    async fn test_approve_credits_once() {
        let (repo, _temp) = setup_test_db().await;
        let owner = with_account(&repo).await;
        let entry = deposit(&owner, "75.5");
        repo.append_pending_entry(&entry).await.unwrap();

        let first = repo
            .resolve_pending_entry(&entry.id, &Resolution::Approve, TimeMs::new(9))
            .await
            .unwrap();
        let ResolveResult::Resolved { entry: resolved, account } = first else {
            panic!("expected resolution");
        };
        assert_eq!(resolved.status, EntryStatus::Completed);
        assert_eq!(resolved.resolved_at, Some(TimeMs::new(9)));
        assert_eq!(account.deposit_balance, d("75.5"));

        let second = repo
            .resolve_pending_entry(&entry.id, &Resolution::Approve, TimeMs::new(10))
            .await
            .unwrap();
        assert_eq!(second, ResolveResult::AlreadyResolved(EntryStatus::Completed));
        let stored = repo.get_account(&owner).await.unwrap().unwrap();
        assert_eq!(stored.deposit_balance, d("75.5"));
    }

    #[tokio::test]
    async fn test_overdrawing_withdrawal_stays_pending() {
        let (repo, _temp) = setup_test_db().await;
        let owner = with_account(&repo).await;
        let withdrawal = LedgerEntry::pending(
            owner.clone(),
            EntryKind::Withdrawal,
            Wallet::Profit,
            d("-10"),
            "payout",
            TimeMs::new(1),
        );
        repo.append_pending_entry(&withdrawal).await.unwrap();

        let result = repo
            .resolve_pending_entry(&withdrawal.id, &Resolution::Approve, TimeMs::new(2))
            .await;
        assert!(matches!(result, Err(StoreError::Wallet(_))));
        let stored = repo.get_ledger_entry(&withdrawal.id).await.unwrap().unwrap();
        assert_eq!(stored.status, EntryStatus::Pending);
        assert!(stored.resolved_at.is_none());
    }

    #[tokio::test]
    async fn test_reject_records_reason() {
        let (repo, _temp) = setup_test_db().await;
        let owner = with_account(&repo).await;
        let entry = deposit(&owner, "5");
        repo.append_pending_entry(&entry).await.unwrap();

        let result = repo
            .resolve_pending_entry(
                &entry.id,
                &Resolution::Reject {
                    reason: "duplicate".to_string(),
                },
                TimeMs::new(3),
            )
            .await
            .unwrap();
        let ResolveResult::Resolved { entry, account } = result else {
            panic!("expected resolution");
        };
        assert_eq!(entry.status, EntryStatus::Rejected);
        assert_eq!(entry.rejection_reason.as_deref(), Some("duplicate"));
        assert_eq!(account.deposit_balance, d("0"));
    }

    #[tokio::test]
    async fn test_history_in_journal_order() {
        let (repo, _temp) = setup_test_db().await;
        let owner = with_account(&repo).await;
        let first = deposit(&owner, "1");
        let second = deposit(&owner, "2");
        repo.append_pending_entry(&first).await.unwrap();
        repo.append_pending_entry(&second).await.unwrap();

        let ids: Vec<_> = repo
            .entries_for(&owner)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[tokio::test]
    async fn test_resolve_unknown_entry() {
        let (repo, _temp) = setup_test_db().await;
        let result = repo
            .resolve_pending_entry(&EntryId::generate(), &Resolution::Approve, TimeMs::new(1))
            .await
            .unwrap();
        assert_eq!(result, ResolveResult::Missing);
    }
}
