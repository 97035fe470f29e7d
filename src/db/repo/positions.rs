//! Position rows and the open/close transactions.

use crate::domain::{
    Account, AccountId, LedgerEntry, Position, PositionId, PositionStatus, PositionTerms,
    TradableId,
};
use crate::engine::wallet;
use crate::store::{CloseResult, PositionClose, StoreError};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

use super::accounts::{lock_account, write_balances};
use super::journal::insert_entry;
use super::{opt_time_col, parse_opt_text, parse_text, time_col, Repository};

const POSITION_COLUMNS: &str = "id, owner, tradable_id, kind, roi_or_profit_percentage, \
     loss_percentage, volatility_percentage, duration_ms, outcome_mode_at_open, amount_invested, \
     leverage, opened_at, closes_at, expected_pnl, realized_pnl, status, closed_at";

fn position_from_row(row: &SqliteRow) -> Result<Position, StoreError> {
    Ok(Position {
        id: parse_text(row, "id")?,
        owner: AccountId::new(row.try_get::<String, _>("owner")?),
        tradable_id: TradableId::new(row.try_get::<String, _>("tradable_id")?),
        terms: PositionTerms {
            kind: parse_text(row, "kind")?,
            roi_or_profit_percentage: parse_text(row, "roi_or_profit_percentage")?,
            loss_percentage: parse_text(row, "loss_percentage")?,
            volatility_percentage: parse_text(row, "volatility_percentage")?,
            duration_ms: row.try_get("duration_ms")?,
            outcome_mode_at_open: parse_text(row, "outcome_mode_at_open")?,
        },
        amount_invested: parse_text(row, "amount_invested")?,
        leverage: parse_text(row, "leverage")?,
        opened_at: time_col(row, "opened_at")?,
        closes_at: opt_time_col(row, "closes_at")?,
        expected_pnl: parse_opt_text(row, "expected_pnl")?,
        realized_pnl: parse_opt_text(row, "realized_pnl")?,
        status: parse_text(row, "status")?,
        closed_at: opt_time_col(row, "closed_at")?,
    })
}

async fn fetch_position(
    conn: &mut SqliteConnection,
    id: &PositionId,
) -> Result<Option<Position>, StoreError> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM positions WHERE id = ?",
        POSITION_COLUMNS
    ))
    .bind(id.to_string())
    .fetch_optional(&mut *conn)
    .await?;
    row.as_ref().map(position_from_row).transpose()
}

async fn insert_position(conn: &mut SqliteConnection, position: &Position) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO positions
        (id, owner, tradable_id, kind, roi_or_profit_percentage, loss_percentage,
         volatility_percentage, duration_ms, outcome_mode_at_open, amount_invested, leverage,
         opened_at, closes_at, expected_pnl, realized_pnl, status, closed_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(position.id.to_string())
    .bind(position.owner.as_str())
    .bind(position.tradable_id.as_str())
    .bind(position.terms.kind.as_str())
    .bind(position.terms.roi_or_profit_percentage.to_canonical_string())
    .bind(position.terms.loss_percentage.to_canonical_string())
    .bind(position.terms.volatility_percentage.to_canonical_string())
    .bind(position.terms.duration_ms)
    .bind(position.terms.outcome_mode_at_open.as_str())
    .bind(position.amount_invested.to_canonical_string())
    .bind(position.leverage.to_canonical_string())
    .bind(position.opened_at.as_ms())
    .bind(position.closes_at.map(|t| t.as_ms()))
    .bind(position.expected_pnl.map(|d| d.to_canonical_string()))
    .bind(position.realized_pnl.map(|d| d.to_canonical_string()))
    .bind(position.status.as_str())
    .bind(position.closed_at.map(|t| t.as_ms()))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

impl Repository {
    pub async fn find_position(&self, id: &PositionId) -> Result<Option<Position>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        fetch_position(&mut *conn, id).await
    }

    /// Active positions ordered by `(opened_at, id)`.
    pub async fn active_positions(&self) -> Result<Vec<Position>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM positions WHERE status = 'active' ORDER BY opened_at ASC, id ASC",
            POSITION_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(position_from_row).collect()
    }

    pub async fn positions_for(&self, owner: &AccountId) -> Result<Vec<Position>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM positions WHERE owner = ? ORDER BY opened_at ASC, id ASC",
            POSITION_COLUMNS
        ))
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(position_from_row).collect()
    }

    /// Reserve the funding debit, journal it and create the position in one transaction.
    pub async fn open_position_tx(
        &self,
        position: &Position,
        funding: &LedgerEntry,
    ) -> Result<Account, StoreError> {
        let mut tx = self.pool.begin().await?;

        let mut account = lock_account(&mut *tx, &position.owner).await?;
        wallet::apply_entries(&mut account, std::slice::from_ref(funding))?;
        write_balances(&mut *tx, &account).await?;
        insert_entry(&mut *tx, funding).await?;
        insert_position(&mut *tx, position).await?;

        tx.commit().await?;
        Ok(account)
    }

    /// Move a position out of `active` and credit its owner, or report who got there first.
    ///
    /// The status compare-and-swap is the transaction's first statement; a
    /// caller that loses it writes nothing.
    pub async fn close_position_tx(&self, close: &PositionClose) -> Result<CloseResult, StoreError> {
        let mut tx = self.pool.begin().await?;

        let swapped = sqlx::query(
            r#"
            UPDATE positions
            SET status = ?, realized_pnl = ?, closed_at = ?
            WHERE id = ? AND status = 'active'
            "#,
        )
        .bind(close.status.as_str())
        .bind(close.realized_pnl.to_canonical_string())
        .bind(close.closed_at.as_ms())
        .bind(close.position_id.to_string())
        .execute(&mut *tx)
        .await?;

        if swapped.rows_affected() == 0 {
            let current = fetch_position(&mut *tx, &close.position_id).await?;
            tx.rollback().await?;
            return Ok(match current {
                Some(position) => CloseResult::AlreadyClosed(position.status),
                None => CloseResult::Missing,
            });
        }

        let position = fetch_position(&mut *tx, &close.position_id)
            .await?
            .ok_or_else(|| {
                StoreError::Corrupt(format!("position {} vanished mid-close", close.position_id))
            })?;
        debug_assert_ne!(position.status, PositionStatus::Active);

        let mut account = lock_account(&mut *tx, &position.owner).await?;
        wallet::apply_entries(&mut account, std::slice::from_ref(&close.credit))?;
        write_balances(&mut *tx, &account).await?;
        insert_entry(&mut *tx, &close.credit).await?;

        tx.commit().await?;
        Ok(CloseResult::Closed { position, account })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::setup_test_db;
    use super::*;
    use crate::domain::{Decimal, EntryKind, OutcomeMode, TimeMs, TradableKind, Wallet};
    use crate::store::Store;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn plan_position(owner: &AccountId, amount: &str, opened_at: i64) -> Position {
        Position {
            id: PositionId::generate(),
            owner: owner.clone(),
            tradable_id: TradableId::new("weekly"),
            terms: PositionTerms {
                kind: TradableKind::Plan,
                roi_or_profit_percentage: d("10"),
                loss_percentage: d("5"),
                volatility_percentage: d("0"),
                duration_ms: Some(1_000),
                outcome_mode_at_open: OutcomeMode::Auto,
            },
            amount_invested: d(amount),
            leverage: d("1"),
            opened_at: TimeMs::new(opened_at),
            closes_at: Some(TimeMs::new(opened_at + 1_000)),
            expected_pnl: d(amount).checked_percent(d("10")),
            realized_pnl: None,
            status: PositionStatus::Active,
            closed_at: None,
        }
    }

    fn funding(position: &Position) -> LedgerEntry {
        LedgerEntry::completed(
            position.owner.clone(),
            EntryKind::Transfer,
            Wallet::Trading,
            -position.amount_invested,
            "open",
            position.opened_at,
        )
    }

    async fn funded_account(repo: &Repository, trading: &str) -> AccountId {
        let mut account = Account::open(AccountId::new("alice"), TimeMs::new(0));
        account.trading_balance = d(trading);
        repo.insert_account(&account).await.unwrap();
        account.id
    }

    #[tokio::test]
    async fn test_open_persists_position_entry_and_balance() {
        let (repo, _temp) = setup_test_db().await;
        let owner = funded_account(&repo, "1000").await;
        let position = plan_position(&owner, "200", 10);

        let account = repo.open_position(&position, &funding(&position)).await.unwrap();
        assert_eq!(account.trading_balance, d("800"));
        assert_eq!(account.version, 1);

        let stored = repo.get_account(&owner).await.unwrap().unwrap();
        assert_eq!(stored, account);
        assert_eq!(repo.get_position(&position.id).await.unwrap(), Some(position));
        assert_eq!(repo.list_ledger_entries(&owner).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_open_insufficient_funds_rolls_back() {
        let (repo, _temp) = setup_test_db().await;
        let owner = funded_account(&repo, "100").await;
        let position = plan_position(&owner, "200", 10);

        let result = repo.open_position(&position, &funding(&position)).await;
        assert!(matches!(result, Err(StoreError::Wallet(_))));

        let stored = repo.get_account(&owner).await.unwrap().unwrap();
        assert_eq!(stored.trading_balance, d("100"));
        assert_eq!(stored.version, 0);
        assert!(repo.get_position(&position.id).await.unwrap().is_none());
        assert!(repo.list_ledger_entries(&owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_close_is_compare_and_swap() {
        let (repo, _temp) = setup_test_db().await;
        let owner = funded_account(&repo, "1000").await;
        let position = plan_position(&owner, "200", 10);
        repo.open_position(&position, &funding(&position)).await.unwrap();

        let close = PositionClose {
            position_id: position.id,
            status: PositionStatus::Matured,
            realized_pnl: d("20"),
            closed_at: TimeMs::new(2_000),
            credit: LedgerEntry::completed(
                owner.clone(),
                EntryKind::Settlement,
                Wallet::Profit,
                d("220"),
                "matured",
                TimeMs::new(2_000),
            ),
        };
        let first = repo.close_position(&close).await.unwrap();
        let CloseResult::Closed { position: closed, account } = first else {
            panic!("first close should win");
        };
        assert_eq!(closed.status, PositionStatus::Matured);
        assert_eq!(closed.realized_pnl, Some(d("20")));
        assert_eq!(account.profit_balance, d("220"));

        let second = repo.close_position(&close).await.unwrap();
        assert_eq!(second, CloseResult::AlreadyClosed(PositionStatus::Matured));
        let stored = repo.get_account(&owner).await.unwrap().unwrap();
        assert_eq!(stored.profit_balance, d("220"));
        assert_eq!(repo.list_ledger_entries(&owner).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_close_missing_position() {
        let (repo, _temp) = setup_test_db().await;
        let owner = funded_account(&repo, "0").await;
        let close = PositionClose {
            position_id: PositionId::generate(),
            status: PositionStatus::Cancelled,
            realized_pnl: d("0"),
            closed_at: TimeMs::new(1),
            credit: LedgerEntry::completed(
                owner,
                EntryKind::Settlement,
                Wallet::Trading,
                d("1"),
                "x",
                TimeMs::new(1),
            ),
        };
        assert_eq!(repo.close_position(&close).await.unwrap(), CloseResult::Missing);
    }

    #[tokio::test]
    async fn test_active_positions_ordering() {
        let (repo, _temp) = setup_test_db().await;
        let owner = funded_account(&repo, "1000").await;
        let later = plan_position(&owner, "100", 50);
        let earlier = plan_position(&owner, "100", 20);
        repo.open_position(&later, &funding(&later)).await.unwrap();
        repo.open_position(&earlier, &funding(&earlier)).await.unwrap();

        let active = repo.active_positions().await.unwrap();
        let ids: Vec<_> = active.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![earlier.id, later.id]);
    }
}
