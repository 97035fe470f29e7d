//! Account rows and the per-account write lock.

use crate::domain::{Account, AccountId};
use crate::store::StoreError;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

use super::{parse_text, time_col, Repository};

const ACCOUNT_COLUMNS: &str =
    "id, deposit_balance, trading_balance, profit_balance, version, created_at";

pub(super) fn account_from_row(row: &SqliteRow) -> Result<Account, StoreError> {
    Ok(Account {
        id: AccountId::new(row.try_get::<String, _>("id")?),
        deposit_balance: parse_text(row, "deposit_balance")?,
        trading_balance: parse_text(row, "trading_balance")?,
        profit_balance: parse_text(row, "profit_balance")?,
        version: row.try_get("version")?,
        created_at: time_col(row, "created_at")?,
    })
}

/// Take the writer lock for `id` and load its balances.
///
/// Bumps `version` as the first write of the transaction. The returned
/// account carries the pre-bump version so that applying entries through
/// the wallet ledger lands on the stored value.
pub(super) async fn lock_account(
    conn: &mut SqliteConnection,
    id: &AccountId,
) -> Result<Account, StoreError> {
    let bumped = sqlx::query("UPDATE accounts SET version = version + 1 WHERE id = ?")
        .bind(id.as_str())
        .execute(&mut *conn)
        .await?;
    if bumped.rows_affected() == 0 {
        return Err(StoreError::AccountNotFound(id.clone()));
    }

    let row = sqlx::query(&format!("SELECT {} FROM accounts WHERE id = ?", ACCOUNT_COLUMNS))
        .bind(id.as_str())
        .fetch_one(&mut *conn)
        .await?;
    let mut account = account_from_row(&row)?;
    account.version -= 1;
    Ok(account)
}

pub(super) async fn write_balances(
    conn: &mut SqliteConnection,
    account: &Account,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        UPDATE accounts
        SET deposit_balance = ?, trading_balance = ?, profit_balance = ?, version = ?
        WHERE id = ?
        "#,
    )
    .bind(account.deposit_balance.to_canonical_string())
    .bind(account.trading_balance.to_canonical_string())
    .bind(account.profit_balance.to_canonical_string())
    .bind(account.version)
    .bind(account.id.as_str())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(super) async fn read_account(
    conn: &mut SqliteConnection,
    id: &AccountId,
) -> Result<Account, StoreError> {
    let row = sqlx::query(&format!("SELECT {} FROM accounts WHERE id = ?", ACCOUNT_COLUMNS))
        .bind(id.as_str())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| StoreError::AccountNotFound(id.clone()))?;
    account_from_row(&row)
}

impl Repository {
    /// Insert a new account. Fails with `AccountExists` on a duplicate id.
    pub async fn insert_account(&self, account: &Account) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO accounts (id, deposit_balance, trading_balance, profit_balance, version, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(account.id.as_str())
        .bind(account.deposit_balance.to_canonical_string())
        .bind(account.trading_balance.to_canonical_string())
        .bind(account.profit_balance.to_canonical_string())
        .bind(account.version)
        .bind(account.created_at.as_ms())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AccountExists(account.id.clone()));
        }
        Ok(())
    }

    pub async fn find_account(&self, id: &AccountId) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query(&format!("SELECT {} FROM accounts WHERE id = ?", ACCOUNT_COLUMNS))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(account_from_row).transpose()
    }
}
