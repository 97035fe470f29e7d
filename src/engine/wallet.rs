//! Wallet ledger: all-or-nothing debits and credits on an account's sub-balances.
//!
//! Stores call into this module inside their transaction so every balance
//! change goes through the same checks regardless of backend.

use crate::domain::{Account, Decimal, LedgerEntry, Wallet};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error("insufficient funds in {wallet} wallet: requested {requested}, available {available}")]
    InsufficientFunds {
        wallet: Wallet,
        requested: Decimal,
        available: Decimal,
    },
    #[error("debit amount must be positive, got {0}")]
    NonPositiveDebit(Decimal),
    #[error("credit amount must not be negative, got {0}")]
    NegativeCredit(Decimal),
    #[error("crediting {amount} would take the {wallet} wallet past {limit}")]
    Overflow {
        wallet: Wallet,
        amount: Decimal,
        limit: Decimal,
    },
    #[error("entry owner {entry_owner} does not match account {account}")]
    OwnerMismatch {
        entry_owner: String,
        account: String,
    },
}

/// Decrement `wallet` by `amount` iff the sub-balance covers it.
///
/// On error the account is left untouched.
pub fn reserve(account: &mut Account, wallet: Wallet, amount: Decimal) -> Result<(), WalletError> {
    if !amount.is_positive() {
        return Err(WalletError::NonPositiveDebit(amount));
    }
    let available = account.balance(wallet);
    if amount > available {
        return Err(WalletError::InsufficientFunds {
            wallet,
            requested: amount,
            available,
        });
    }
    *account.balance_mut(wallet) = available - amount;
    Ok(())
}

/// Increment `wallet` by `amount`.
///
/// Credits are not checked against any business limit, only against
/// [`Decimal::max_balance`] so balances stay representable.
pub fn release(account: &mut Account, wallet: Wallet, amount: Decimal) -> Result<(), WalletError> {
    if amount.is_negative() {
        return Err(WalletError::NegativeCredit(amount));
    }
    let limit = Decimal::max_balance();
    let balance = account.balance_mut(wallet);
    match balance.checked_add(amount) {
        Some(next) if next <= limit => {
            *balance = next;
            Ok(())
        }
        _ => Err(WalletError::Overflow {
            wallet,
            amount,
            limit,
        }),
    }
}

/// Apply the movement a journal entry describes.
pub fn apply_entry(account: &mut Account, entry: &LedgerEntry) -> Result<(), WalletError> {
    if entry.owner != account.id {
        return Err(WalletError::OwnerMismatch {
            entry_owner: entry.owner.to_string(),
            account: account.id.to_string(),
        });
    }
    if entry.amount.is_negative() {
        reserve(account, entry.wallet, entry.amount.abs())
    } else {
        release(account, entry.wallet, entry.amount)
    }
}

/// Apply a batch of entries all-or-nothing.
///
/// Works on a copy so a failure halfway through leaves `account` unchanged.
pub fn apply_entries(account: &mut Account, entries: &[LedgerEntry]) -> Result<(), WalletError> {
    let mut staged = account.clone();
    for entry in entries {
        apply_entry(&mut staged, entry)?;
    }
    staged.version += 1;
    *account = staged;
    Ok(())
}
