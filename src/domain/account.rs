//! A user's wallet set.

use crate::domain::{AccountId, Decimal, TimeMs, Wallet};
use serde::{Deserialize, Serialize};

/// Per-user sub-balances.
///
/// `total_balance` is derived from the three sub-balances and never stored,
/// so it cannot drift from its parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub deposit_balance: Decimal,
    pub trading_balance: Decimal,
    pub profit_balance: Decimal,
    /// Bumped by every committed balance change.
    pub version: i64,
    pub created_at: TimeMs,
}

impl Account {
    /// A fresh account with all sub-balances at zero.
    pub fn open(id: AccountId, created_at: TimeMs) -> Self {
        Self {
            id,
            deposit_balance: Decimal::zero(),
            trading_balance: Decimal::zero(),
            profit_balance: Decimal::zero(),
            version: 0,
            created_at,
        }
    }

    pub fn total_balance(&self) -> Decimal {
        self.deposit_balance
            .saturating_add(self.trading_balance)
            .saturating_add(self.profit_balance)
    }

    pub fn balance(&self, wallet: Wallet) -> Decimal {
        match wallet {
            Wallet::Deposit => self.deposit_balance,
            Wallet::Trading => self.trading_balance,
            Wallet::Profit => self.profit_balance,
        }
    }

    pub(crate) fn balance_mut(&mut self, wallet: Wallet) -> &mut Decimal {
        match wallet {
            Wallet::Deposit => &mut self.deposit_balance,
            Wallet::Trading => &mut self.trading_balance,
            Wallet::Profit => &mut self.profit_balance,
        }
    }
}
