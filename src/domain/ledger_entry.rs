//! Transaction journal record: one sub-balance movement.

use crate::domain::{AccountId, Decimal, EntryId, TimeMs, Wallet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Transfer,
    Deposit,
    Withdrawal,
    Settlement,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Transfer => "transfer",
            EntryKind::Deposit => "deposit",
            EntryKind::Withdrawal => "withdrawal",
            EntryKind::Settlement => "settlement",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Pending,
    Completed,
    Rejected,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Pending => "pending",
            EntryStatus::Completed => "completed",
            EntryStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown ledger {field}: {value}")]
pub struct UnknownEntryField {
    pub field: &'static str,
    pub value: String,
}

impl FromStr for EntryKind {
    type Err = UnknownEntryField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transfer" => Ok(EntryKind::Transfer),
            "deposit" => Ok(EntryKind::Deposit),
            "withdrawal" => Ok(EntryKind::Withdrawal),
            "settlement" => Ok(EntryKind::Settlement),
            other => Err(UnknownEntryField {
                field: "kind",
                value: other.to_string(),
            }),
        }
    }
}

impl FromStr for EntryStatus {
    type Err = UnknownEntryField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EntryStatus::Pending),
            "completed" => Ok(EntryStatus::Completed),
            "rejected" => Ok(EntryStatus::Rejected),
            other => Err(UnknownEntryField {
                field: "status",
                value: other.to_string(),
            }),
        }
    }
}

/// An audit record of one balance movement.
///
/// `amount` is signed: positive credits `wallet`, negative debits it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub owner: AccountId,
    pub kind: EntryKind,
    pub wallet: Wallet,
    pub amount: Decimal,
    pub status: EntryStatus,
    pub description: String,
    pub created_at: TimeMs,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<TimeMs>,
}

impl LedgerEntry {
    /// An entry describing a movement that has already been applied.
    pub fn completed(
        owner: AccountId,
        kind: EntryKind,
        wallet: Wallet,
        amount: Decimal,
        description: impl Into<String>,
        created_at: TimeMs,
    ) -> Self {
        Self {
            id: EntryId::generate(),
            owner,
            kind,
            wallet,
            amount,
            status: EntryStatus::Completed,
            description: description.into(),
            created_at,
            rejection_reason: None,
            resolved_at: None,
        }
    }

    /// An entry awaiting administrator approval; no balance has moved yet.
    pub fn pending(
        owner: AccountId,
        kind: EntryKind,
        wallet: Wallet,
        amount: Decimal,
        description: impl Into<String>,
        created_at: TimeMs,
    ) -> Self {
        Self {
            status: EntryStatus::Pending,
            ..Self::completed(owner, kind, wallet, amount, description, created_at)
        }
    }
}
