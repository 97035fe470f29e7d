//! A funded investment or trade exposure.

use crate::domain::{
    AccountId, Decimal, OutcomeMode, PositionId, TimeMs, TradableConfig, TradableId, TradableKind,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    Active,
    Matured,
    Cancelled,
}

impl PositionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionStatus::Active => "active",
            PositionStatus::Matured => "matured",
            PositionStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PositionStatus::Active)
    }
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown position status: {0}")]
pub struct UnknownPositionStatus(pub String);

impl FromStr for PositionStatus {
    type Err = UnknownPositionStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(PositionStatus::Active),
            "matured" => Ok(PositionStatus::Matured),
            "cancelled" => Ok(PositionStatus::Cancelled),
            other => Err(UnknownPositionStatus(other.to_string())),
        }
    }
}

/// Percentages and duration captured from the tradable at open time.
///
/// These stay fixed for the life of the position even if an administrator
/// edits the tradable afterwards. The outcome mode is deliberately not part
/// of this snapshot: it is read from the live config when P&L is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionTerms {
    pub kind: TradableKind,
    pub roi_or_profit_percentage: Decimal,
    pub loss_percentage: Decimal,
    pub volatility_percentage: Decimal,
    pub duration_ms: Option<i64>,
    /// Mode in force at open; used only if the tradable later disappears.
    pub outcome_mode_at_open: OutcomeMode,
}

impl PositionTerms {
    pub fn capture(config: &TradableConfig) -> Self {
        Self {
            kind: config.kind,
            roi_or_profit_percentage: config.roi_or_profit_percentage,
            loss_percentage: config.loss_percentage,
            volatility_percentage: config.volatility_percentage,
            duration_ms: config.duration_ms,
            outcome_mode_at_open: config.outcome_mode,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub owner: AccountId,
    pub tradable_id: TradableId,
    pub terms: PositionTerms,
    pub amount_invested: Decimal,
    pub leverage: Decimal,
    pub opened_at: TimeMs,
    /// `None` means open until manually closed.
    pub closes_at: Option<TimeMs>,
    pub expected_pnl: Option<Decimal>,
    pub realized_pnl: Option<Decimal>,
    pub status: PositionStatus,
    pub closed_at: Option<TimeMs>,
}

impl Position {
    pub fn is_active(&self) -> bool {
        self.status == PositionStatus::Active
    }

    pub fn is_fixed_duration(&self) -> bool {
        self.closes_at.is_some()
    }

    /// True once a fixed-duration position has reached its closing time.
    pub fn is_due(&self, now: TimeMs) -> bool {
        self.is_active() && self.closes_at.is_some_and(|closes_at| closes_at <= now)
    }
}
