//! Administrator-managed configuration for investment plans and trading symbols.

use crate::domain::{Decimal, TradableId, TimeMs};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Upper bound for `roi_or_profit_percentage` and `volatility_percentage`.
pub const MAX_PERCENTAGE: i64 = 10_000;

/// Upper bound for `max_leverage`.
pub const MAX_LEVERAGE: i64 = 1_000;

/// Administrator policy selecting how a position's result is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeMode {
    Auto,
    ForceProfit,
    ForceLoss,
}

impl OutcomeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeMode::Auto => "auto",
            OutcomeMode::ForceProfit => "force_profit",
            OutcomeMode::ForceLoss => "force_loss",
        }
    }
}

impl fmt::Display for OutcomeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutcomeMode {
    type Err = TradableConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(OutcomeMode::Auto),
            "force_profit" => Ok(OutcomeMode::ForceProfit),
            "force_loss" => Ok(OutcomeMode::ForceLoss),
            other => Err(TradableConfigError::UnknownOutcomeMode(other.to_string())),
        }
    }
}

/// Fixed-duration investment plan or open-ended trading symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradableKind {
    Plan,
    Symbol,
}

impl TradableKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradableKind::Plan => "plan",
            TradableKind::Symbol => "symbol",
        }
    }
}

impl fmt::Display for TradableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradableKind {
    type Err = TradableConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plan" => Ok(TradableKind::Plan),
            "symbol" => Ok(TradableKind::Symbol),
            other => Err(TradableConfigError::UnknownKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TradableConfigError {
    #[error("unknown outcome mode: {0}")]
    UnknownOutcomeMode(String),
    #[error("unknown tradable kind: {0}")]
    UnknownKind(String),
    #[error("invalid tradable config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradableConfig {
    pub id: TradableId,
    pub name: String,
    pub kind: TradableKind,
    pub roi_or_profit_percentage: Decimal,
    pub loss_percentage: Decimal,
    /// Fixed lifetime for plans; `None` for open-ended symbols.
    pub duration_ms: Option<i64>,
    pub volatility_percentage: Decimal,
    pub outcome_mode: OutcomeMode,
    pub min_exposure: Decimal,
    pub max_exposure: Decimal,
    pub max_leverage: Decimal,
    pub updated_at: TimeMs,
}

impl TradableConfig {
    pub fn is_fixed_duration(&self) -> bool {
        self.duration_ms.is_some()
    }

    /// Check the cross-field rules an administrator edit must satisfy.
    pub fn validate(&self) -> Result<(), TradableConfigError> {
        let invalid = |msg: &str| Err(TradableConfigError::Invalid(msg.to_string()));

        if self.name.trim().is_empty() {
            return invalid("name must not be empty");
        }
        match (self.kind, self.duration_ms) {
            (TradableKind::Plan, None) => return invalid("plans require a duration"),
            (TradableKind::Plan, Some(ms)) if ms <= 0 => {
                return invalid("duration must be positive")
            }
            (TradableKind::Symbol, Some(_)) => return invalid("symbols are open-ended"),
            _ => {}
        }
        let max_percentage = Decimal::from(MAX_PERCENTAGE);
        if self.roi_or_profit_percentage.is_negative()
            || self.roi_or_profit_percentage > max_percentage
        {
            return invalid("roi_or_profit_percentage must be within [0, 10000]");
        }
        if self.loss_percentage.is_negative() || self.loss_percentage > Decimal::hundred() {
            return invalid("loss_percentage must be within [0, 100]");
        }
        if self.volatility_percentage.is_negative() || self.volatility_percentage > max_percentage {
            return invalid("volatility_percentage must be within [0, 10000]");
        }
        if !self.min_exposure.is_positive() || self.max_exposure < self.min_exposure {
            return invalid("exposure bounds must satisfy 0 < min <= max");
        }
        if self.max_exposure > Decimal::max_amount() {
            return invalid("max_exposure must not exceed 1000000000000000");
        }
        if self.max_leverage < Decimal::one() || self.max_leverage > Decimal::from(MAX_LEVERAGE) {
            return invalid("max_leverage must be within [1, 1000]");
        }
        if self.kind == TradableKind::Plan && self.max_leverage != Decimal::one() {
            return invalid("plans cannot be leveraged");
        }
        Ok(())
    }
}
