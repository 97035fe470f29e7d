//! Domain primitives: TimeMs, identifiers, Wallet.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

pub const MS_PER_MINUTE: i64 = 60_000;

/// Time in milliseconds since Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeMs(pub i64);

impl TimeMs {
    /// Create a TimeMs from milliseconds.
    pub fn new(ms: i64) -> Self {
        TimeMs(ms)
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        TimeMs(chrono::Utc::now().timestamp_millis())
    }

    /// Get the underlying milliseconds value.
    pub fn as_ms(&self) -> i64 {
        self.0
    }

    pub fn plus_ms(&self, ms: i64) -> Self {
        TimeMs(self.0.saturating_add(ms))
    }

    /// Milliseconds from `earlier` to `self`, floored at zero.
    pub fn ms_since(&self, earlier: TimeMs) -> i64 {
        self.0.saturating_sub(earlier.0).max(0)
    }
}

impl fmt::Display for TimeMs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdParseError {
    #[error("identifier must not be empty")]
    Empty,
    #[error("invalid uuid: {0}")]
    Uuid(String),
}

/// Owner of a wallet set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        AccountId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccountId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(IdParseError::Empty);
        }
        Ok(AccountId(trimmed.to_string()))
    }
}

/// Identifier of an investment plan or trading symbol (e.g. "gold-plan", "BTCUSD").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TradableId(pub String);

impl TradableId {
    pub fn new(id: impl Into<String>) -> Self {
        TradableId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TradableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TradableId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(IdParseError::Empty);
        }
        Ok(TradableId(trimmed.to_string()))
    }
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn generate() -> Self {
                $name(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map($name)
                    .map_err(|e| IdParseError::Uuid(e.to_string()))
            }
        }
    };
}

uuid_id!(
    /// Identifier of a funded position.
    PositionId
);
uuid_id!(
    /// Identifier of a journal entry.
    EntryId
);

/// One of the three sub-balances of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Wallet {
    Deposit,
    Trading,
    Profit,
}

impl Wallet {
    pub fn as_str(&self) -> &'static str {
        match self {
            Wallet::Deposit => "deposit",
            Wallet::Trading => "trading",
            Wallet::Profit => "profit",
        }
    }
}

impl fmt::Display for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown wallet: {0}")]
pub struct UnknownWallet(pub String);

impl FromStr for Wallet {
    type Err = UnknownWallet;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deposit" => Ok(Wallet::Deposit),
            "trading" => Ok(Wallet::Trading),
            "profit" => Ok(Wallet::Profit),
            other => Err(UnknownWallet(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_roundtrip_through_str() {
        for wallet in [Wallet::Deposit, Wallet::Trading, Wallet::Profit] {
            assert_eq!(Wallet::from_str(wallet.as_str()).unwrap(), wallet);
        }
        assert!(Wallet::from_str("savings").is_err());
    }

    #[test]
    fn test_wallet_serialization() {
        let json = serde_json::to_string(&Wallet::Profit).unwrap();
        assert_eq!(json, "\"profit\"");
    }

    #[test]
    fn test_account_id_rejects_blank() {
        assert_eq!(AccountId::from_str("  "), Err(IdParseError::Empty));
        assert_eq!(AccountId::from_str(" alice ").unwrap().as_str(), "alice");
    }

    #[test]
    fn test_position_id_parse() {
        let id = PositionId::generate();
        assert_eq!(PositionId::from_str(&id.to_string()).unwrap(), id);
        assert!(PositionId::from_str("nope").is_err());
    }

    #[test]
    fn test_timems_ms_since_floors_at_zero() {
        let t1 = TimeMs::new(1000);
        let t2 = TimeMs::new(2500);
        assert_eq!(t2.ms_since(t1), 1500);
        assert_eq!(t1.ms_since(t2), 0);
        assert!(t1 < t2);
    }
}
