use crate::domain::Wallet;
use crate::engine::SchedulerConfig;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub scheduler: SchedulerConfig,
    /// Wallet credited with principal plus P&L when a plan matures.
    pub maturity_credit_wallet: Wallet,
    /// Seed for the auto-mode market walk; entropy when unset.
    pub market_seed: Option<u64>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let coarse_secs = parse_secs(&env_map, "SCHEDULER_COARSE_INTERVAL_SECS", 60)?;
        let fine_secs = parse_secs(&env_map, "SCHEDULER_FINE_INTERVAL_SECS", 10)?;
        let threshold_secs = parse_secs(&env_map, "SCHEDULER_FINE_THRESHOLD_SECS", 3600)?;
        if fine_secs > coarse_secs {
            return Err(ConfigError::InvalidValue(
                "SCHEDULER_FINE_INTERVAL_SECS".to_string(),
                format!(
                    "must not exceed SCHEDULER_COARSE_INTERVAL_SECS ({}), got {}",
                    coarse_secs, fine_secs
                ),
            ));
        }

        let maturity_credit_wallet = match env_map
            .get("MATURITY_CREDIT_WALLET")
            .map(|s| s.as_str())
            .unwrap_or("profit")
        {
            "profit" => Wallet::Profit,
            "trading" => Wallet::Trading,
            other => {
                return Err(ConfigError::InvalidValue(
                    "MATURITY_CREDIT_WALLET".to_string(),
                    format!("must be profit or trading, got {}", other),
                ))
            }
        };

        let market_seed = env_map
            .get("MARKET_SEED")
            .map(|s| {
                s.trim().parse::<u64>().map_err(|_| {
                    ConfigError::InvalidValue(
                        "MARKET_SEED".to_string(),
                        "must be a valid u64".to_string(),
                    )
                })
            })
            .transpose()?;

        Ok(Config {
            port,
            database_path,
            scheduler: SchedulerConfig {
                coarse_interval: Duration::from_secs(coarse_secs),
                fine_interval: Duration::from_secs(fine_secs),
                fine_threshold: Duration::from_secs(threshold_secs),
            },
            maturity_credit_wallet,
            market_seed,
        })
    }
}

fn parse_secs(
    env_map: &HashMap<String, String>,
    key: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    let secs = match env_map.get(key) {
        Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
            ConfigError::InvalidValue(key.to_string(), "must be a whole number of seconds".to_string())
        })?,
        None => default,
    };
    if secs == 0 {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(secs)
}
