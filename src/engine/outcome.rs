//! Outcome resolver: realized or unrealized P&L for an exposure.
//!
//! Forced modes are pure functions of `(terms, exposure, leverage, elapsed)`
//! so a displayed unrealized figure and the later settled figure agree.
//! Auto mode on symbols draws from a [`MarketSimulator`] and may differ
//! between observations; the value is frozen by storing it at settlement.

use crate::domain::{Decimal, OutcomeMode, PositionTerms, TradableKind, MS_PER_MINUTE};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Fraction of exposure lost per elapsed minute under `force_loss`, before leverage.
pub fn forced_loss_rate_per_minute() -> Decimal {
    Decimal::from(2) / Decimal::from(10_000)
}

/// Upper bound on random-walk steps per observation.
const MAX_WALK_STEPS: i64 = 60;

/// Produces the percentage move of a symbol over an elapsed period.
pub trait MarketSimulator: Send + Sync + fmt::Debug {
    /// A percentage within `[-volatility, volatility]`.
    fn drift_percentage(&self, volatility: Decimal, elapsed_ms: i64) -> Decimal;
}

/// Bounded random walk: up to [`MAX_WALK_STEPS`] uniform steps of at most a
/// tenth of the volatility each, clamped to the volatility band after every step.
#[derive(Debug)]
pub struct RandomWalk {
    rng: Mutex<StdRng>,
}

impl RandomWalk {
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl MarketSimulator for RandomWalk {
    fn drift_percentage(&self, volatility: Decimal, elapsed_ms: i64) -> Decimal {
        let band = volatility.to_f64_lossy();
        if band <= 0.0 {
            return Decimal::zero();
        }
        let steps = (elapsed_ms / MS_PER_MINUTE).clamp(1, MAX_WALK_STEPS);
        let step_bound = band / 10.0;

        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut pct = 0.0_f64;
        for _ in 0..steps {
            pct = (pct + rng.gen_range(-step_bound..=step_bound)).clamp(-band, band);
        }
        Decimal::from_f64_lossy(pct).min(volatility).max(-volatility)
    }
}

/// The P&L for these inputs does not fit the money type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("P&L for exposure {exposure} at leverage {leverage} is out of range")]
pub struct PnlOverflow {
    pub exposure: Decimal,
    pub leverage: Decimal,
}

#[derive(Debug, Clone)]
pub struct OutcomeResolver {
    simulator: Arc<dyn MarketSimulator>,
}

impl OutcomeResolver {
    pub fn new(simulator: Arc<dyn MarketSimulator>) -> Self {
        Self { simulator }
    }

    /// P&L for `exposure` after `elapsed_ms` under `mode`.
    ///
    /// The result never loses more than the exposure itself and is rounded
    /// to money scale.
    pub fn resolve(
        &self,
        terms: &PositionTerms,
        mode: OutcomeMode,
        exposure: Decimal,
        leverage: Decimal,
        elapsed_ms: i64,
    ) -> Result<Decimal, PnlOverflow> {
        let elapsed_ms = elapsed_ms.max(0);
        let pnl = match (mode, terms.kind) {
            (OutcomeMode::ForceProfit, _) | (OutcomeMode::Auto, TradableKind::Plan) => {
                exposure.checked_percent(terms.roi_or_profit_percentage)
            }
            (OutcomeMode::ForceLoss, _) => {
                let fraction = forced_loss_fraction(terms.loss_percentage, leverage, elapsed_ms);
                exposure.checked_mul(fraction).map(|loss| -loss)
            }
            (OutcomeMode::Auto, TradableKind::Symbol) => {
                let pct = self
                    .simulator
                    .drift_percentage(terms.volatility_percentage, elapsed_ms);
                exposure
                    .checked_mul(leverage)
                    .and_then(|notional| notional.checked_percent(pct))
            }
        };
        let pnl = pnl.ok_or(PnlOverflow { exposure, leverage })?;
        Ok(pnl.max(-exposure).round_money())
    }
}

/// Loss fraction under `force_loss`: the per-minute rate scaled by leverage,
/// capped at `loss_percentage / 100`. The cap is never scaled.
pub fn forced_loss_fraction(loss_percentage: Decimal, leverage: Decimal, elapsed_ms: i64) -> Decimal {
    let cap = loss_percentage / Decimal::hundred();
    let minutes = Decimal::from(elapsed_ms.max(0)) / Decimal::from(MS_PER_MINUTE);
    // An accrual too large to represent is past any cap.
    let accrued = minutes
        .checked_mul(forced_loss_rate_per_minute())
        .and_then(|rate| rate.checked_mul(leverage.max(Decimal::one())))
        .unwrap_or(cap);
    accrued.min(cap).max(Decimal::zero())
}
