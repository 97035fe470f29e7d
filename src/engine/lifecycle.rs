//! Position lifecycle: `active -> {matured, cancelled}`, each transition exactly once.
//!
//! Every terminal transition goes through [`Store::close_position`], whose
//! status compare-and-swap adjudicates races between schedulers, manual
//! closes and cancellations. Losing that race is reported as
//! [`CloseOutcome::AlreadyClosed`], never as an error.

use super::{Clock, EngineError, OutcomeResolver};
use crate::domain::{
    Account, AccountId, Decimal, EntryKind, LedgerEntry, OutcomeMode, Position, PositionId,
    PositionStatus, PositionTerms, TimeMs, TradableId, TradableKind, Wallet,
};
use crate::store::{CloseResult, PositionClose, Store};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRequest {
    pub owner: AccountId,
    pub tradable_id: TradableId,
    pub amount: Decimal,
    /// Only meaningful for symbols; plans always run at 1x.
    pub leverage: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseOutcome {
    Closed { position: Position, account: Account },
    /// The position had already left `active`; nothing was credited.
    AlreadyClosed(PositionStatus),
}

/// Read-only presentation of a position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionView {
    pub position: Position,
    pub time_remaining_ms: Option<i64>,
    pub unrealized_pnl: Decimal,
}

/// Milliseconds until a fixed-duration position closes, floored at zero.
///
/// `None` for open-ended positions. Terminal positions report zero.
pub fn time_remaining_ms(position: &Position, now: TimeMs) -> Option<i64> {
    let closes_at = position.closes_at?;
    if position.status.is_terminal() {
        return Some(0);
    }
    Some(closes_at.ms_since(now))
}

#[derive(Debug, Clone)]
pub struct PositionLifecycle {
    store: Arc<dyn Store>,
    resolver: OutcomeResolver,
    clock: Arc<dyn Clock>,
    maturity_wallet: Wallet,
}

impl PositionLifecycle {
    pub fn new(
        store: Arc<dyn Store>,
        resolver: OutcomeResolver,
        clock: Arc<dyn Clock>,
        maturity_wallet: Wallet,
    ) -> Self {
        Self {
            store,
            resolver,
            clock,
            maturity_wallet,
        }
    }

    /// Reserve funds from the trading wallet and create an active position.
    ///
    /// # Errors
    /// `InvalidExposure`, `InvalidLeverage` and `InsufficientFunds` are
    /// returned before anything is written. The reservation itself is
    /// re-checked inside the store transaction, so two racing opens cannot
    /// both spend the same balance.
    pub async fn open(&self, request: OpenRequest) -> Result<Position, EngineError> {
        if !request.amount.is_positive() || request.amount > Decimal::max_amount() {
            return Err(EngineError::InvalidAmount(format!(
                "position amount must be within (0, {}], got {}",
                Decimal::max_amount(),
                request.amount
            )));
        }

        let config = self
            .store
            .get_tradable(&request.tradable_id)
            .await?
            .ok_or_else(|| EngineError::TradableNotFound(request.tradable_id.clone()))?;

        if request.amount < config.min_exposure || request.amount > config.max_exposure {
            return Err(EngineError::InvalidExposure {
                amount: request.amount,
                min: config.min_exposure,
                max: config.max_exposure,
            });
        }

        let leverage = match (config.kind, request.leverage) {
            (_, None) => Decimal::one(),
            (TradableKind::Plan, Some(l)) if l != Decimal::one() => {
                return Err(EngineError::InvalidLeverage {
                    leverage: l,
                    max: Decimal::one(),
                })
            }
            (_, Some(l)) if l < Decimal::one() || l > config.max_leverage => {
                return Err(EngineError::InvalidLeverage {
                    leverage: l,
                    max: config.max_leverage,
                })
            }
            (_, Some(l)) => l,
        };

        let account = self
            .store
            .get_account(&request.owner)
            .await?
            .ok_or_else(|| EngineError::AccountNotFound(request.owner.clone()))?;
        if request.amount > account.trading_balance {
            return Err(EngineError::InsufficientFunds {
                wallet: Wallet::Trading,
                requested: request.amount,
                available: account.trading_balance,
            });
        }

        let now = self.clock.now();
        let terms = PositionTerms::capture(&config);
        let closes_at = terms.duration_ms.map(|ms| now.plus_ms(ms));
        let expected_pnl = terms
            .duration_ms
            .map(|ms| {
                self.resolver
                    .resolve(&terms, config.outcome_mode, request.amount, leverage, ms)
            })
            .transpose()?;

        let position = Position {
            id: PositionId::generate(),
            owner: request.owner.clone(),
            tradable_id: config.id.clone(),
            terms,
            amount_invested: request.amount,
            leverage,
            opened_at: now,
            closes_at,
            expected_pnl,
            realized_pnl: None,
            status: PositionStatus::Active,
            closed_at: None,
        };
        let funding = LedgerEntry::completed(
            request.owner.clone(),
            EntryKind::Transfer,
            Wallet::Trading,
            -request.amount,
            format!("Opened {} position {}", config.name, position.id),
            now,
        );

        let account = self.store.open_position(&position, &funding).await?;

        info!(
            position_id = %position.id,
            owner = %position.owner,
            tradable = %position.tradable_id,
            amount = %position.amount_invested,
            trading_balance = %account.trading_balance,
            "Position opened"
        );
        Ok(position)
    }

    /// Settle a fixed-duration position whose closing time has passed.
    ///
    /// Credits principal plus the P&L resolved over the full duration to the
    /// configured maturity wallet. Re-invoking on a settled position is a no-op.
    pub async fn settle_at_maturity(&self, id: &PositionId) -> Result<CloseOutcome, EngineError> {
        let result = async {
            let position = self.load_active(id).await?;
            let (closes_at, duration_ms) = match (position.closes_at, position.terms.duration_ms) {
                (Some(closes_at), Some(duration_ms)) => (closes_at, duration_ms),
                _ => {
                    return Err(EngineError::Unsupported(format!(
                        "position {} is open-ended and settles only on manual close",
                        id
                    )))
                }
            };
            let now = self.clock.now();
            if now < closes_at {
                return Err(EngineError::NotMatured { id: *id, closes_at });
            }

            let mode = self.live_mode(&position).await?;
            let pnl = self.resolver.resolve(
                &position.terms,
                mode,
                position.amount_invested,
                position.leverage,
                duration_ms,
            )?;
            self.finish(
                &position,
                PositionStatus::Matured,
                pnl,
                self.maturity_wallet,
                format!("Matured position {} ({})", position.id, mode),
                now,
            )
            .await
        }
        .await;
        already_handled_is_ok(result)
    }

    /// Cancel an active position, returning only its principal.
    ///
    /// Any unrealized profit is forfeited: `realized_pnl` is recorded as zero.
    /// Plans cannot be cancelled once their closing time has been reached.
    pub async fn cancel(
        &self,
        id: &PositionId,
        owner: &AccountId,
    ) -> Result<CloseOutcome, EngineError> {
        let result = async {
            let position = self.load_owned_active(id, owner).await?;
            let now = self.clock.now();
            if let Some(closes_at) = position.closes_at {
                if now >= closes_at {
                    return Err(EngineError::MaturityReached { id: *id, closes_at });
                }
            }
            self.finish(
                &position,
                PositionStatus::Cancelled,
                Decimal::zero(),
                Wallet::Trading,
                format!("Cancelled position {}", position.id),
                now,
            )
            .await
        }
        .await;
        already_handled_is_ok(result)
    }

    /// Manually close an open-ended trade at its current P&L.
    pub async fn close_trade(
        &self,
        id: &PositionId,
        owner: &AccountId,
    ) -> Result<CloseOutcome, EngineError> {
        let result = async {
            let position = self.load_owned_active(id, owner).await?;
            if position.is_fixed_duration() {
                return Err(EngineError::Unsupported(format!(
                    "position {} has a fixed duration; cancel it or wait for maturity",
                    id
                )));
            }
            let now = self.clock.now();
            let mode = self.live_mode(&position).await?;
            let pnl = self.resolver.resolve(
                &position.terms,
                mode,
                position.amount_invested,
                position.leverage,
                now.ms_since(position.opened_at),
            )?;
            self.finish(
                &position,
                PositionStatus::Matured,
                pnl,
                Wallet::Trading,
                format!("Closed trade {} ({})", position.id, mode),
                now,
            )
            .await
        }
        .await;
        already_handled_is_ok(result)
    }

    /// Current P&L of a position without mutating anything.
    ///
    /// Terminal positions report their frozen realized P&L.
    pub async fn unrealized_pnl(&self, position: &Position) -> Result<Decimal, EngineError> {
        if position.status.is_terminal() {
            return Ok(position.realized_pnl.unwrap_or_default());
        }
        let mode = self.live_mode(position).await?;
        let elapsed = self.clock.now().ms_since(position.opened_at);
        let elapsed = match position.terms.duration_ms {
            Some(duration_ms) => elapsed.min(duration_ms),
            None => elapsed,
        };
        Ok(self.resolver.resolve(
            &position.terms,
            mode,
            position.amount_invested,
            position.leverage,
            elapsed,
        )?)
    }

    pub async fn view(&self, position: Position) -> Result<PositionView, EngineError> {
        let unrealized_pnl = self.unrealized_pnl(&position).await?;
        Ok(PositionView {
            time_remaining_ms: time_remaining_ms(&position, self.clock.now()),
            unrealized_pnl,
            position,
        })
    }

    pub async fn get(&self, id: &PositionId) -> Result<Position, EngineError> {
        self.store
            .get_position(id)
            .await?
            .ok_or(EngineError::PositionNotFound(*id))
    }

    pub async fn list_for(&self, owner: &AccountId) -> Result<Vec<Position>, EngineError> {
        Ok(self.store.list_positions(owner).await?)
    }

    /// Outcome mode from the live tradable config, falling back to the mode
    /// captured at open if the tradable no longer exists.
    async fn live_mode(&self, position: &Position) -> Result<OutcomeMode, EngineError> {
        Ok(self
            .store
            .get_tradable(&position.tradable_id)
            .await?
            .map(|config| config.outcome_mode)
            .unwrap_or(position.terms.outcome_mode_at_open))
    }

    async fn load_active(&self, id: &PositionId) -> Result<Position, EngineError> {
        let position = self.get(id).await?;
        if !position.is_active() {
            return Err(EngineError::InvalidTransition {
                id: *id,
                status: position.status,
            });
        }
        Ok(position)
    }

    async fn load_owned_active(
        &self,
        id: &PositionId,
        owner: &AccountId,
    ) -> Result<Position, EngineError> {
        let position = self.get(id).await?;
        if &position.owner != owner {
            return Err(EngineError::PositionNotFound(*id));
        }
        if !position.is_active() {
            return Err(EngineError::InvalidTransition {
                id: *id,
                status: position.status,
            });
        }
        Ok(position)
    }

    async fn finish(
        &self,
        position: &Position,
        status: PositionStatus,
        realized_pnl: Decimal,
        wallet: Wallet,
        description: String,
        now: TimeMs,
    ) -> Result<CloseOutcome, EngineError> {
        let credit_amount = position
            .amount_invested
            .checked_add(realized_pnl)
            .ok_or_else(|| {
                EngineError::InvalidAmount(format!(
                    "credit for position {} is out of range",
                    position.id
                ))
            })?
            .max(Decimal::zero());
        let close = PositionClose {
            position_id: position.id,
            status,
            realized_pnl,
            closed_at: now,
            credit: LedgerEntry::completed(
                position.owner.clone(),
                EntryKind::Settlement,
                wallet,
                credit_amount,
                description,
                now,
            ),
        };

        match self.store.close_position(&close).await? {
            CloseResult::Closed { position, account } => {
                info!(
                    position_id = %position.id,
                    owner = %position.owner,
                    status = %position.status,
                    realized_pnl = %realized_pnl,
                    credited = %credit_amount,
                    wallet = %wallet,
                    total_balance = %account.total_balance(),
                    "Position closed"
                );
                Ok(CloseOutcome::Closed { position, account })
            }
            CloseResult::AlreadyClosed(status) => Err(EngineError::ConcurrentSettlementLost {
                id: position.id,
                status,
            }),
            CloseResult::Missing => Err(EngineError::PositionNotFound(position.id)),
        }
    }
}

/// "Someone already did this" is success with nothing to do.
fn already_handled_is_ok(
    result: Result<CloseOutcome, EngineError>,
) -> Result<CloseOutcome, EngineError> {
    match result {
        Err(EngineError::InvalidTransition { id, status }) => {
            debug!(position_id = %id, status = %status, "Position already terminal, nothing to do");
            Ok(CloseOutcome::AlreadyClosed(status))
        }
        Err(EngineError::ConcurrentSettlementLost { id, status }) => {
            debug!(position_id = %id, status = %status, "Lost close race, nothing to do");
            Ok(CloseOutcome::AlreadyClosed(status))
        }
        other => other,
    }
}
