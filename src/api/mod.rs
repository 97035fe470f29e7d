pub mod accounts;
pub mod health;
pub mod ledger;
pub mod positions;
pub mod tradables;

use crate::domain::{Account, AccountId, Decimal, EntryId, PositionId, TradableId};
use crate::engine::{Clock, PositionLifecycle, TransactionJournal};
use crate::error::AppError;
use crate::store::Store;
use axum::{
    routing::{get, post, put},
    Router,
};
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub lifecycle: PositionLifecycle,
    pub journal: TransactionJournal,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        lifecycle: PositionLifecycle,
        journal: TransactionJournal,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            lifecycle,
            journal,
            clock,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/accounts", post(accounts::create_account))
        .route("/v1/accounts/:account_id", get(accounts::get_account))
        .route(
            "/v1/accounts/:account_id/transfers",
            post(accounts::transfer),
        )
        .route(
            "/v1/accounts/:account_id/positions",
            get(positions::list_positions).post(positions::open_position),
        )
        .route(
            "/v1/accounts/:account_id/positions/:position_id/cancel",
            post(positions::cancel_position),
        )
        .route(
            "/v1/accounts/:account_id/positions/:position_id/close",
            post(positions::close_position),
        )
        .route("/v1/positions/:position_id", get(positions::get_position))
        .route("/v1/accounts/:account_id/ledger", get(ledger::history))
        .route(
            "/v1/accounts/:account_id/deposits",
            post(ledger::request_deposit),
        )
        .route(
            "/v1/accounts/:account_id/withdrawals",
            post(ledger::request_withdrawal),
        )
        .route("/v1/tradables", get(tradables::list_tradables))
        .route(
            "/v1/admin/tradables/:tradable_id",
            put(tradables::upsert_tradable),
        )
        .route(
            "/v1/admin/positions/:position_id/settle",
            post(positions::settle_position),
        )
        .route(
            "/v1/admin/ledger/:entry_id/approve",
            post(ledger::approve_entry),
        )
        .route(
            "/v1/admin/ledger/:entry_id/reject",
            post(ledger::reject_entry),
        )
        .layer(cors)
        .with_state(state)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDto {
    pub id: String,
    pub deposit_balance: String,
    pub trading_balance: String,
    pub profit_balance: String,
    pub total_balance: String,
    pub created_at: i64,
}

impl From<&Account> for AccountDto {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.to_string(),
            deposit_balance: account.deposit_balance.to_canonical_string(),
            trading_balance: account.trading_balance.to_canonical_string(),
            profit_balance: account.profit_balance.to_canonical_string(),
            total_balance: account.total_balance().to_canonical_string(),
            created_at: account.created_at.as_ms(),
        }
    }
}

pub(crate) fn parse_account_id(raw: &str) -> Result<AccountId, AppError> {
    AccountId::from_str(raw).map_err(|_| AppError::BadRequest("Invalid account id".into()))
}

pub(crate) fn parse_position_id(raw: &str) -> Result<PositionId, AppError> {
    PositionId::from_str(raw).map_err(|_| AppError::BadRequest("Invalid position id".into()))
}

pub(crate) fn parse_entry_id(raw: &str) -> Result<EntryId, AppError> {
    EntryId::from_str(raw).map_err(|_| AppError::BadRequest("Invalid ledger entry id".into()))
}

pub(crate) fn parse_tradable_id(raw: &str) -> Result<TradableId, AppError> {
    TradableId::from_str(raw).map_err(|_| AppError::BadRequest("Invalid tradable id".into()))
}

pub(crate) fn parse_decimal(field: &str, raw: &str) -> Result<Decimal, AppError> {
    Decimal::from_str_canonical(raw)
        .map_err(|_| AppError::BadRequest(format!("{} must be a decimal string", field)))
}
