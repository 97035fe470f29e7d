use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::api::{parse_account_id, parse_decimal, AccountDto, AppState};
use crate::domain::Wallet;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    pub account_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub from: Wallet,
    pub to: Wallet,
    pub amount: String,
}

pub async fn create_account(
    State(state): State<AppState>,
    Json(body): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<AccountDto>), AppError> {
    let id = parse_account_id(&body.account_id)?;
    let account = state.journal.create_account(id).await?;
    Ok((StatusCode::CREATED, Json(AccountDto::from(&account))))
}

pub async fn get_account(
    Path(account_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AccountDto>, AppError> {
    let id = parse_account_id(&account_id)?;
    let account = state.journal.account(&id).await?;
    Ok(Json(AccountDto::from(&account)))
}

/// Move funds between the caller's own wallets.
pub async fn transfer(
    Path(account_id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<TransferRequest>,
) -> Result<Json<AccountDto>, AppError> {
    let owner = parse_account_id(&account_id)?;
    let amount = parse_decimal("amount", &body.amount)?;
    let account = state
        .journal
        .transfer(&owner, body.from, body.to, amount)
        .await?;
    Ok(Json(AccountDto::from(&account)))
}
