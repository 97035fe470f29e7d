use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::{parse_account_id, parse_decimal, parse_entry_id, AccountDto, AppState};
use crate::domain::{LedgerEntry, Wallet};
use crate::engine::ResolveOutcome;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositRequest {
    pub amount: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    pub wallet: Wallet,
    pub amount: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectRequest {
    pub reason: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryDto {
    pub id: String,
    pub owner: String,
    pub kind: String,
    pub wallet: String,
    /// Signed: positive credits `wallet`, negative debits it.
    pub amount: String,
    pub status: String,
    pub description: String,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<i64>,
}

impl From<LedgerEntry> for EntryDto {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            owner: entry.owner.to_string(),
            kind: entry.kind.as_str().to_string(),
            wallet: entry.wallet.as_str().to_string(),
            amount: entry.amount.to_canonical_string(),
            status: entry.status.as_str().to_string(),
            description: entry.description,
            created_at: entry.created_at.as_ms(),
            rejection_reason: entry.rejection_reason,
            resolved_at: entry.resolved_at.map(|t| t.as_ms()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveResponse {
    /// `resolved` when this request performed the transition, `already_resolved` otherwise.
    pub outcome: &'static str,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<EntryDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<AccountDto>,
}

impl From<ResolveOutcome> for ResolveResponse {
    fn from(outcome: ResolveOutcome) -> Self {
        match outcome {
            ResolveOutcome::Resolved { entry, account } => Self {
                outcome: "resolved",
                status: entry.status.as_str().to_string(),
                entry: Some(EntryDto::from(entry)),
                account: Some(AccountDto::from(&account)),
            },
            ResolveOutcome::AlreadyResolved(status) => Self {
                outcome: "already_resolved",
                status: status.as_str().to_string(),
                entry: None,
                account: None,
            },
        }
    }
}

pub async fn history(
    Path(account_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<EntryDto>>, AppError> {
    let owner = parse_account_id(&account_id)?;
    let entries = state.journal.history(&owner).await?;
    Ok(Json(entries.into_iter().map(EntryDto::from).collect()))
}

pub async fn request_deposit(
    Path(account_id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<DepositRequest>,
) -> Result<(StatusCode, Json<EntryDto>), AppError> {
    let owner = parse_account_id(&account_id)?;
    let amount = parse_decimal("amount", &body.amount)?;
    let entry = state
        .journal
        .request_deposit(&owner, amount, body.description)
        .await?;
    Ok((StatusCode::CREATED, Json(EntryDto::from(entry))))
}

pub async fn request_withdrawal(
    Path(account_id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<WithdrawalRequest>,
) -> Result<(StatusCode, Json<EntryDto>), AppError> {
    let owner = parse_account_id(&account_id)?;
    let amount = parse_decimal("amount", &body.amount)?;
    let entry = state
        .journal
        .request_withdrawal(&owner, body.wallet, amount, body.description)
        .await?;
    Ok((StatusCode::CREATED, Json(EntryDto::from(entry))))
}

pub async fn approve_entry(
    Path(entry_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ResolveResponse>, AppError> {
    let id = parse_entry_id(&entry_id)?;
    let outcome = state.journal.approve(&id).await?;
    Ok(Json(ResolveResponse::from(outcome)))
}

pub async fn reject_entry(
    Path(entry_id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<RejectRequest>,
) -> Result<Json<ResolveResponse>, AppError> {
    let id = parse_entry_id(&entry_id)?;
    let outcome = state.journal.reject(&id, body.reason).await?;
    Ok(Json(ResolveResponse::from(outcome)))
}
