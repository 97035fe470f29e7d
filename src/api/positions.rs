use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::{
    parse_account_id, parse_decimal, parse_position_id, parse_tradable_id, AccountDto, AppState,
};
use crate::engine::{CloseOutcome, OpenRequest, PositionView};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPositionRequest {
    pub tradable_id: String,
    pub amount: String,
    pub leverage: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionDto {
    pub id: String,
    pub owner: String,
    pub tradable_id: String,
    pub kind: String,
    pub status: String,
    pub amount_invested: String,
    pub leverage: String,
    pub roi_or_profit_percentage: String,
    pub loss_percentage: String,
    pub volatility_percentage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    pub opened_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closes_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_pnl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realized_pnl: Option<String>,
    pub unrealized_pnl: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_remaining_ms: Option<i64>,
}

impl From<PositionView> for PositionDto {
    fn from(view: PositionView) -> Self {
        let p = view.position;
        Self {
            id: p.id.to_string(),
            owner: p.owner.to_string(),
            tradable_id: p.tradable_id.to_string(),
            kind: p.terms.kind.as_str().to_string(),
            status: p.status.as_str().to_string(),
            amount_invested: p.amount_invested.to_canonical_string(),
            leverage: p.leverage.to_canonical_string(),
            roi_or_profit_percentage: p.terms.roi_or_profit_percentage.to_canonical_string(),
            loss_percentage: p.terms.loss_percentage.to_canonical_string(),
            volatility_percentage: p.terms.volatility_percentage.to_canonical_string(),
            duration_ms: p.terms.duration_ms,
            opened_at: p.opened_at.as_ms(),
            closes_at: p.closes_at.map(|t| t.as_ms()),
            closed_at: p.closed_at.map(|t| t.as_ms()),
            expected_pnl: p.expected_pnl.map(|d| d.to_canonical_string()),
            realized_pnl: p.realized_pnl.map(|d| d.to_canonical_string()),
            unrealized_pnl: view.unrealized_pnl.to_canonical_string(),
            time_remaining_ms: view.time_remaining_ms,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseResponse {
    /// `closed` when this request performed the transition, `already_closed` otherwise.
    pub outcome: &'static str,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<PositionDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<AccountDto>,
}

async fn close_response(state: &AppState, outcome: CloseOutcome) -> Result<CloseResponse, AppError> {
    Ok(match outcome {
        CloseOutcome::Closed { position, account } => {
            let status = position.status.as_str().to_string();
            let view = state.lifecycle.view(position).await?;
            CloseResponse {
                outcome: "closed",
                status,
                position: Some(PositionDto::from(view)),
                account: Some(AccountDto::from(&account)),
            }
        }
        CloseOutcome::AlreadyClosed(status) => CloseResponse {
            outcome: "already_closed",
            status: status.as_str().to_string(),
            position: None,
            account: None,
        },
    })
}

pub async fn open_position(
    Path(account_id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<OpenPositionRequest>,
) -> Result<(StatusCode, Json<PositionDto>), AppError> {
    let owner = parse_account_id(&account_id)?;
    let tradable_id = parse_tradable_id(&body.tradable_id)?;
    let amount = parse_decimal("amount", &body.amount)?;
    let leverage = body
        .leverage
        .as_deref()
        .map(|raw| parse_decimal("leverage", raw))
        .transpose()?;

    let position = state
        .lifecycle
        .open(OpenRequest {
            owner,
            tradable_id,
            amount,
            leverage,
        })
        .await?;
    let view = state.lifecycle.view(position).await?;
    Ok((StatusCode::CREATED, Json(PositionDto::from(view))))
}

pub async fn list_positions(
    Path(account_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<PositionDto>>, AppError> {
    let owner = parse_account_id(&account_id)?;
    state.journal.account(&owner).await?;

    let positions = state.lifecycle.list_for(&owner).await?;
    let mut dtos = Vec::with_capacity(positions.len());
    for position in positions {
        dtos.push(PositionDto::from(state.lifecycle.view(position).await?));
    }
    Ok(Json(dtos))
}

pub async fn get_position(
    Path(position_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<PositionDto>, AppError> {
    let id = parse_position_id(&position_id)?;
    let position = state.lifecycle.get(&id).await?;
    Ok(Json(PositionDto::from(state.lifecycle.view(position).await?)))
}

pub async fn cancel_position(
    Path((account_id, position_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<CloseResponse>, AppError> {
    let owner = parse_account_id(&account_id)?;
    let id = parse_position_id(&position_id)?;
    let outcome = state.lifecycle.cancel(&id, &owner).await?;
    Ok(Json(close_response(&state, outcome).await?))
}

/// Manual close of an open-ended trade at its current P&L.
pub async fn close_position(
    Path((account_id, position_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<CloseResponse>, AppError> {
    let owner = parse_account_id(&account_id)?;
    let id = parse_position_id(&position_id)?;
    let outcome = state.lifecycle.close_trade(&id, &owner).await?;
    Ok(Json(close_response(&state, outcome).await?))
}

/// Settle a matured plan now instead of waiting for the scheduler.
pub async fn settle_position(
    Path(position_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<CloseResponse>, AppError> {
    let id = parse_position_id(&position_id)?;
    let outcome = state.lifecycle.settle_at_maturity(&id).await?;
    Ok(Json(close_response(&state, outcome).await?))
}
