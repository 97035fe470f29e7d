use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::{parse_decimal, parse_tradable_id, AppState};
use crate::domain::{Decimal, OutcomeMode, TradableConfig, TradableKind};
use crate::error::AppError;

/// Administrator edit of a plan or symbol. Omitted optional fields take the
/// defaults shown on each field.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradableRequest {
    pub name: String,
    pub kind: TradableKind,
    pub roi_or_profit_percentage: String,
    pub loss_percentage: String,
    /// Required for plans, absent for symbols.
    pub duration_ms: Option<i64>,
    /// Defaults to 0.
    pub volatility_percentage: Option<String>,
    /// Defaults to `auto`.
    pub outcome_mode: Option<OutcomeMode>,
    pub min_exposure: String,
    pub max_exposure: String,
    /// Defaults to 1.
    pub max_leverage: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradableDto {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub roi_or_profit_percentage: String,
    pub loss_percentage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    pub volatility_percentage: String,
    pub outcome_mode: String,
    pub min_exposure: String,
    pub max_exposure: String,
    pub max_leverage: String,
    pub updated_at: i64,
}

impl From<TradableConfig> for TradableDto {
    fn from(config: TradableConfig) -> Self {
        Self {
            id: config.id.to_string(),
            name: config.name,
            kind: config.kind.as_str().to_string(),
            roi_or_profit_percentage: config.roi_or_profit_percentage.to_canonical_string(),
            loss_percentage: config.loss_percentage.to_canonical_string(),
            duration_ms: config.duration_ms,
            volatility_percentage: config.volatility_percentage.to_canonical_string(),
            outcome_mode: config.outcome_mode.as_str().to_string(),
            min_exposure: config.min_exposure.to_canonical_string(),
            max_exposure: config.max_exposure.to_canonical_string(),
            max_leverage: config.max_leverage.to_canonical_string(),
            updated_at: config.updated_at.as_ms(),
        }
    }
}

pub async fn list_tradables(
    State(state): State<AppState>,
) -> Result<Json<Vec<TradableDto>>, AppError> {
    let configs = state.store.list_tradables().await?;
    Ok(Json(configs.into_iter().map(TradableDto::from).collect()))
}

/// Create or replace a tradable. Changing `outcomeMode` affects open
/// positions at their next resolution; percentages captured at open do not change.
pub async fn upsert_tradable(
    Path(tradable_id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<TradableRequest>,
) -> Result<Json<TradableDto>, AppError> {
    let id = parse_tradable_id(&tradable_id)?;
    let config = TradableConfig {
        id,
        name: body.name.trim().to_string(),
        kind: body.kind,
        roi_or_profit_percentage: parse_decimal(
            "roiOrProfitPercentage",
            &body.roi_or_profit_percentage,
        )?,
        loss_percentage: parse_decimal("lossPercentage", &body.loss_percentage)?,
        duration_ms: body.duration_ms,
        volatility_percentage: body
            .volatility_percentage
            .as_deref()
            .map(|raw| parse_decimal("volatilityPercentage", raw))
            .transpose()?
            .unwrap_or_default(),
        outcome_mode: body.outcome_mode.unwrap_or(OutcomeMode::Auto),
        min_exposure: parse_decimal("minExposure", &body.min_exposure)?,
        max_exposure: parse_decimal("maxExposure", &body.max_exposure)?,
        max_leverage: body
            .max_leverage
            .as_deref()
            .map(|raw| parse_decimal("maxLeverage", raw))
            .transpose()?
            .unwrap_or_else(Decimal::one),
        updated_at: state.clock.now(),
    };
    config
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    state.store.upsert_tradable(&config).await?;
    info!(
        tradable = %config.id,
        kind = %config.kind,
        outcome_mode = %config.outcome_mode,
        "Tradable saved"
    );
    Ok(Json(TradableDto::from(config)))
}
