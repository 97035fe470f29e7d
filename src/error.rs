use crate::engine::EngineError;
use crate::store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unprocessable: {0}")]
    Unprocessable(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        let msg = err.to_string();
        match err {
            EngineError::InsufficientFunds { .. } => AppError::Unprocessable(msg),
            EngineError::InvalidExposure { .. }
            | EngineError::InvalidLeverage { .. }
            | EngineError::InvalidAmount(_)
            | EngineError::InvalidConfig(_)
            | EngineError::Unsupported(_) => AppError::BadRequest(msg),
            EngineError::NotMatured { .. }
            | EngineError::MaturityReached { .. }
            | EngineError::AccountExists(_)
            | EngineError::InvalidTransition { .. }
            | EngineError::ConcurrentSettlementLost { .. } => AppError::Conflict(msg),
            EngineError::AccountNotFound(_)
            | EngineError::TradableNotFound(_)
            | EngineError::PositionNotFound(_)
            | EngineError::EntryNotFound(_) => AppError::NotFound(msg),
            EngineError::StoreUnavailable(_) => AppError::Unavailable(msg),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        EngineError::from(err).into()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
