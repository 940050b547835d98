use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Error, Debug)]
pub enum MarketError {
    #[error("Unauthorized")]
    NotAuthenticated,

    #[error("User not found")]
    UserNotFound,

    #[error("Asset not found")]
    AssetNotFound,

    #[error("Asset has no download available")]
    AssetUnavailable,

    #[error("Insufficient coins")]
    InsufficientFunds { required: i64, available: i64 },

    #[error("Already claimed today")]
    AlreadyClaimed { hours: i64, minutes: i64 },

    #[error("Admin access required")]
    Forbidden,

    #[error("{0}")]
    InvalidRequest(String),

    #[error("No spin tickets left")]
    NoTickets,

    #[error("No prizes active")]
    NoPrizes,

    #[error("Persistence failure: {0}")]
    Persistence(#[from] anyhow::Error),
}

impl MarketError {
    pub fn status(&self) -> StatusCode {
        match self {
            MarketError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            MarketError::UserNotFound | MarketError::AssetNotFound => StatusCode::NOT_FOUND,
            MarketError::AssetUnavailable | MarketError::NoPrizes => StatusCode::CONFLICT,
            MarketError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
            MarketError::AlreadyClaimed { .. }
            | MarketError::InvalidRequest(_)
            | MarketError::NoTickets => StatusCode::BAD_REQUEST,
            MarketError::Forbidden => StatusCode::FORBIDDEN,
            MarketError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error body returned by every endpoint.
#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hours_until_reset: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minutes_until_reset: Option<i64>,
}

impl IntoResponse for MarketError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = ErrorBody {
            success: false,
            error: self.to_string(),
            required: None,
            available: None,
            hours_until_reset: None,
            minutes_until_reset: None,
        };

        match &self {
            MarketError::InsufficientFunds { required, available } => {
                body.required = Some(*required);
                body.available = Some(*available);
            }
            MarketError::AlreadyClaimed { hours, minutes } => {
                body.hours_until_reset = Some(*hours);
                body.minutes_until_reset = Some(*minutes);
            }
            MarketError::Persistence(e) => {
                tracing::error!(error = ?e, "persistence failure");
                body.error = "Internal server error".to_string();
            }
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, MarketError>;
