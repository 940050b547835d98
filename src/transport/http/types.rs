use crate::app::market_service::MarketService;
use crate::domain::model::{CoinTransaction, SpinPrize, SpinRecord};
use crate::domain::rewards::AdjustAction;
use crate::error::ErrorBody;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderName, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MarketService>,
    /// Header carrying the authenticated user id, set by the upstream session layer.
    pub session_header: HeaderName,
}

impl AppState {
    pub fn new(service: Arc<MarketService>, session_header: &str) -> anyhow::Result<Self> {
        let session_header = HeaderName::from_bytes(session_header.trim().to_lowercase().as_bytes())
            .map_err(|e| anyhow::anyhow!("invalid session header '{}': {}", session_header, e))?;
        Ok(Self {
            service,
            session_header,
        })
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct HealthResponse {
    pub success: bool,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    pub success: bool,
    pub download_url: String,
    pub coins_spent: i64,
    pub message: String,
    /// Balance after the attempt.
    pub balance: i64,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct PurchaseStatusResponse {
    pub purchased: bool,
    pub price: i64,
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub coins: i64,
    pub spin_tickets: i64,
    pub xp: i64,
    pub badge_tier: i32,
    pub badge_name: String,
}

#[derive(Deserialize, Debug, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// Page size, clamped to 1..=100 (default 50).
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct TransactionsResponse {
    pub transactions: Vec<CoinTransaction>,
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DailyStatusResponse {
    pub can_claim: bool,
    pub hours_until_reset: i64,
    pub minutes_until_reset: i64,
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DailyClaimResponse {
    pub success: bool,
    pub reward: i64,
    pub xp_bonus: i64,
    pub new_balance: i64,
}

#[derive(Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AdminCoinsRequest {
    pub user_id: Uuid,
    pub amount: i64,
    pub action: AdjustAction,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminCoinsResponse {
    pub success: bool,
    pub username: String,
    pub action: AdjustAction,
    /// Effective change after clamping at zero.
    pub change: i64,
    pub total_coins: i64,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct PrizesResponse {
    pub prizes: Vec<SpinPrize>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct SpinHistoryResponse {
    pub history: Vec<SpinRecord>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct TicketResponse {
    pub success: bool,
    pub tickets: i64,
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SpinResponse {
    pub success: bool,
    pub prize: SpinPrize,
    pub prize_index: usize,
    pub new_balance: i64,
    pub remaining_tickets: i64,
}

pub fn json_422(err: JsonRejection, expected: &str) -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ErrorBody {
            success: false,
            error: format!("Invalid JSON body: {} (expected: {})", err, expected),
            required: None,
            available: None,
            hours_until_reset: None,
            minutes_until_reset: None,
        }),
    )
}
