use crate::error::MarketError;
use crate::transport::http::session::SessionUser;
use crate::transport::http::types::{
    AppState, BalanceResponse, DailyClaimResponse, DailyStatusResponse, PageQuery,
    TransactionsResponse,
};
use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;

#[utoipa::path(
    get,
    path = "/api/coins/balance",
    responses(
        (status = 200, description = "Coins, tickets and progression", body = BalanceResponse),
        (status = 401, description = "No session", body = crate::error::ErrorBody)
    )
)]
pub async fn balance_handler(
    State(state): State<AppState>,
    SessionUser(user_id): SessionUser,
) -> Result<Json<BalanceResponse>, MarketError> {
    let summary = state.service.balance(user_id).await?;
    Ok(Json(BalanceResponse {
        coins: summary.coins,
        spin_tickets: summary.spin_tickets,
        xp: summary.xp,
        badge_tier: summary.badge.tier,
        badge_name: summary.badge.name.to_string(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/coins/transactions",
    params(PageQuery),
    responses(
        (status = 200, description = "Ledger entries, newest first", body = TransactionsResponse),
        (status = 401, description = "No session", body = crate::error::ErrorBody)
    )
)]
pub async fn transactions_handler(
    State(state): State<AppState>,
    SessionUser(user_id): SessionUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<TransactionsResponse>, MarketError> {
    let transactions = state
        .service
        .transactions(user_id, query.limit, query.offset)
        .await?;
    Ok(Json(TransactionsResponse { transactions }))
}

#[utoipa::path(
    get,
    path = "/api/coins/daily",
    responses(
        (status = 200, description = "Daily reward availability", body = DailyStatusResponse),
        (status = 401, description = "No session", body = crate::error::ErrorBody)
    )
)]
pub async fn daily_status_handler(
    State(state): State<AppState>,
    SessionUser(user_id): SessionUser,
) -> Result<Json<DailyStatusResponse>, MarketError> {
    let status = state.service.daily_status(user_id, Utc::now()).await?;
    Ok(Json(DailyStatusResponse {
        can_claim: status.can_claim,
        hours_until_reset: status.hours_until_reset,
        minutes_until_reset: status.minutes_until_reset,
    }))
}

#[utoipa::path(
    post,
    path = "/api/coins/daily",
    responses(
        (status = 200, description = "Daily reward credited", body = DailyClaimResponse),
        (status = 400, description = "Already claimed within the cooldown", body = crate::error::ErrorBody),
        (status = 401, description = "No session", body = crate::error::ErrorBody)
    )
)]
pub async fn daily_claim_handler(
    State(state): State<AppState>,
    SessionUser(user_id): SessionUser,
) -> Result<Json<DailyClaimResponse>, MarketError> {
    let reward = state.service.claim_daily(user_id, Utc::now()).await?;
    Ok(Json(DailyClaimResponse {
        success: true,
        reward: reward.reward,
        xp_bonus: reward.xp_bonus,
        new_balance: reward.balance,
    }))
}
