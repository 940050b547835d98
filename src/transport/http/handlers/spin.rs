use crate::error::MarketError;
use crate::transport::http::session::SessionUser;
use crate::transport::http::types::{
    AppState, PageQuery, PrizesResponse, SpinHistoryResponse, SpinResponse, TicketResponse,
};
use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;

#[utoipa::path(
    get,
    path = "/api/spin/prizes",
    responses(
        (status = 200, description = "Active prizes in wheel order", body = PrizesResponse)
    )
)]
pub async fn prizes_handler(State(state): State<AppState>) -> Result<Json<PrizesResponse>, MarketError> {
    let prizes = state.service.prizes().await?;
    Ok(Json(PrizesResponse { prizes }))
}

#[utoipa::path(
    post,
    path = "/api/spin/ticket",
    responses(
        (status = 200, description = "Daily spin ticket granted", body = TicketResponse),
        (status = 400, description = "Ticket already granted today", body = crate::error::ErrorBody),
        (status = 401, description = "No session", body = crate::error::ErrorBody)
    )
)]
pub async fn ticket_handler(
    State(state): State<AppState>,
    SessionUser(user_id): SessionUser,
) -> Result<Json<TicketResponse>, MarketError> {
    let tickets = state.service.claim_spin_ticket(user_id, Utc::now()).await?;
    Ok(Json(TicketResponse {
        success: true,
        tickets,
    }))
}

#[utoipa::path(
    post,
    path = "/api/spin",
    responses(
        (status = 200, description = "Prize drawn and credited", body = SpinResponse),
        (status = 400, description = "No spin tickets", body = crate::error::ErrorBody),
        (status = 401, description = "No session", body = crate::error::ErrorBody),
        (status = 409, description = "Wheel has no active prizes", body = crate::error::ErrorBody)
    )
)]
pub async fn spin_handler(
    State(state): State<AppState>,
    SessionUser(user_id): SessionUser,
) -> Result<Json<SpinResponse>, MarketError> {
    let mut rng = StdRng::from_entropy();
    let result = state.service.spin(user_id, &mut rng).await?;
    Ok(Json(SpinResponse {
        success: true,
        prize: result.prize,
        prize_index: result.prize_index,
        new_balance: result.balance,
        remaining_tickets: result.tickets,
    }))
}

#[utoipa::path(
    get,
    path = "/api/spin/history",
    params(PageQuery),
    responses(
        (status = 200, description = "Past spins, newest first", body = SpinHistoryResponse),
        (status = 401, description = "No session", body = crate::error::ErrorBody)
    )
)]
pub async fn history_handler(
    State(state): State<AppState>,
    SessionUser(user_id): SessionUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<SpinHistoryResponse>, MarketError> {
    let history = state
        .service
        .spin_history(user_id, query.limit, query.offset)
        .await?;
    Ok(Json(SpinHistoryResponse { history }))
}
