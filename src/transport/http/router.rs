use crate::domain::model::{CoinTransaction, PrizeKind, SpinPrize, SpinRecord, TransactionKind};
use crate::domain::rewards::AdjustAction;
use crate::error::ErrorBody;
use crate::transport::http::handlers::{admin, coins, download, health, spin};
use crate::transport::http::types::{
    AdminCoinsRequest, AdminCoinsResponse, AppState, BalanceResponse, DailyClaimResponse,
    DailyStatusResponse, DownloadResponse, HealthResponse, PrizesResponse, PurchaseStatusResponse,
    SpinHistoryResponse, SpinResponse, TicketResponse, TransactionsResponse,
};
use axum::routing::{get, post};
use axum::Router;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthcheck_handler,
        download::download_handler,
        download::purchase_status_handler,
        coins::balance_handler,
        coins::transactions_handler,
        coins::daily_status_handler,
        coins::daily_claim_handler,
        admin::admin_coins_handler,
        spin::prizes_handler,
        spin::ticket_handler,
        spin::spin_handler,
        spin::history_handler
    ),
    components(schemas(
        ErrorBody,
        HealthResponse,
        DownloadResponse,
        PurchaseStatusResponse,
        BalanceResponse,
        TransactionsResponse,
        CoinTransaction,
        TransactionKind,
        DailyStatusResponse,
        DailyClaimResponse,
        AdminCoinsRequest,
        AdminCoinsResponse,
        AdjustAction,
        PrizesResponse,
        SpinPrize,
        PrizeKind,
        TicketResponse,
        SpinResponse,
        SpinHistoryResponse,
        SpinRecord
    ))
)]
pub struct ApiDoc;

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::healthcheck_handler))
        .route("/api/download/:asset_id", post(download::download_handler))
        .route(
            "/api/assets/:asset_id/purchase",
            get(download::purchase_status_handler),
        )
        .route("/api/coins/balance", get(coins::balance_handler))
        .route("/api/coins/transactions", get(coins::transactions_handler))
        .route(
            "/api/coins/daily",
            get(coins::daily_status_handler).post(coins::daily_claim_handler),
        )
        .route("/api/admin/coins", post(admin::admin_coins_handler))
        .route("/api/spin/prizes", get(spin::prizes_handler))
        .route("/api/spin/ticket", post(spin::ticket_handler))
        .route("/api/spin", post(spin::spin_handler))
        .route("/api/spin/history", get(spin::history_handler))
        .with_state(app_state)
}
