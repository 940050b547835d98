use crate::error::MarketError;
use crate::transport::http::session::SessionUser;
use crate::transport::http::types::{AppState, DownloadResponse, PurchaseStatusResponse};
use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

/// Malformed ids cannot name an asset.
fn parse_asset_id(raw: &str) -> Result<Uuid, MarketError> {
    Uuid::parse_str(raw.trim()).map_err(|_| MarketError::AssetNotFound)
}

#[utoipa::path(
    post,
    path = "/api/download/{asset_id}",
    params(("asset_id" = String, Path, description = "Asset id")),
    responses(
        (status = 200, description = "Download granted", body = DownloadResponse),
        (status = 401, description = "No session", body = crate::error::ErrorBody),
        (status = 402, description = "Not enough coins", body = crate::error::ErrorBody),
        (status = 404, description = "Unknown user or asset", body = crate::error::ErrorBody),
        (status = 409, description = "Asset has no download link", body = crate::error::ErrorBody)
    )
)]
pub async fn download_handler(
    State(state): State<AppState>,
    SessionUser(user_id): SessionUser,
    Path(asset_id): Path<String>,
) -> Result<Json<DownloadResponse>, MarketError> {
    let asset_id = parse_asset_id(&asset_id)?;
    let receipt = state.service.download(user_id, asset_id).await?;
    Ok(Json(DownloadResponse {
        success: true,
        download_url: receipt.download_url,
        coins_spent: receipt.coins_spent,
        message: receipt.message.to_string(),
        balance: receipt.balance,
    }))
}

#[utoipa::path(
    get,
    path = "/api/assets/{asset_id}/purchase",
    params(("asset_id" = String, Path, description = "Asset id")),
    responses(
        (status = 200, description = "Whether the user owns the asset", body = PurchaseStatusResponse),
        (status = 401, description = "No session", body = crate::error::ErrorBody),
        (status = 404, description = "Unknown user or asset", body = crate::error::ErrorBody)
    )
)]
pub async fn purchase_status_handler(
    State(state): State<AppState>,
    SessionUser(user_id): SessionUser,
    Path(asset_id): Path<String>,
) -> Result<Json<PurchaseStatusResponse>, MarketError> {
    let asset_id = parse_asset_id(&asset_id)?;
    let status = state.service.purchase_status(user_id, asset_id).await?;
    Ok(Json(PurchaseStatusResponse {
        purchased: status.purchased,
        price: status.price,
    }))
}
