use crate::error::MarketError;
use crate::transport::http::session::SessionUser;
use crate::transport::http::types::{json_422, AdminCoinsRequest, AdminCoinsResponse, AppState};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;

#[utoipa::path(
    post,
    path = "/api/admin/coins",
    request_body = AdminCoinsRequest,
    responses(
        (status = 200, description = "Balance adjusted", body = AdminCoinsResponse),
        (status = 400, description = "Amount out of range", body = crate::error::ErrorBody),
        (status = 401, description = "No session", body = crate::error::ErrorBody),
        (status = 403, description = "Caller is not an admin", body = crate::error::ErrorBody),
        (status = 404, description = "Unknown target user", body = crate::error::ErrorBody),
        (status = 422, description = "Malformed body", body = crate::error::ErrorBody)
    )
)]
pub async fn admin_coins_handler(
    State(state): State<AppState>,
    SessionUser(admin_id): SessionUser,
    payload: Result<Json<AdminCoinsRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(v) => v,
        Err(e) => {
            return json_422(e, r#"{"userId":"<uuid>","amount":100,"action":"add","reason":"..."}"#)
                .into_response()
        }
    };

    let result: Result<_, MarketError> = state
        .service
        .admin_adjust(
            admin_id,
            req.user_id,
            req.amount,
            req.action,
            req.reason.as_deref().unwrap_or_default(),
        )
        .await;

    match result {
        Ok(adj) => Json(AdminCoinsResponse {
            success: true,
            username: adj.username,
            action: adj.action,
            change: adj.change,
            total_coins: adj.balance,
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}
