//! Session resolution.
//!
//! Authentication happens upstream; this service only trusts the user id forwarded in the
//! configured session header.

use crate::error::MarketError;
use crate::transport::http::types::AppState;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

/// The authenticated user making the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionUser(pub Uuid);

#[async_trait]
impl FromRequestParts<AppState> for SessionUser {
    type Rejection = MarketError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(&state.session_header)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(MarketError::NotAuthenticated)?;
        Uuid::parse_str(raw)
            .map(SessionUser)
            .map_err(|_| MarketError::NotAuthenticated)
    }
}
