// handlers/public/auth/refresh.rs - POST /auth/refresh handler

use axum::http::HeaderMap;

use crate::auth;
use crate::error::ApiError;
use crate::middleware::auth::extract_jwt_from_headers;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::auth_service::{AuthService, TokenResponse};

/// POST /auth/refresh - Exchange a still-valid bearer token for a fresh one
///
/// The tenant and user are re-validated, so a deactivated account cannot keep
/// extending its session.
pub async fn refresh_post(headers: HeaderMap) -> ApiResult<TokenResponse> {
    let token = extract_jwt_from_headers(&headers).map_err(ApiError::unauthorized)?;
    let claims = auth::validate_jwt(&token).map_err(|e| {
        tracing::debug!("Refused token refresh: {}", e);
        ApiError::unauthorized("Invalid or expired token")
    })?;

    Ok(ApiResponse::success(AuthService::refresh(&claims).await?))
}
