// handlers/public/auth/login.rs - POST /auth/login/:tenant handler

use axum::{extract::Path, Json};

use crate::middleware::{ApiResponse, ApiResult};
use crate::services::auth_service::{AuthService, LoginRequest, TokenResponse};

/// POST /auth/login/:tenant - Authenticate with email and password
///
/// Expected Input:
/// ```json
/// { "email": "ops@acme.io", "password": "..." }
/// ```
///
/// Returns the signed token, its lifetime in seconds and the session user.
pub async fn login_post(Path(tenant): Path<String>, Json(request): Json<LoginRequest>) -> ApiResult<TokenResponse> {
    let response = AuthService::login(&tenant, &request).await?;
    Ok(ApiResponse::success(response))
}
