use axum::{Extension, Json};
use serde_json::{json, Value};

use crate::database::models::user::ChangePassword;
use crate::middleware::{ApiResponse, ApiResult, TenantPool, ValidatedTenant, ValidatedUser};
use crate::services::user_service::UserService;

/// GET /api/auth/whoami - Current user as loaded by the user middleware
pub async fn whoami(
    Extension(tenant): Extension<ValidatedTenant>,
    Extension(user): Extension<ValidatedUser>,
) -> ApiResult<Value> {
    Ok(ApiResponse::success(json!({
        "id": user.id,
        "email": user.email,
        "first_name": user.first_name,
        "last_name": user.last_name,
        "role": user.role,
        "is_active": user.is_active,
        "tenant": tenant.name,
    })))
}

/// PUT /api/auth/password - Change the caller's own password
///
/// Expected Input:
/// ```json
/// { "current_password": "...", "new_password": "at least 8 characters" }
/// ```
pub async fn password_put(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<ValidatedUser>,
    Json(input): Json<ChangePassword>,
) -> ApiResult<()> {
    UserService::new(pool).change_password(user.id, input).await?;
    Ok(ApiResponse::no_content())
}
