use axum::{extract::Request, middleware::Next, response::Response};
use uuid::Uuid;

use super::auth::AuthUser;
use super::validate_tenant::TenantPool;
use crate::auth::Role;
use crate::error::ApiError;

/// Validated user information from the tenant's users table
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct ValidatedUser {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub is_active: bool,
}

/// Middleware that validates the user from JWT claims against the tenant's users table.
/// Ensures the user exists, is active, and still holds the role the token was issued for.
pub async fn validate_user_middleware(mut request: Request, next: Next) -> Result<Response, ApiError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or_else(|| ApiError::unauthorized("JWT authentication required before user validation"))?
        .clone();

    let TenantPool(tenant_pool) = request
        .extensions()
        .get::<TenantPool>()
        .ok_or_else(|| ApiError::internal_server_error("Tenant pool required before user validation"))?
        .clone();

    let user: Option<ValidatedUser> = sqlx::query_as(
        r#"
        SELECT id, email, first_name, last_name, role, is_active
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(auth_user.user_id)
    .fetch_optional(&tenant_pool)
    .await
    .map_err(|e| {
        tracing::error!("Database error validating user in tenant '{}': {}", auth_user.database, e);
        ApiError::internal_server_error("Failed to validate user")
    })?;

    let user = user.ok_or_else(|| {
        tracing::warn!(
            "User validation failed: user '{}' (ID: {}) not found in tenant '{}'",
            auth_user.user,
            auth_user.user_id,
            auth_user.database
        );
        ApiError::forbidden(format!("User '{}' is not active in tenant '{}'", auth_user.user, auth_user.tenant))
    })?;

    if !user.is_active {
        tracing::warn!("User validation failed: user '{}' is deactivated", user.email);
        return Err(ApiError::forbidden("User account is deactivated"));
    }

    if !user.email.eq_ignore_ascii_case(&auth_user.user) {
        tracing::warn!(
            "User validation failed: JWT user '{}' doesn't match database email '{}'",
            auth_user.user,
            user.email
        );
        return Err(ApiError::forbidden("User authentication mismatch"));
    }

    if user.role != auth_user.role {
        tracing::warn!(
            "User validation failed: JWT role '{}' doesn't match database role '{}'",
            auth_user.role,
            user.role
        );
        return Err(ApiError::forbidden("User role has changed, please log in again"));
    }

    tracing::debug!(
        "User validation successful: {} with {} role in tenant '{}'",
        user.email,
        user.role,
        auth_user.tenant
    );

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}
