use axum::{extract::Request, middleware::Next, response::Response};
use sqlx::PgPool;
use uuid::Uuid;

use super::auth::AuthUser;
use crate::database::manager::DatabaseManager;
use crate::error::ApiError;

/// Extracted tenant database pool, injected by middleware
#[derive(Clone)]
pub struct TenantPool(pub PgPool);

/// Validated tenant information from the system tenants table
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct ValidatedTenant {
    pub id: Uuid,
    pub name: String,
    pub database: String,
}

/// Middleware that validates the tenant from JWT claims against the system database.
/// Ensures the tenant exists and is active (not deactivated/deleted).
pub async fn validate_tenant_middleware(mut request: Request, next: Next) -> Result<Response, ApiError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or_else(|| ApiError::unauthorized("JWT authentication required before tenant validation"))?
        .clone();

    let main_pool = DatabaseManager::main_pool().await?;

    let tenant: Option<ValidatedTenant> = sqlx::query_as(
        r#"
        SELECT id, name, database
        FROM tenants
        WHERE database = $1
        AND is_active = true
        AND deleted_at IS NULL
        "#,
    )
    .bind(&auth_user.database)
    .fetch_optional(&main_pool)
    .await
    .map_err(|e| {
        tracing::error!("Database error validating tenant: {}", e);
        ApiError::internal_server_error("Failed to validate tenant")
    })?;

    let tenant = tenant.ok_or_else(|| {
        tracing::warn!("Tenant validation failed: tenant '{}' not found or inactive", auth_user.database);
        ApiError::forbidden(format!("Tenant '{}' is not active or does not exist", auth_user.tenant))
    })?;

    if tenant.name != auth_user.tenant {
        tracing::warn!(
            "Tenant validation failed: token tenant '{}' does not own database '{}'",
            auth_user.tenant,
            tenant.database
        );
        return Err(ApiError::forbidden("Tenant mismatch"));
    }

    let tenant_pool = DatabaseManager::tenant_pool(&tenant.database).await.map_err(|e| {
        tracing::error!("Failed to get database pool for tenant '{}': {}", tenant.database, e);
        ApiError::from(e)
    })?;

    tracing::debug!("Tenant validation successful: {} ({})", tenant.name, tenant.database);

    request.extensions_mut().insert(tenant);
    request.extensions_mut().insert(TenantPool(tenant_pool));

    Ok(next.run(request).await)
}
