use axum::{extract::Path, Extension, Json};
use uuid::Uuid;

use super::service;
use crate::auth::require_role;
use crate::auth::roles::ADMIN_ONLY;
use crate::database::models::integration::{CreateDataSource, DataSourceView, UpdateDataSource};
use crate::integrations::fetcher::SourceTestResult;
use crate::middleware::{ApiResponse, ApiResult, TenantPool, ValidatedTenant, ValidatedUser};

/// GET /api/integrations/sources
pub async fn source_list(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(tenant): Extension<ValidatedTenant>,
    Extension(user): Extension<ValidatedUser>,
) -> ApiResult<Vec<DataSourceView>> {
    require_role(user.role, ADMIN_ONLY)?;
    Ok(ApiResponse::success(service(pool, &tenant).list_sources().await?))
}

/// POST /api/integrations/sources - Credentials are encrypted before they are stored
///
/// Expected Input:
/// ```json
/// {
///   "name": "jira",
///   "base_url": "https://acme.atlassian.net",
///   "auth_type": "basic",
///   "credentials": { "username": "svc-mssp", "password": "..." }
/// }
/// ```
pub async fn source_create(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(tenant): Extension<ValidatedTenant>,
    Extension(user): Extension<ValidatedUser>,
    Json(input): Json<CreateDataSource>,
) -> ApiResult<DataSourceView> {
    require_role(user.role, ADMIN_ONLY)?;
    Ok(ApiResponse::created(service(pool, &tenant).create_source(input).await?))
}

/// GET /api/integrations/sources/:id
pub async fn source_get(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(tenant): Extension<ValidatedTenant>,
    Extension(user): Extension<ValidatedUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<DataSourceView> {
    require_role(user.role, ADMIN_ONLY)?;
    Ok(ApiResponse::success(service(pool, &tenant).get_source(id).await?))
}

/// PATCH /api/integrations/sources/:id - `credentials: null` clears them
pub async fn source_update(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(tenant): Extension<ValidatedTenant>,
    Extension(user): Extension<ValidatedUser>,
    Path(id): Path<Uuid>,
    Json(patch): Json<UpdateDataSource>,
) -> ApiResult<DataSourceView> {
    require_role(user.role, ADMIN_ONLY)?;
    Ok(ApiResponse::success(service(pool, &tenant).update_source(id, patch).await?))
}

/// DELETE /api/integrations/sources/:id - Also deletes the source's queries
pub async fn source_delete(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(tenant): Extension<ValidatedTenant>,
    Extension(user): Extension<ValidatedUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    require_role(user.role, ADMIN_ONLY)?;
    service(pool, &tenant).delete_source(id).await?;
    Ok(ApiResponse::no_content())
}

/// POST /api/integrations/sources/:id/test - GET the base URL and report status and latency
pub async fn source_test(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(tenant): Extension<ValidatedTenant>,
    Extension(user): Extension<ValidatedUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<SourceTestResult> {
    require_role(user.role, ADMIN_ONLY)?;
    Ok(ApiResponse::success(service(pool, &tenant).test_source(id).await?))
}
