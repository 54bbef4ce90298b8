use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use uuid::Uuid;

use super::service;
use crate::auth::require_role;
use crate::auth::roles::ADMIN_ONLY;
use crate::database::models::integration::{CreateDataSourceQuery, UpdateDataSourceQuery};
use crate::database::models::DataSourceQuery;
use crate::integrations::FetchOutcome;
use crate::middleware::{ApiResponse, ApiResult, TenantPool, ValidatedTenant, ValidatedUser};
use crate::services::integration_service::{QueryFilter, TestQueryRequest};

/// GET /api/integrations/queries?data_source_id=
pub async fn query_list(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(tenant): Extension<ValidatedTenant>,
    Extension(user): Extension<ValidatedUser>,
    Query(filter): Query<QueryFilter>,
) -> ApiResult<Vec<DataSourceQuery>> {
    require_role(user.role, ADMIN_ONLY)?;
    Ok(ApiResponse::success(service(pool, &tenant).list_queries(&filter).await?))
}

/// POST /api/integrations/queries
///
/// Expected Input:
/// ```json
/// {
///   "data_source_id": "...",
///   "name": "open_tickets",
///   "endpoint": "/rest/api/2/search",
///   "query_params": { "jql": "project = {{project}} AND status != Done" },
///   "json_path": "$.total",
///   "expected_type": "number",
///   "cache_ttl_secs": 300
/// }
/// ```
pub async fn query_create(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(tenant): Extension<ValidatedTenant>,
    Extension(user): Extension<ValidatedUser>,
    Json(input): Json<CreateDataSourceQuery>,
) -> ApiResult<DataSourceQuery> {
    require_role(user.role, ADMIN_ONLY)?;
    Ok(ApiResponse::created(service(pool, &tenant).create_query(input).await?))
}

/// GET /api/integrations/queries/:id
pub async fn query_get(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(tenant): Extension<ValidatedTenant>,
    Extension(user): Extension<ValidatedUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<DataSourceQuery> {
    require_role(user.role, ADMIN_ONLY)?;
    Ok(ApiResponse::success(service(pool, &tenant).get_query(id).await?))
}

/// PATCH /api/integrations/queries/:id - Invalidates cached results
pub async fn query_update(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(tenant): Extension<ValidatedTenant>,
    Extension(user): Extension<ValidatedUser>,
    Path(id): Path<Uuid>,
    Json(patch): Json<UpdateDataSourceQuery>,
) -> ApiResult<DataSourceQuery> {
    require_role(user.role, ADMIN_ONLY)?;
    Ok(ApiResponse::success(service(pool, &tenant).update_query(id, patch).await?))
}

/// DELETE /api/integrations/queries/:id
pub async fn query_delete(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(tenant): Extension<ValidatedTenant>,
    Extension(user): Extension<ValidatedUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    require_role(user.role, ADMIN_ONLY)?;
    service(pool, &tenant).delete_query(id).await?;
    Ok(ApiResponse::no_content())
}

/// POST /api/integrations/queries/:id/test - Run with the given context, never cached
pub async fn query_test(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(tenant): Extension<ValidatedTenant>,
    Extension(user): Extension<ValidatedUser>,
    Path(id): Path<Uuid>,
    body: Option<Json<TestQueryRequest>>,
) -> ApiResult<FetchOutcome> {
    require_role(user.role, ADMIN_ONLY)?;
    let request = body.map(|Json(request)| request).unwrap_or_default();
    Ok(ApiResponse::success(service(pool, &tenant).test_query(id, request).await?))
}
