use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use std::collections::BTreeMap;

use super::service;
use crate::integrations::{FetchOptions, FetchOutcome};
use crate::middleware::{ApiResponse, ApiResult, TenantPool, ValidatedTenant};
use crate::services::integration_service::{context_from_params, BatchRequest, BatchResult};

/// GET /api/integrations/data/:query_name?var=value - Execute a named query
///
/// Every query-string parameter except `refresh` becomes a template variable.
/// `refresh=true` skips the cache read and stores the fresh result.
pub async fn data_get(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(tenant): Extension<ValidatedTenant>,
    Path(query_name): Path<String>,
    Query(params): Query<BTreeMap<String, String>>,
) -> ApiResult<FetchOutcome> {
    let (context, refresh) = context_from_params(params);
    let options = FetchOptions { refresh, bypass_cache: false };
    let outcome = service(pool, &tenant).execute_named(&query_name, context, options).await?;
    Ok(ApiResponse::success(outcome))
}

/// POST /api/integrations/data/batch - Run several queries concurrently
///
/// Expected Input:
/// ```json
/// { "requests": [ { "query": "open_tickets", "context": { "project": "SOC" } } ] }
/// ```
///
/// Each item reports its own success or error; the batch itself only fails
/// when the request is malformed.
pub async fn data_batch(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(tenant): Extension<ValidatedTenant>,
    Json(request): Json<BatchRequest>,
) -> ApiResult<Vec<BatchResult>> {
    Ok(ApiResponse::success(service(pool, &tenant).batch(request).await?))
}
