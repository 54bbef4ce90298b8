use axum::{extract::Path, Extension, Json};
use uuid::Uuid;

use crate::auth::require_role;
use crate::auth::roles::SCOPE_WRITERS;
use crate::database::models::contract::{CreateServiceScope, UpdateSafStatus, UpdateServiceScope};
use crate::database::models::ServiceScope;
use crate::middleware::{ApiResponse, ApiResult, TenantPool, ValidatedUser};
use crate::services::contract_service::ContractService;

/// GET /api/contracts/:id/scopes
pub async fn scope_list(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(contract_id): Path<Uuid>,
) -> ApiResult<Vec<ServiceScope>> {
    Ok(ApiResponse::success(ContractService::new(pool).list_scopes(contract_id).await?))
}

/// POST /api/contracts/:id/scopes
pub async fn scope_create(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<ValidatedUser>,
    Path(contract_id): Path<Uuid>,
    Json(input): Json<CreateServiceScope>,
) -> ApiResult<ServiceScope> {
    require_role(user.role, SCOPE_WRITERS)?;
    let scope = ContractService::new(pool).create_scope(contract_id, input).await?;
    Ok(ApiResponse::created(scope))
}

/// GET /api/scopes/:id
pub async fn scope_get(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<ServiceScope> {
    Ok(ApiResponse::success(ContractService::new(pool).get_scope(id).await?))
}

/// PATCH /api/scopes/:id
pub async fn scope_update(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<ValidatedUser>,
    Path(id): Path<Uuid>,
    Json(patch): Json<UpdateServiceScope>,
) -> ApiResult<ServiceScope> {
    require_role(user.role, SCOPE_WRITERS)?;
    Ok(ApiResponse::success(ContractService::new(pool).update_scope(id, patch).await?))
}

/// PUT /api/scopes/:id/saf - Move the SAF workflow one step forward, or reset it
pub async fn scope_saf(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<ValidatedUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateSafStatus>,
) -> ApiResult<ServiceScope> {
    require_role(user.role, SCOPE_WRITERS)?;
    Ok(ApiResponse::success(ContractService::new(pool).transition_saf(id, input).await?))
}

/// DELETE /api/scopes/:id - Hard delete; refused while hardware is assigned against it
pub async fn scope_delete(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<ValidatedUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    require_role(user.role, SCOPE_WRITERS)?;
    ContractService::new(pool).delete_scope(id).await?;
    Ok(ApiResponse::no_content())
}
