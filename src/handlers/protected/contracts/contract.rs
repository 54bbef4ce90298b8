use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use uuid::Uuid;

use crate::auth::require_role;
use crate::auth::roles::CONTRACT_WRITERS;
use crate::database::models::contract::{ContractFilter, CreateContract, RenewContract, UpdateContract};
use crate::database::models::Contract;
use crate::database::query::{ListParams, Page};
use crate::middleware::{ApiResponse, ApiResult, TenantPool, ValidatedUser};
use crate::services::contract_service::{ContractDetail, ContractService, ExpiringContract, ExpiringQuery, RenewalResult};

/// GET /api/contracts - List contracts (`client_id`, `status`, paging, sort)
pub async fn contract_list(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Query(params): Query<ListParams>,
    Query(filter): Query<ContractFilter>,
) -> ApiResult<Page<Contract>> {
    Ok(ApiResponse::success(ContractService::new(pool).list(&params, &filter).await?))
}

/// POST /api/contracts
pub async fn contract_create(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<ValidatedUser>,
    Json(input): Json<CreateContract>,
) -> ApiResult<Contract> {
    require_role(user.role, CONTRACT_WRITERS)?;
    Ok(ApiResponse::created(ContractService::new(pool).create(input).await?))
}

/// GET /api/contracts/expiring?days=30 - Active contracts ending within the window
pub async fn contract_expiring(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Query(query): Query<ExpiringQuery>,
) -> ApiResult<Vec<ExpiringContract>> {
    Ok(ApiResponse::success(ContractService::new(pool).expiring(query.days).await?))
}

/// GET /api/contracts/:id - Contract with its service scopes
pub async fn contract_get(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<ContractDetail> {
    Ok(ApiResponse::success(ContractService::new(pool).get_detail(id).await?))
}

/// PATCH /api/contracts/:id
pub async fn contract_update(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<ValidatedUser>,
    Path(id): Path<Uuid>,
    Json(patch): Json<UpdateContract>,
) -> ApiResult<Contract> {
    require_role(user.role, CONTRACT_WRITERS)?;
    Ok(ApiResponse::success(ContractService::new(pool).update(id, patch).await?))
}

/// DELETE /api/contracts/:id - Soft delete
pub async fn contract_delete(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<ValidatedUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    require_role(user.role, CONTRACT_WRITERS)?;
    ContractService::new(pool).delete(id).await?;
    Ok(ApiResponse::no_content())
}

/// POST /api/contracts/:id/renew - Close this contract and open its successor
///
/// Expected Input:
/// ```json
/// { "end_date": "2027-12-31", "value": "48000.00" }
/// ```
pub async fn contract_renew(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<ValidatedUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<RenewContract>,
) -> ApiResult<RenewalResult> {
    require_role(user.role, CONTRACT_WRITERS)?;
    Ok(ApiResponse::created(ContractService::new(pool).renew(id, input).await?))
}
