use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use uuid::Uuid;

use crate::auth::require_role;
use crate::auth::roles::HARDWARE_WRITERS;
use crate::database::models::hardware::{
    AssignHardware, AssignmentFilter, ReplaceHardware, ReplacedAssignment, ReturnHardware,
};
use crate::database::models::ClientHardwareAssignment;
use crate::database::query::{ListParams, Page};
use crate::middleware::{ApiResponse, ApiResult, TenantPool, ValidatedUser};
use crate::services::hardware_service::HardwareService;

/// GET /api/hardware/assignments - Filter by `client_id`, `hardware_asset_id`, `status`
pub async fn assignment_list(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Query(params): Query<ListParams>,
    Query(filter): Query<AssignmentFilter>,
) -> ApiResult<Page<ClientHardwareAssignment>> {
    let page = HardwareService::new(pool).list_assignments(&params, &filter).await?;
    Ok(ApiResponse::success(page))
}

/// POST /api/hardware/assignments - Assign an in-stock asset to a client
///
/// Expected Input:
/// ```json
/// { "hardware_asset_id": "...", "client_id": "...", "service_scope_id": "..." }
/// ```
pub async fn assignment_create(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<ValidatedUser>,
    Json(input): Json<AssignHardware>,
) -> ApiResult<ClientHardwareAssignment> {
    require_role(user.role, HARDWARE_WRITERS)?;
    Ok(ApiResponse::created(HardwareService::new(pool).assign(input).await?))
}

/// GET /api/hardware/assignments/:id
pub async fn assignment_get(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<ClientHardwareAssignment> {
    Ok(ApiResponse::success(HardwareService::new(pool).get_assignment(id).await?))
}

/// POST /api/hardware/assignments/:id/return - Close the assignment, asset back in stock
pub async fn assignment_return(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<ValidatedUser>,
    Path(id): Path<Uuid>,
    body: Option<Json<ReturnHardware>>,
) -> ApiResult<ClientHardwareAssignment> {
    require_role(user.role, HARDWARE_WRITERS)?;
    let input = body.map(|Json(input)| input).unwrap_or_default();
    Ok(ApiResponse::success(HardwareService::new(pool).return_assignment(id, input).await?))
}

/// POST /api/hardware/assignments/:id/replace - Swap in a replacement asset
pub async fn assignment_replace(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<ValidatedUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<ReplaceHardware>,
) -> ApiResult<ReplacedAssignment> {
    require_role(user.role, HARDWARE_WRITERS)?;
    Ok(ApiResponse::success(HardwareService::new(pool).replace_assignment(id, input).await?))
}
