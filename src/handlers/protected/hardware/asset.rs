use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use uuid::Uuid;

use crate::auth::require_role;
use crate::auth::roles::HARDWARE_WRITERS;
use crate::database::models::hardware::{CreateHardwareAsset, HardwareFilter, UpdateHardwareAsset};
use crate::database::models::HardwareAsset;
use crate::database::query::{ListParams, Page};
use crate::middleware::{ApiResponse, ApiResult, TenantPool, ValidatedUser};
use crate::services::hardware_service::{AssetHistory, HardwareService};

/// GET /api/hardware - List assets (`status`, `asset_type`, `search`, paging, sort)
pub async fn asset_list(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Query(params): Query<ListParams>,
    Query(filter): Query<HardwareFilter>,
) -> ApiResult<Page<HardwareAsset>> {
    Ok(ApiResponse::success(HardwareService::new(pool).list(&params, &filter).await?))
}

/// POST /api/hardware - Register an asset; it starts in stock
pub async fn asset_create(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<ValidatedUser>,
    Json(input): Json<CreateHardwareAsset>,
) -> ApiResult<HardwareAsset> {
    require_role(user.role, HARDWARE_WRITERS)?;
    Ok(ApiResponse::created(HardwareService::new(pool).create(input).await?))
}

/// GET /api/hardware/:id
pub async fn asset_get(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<HardwareAsset> {
    Ok(ApiResponse::success(HardwareService::new(pool).get(id).await?))
}

/// PATCH /api/hardware/:id
pub async fn asset_update(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<ValidatedUser>,
    Path(id): Path<Uuid>,
    Json(patch): Json<UpdateHardwareAsset>,
) -> ApiResult<HardwareAsset> {
    require_role(user.role, HARDWARE_WRITERS)?;
    Ok(ApiResponse::success(HardwareService::new(pool).update(id, patch).await?))
}

/// DELETE /api/hardware/:id - Soft delete
pub async fn asset_delete(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<ValidatedUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    require_role(user.role, HARDWARE_WRITERS)?;
    HardwareService::new(pool).delete(id).await?;
    Ok(ApiResponse::no_content())
}

/// GET /api/hardware/:id/history - Asset with every assignment it has had
pub async fn asset_history(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<AssetHistory> {
    Ok(ApiResponse::success(HardwareService::new(pool).history(id).await?))
}
