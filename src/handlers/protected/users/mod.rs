use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use uuid::Uuid;

use crate::auth::roles::ADMIN_ONLY;
use crate::auth::require_role;
use crate::database::models::team::UserClientAssignment;
use crate::database::models::user::{CreateUser, UpdateUser};
use crate::database::models::User;
use crate::database::query::{ListParams, Page};
use crate::middleware::{ApiResponse, ApiResult, TenantPool, ValidatedUser};
use crate::services::user_service::{UserFilter, UserService};

/// GET /api/users - List users (admin)
pub async fn user_list(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(caller): Extension<ValidatedUser>,
    Query(params): Query<ListParams>,
    Query(filter): Query<UserFilter>,
) -> ApiResult<Page<User>> {
    require_role(caller.role, ADMIN_ONLY)?;
    Ok(ApiResponse::success(UserService::new(pool).list(&params, &filter).await?))
}

/// POST /api/users - Create a user (admin)
pub async fn user_create(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(caller): Extension<ValidatedUser>,
    Json(input): Json<CreateUser>,
) -> ApiResult<User> {
    require_role(caller.role, ADMIN_ONLY)?;
    Ok(ApiResponse::created(UserService::new(pool).create(input).await?))
}

/// GET /api/users/:id
pub async fn user_get(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(caller): Extension<ValidatedUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<User> {
    require_role(caller.role, ADMIN_ONLY)?;
    Ok(ApiResponse::success(UserService::new(pool).get(id).await?))
}

/// PATCH /api/users/:id
pub async fn user_update(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(caller): Extension<ValidatedUser>,
    Path(id): Path<Uuid>,
    Json(patch): Json<UpdateUser>,
) -> ApiResult<User> {
    require_role(caller.role, ADMIN_ONLY)?;
    Ok(ApiResponse::success(UserService::new(pool).update(id, patch, caller.id).await?))
}

/// POST /api/users/:id/deactivate
pub async fn user_deactivate(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(caller): Extension<ValidatedUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<User> {
    require_role(caller.role, ADMIN_ONLY)?;
    Ok(ApiResponse::success(UserService::new(pool).deactivate(id, caller.id).await?))
}

/// GET /api/users/:id/clients - Active client assignments for a user (any role)
pub async fn user_clients(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<UserClientAssignment>> {
    let service = UserService::new(pool);
    service.get(id).await?;
    Ok(ApiResponse::success(service.client_assignments(id).await?))
}
