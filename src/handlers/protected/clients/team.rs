use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use uuid::Uuid;

use crate::auth::require_role;
use crate::auth::roles::TEAM_WRITERS;
use crate::database::models::team::{CreateTeamAssignment, TeamListQuery, TeamMember, UpdateTeamAssignment};
use crate::database::models::ClientTeamAssignment;
use crate::middleware::{ApiResponse, ApiResult, TenantPool, ValidatedUser};
use crate::services::team_service::TeamService;

/// GET /api/clients/:id/team - Active members; `include_inactive=true` adds history
pub async fn team_list(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(client_id): Path<Uuid>,
    Query(query): Query<TeamListQuery>,
) -> ApiResult<Vec<TeamMember>> {
    let members = TeamService::new(pool).list(client_id, query.include_inactive).await?;
    Ok(ApiResponse::success(members))
}

/// POST /api/clients/:id/team - Assign a user to the client's team
pub async fn team_create(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<ValidatedUser>,
    Path(client_id): Path<Uuid>,
    Json(input): Json<CreateTeamAssignment>,
) -> ApiResult<ClientTeamAssignment> {
    require_role(user.role, TEAM_WRITERS)?;
    Ok(ApiResponse::created(TeamService::new(pool).create(client_id, input).await?))
}

/// GET /api/team/:id
pub async fn team_get(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<ClientTeamAssignment> {
    Ok(ApiResponse::success(TeamService::new(pool).get(id).await?))
}

/// PATCH /api/team/:id - Change role or notes
pub async fn team_update(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<ValidatedUser>,
    Path(id): Path<Uuid>,
    Json(patch): Json<UpdateTeamAssignment>,
) -> ApiResult<ClientTeamAssignment> {
    require_role(user.role, TEAM_WRITERS)?;
    Ok(ApiResponse::success(TeamService::new(pool).update(id, patch).await?))
}

/// POST /api/team/:id/deactivate
pub async fn team_deactivate(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<ValidatedUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<ClientTeamAssignment> {
    require_role(user.role, TEAM_WRITERS)?;
    Ok(ApiResponse::success(TeamService::new(pool).deactivate(id).await?))
}

/// DELETE /api/team/:id
pub async fn team_delete(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<ValidatedUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    require_role(user.role, TEAM_WRITERS)?;
    TeamService::new(pool).delete(id).await?;
    Ok(ApiResponse::no_content())
}
