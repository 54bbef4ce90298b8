use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use uuid::Uuid;

use crate::auth::require_role;
use crate::auth::roles::{can_read_finances, CLIENT_WRITERS};
use crate::database::models::client::{ClientFilter, CreateClient, UpdateClient};
use crate::database::models::Client;
use crate::database::query::{ListParams, Page};
use crate::middleware::{ApiResponse, ApiResult, TenantPool, ValidatedUser};
use crate::services::client_service::{ClientOverview, ClientService};

/// GET /api/clients - List clients
///
/// Query: `status`, `search` (company, contact or email), `page`, `limit`,
/// `sort` (e.g. `company_name asc`)
pub async fn client_list(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Query(params): Query<ListParams>,
    Query(filter): Query<ClientFilter>,
) -> ApiResult<Page<Client>> {
    Ok(ApiResponse::success(ClientService::new(pool).list(&params, &filter).await?))
}

/// POST /api/clients - Create a client
pub async fn client_create(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<ValidatedUser>,
    Json(input): Json<CreateClient>,
) -> ApiResult<Client> {
    require_role(user.role, CLIENT_WRITERS)?;
    Ok(ApiResponse::created(ClientService::new(pool).create(input).await?))
}

/// GET /api/clients/:id
pub async fn client_get(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Client> {
    Ok(ApiResponse::success(ClientService::new(pool).get(id).await?))
}

/// PATCH /api/clients/:id
pub async fn client_update(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<ValidatedUser>,
    Path(id): Path<Uuid>,
    Json(patch): Json<UpdateClient>,
) -> ApiResult<Client> {
    require_role(user.role, CLIENT_WRITERS)?;
    Ok(ApiResponse::success(ClientService::new(pool).update(id, patch).await?))
}

/// DELETE /api/clients/:id - Soft delete
pub async fn client_delete(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<ValidatedUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    require_role(user.role, CLIENT_WRITERS)?;
    ClientService::new(pool).delete(id).await?;
    Ok(ApiResponse::no_content())
}

/// POST /api/clients/:id/restore - Undo a soft delete
pub async fn client_restore(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<ValidatedUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Client> {
    require_role(user.role, CLIENT_WRITERS)?;
    Ok(ApiResponse::success(ClientService::new(pool).restore(id).await?))
}

/// GET /api/clients/:id/overview - Client with contracts, team, hardware and
/// (for finance readers) financials
pub async fn client_overview(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<ValidatedUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<ClientOverview> {
    let overview = ClientService::new(pool).overview(id, can_read_finances(user.role)).await?;
    Ok(ApiResponse::success(overview))
}
