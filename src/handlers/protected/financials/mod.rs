use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use uuid::Uuid;

use crate::auth::require_role;
use crate::auth::roles::{FINANCE_READERS, FINANCE_WRITERS};
use crate::database::models::financial::{
    CreateTransaction, FinancialSummary, MonthlyTotal, SummaryQuery, TransactionFilter, UpdateTransaction,
};
use crate::database::models::FinancialTransaction;
use crate::database::query::{ListParams, Page};
use crate::middleware::{ApiResponse, ApiResult, TenantPool, ValidatedUser};
use crate::services::dashboard_service::TrendQuery;
use crate::services::financial_service::FinancialService;

/// GET /api/financials - List transactions
///
/// Query: `transaction_type`, `status`, `category`, `client_id`, `contract_id`,
/// `from`, `to` plus paging and sort
pub async fn transaction_list(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<ValidatedUser>,
    Query(params): Query<ListParams>,
    Query(filter): Query<TransactionFilter>,
) -> ApiResult<Page<FinancialTransaction>> {
    require_role(user.role, FINANCE_READERS)?;
    Ok(ApiResponse::success(FinancialService::new(pool).list(&params, &filter).await?))
}

/// POST /api/financials - Record a transaction; `recorded_by` is the caller
pub async fn transaction_create(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<ValidatedUser>,
    Json(input): Json<CreateTransaction>,
) -> ApiResult<FinancialTransaction> {
    require_role(user.role, FINANCE_WRITERS)?;
    Ok(ApiResponse::created(FinancialService::new(pool).create(input, user.id).await?))
}

/// GET /api/financials/summary?from=&to=&client_id=&currency= - Completed totals by type and category
pub async fn transaction_summary(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<ValidatedUser>,
    Query(query): Query<SummaryQuery>,
) -> ApiResult<FinancialSummary> {
    require_role(user.role, FINANCE_READERS)?;
    Ok(ApiResponse::success(FinancialService::new(pool).summary(&query).await?))
}

/// GET /api/financials/trend?months=12&currency=EUR
pub async fn transaction_trend(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<ValidatedUser>,
    Query(query): Query<TrendQuery>,
) -> ApiResult<Vec<MonthlyTotal>> {
    require_role(user.role, FINANCE_READERS)?;
    Ok(ApiResponse::success(FinancialService::new(pool).monthly_trend(&query).await?))
}

/// GET /api/financials/:id
pub async fn transaction_get(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<ValidatedUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<FinancialTransaction> {
    require_role(user.role, FINANCE_READERS)?;
    Ok(ApiResponse::success(FinancialService::new(pool).get(id).await?))
}

/// PATCH /api/financials/:id
pub async fn transaction_update(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<ValidatedUser>,
    Path(id): Path<Uuid>,
    Json(patch): Json<UpdateTransaction>,
) -> ApiResult<FinancialTransaction> {
    require_role(user.role, FINANCE_WRITERS)?;
    Ok(ApiResponse::success(FinancialService::new(pool).update(id, patch).await?))
}

/// DELETE /api/financials/:id - Hard delete
pub async fn transaction_delete(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<ValidatedUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    require_role(user.role, FINANCE_WRITERS)?;
    FinancialService::new(pool).delete(id).await?;
    Ok(ApiResponse::no_content())
}
