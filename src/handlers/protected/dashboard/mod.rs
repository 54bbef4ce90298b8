// Read-only aggregates. Money totals need a finance reader role
use axum::{extract::Query, Extension};

use crate::auth::require_role;
use crate::auth::roles::{can_read_finances, FINANCE_READERS};

use crate::database::models::financial::MonthlyTotal;
use crate::middleware::{ApiResponse, ApiResult, TenantPool, ValidatedUser};
use crate::services::contract_service::{ExpiringContract, ExpiringQuery};
use crate::services::dashboard_service::{DashboardOverview, DashboardService, HardwareDashboard, TrendQuery};

/// GET /api/dashboard/overview
pub async fn dashboard_overview(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<ValidatedUser>,
) -> ApiResult<DashboardOverview> {
    let overview = DashboardService::new(pool).overview(can_read_finances(user.role)).await?;
    Ok(ApiResponse::success(overview))
}

/// GET /api/dashboard/expiring-contracts?days=30
pub async fn dashboard_expiring(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Query(query): Query<ExpiringQuery>,
) -> ApiResult<Vec<ExpiringContract>> {
    Ok(ApiResponse::success(DashboardService::new(pool).expiring_contracts(query.days).await?))
}

/// GET /api/dashboard/financial-trend?months=12
pub async fn dashboard_trend(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<ValidatedUser>,
    Query(query): Query<TrendQuery>,
) -> ApiResult<Vec<MonthlyTotal>> {
    require_role(user.role, FINANCE_READERS)?;
    Ok(ApiResponse::success(DashboardService::new(pool).financial_trend(&query).await?))
}

/// GET /api/dashboard/hardware
pub async fn dashboard_hardware(Extension(TenantPool(pool)): Extension<TenantPool>) -> ApiResult<HardwareDashboard> {
    Ok(ApiResponse::success(DashboardService::new(pool).hardware().await?))
}
