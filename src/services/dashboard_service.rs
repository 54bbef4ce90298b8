use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::models::financial::{FinancialSummary, MonthlyTotal};
use crate::database::models::HardwareStatus;
use crate::error::ApiError;
use crate::services::contract_service::{ContractService, ExpiringContract};
use crate::services::financial_service::FinancialService;

const WARRANTY_WINDOW_DAYS: i64 = 90;

/// `label` is the enum value as stored, e.g. `in_stock`
#[derive(Debug, Clone, Serialize, FromRow, PartialEq)]
pub struct LabelCount {
    pub label: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContractTotals {
    pub active_count: i64,
    pub active_value: Decimal,
    pub expiring_30_days: i64,
    pub expiring_60_days: i64,
    pub expiring_90_days: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PeriodTotals {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub currency: String,
    pub revenue: Decimal,
    pub expense: Decimal,
    pub net: Decimal,
}

impl From<FinancialSummary> for PeriodTotals {
    fn from(summary: FinancialSummary) -> Self {
        Self {
            from: summary.from,
            to: summary.to,
            currency: summary.currency,
            revenue: summary.total_revenue,
            expense: summary.total_expense,
            net: summary.net,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardOverview {
    pub clients_by_status: Vec<LabelCount>,
    pub contracts: ContractTotals,
    pub hardware_by_status: Vec<LabelCount>,
    pub saf_status: Vec<LabelCount>,
    /// Money totals are `None` unless the caller may read financials
    pub current_month: Option<PeriodTotals>,
    pub year_to_date: Option<PeriodTotals>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct WarrantyExpiry {
    pub id: Uuid,
    pub asset_tag: String,
    pub name: String,
    pub status: HardwareStatus,
    pub warranty_expiry_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct HardwareDashboard {
    pub by_status: Vec<LabelCount>,
    pub by_type: Vec<LabelCount>,
    pub warranties_expiring: Vec<WarrantyExpiry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrendQuery {
    pub months: Option<u32>,
    pub currency: Option<String>,
}

#[derive(FromRow)]
struct ContractTotalsRow {
    active_count: i64,
    active_value: Decimal,
    expiring_30_days: i64,
    expiring_60_days: i64,
    expiring_90_days: i64,
}

pub struct DashboardService {
    pool: PgPool,
}

impl DashboardService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn counts(&self, sql: &str) -> Result<Vec<LabelCount>, ApiError> {
        Ok(sqlx::query_as::<_, LabelCount>(sql).fetch_all(&self.pool).await?)
    }

    pub async fn overview(&self, include_financials: bool) -> Result<DashboardOverview, ApiError> {
        let today = Utc::now().date_naive();

        let clients_by_status = self
            .counts(
                "SELECT status::text AS label, COUNT(*) AS count FROM clients \
                 WHERE deleted_at IS NULL GROUP BY status ORDER BY status",
            )
            .await?;

        let row = sqlx::query_as::<_, ContractTotalsRow>(
            r#"
            SELECT COUNT(*) AS active_count,
                   COALESCE(SUM(value), 0) AS active_value,
                   COUNT(*) FILTER (WHERE end_date BETWEEN $1 AND $1 + 30) AS expiring_30_days,
                   COUNT(*) FILTER (WHERE end_date BETWEEN $1 AND $1 + 60) AS expiring_60_days,
                   COUNT(*) FILTER (WHERE end_date BETWEEN $1 AND $1 + 90) AS expiring_90_days
            FROM contracts
            WHERE deleted_at IS NULL AND status = 'active'
            "#,
        )
        .bind(today)
        .fetch_one(&self.pool)
        .await?;

        let hardware_by_status = self
            .counts(
                "SELECT status::text AS label, COUNT(*) AS count FROM hardware_assets \
                 WHERE deleted_at IS NULL GROUP BY status ORDER BY status",
            )
            .await?;

        let saf_status = self
            .counts(
                "SELECT s.saf_status::text AS label, COUNT(*) AS count FROM service_scopes s \
                 JOIN contracts c ON c.id = s.contract_id \
                 WHERE s.is_active AND c.deleted_at IS NULL GROUP BY s.saf_status ORDER BY s.saf_status",
            )
            .await?;

        let (current_month, year_to_date) = if include_financials {
            let (month, year) = FinancialService::new(self.pool.clone()).current_periods(today).await?;
            (Some(month.into()), Some(year.into()))
        } else {
            (None, None)
        };

        Ok(DashboardOverview {
            clients_by_status,
            contracts: ContractTotals {
                active_count: row.active_count,
                active_value: row.active_value,
                expiring_30_days: row.expiring_30_days,
                expiring_60_days: row.expiring_60_days,
                expiring_90_days: row.expiring_90_days,
            },
            hardware_by_status,
            saf_status,
            current_month,
            year_to_date,
        })
    }

    pub async fn expiring_contracts(&self, days: Option<i64>) -> Result<Vec<ExpiringContract>, ApiError> {
        ContractService::new(self.pool.clone()).expiring(days).await
    }

    pub async fn financial_trend(&self, query: &TrendQuery) -> Result<Vec<MonthlyTotal>, ApiError> {
        FinancialService::new(self.pool.clone()).monthly_trend(query).await
    }

    pub async fn hardware(&self) -> Result<HardwareDashboard, ApiError> {
        let today = Utc::now().date_naive();

        let by_status = self
            .counts(
                "SELECT status::text AS label, COUNT(*) AS count FROM hardware_assets \
                 WHERE deleted_at IS NULL GROUP BY status ORDER BY status",
            )
            .await?;
        let by_type = self
            .counts(
                "SELECT asset_type::text AS label, COUNT(*) AS count FROM hardware_assets \
                 WHERE deleted_at IS NULL GROUP BY asset_type ORDER BY asset_type",
            )
            .await?;

        let warranties_expiring = sqlx::query_as::<_, WarrantyExpiry>(
            r#"
            SELECT id, asset_tag, name, status, warranty_expiry_date
            FROM hardware_assets
            WHERE deleted_at IS NULL
            AND status NOT IN ('retired', 'lost')
            AND warranty_expiry_date BETWEEN $1 AND $2
            ORDER BY warranty_expiry_date, asset_tag
            "#,
        )
        .bind(today)
        .bind(today + Duration::days(WARRANTY_WINDOW_DAYS))
        .fetch_all(&self.pool)
        .await?;

        Ok(HardwareDashboard { by_status, by_type, warranties_expiring })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::financial::SummaryQuery;

    #[test]
    fn period_totals_carry_summary_range() {
        let from = NaiveDate::from_ymd_opt(2026, 10, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2026, 10, 14).unwrap();
        let query = SummaryQuery { from: Some(from), to: Some(to), ..Default::default() };
        let totals = PeriodTotals::from(FinancialSummary::from_rows(&query, "EUR", Vec::new()));
        assert_eq!(totals.from, Some(from));
        assert_eq!(totals.currency, "EUR");
        assert_eq!(totals.revenue, Decimal::ZERO);
        assert_eq!(totals.net, Decimal::ZERO);
    }
}
