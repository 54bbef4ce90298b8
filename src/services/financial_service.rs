use chrono::{Datelike, NaiveDate, Utc};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::database::models::financial::{
    month_starts, monthly_trend, validate_range, CategoryTotalRow, CreateTransaction, FinancialSummary,
    MonthlyRow, MonthlyTotal, SummaryQuery, TransactionFilter, UpdateTransaction,
};
use crate::database::models::FinancialTransaction;
use crate::config;
use crate::database::query::{ListParams, Page, SortDirection};
use crate::error::ApiError;
use crate::services::dashboard_service::TrendQuery;
use crate::validation::normalize_currency;

const TRANSACTION_COLUMNS: &str = "id, transaction_type, category, amount, currency, transaction_date, description, \
     status, reference_number, client_id, contract_id, service_scope_id, hardware_asset_id, recorded_by, \
     created_at, updated_at";
const SORTABLE: &[&str] = &["transaction_date", "amount", "category", "status", "created_at"];

pub const DEFAULT_TREND_MONTHS: u32 = 12;
pub const MAX_TREND_MONTHS: u32 = 60;

pub struct FinancialService {
    pool: PgPool,
}

impl FinancialService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, params: &ListParams, filter: &TransactionFilter) -> Result<Page<FinancialTransaction>, ApiError> {
        filter.validate()?;
        let pagination = params.pagination()?;
        let order = params.order_by(SORTABLE, ("transaction_date", SortDirection::Desc))?;

        let predicate = "($1::transaction_type IS NULL OR transaction_type = $1) \
             AND ($2::transaction_status IS NULL OR status = $2) \
             AND ($3::transaction_category IS NULL OR category = $3) \
             AND ($4::uuid IS NULL OR client_id = $4) \
             AND ($5::uuid IS NULL OR contract_id = $5) \
             AND ($6::date IS NULL OR transaction_date >= $6) \
             AND ($7::date IS NULL OR transaction_date <= $7)";

        let (total,): (i64,) =
            sqlx::query_as(&format!("SELECT COUNT(*) FROM financial_transactions WHERE {}", predicate))
                .bind(filter.transaction_type)
                .bind(filter.status)
                .bind(filter.category)
                .bind(filter.client_id)
                .bind(filter.contract_id)
                .bind(filter.from)
                .bind(filter.to)
                .fetch_one(&self.pool)
                .await?;

        let sql = format!(
            "SELECT {} FROM financial_transactions WHERE {} ORDER BY {} LIMIT $8 OFFSET $9",
            TRANSACTION_COLUMNS, predicate, order
        );
        let items = sqlx::query_as::<_, FinancialTransaction>(&sql)
            .bind(filter.transaction_type)
            .bind(filter.status)
            .bind(filter.category)
            .bind(filter.client_id)
            .bind(filter.contract_id)
            .bind(filter.from)
            .bind(filter.to)
            .bind(pagination.limit)
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(items, total, pagination))
    }

    pub async fn get(&self, id: Uuid) -> Result<FinancialTransaction, ApiError> {
        let sql = format!("SELECT {} FROM financial_transactions WHERE id = $1", TRANSACTION_COLUMNS);
        sqlx::query_as::<_, FinancialTransaction>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Transaction {} not found", id)))
    }

    async fn exists(&self, sql: &str, id: Uuid) -> Result<bool, ApiError> {
        let (count,): (i64,) = sqlx::query_as(sql).bind(id).fetch_one(&self.pool).await?;
        Ok(count > 0)
    }

    /// Every referenced record must exist, and a scope must belong to the referenced contract
    async fn validate_references(&self, tx: &FinancialTransaction) -> Result<(), ApiError> {
        if let Some(id) = tx.client_id {
            if !self.exists("SELECT COUNT(*) FROM clients WHERE id = $1 AND deleted_at IS NULL", id).await? {
                return Err(ApiError::not_found(format!("Client {} not found", id)));
            }
        }
        if let Some(id) = tx.contract_id {
            let row: Option<(Uuid,)> =
                sqlx::query_as("SELECT client_id FROM contracts WHERE id = $1 AND deleted_at IS NULL")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?;
            let (contract_client,) = row.ok_or_else(|| ApiError::not_found(format!("Contract {} not found", id)))?;
            if tx.client_id.is_some_and(|c| c != contract_client) {
                return Err(ApiError::invalid_field("contract_id", "Contract does not belong to the given client"));
            }
        }
        if let Some(id) = tx.service_scope_id {
            let row: Option<(Uuid,)> = sqlx::query_as("SELECT contract_id FROM service_scopes WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
            let (scope_contract,) =
                row.ok_or_else(|| ApiError::not_found(format!("Service scope {} not found", id)))?;
            if tx.contract_id.is_some_and(|c| c != scope_contract) {
                return Err(ApiError::invalid_field(
                    "service_scope_id",
                    "Service scope does not belong to the given contract",
                ));
            }
        }
        if let Some(id) = tx.hardware_asset_id {
            if !self.exists("SELECT COUNT(*) FROM hardware_assets WHERE id = $1 AND deleted_at IS NULL", id).await? {
                return Err(ApiError::not_found(format!("Hardware asset {} not found", id)));
            }
        }
        Ok(())
    }

    pub async fn create(&self, input: CreateTransaction, recorded_by: Uuid) -> Result<FinancialTransaction, ApiError> {
        let tx = input.into_transaction(recorded_by, Utc::now())?;
        self.validate_references(&tx).await?;

        let sql = format!(
            "INSERT INTO financial_transactions (id, transaction_type, category, amount, currency, transaction_date, \
             description, status, reference_number, client_id, contract_id, service_scope_id, hardware_asset_id, \
             recorded_by, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) RETURNING {}",
            TRANSACTION_COLUMNS
        );
        let created = sqlx::query_as::<_, FinancialTransaction>(&sql)
            .bind(tx.id)
            .bind(tx.transaction_type)
            .bind(tx.category)
            .bind(tx.amount)
            .bind(&tx.currency)
            .bind(tx.transaction_date)
            .bind(&tx.description)
            .bind(tx.status)
            .bind(&tx.reference_number)
            .bind(tx.client_id)
            .bind(tx.contract_id)
            .bind(tx.service_scope_id)
            .bind(tx.hardware_asset_id)
            .bind(tx.recorded_by)
            .bind(tx.created_at)
            .bind(tx.updated_at)
            .fetch_one(&self.pool)
            .await?;

        info!("Recorded {:?} transaction {} of {} {}", created.transaction_type, created.id, created.amount, created.currency);
        Ok(created)
    }

    pub async fn update(&self, id: Uuid, patch: UpdateTransaction) -> Result<FinancialTransaction, ApiError> {
        let mut tx = self.get(id).await?;
        patch.apply(&mut tx)?;
        self.validate_references(&tx).await?;

        let sql = format!(
            "UPDATE financial_transactions SET transaction_type = $2, category = $3, amount = $4, currency = $5, \
             transaction_date = $6, description = $7, status = $8, reference_number = $9, client_id = $10, \
             contract_id = $11, service_scope_id = $12, hardware_asset_id = $13, updated_at = $14 \
             WHERE id = $1 RETURNING {}",
            TRANSACTION_COLUMNS
        );
        Ok(sqlx::query_as::<_, FinancialTransaction>(&sql)
            .bind(tx.id)
            .bind(tx.transaction_type)
            .bind(tx.category)
            .bind(tx.amount)
            .bind(&tx.currency)
            .bind(tx.transaction_date)
            .bind(&tx.description)
            .bind(tx.status)
            .bind(&tx.reference_number)
            .bind(tx.client_id)
            .bind(tx.contract_id)
            .bind(tx.service_scope_id)
            .bind(tx.hardware_asset_id)
            .bind(tx.updated_at)
            .fetch_one(&self.pool)
            .await?)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ApiError> {
        let result = sqlx::query("DELETE FROM financial_transactions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::not_found(format!("Transaction {} not found", id)));
        }
        info!("Deleted transaction {}", id);
        Ok(())
    }

    /// Totals over completed transactions in one currency; other currencies are only listed
    pub async fn summary(&self, query: &SummaryQuery) -> Result<FinancialSummary, ApiError> {
        validate_range(query.from, query.to)?;
        let currency = reporting_currency(query.currency.as_deref())?;

        let rows = sqlx::query_as::<_, CategoryTotalRow>(
            r#"
            SELECT transaction_type, category, COALESCE(SUM(amount), 0) AS total, COUNT(*) AS count
            FROM financial_transactions
            WHERE status = 'completed'
            AND ($1::date IS NULL OR transaction_date >= $1)
            AND ($2::date IS NULL OR transaction_date <= $2)
            AND ($3::uuid IS NULL OR client_id = $3)
            AND currency = $4
            GROUP BY transaction_type, category
            ORDER BY transaction_type, category
            "#,
        )
        .bind(query.from)
        .bind(query.to)
        .bind(query.client_id)
        .bind(&currency)
        .fetch_all(&self.pool)
        .await?;

        let others: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT currency
            FROM financial_transactions
            WHERE status = 'completed'
            AND ($1::date IS NULL OR transaction_date >= $1)
            AND ($2::date IS NULL OR transaction_date <= $2)
            AND ($3::uuid IS NULL OR client_id = $3)
            AND currency <> $4
            ORDER BY currency
            "#,
        )
        .bind(query.from)
        .bind(query.to)
        .bind(query.client_id)
        .bind(&currency)
        .fetch_all(&self.pool)
        .await?;

        let mut summary = FinancialSummary::from_rows(query, &currency, rows);
        summary.other_currencies = others.into_iter().map(|(c,)| c).collect();
        Ok(summary)
    }

    /// Summary of the month containing `today`, and of the year so far
    pub async fn current_periods(&self, today: NaiveDate) -> Result<(FinancialSummary, FinancialSummary), ApiError> {
        let month_start = today.with_day(1).unwrap_or(today);
        let year_start = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(month_start);

        let month = self
            .summary(&SummaryQuery { from: Some(month_start), to: Some(today), ..Default::default() })
            .await?;
        let year = self
            .summary(&SummaryQuery { from: Some(year_start), to: Some(today), ..Default::default() })
            .await?;
        Ok((month, year))
    }

    pub async fn monthly_trend(&self, query: &TrendQuery) -> Result<Vec<MonthlyTotal>, ApiError> {
        let months = query.months.unwrap_or(DEFAULT_TREND_MONTHS);
        let currency = reporting_currency(query.currency.as_deref())?;
        if months == 0 || months > MAX_TREND_MONTHS {
            return Err(ApiError::invalid_field(
                "months",
                format!("Must be between 1 and {}", MAX_TREND_MONTHS),
            ));
        }

        let starts = month_starts(Utc::now().date_naive(), months);
        let first = match starts.first() {
            Some(first) => *first,
            None => return Ok(Vec::new()),
        };

        let rows = sqlx::query_as::<_, MonthlyRow>(
            r#"
            SELECT date_trunc('month', transaction_date)::date AS month,
                   COALESCE(SUM(amount) FILTER (WHERE transaction_type = 'revenue'), 0) AS revenue,
                   COALESCE(SUM(amount) FILTER (WHERE transaction_type = 'expense'), 0) AS expense
            FROM financial_transactions
            WHERE status = 'completed' AND transaction_date >= $1 AND currency = $2
            GROUP BY 1
            ORDER BY 1
            "#,
        )
        .bind(first)
        .bind(&currency)
        .fetch_all(&self.pool)
        .await?;

        Ok(monthly_trend(&starts, &currency, rows))
    }
}

/// The requested currency, or the configured reporting currency
pub fn reporting_currency(requested: Option<&str>) -> Result<String, ApiError> {
    match requested.map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) => normalize_currency("currency", code),
        None => Ok(config::config().finance.reporting_currency.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reporting_currency_normalizes_requests() {
        assert_eq!(reporting_currency(Some(" eur ")).unwrap(), "EUR");
        assert!(reporting_currency(Some("euro")).is_err());
    }

    #[test]
    fn reporting_currency_falls_back_to_config() {
        let expected = config::config().finance.reporting_currency.clone();
        assert_eq!(reporting_currency(None).unwrap(), expected);
        assert_eq!(reporting_currency(Some("")).unwrap(), expected);
    }
}
