use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::ApiError;
use crate::validation::{double_option, normalize_currency, optional_text};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "transaction_type", rename_all = "snake_case")]
pub enum TransactionType {
    Revenue,
    Expense,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "transaction_category", rename_all = "snake_case")]
pub enum TransactionCategory {
    ContractPayment,
    HardwarePurchase,
    License,
    Service,
    Consulting,
    Operational,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "transaction_status", rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FinancialTransaction {
    pub id: Uuid,
    pub transaction_type: TransactionType,
    pub category: TransactionCategory,
    pub amount: Decimal,
    pub currency: String,
    pub transaction_date: NaiveDate,
    pub description: Option<String>,
    pub status: TransactionStatus,
    pub reference_number: Option<String>,
    pub client_id: Option<Uuid>,
    pub contract_id: Option<Uuid>,
    pub service_scope_id: Option<Uuid>,
    pub hardware_asset_id: Option<Uuid>,
    pub recorded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn validate_amount(amount: Decimal) -> Result<(), ApiError> {
    if amount <= Decimal::ZERO {
        return Err(ApiError::invalid_field("amount", "Amount must be greater than zero"));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTransaction {
    pub transaction_type: TransactionType,
    pub category: Option<TransactionCategory>,
    pub amount: Decimal,
    pub currency: Option<String>,
    pub transaction_date: NaiveDate,
    pub description: Option<String>,
    pub status: Option<TransactionStatus>,
    pub reference_number: Option<String>,
    pub client_id: Option<Uuid>,
    pub contract_id: Option<Uuid>,
    pub service_scope_id: Option<Uuid>,
    pub hardware_asset_id: Option<Uuid>,
}

impl CreateTransaction {
    pub fn into_transaction(self, recorded_by: Uuid, now: DateTime<Utc>) -> Result<FinancialTransaction, ApiError> {
        validate_amount(self.amount)?;
        Ok(FinancialTransaction {
            id: Uuid::new_v4(),
            transaction_type: self.transaction_type,
            category: self.category.unwrap_or(TransactionCategory::Other),
            amount: self.amount,
            currency: normalize_currency("currency", self.currency.as_deref().unwrap_or("USD"))?,
            transaction_date: self.transaction_date,
            description: optional_text(self.description),
            status: self.status.unwrap_or(TransactionStatus::Completed),
            reference_number: optional_text(self.reference_number),
            client_id: self.client_id,
            contract_id: self.contract_id,
            service_scope_id: self.service_scope_id,
            hardware_asset_id: self.hardware_asset_id,
            recorded_by: Some(recorded_by),
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTransaction {
    pub transaction_type: Option<TransactionType>,
    pub category: Option<TransactionCategory>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub transaction_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub status: Option<TransactionStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub reference_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub client_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    pub contract_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    pub service_scope_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    pub hardware_asset_id: Option<Option<Uuid>>,
}

impl UpdateTransaction {
    pub fn apply(self, tx: &mut FinancialTransaction) -> Result<(), ApiError> {
        if let Some(t) = self.transaction_type {
            tx.transaction_type = t;
        }
        if let Some(c) = self.category {
            tx.category = c;
        }
        if let Some(amount) = self.amount {
            validate_amount(amount)?;
            tx.amount = amount;
        }
        if let Some(c) = self.currency {
            tx.currency = normalize_currency("currency", &c)?;
        }
        if let Some(d) = self.transaction_date {
            tx.transaction_date = d;
        }
        if let Some(v) = self.description {
            tx.description = optional_text(v);
        }
        if let Some(s) = self.status {
            tx.status = s;
        }
        if let Some(v) = self.reference_number {
            tx.reference_number = optional_text(v);
        }
        if let Some(v) = self.client_id {
            tx.client_id = v;
        }
        if let Some(v) = self.contract_id {
            tx.contract_id = v;
        }
        if let Some(v) = self.service_scope_id {
            tx.service_scope_id = v;
        }
        if let Some(v) = self.hardware_asset_id {
            tx.hardware_asset_id = v;
        }
        tx.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionFilter {
    pub transaction_type: Option<TransactionType>,
    pub status: Option<TransactionStatus>,
    pub category: Option<TransactionCategory>,
    pub client_id: Option<Uuid>,
    pub contract_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl TransactionFilter {
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_range(self.from, self.to)
    }
}

pub fn validate_range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<(), ApiError> {
    match (from, to) {
        (Some(f), Some(t)) if t < f => Err(ApiError::invalid_field("to", "Range end is before its start")),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummaryQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub client_id: Option<Uuid>,
    /// Defaults to the configured reporting currency
    pub currency: Option<String>,
}

/// Aggregated row as returned by the summary GROUP BY
#[derive(Debug, Clone, FromRow)]
pub struct CategoryTotalRow {
    pub transaction_type: TransactionType,
    pub category: TransactionCategory,
    pub total: Decimal,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryTotal {
    pub transaction_type: TransactionType,
    pub category: TransactionCategory,
    pub total: Decimal,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FinancialSummary {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub client_id: Option<Uuid>,
    /// Every amount below is in this currency
    pub currency: String,
    /// Currencies with completed transactions in range that the totals leave out
    pub other_currencies: Vec<String>,
    pub total_revenue: Decimal,
    pub total_expense: Decimal,
    pub net: Decimal,
    pub revenue_count: i64,
    pub expense_count: i64,
    pub by_category: Vec<CategoryTotal>,
}

impl FinancialSummary {
    pub fn from_rows(query: &SummaryQuery, currency: &str, rows: Vec<CategoryTotalRow>) -> Self {
        let mut summary = FinancialSummary {
            from: query.from,
            to: query.to,
            client_id: query.client_id,
            currency: currency.to_string(),
            other_currencies: Vec::new(),
            total_revenue: Decimal::ZERO,
            total_expense: Decimal::ZERO,
            net: Decimal::ZERO,
            revenue_count: 0,
            expense_count: 0,
            by_category: Vec::with_capacity(rows.len()),
        };

        for row in rows {
            match row.transaction_type {
                TransactionType::Revenue => {
                    summary.total_revenue += row.total;
                    summary.revenue_count += row.count;
                }
                TransactionType::Expense => {
                    summary.total_expense += row.total;
                    summary.expense_count += row.count;
                }
            }
            summary.by_category.push(CategoryTotal {
                transaction_type: row.transaction_type,
                category: row.category,
                total: row.total,
                count: row.count,
            });
        }
        summary.net = summary.total_revenue - summary.total_expense;
        summary
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct MonthlyRow {
    pub month: NaiveDate,
    pub revenue: Decimal,
    pub expense: Decimal,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MonthlyTotal {
    /// `YYYY-MM`
    pub month: String,
    pub currency: String,
    pub revenue: Decimal,
    pub expense: Decimal,
    pub net: Decimal,
}

/// First day of each of the `months` months ending with the month of `today`, oldest first
pub fn month_starts(today: NaiveDate, months: u32) -> Vec<NaiveDate> {
    use chrono::{Datelike, Months};

    let current = today.with_day(1).unwrap_or(today);
    (0..months)
        .rev()
        .filter_map(|back| current.checked_sub_months(Months::new(back)))
        .collect()
}

/// Fills months without transactions with zeros so the trend has no gaps
pub fn monthly_trend(starts: &[NaiveDate], currency: &str, rows: Vec<MonthlyRow>) -> Vec<MonthlyTotal> {
    starts
        .iter()
        .map(|start| {
            let (revenue, expense) = rows
                .iter()
                .find(|r| r.month == *start)
                .map(|r| (r.revenue, r.expense))
                .unwrap_or((Decimal::ZERO, Decimal::ZERO));
            MonthlyTotal {
                month: start.format("%Y-%m").to_string(),
                currency: currency.to_string(),
                revenue,
                expense,
                net: revenue - expense,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn amount_must_be_positive() {
        let input = CreateTransaction {
            transaction_type: TransactionType::Expense,
            category: None,
            amount: Decimal::ZERO,
            currency: None,
            transaction_date: date("2025-03-01"),
            description: None,
            status: None,
            reference_number: None,
            client_id: None,
            contract_id: None,
            service_scope_id: None,
            hardware_asset_id: None,
        };
        assert!(input.into_transaction(Uuid::new_v4(), Utc::now()).is_err());
    }

    #[test]
    fn summary_totals_by_type() {
        let rows = vec![
            CategoryTotalRow {
                transaction_type: TransactionType::Revenue,
                category: TransactionCategory::ContractPayment,
                total: dec("1500.50"),
                count: 3,
            },
            CategoryTotalRow {
                transaction_type: TransactionType::Expense,
                category: TransactionCategory::HardwarePurchase,
                total: dec("400.25"),
                count: 1,
            },
            CategoryTotalRow {
                transaction_type: TransactionType::Expense,
                category: TransactionCategory::License,
                total: dec("100"),
                count: 2,
            },
        ];
        let summary = FinancialSummary::from_rows(&SummaryQuery::default(), "USD", rows);
        assert_eq!(summary.total_revenue, dec("1500.50"));
        assert_eq!(summary.total_expense, dec("500.25"));
        assert_eq!(summary.net, dec("1000.25"));
        assert_eq!(summary.revenue_count, 3);
        assert_eq!(summary.expense_count, 3);
        assert_eq!(summary.by_category.len(), 3);
        assert_eq!(summary.currency, "USD");
    }

    #[test]
    fn month_starts_cross_year_boundary() {
        let starts = month_starts(date("2025-02-17"), 4);
        assert_eq!(
            starts,
            vec![date("2024-11-01"), date("2024-12-01"), date("2025-01-01"), date("2025-02-01")]
        );
    }

    #[test]
    fn trend_fills_empty_months() {
        let starts = month_starts(date("2025-03-10"), 3);
        let rows = vec![MonthlyRow { month: date("2025-02-01"), revenue: dec("10"), expense: dec("4") }];
        let trend = monthly_trend(&starts, "EUR", rows);
        assert_eq!(trend.len(), 3);
        assert_eq!(trend[0].month, "2025-01");
        assert_eq!(trend[0].net, Decimal::ZERO);
        assert_eq!(trend[1].net, dec("6"));
        assert!(trend.iter().all(|m| m.currency == "EUR"));
    }

    #[test]
    fn range_must_be_ordered() {
        assert!(validate_range(Some(date("2025-02-01")), Some(date("2025-01-01"))).is_err());
        assert!(validate_range(Some(date("2025-01-01")), None).is_ok());
    }
}
