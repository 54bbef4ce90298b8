use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::database::models::contract::{
    ContractFilter, CreateContract, CreateServiceScope, RenewContract, UpdateContract, UpdateSafStatus,
    UpdateServiceScope,
};
use crate::database::models::{Contract, ContractStatus, ServiceScope};
use crate::database::query::{ListParams, Page, SortDirection};
use crate::error::ApiError;
use crate::validation::optional_text;

pub const CONTRACT_COLUMNS: &str = "id, client_id, contract_name, contract_number, start_date, end_date, \
     renewal_date, value, currency, status, document_link, notes, created_at, updated_at, deleted_at";
pub const SCOPE_COLUMNS: &str = "id, contract_id, service_name, description, scope_parameters, price, saf_status, \
     saf_document_link, saf_sent_at, saf_signed_at, saf_activated_at, notes, is_active, created_at, updated_at";
const SORTABLE: &[&str] = &["contract_name", "start_date", "end_date", "value", "status", "created_at"];

pub const DEFAULT_EXPIRY_WINDOW_DAYS: i64 = 30;
const MAX_EXPIRY_WINDOW_DAYS: i64 = 3650;

#[derive(Debug, Serialize)]
pub struct ContractDetail {
    #[serde(flatten)]
    pub contract: Contract,
    pub service_scopes: Vec<ServiceScope>,
}

#[derive(Debug, Serialize)]
pub struct RenewalResult {
    pub previous: Contract,
    pub renewal: Contract,
    pub service_scopes: Vec<ServiceScope>,
}

/// Active contract ending inside the requested window
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ExpiringContract {
    pub id: Uuid,
    pub client_id: Uuid,
    pub company_name: String,
    pub contract_name: String,
    pub contract_number: Option<String>,
    pub end_date: NaiveDate,
    pub value: Decimal,
    pub currency: String,
    pub days_remaining: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExpiringQuery {
    pub days: Option<i64>,
}

pub struct ContractService {
    pool: PgPool,
}

impl ContractService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, params: &ListParams, filter: &ContractFilter) -> Result<Page<Contract>, ApiError> {
        let pagination = params.pagination()?;
        let order = params.order_by(SORTABLE, ("end_date", SortDirection::Asc))?;

        let predicate = "deleted_at IS NULL \
             AND ($1::uuid IS NULL OR client_id = $1) \
             AND ($2::contract_status IS NULL OR status = $2)";

        let (total,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM contracts WHERE {}", predicate))
            .bind(filter.client_id)
            .bind(filter.status)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {} FROM contracts WHERE {} ORDER BY {} LIMIT $3 OFFSET $4",
            CONTRACT_COLUMNS, predicate, order
        );
        let contracts = sqlx::query_as::<_, Contract>(&sql)
            .bind(filter.client_id)
            .bind(filter.status)
            .bind(pagination.limit)
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(contracts, total, pagination))
    }

    pub async fn get(&self, id: Uuid) -> Result<Contract, ApiError> {
        let sql = format!("SELECT {} FROM contracts WHERE id = $1 AND deleted_at IS NULL", CONTRACT_COLUMNS);
        sqlx::query_as::<_, Contract>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| contract_not_found(id))
    }

    pub async fn get_detail(&self, id: Uuid) -> Result<ContractDetail, ApiError> {
        let contract = self.get(id).await?;
        let service_scopes = self.scopes_for(id).await?;
        Ok(ContractDetail { contract, service_scopes })
    }

    async fn ensure_client(&self, client_id: Uuid) -> Result<(), ApiError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM clients WHERE id = $1 AND deleted_at IS NULL")
            .bind(client_id)
            .fetch_one(&self.pool)
            .await?;
        if count == 0 {
            return Err(ApiError::not_found(format!("Client {} not found", client_id)));
        }
        Ok(())
    }

    pub async fn create(&self, input: CreateContract) -> Result<Contract, ApiError> {
        let contract = input.into_contract(Utc::now())?;
        self.ensure_client(contract.client_id).await?;

        let mut conn = self.pool.acquire().await?;
        let created = insert_contract(&mut conn, &contract).await?;
        info!("Created contract {} for client {}", created.id, created.client_id);
        Ok(created)
    }

    pub async fn update(&self, id: Uuid, patch: UpdateContract) -> Result<Contract, ApiError> {
        let mut tx = self.pool.begin().await?;
        let mut contract = lock_contract(&mut tx, id).await?;
        patch.apply(&mut contract)?;

        let sql = format!(
            "UPDATE contracts SET contract_name = $2, contract_number = $3, start_date = $4, end_date = $5, \
             renewal_date = $6, value = $7, currency = $8, status = $9, document_link = $10, notes = $11, \
             updated_at = $12 WHERE id = $1 AND deleted_at IS NULL RETURNING {}",
            CONTRACT_COLUMNS
        );
        let updated = sqlx::query_as::<_, Contract>(&sql)
            .bind(contract.id)
            .bind(&contract.contract_name)
            .bind(&contract.contract_number)
            .bind(contract.start_date)
            .bind(contract.end_date)
            .bind(contract.renewal_date)
            .bind(contract.value)
            .bind(&contract.currency)
            .bind(contract.status)
            .bind(&contract.document_link)
            .bind(&contract.notes)
            .bind(contract.updated_at)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(updated)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ApiError> {
        let result =
            sqlx::query("UPDATE contracts SET deleted_at = now(), updated_at = now() WHERE id = $1 AND deleted_at IS NULL")
                .bind(id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(contract_not_found(id));
        }
        info!("Soft deleted contract {}", id);
        Ok(())
    }

    pub async fn expiring(&self, days: Option<i64>) -> Result<Vec<ExpiringContract>, ApiError> {
        let days = days.unwrap_or(DEFAULT_EXPIRY_WINDOW_DAYS);
        if !(0..=MAX_EXPIRY_WINDOW_DAYS).contains(&days) {
            return Err(ApiError::invalid_field(
                "days",
                format!("Must be between 0 and {}", MAX_EXPIRY_WINDOW_DAYS),
            ));
        }

        let today = Utc::now().date_naive();
        let until = today + Duration::days(days);

        Ok(sqlx::query_as::<_, ExpiringContract>(
            r#"
            SELECT c.id, c.client_id, cl.company_name, c.contract_name, c.contract_number, c.end_date,
                   c.value, c.currency, (c.end_date - $1)::int4 AS days_remaining
            FROM contracts c
            JOIN clients cl ON cl.id = c.client_id
            WHERE c.deleted_at IS NULL AND cl.deleted_at IS NULL
            AND c.status = 'active'
            AND c.end_date BETWEEN $1 AND $2
            ORDER BY c.end_date, c.id
            "#,
        )
        .bind(today)
        .bind(until)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Close `id` as renewed and open its successor with copies of the active scopes, atomically
    pub async fn renew(&self, id: Uuid, input: RenewContract) -> Result<RenewalResult, ApiError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let previous = lock_contract(&mut tx, id).await?;

        if !matches!(previous.status, ContractStatus::Active | ContractStatus::Expired) {
            return Err(ApiError::bad_request(format!(
                "Only active or expired contracts can be renewed (contract is {:?})",
                previous.status
            )));
        }

        let successor = input.successor(&previous, now)?;

        let sql = format!(
            "UPDATE contracts SET status = 'renewed', updated_at = $2 WHERE id = $1 RETURNING {}",
            CONTRACT_COLUMNS
        );
        let previous = sqlx::query_as::<_, Contract>(&sql)
            .bind(id)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

        let renewal = insert_contract(&mut tx, &successor).await?;

        let sql = format!(
            "SELECT {} FROM service_scopes WHERE contract_id = $1 AND is_active ORDER BY created_at, id",
            SCOPE_COLUMNS
        );
        let scopes = sqlx::query_as::<_, ServiceScope>(&sql).bind(id).fetch_all(&mut *tx).await?;

        let mut service_scopes = Vec::with_capacity(scopes.len());
        for scope in &scopes {
            let copy = scope.renewed_copy(renewal.id, now);
            service_scopes.push(insert_scope(&mut tx, &copy).await?);
        }

        tx.commit().await?;
        info!(
            "Renewed contract {} as {} with {} service scope(s)",
            previous.id,
            renewal.id,
            service_scopes.len()
        );
        Ok(RenewalResult { previous, renewal, service_scopes })
    }

    pub async fn scopes_for(&self, contract_id: Uuid) -> Result<Vec<ServiceScope>, ApiError> {
        let sql = format!(
            "SELECT {} FROM service_scopes WHERE contract_id = $1 ORDER BY created_at, id",
            SCOPE_COLUMNS
        );
        Ok(sqlx::query_as::<_, ServiceScope>(&sql)
            .bind(contract_id)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn list_scopes(&self, contract_id: Uuid) -> Result<Vec<ServiceScope>, ApiError> {
        self.get(contract_id).await?;
        self.scopes_for(contract_id).await
    }

    pub async fn get_scope(&self, id: Uuid) -> Result<ServiceScope, ApiError> {
        let sql = format!("SELECT {} FROM service_scopes WHERE id = $1", SCOPE_COLUMNS);
        sqlx::query_as::<_, ServiceScope>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| scope_not_found(id))
    }

    pub async fn create_scope(&self, contract_id: Uuid, input: CreateServiceScope) -> Result<ServiceScope, ApiError> {
        self.get(contract_id).await?;
        let scope = input.into_scope(contract_id, Utc::now())?;

        let mut conn = self.pool.acquire().await?;
        let created = insert_scope(&mut conn, &scope).await?;
        info!("Created service scope {} on contract {}", created.id, contract_id);
        Ok(created)
    }

    pub async fn update_scope(&self, id: Uuid, patch: UpdateServiceScope) -> Result<ServiceScope, ApiError> {
        let mut tx = self.pool.begin().await?;
        let mut scope = lock_scope(&mut tx, id).await?;
        patch.apply(&mut scope)?;

        let saved = save_scope(&mut tx, &scope).await?;
        tx.commit().await?;
        Ok(saved)
    }

    pub async fn transition_saf(&self, id: Uuid, input: UpdateSafStatus) -> Result<ServiceScope, ApiError> {
        let mut tx = self.pool.begin().await?;
        let mut scope = lock_scope(&mut tx, id).await?;
        let from = scope.saf_status;
        scope.transition_saf(input.saf_status, Utc::now())?;
        if let Some(link) = optional_text(input.saf_document_link) {
            scope.saf_document_link = Some(link);
        }

        let saved = save_scope(&mut tx, &scope).await?;
        tx.commit().await?;
        info!("Service scope {} SAF {:?} -> {:?}", saved.id, from, saved.saf_status);
        Ok(saved)
    }

    /// Hard delete; refused while hardware is actively assigned against the scope
    pub async fn delete_scope(&self, id: Uuid) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await?;

        lock_scope(&mut tx, id).await?;

        let (active,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM client_hardware_assignments WHERE service_scope_id = $1 AND status = 'active'",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if active > 0 {
            return Err(ApiError::bad_request(format!(
                "Service scope has {} active hardware assignment(s); return them first",
                active
            )));
        }

        // historic assignments keep their row but lose the link
        sqlx::query("UPDATE client_hardware_assignments SET service_scope_id = NULL, updated_at = now() WHERE service_scope_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM service_scopes WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!("Deleted service scope {}", id);
        Ok(())
    }
}

fn contract_not_found(id: Uuid) -> ApiError {
    ApiError::not_found(format!("Contract {} not found", id))
}

fn scope_not_found(id: Uuid) -> ApiError {
    ApiError::not_found(format!("Service scope {} not found", id))
}

async fn lock_contract(conn: &mut PgConnection, id: Uuid) -> Result<Contract, ApiError> {
    let sql = format!(
        "SELECT {} FROM contracts WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
        CONTRACT_COLUMNS
    );
    sqlx::query_as::<_, Contract>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| contract_not_found(id))
}

async fn lock_scope(conn: &mut PgConnection, id: Uuid) -> Result<ServiceScope, ApiError> {
    let sql = format!("SELECT {} FROM service_scopes WHERE id = $1 FOR UPDATE", SCOPE_COLUMNS);
    sqlx::query_as::<_, ServiceScope>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| scope_not_found(id))
}

async fn save_scope(conn: &mut PgConnection, scope: &ServiceScope) -> Result<ServiceScope, ApiError> {
    let sql = format!(
        "UPDATE service_scopes SET service_name = $2, description = $3, scope_parameters = $4, price = $5, \
         saf_status = $6, saf_document_link = $7, saf_sent_at = $8, saf_signed_at = $9, saf_activated_at = $10, \
         notes = $11, is_active = $12, updated_at = $13 WHERE id = $1 RETURNING {}",
        SCOPE_COLUMNS
    );
    Ok(sqlx::query_as::<_, ServiceScope>(&sql)
        .bind(scope.id)
        .bind(&scope.service_name)
        .bind(&scope.description)
        .bind(&scope.scope_parameters)
        .bind(scope.price)
        .bind(scope.saf_status)
        .bind(&scope.saf_document_link)
        .bind(scope.saf_sent_at)
        .bind(scope.saf_signed_at)
        .bind(scope.saf_activated_at)
        .bind(&scope.notes)
        .bind(scope.is_active)
        .bind(scope.updated_at)
        .fetch_one(conn)
        .await?)
}

async fn insert_contract(conn: &mut PgConnection, contract: &Contract) -> Result<Contract, ApiError> {
    let sql = format!(
        "INSERT INTO contracts (id, client_id, contract_name, contract_number, start_date, end_date, renewal_date, \
         value, currency, status, document_link, notes, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) RETURNING {}",
        CONTRACT_COLUMNS
    );
    Ok(sqlx::query_as::<_, Contract>(&sql)
        .bind(contract.id)
        .bind(contract.client_id)
        .bind(&contract.contract_name)
        .bind(&contract.contract_number)
        .bind(contract.start_date)
        .bind(contract.end_date)
        .bind(contract.renewal_date)
        .bind(contract.value)
        .bind(&contract.currency)
        .bind(contract.status)
        .bind(&contract.document_link)
        .bind(&contract.notes)
        .bind(contract.created_at)
        .bind(contract.updated_at)
        .fetch_one(conn)
        .await?)
}

async fn insert_scope(conn: &mut PgConnection, scope: &ServiceScope) -> Result<ServiceScope, ApiError> {
    let sql = format!(
        "INSERT INTO service_scopes (id, contract_id, service_name, description, scope_parameters, price, \
         saf_status, saf_document_link, saf_sent_at, saf_signed_at, saf_activated_at, notes, is_active, \
         created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) RETURNING {}",
        SCOPE_COLUMNS
    );
    Ok(sqlx::query_as::<_, ServiceScope>(&sql)
        .bind(scope.id)
        .bind(scope.contract_id)
        .bind(&scope.service_name)
        .bind(&scope.description)
        .bind(&scope.scope_parameters)
        .bind(scope.price)
        .bind(scope.saf_status)
        .bind(&scope.saf_document_link)
        .bind(scope.saf_sent_at)
        .bind(scope.saf_signed_at)
        .bind(scope.saf_activated_at)
        .bind(&scope.notes)
        .bind(scope.is_active)
        .bind(scope.created_at)
        .bind(scope.updated_at)
        .fetch_one(conn)
        .await?)
}
