use chrono::Utc;
use serde::Serialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::database::models::client::{ClientFilter, CreateClient, UpdateClient};
use crate::database::models::financial::{FinancialSummary, SummaryQuery};
use crate::database::models::team::TeamMember;
use crate::database::models::{Client, ClientHardwareAssignment, Contract};
use crate::database::query::{like_pattern, ListParams, Page, SortDirection};
use crate::error::ApiError;
use crate::services::contract_service::CONTRACT_COLUMNS;
use crate::services::financial_service::FinancialService;
use crate::services::hardware_service::ASSIGNMENT_COLUMNS;
use crate::services::team_service::TeamService;

const CLIENT_COLUMNS: &str = "id, company_name, industry, contact_name, contact_email, contact_phone, address, \
     website, status, notes, created_at, updated_at, deleted_at";
const SORTABLE: &[&str] = &["company_name", "status", "industry", "created_at", "updated_at"];

/// Everything the client detail page shows at once
#[derive(Debug, Serialize)]
pub struct ClientOverview {
    pub client: Client,
    pub contracts: Vec<Contract>,
    pub team: Vec<TeamMember>,
    pub hardware: Vec<ClientHardwareAssignment>,
    /// `None` unless the caller may read financials
    pub financials: Option<FinancialSummary>,
}

pub struct ClientService {
    pool: PgPool,
}

impl ClientService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, params: &ListParams, filter: &ClientFilter) -> Result<Page<Client>, ApiError> {
        let pagination = params.pagination()?;
        let order = params.order_by(SORTABLE, ("company_name", SortDirection::Asc))?;
        let search = filter.search.as_deref().filter(|s| !s.trim().is_empty()).map(like_pattern);

        let predicate = "deleted_at IS NULL \
             AND ($1::client_status IS NULL OR status = $1) \
             AND ($2::text IS NULL OR company_name ILIKE $2 OR contact_name ILIKE $2 OR contact_email ILIKE $2)";

        let (total,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM clients WHERE {}", predicate))
            .bind(filter.status)
            .bind(&search)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {} FROM clients WHERE {} ORDER BY {} LIMIT $3 OFFSET $4",
            CLIENT_COLUMNS, predicate, order
        );
        let clients = sqlx::query_as::<_, Client>(&sql)
            .bind(filter.status)
            .bind(&search)
            .bind(pagination.limit)
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(clients, total, pagination))
    }

    pub async fn get(&self, id: Uuid) -> Result<Client, ApiError> {
        let sql = format!("SELECT {} FROM clients WHERE id = $1 AND deleted_at IS NULL", CLIENT_COLUMNS);
        sqlx::query_as::<_, Client>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Client {} not found", id)))
    }

    /// Company names are unique among live clients, ignoring case
    async fn ensure_name_free(&self, name: &str, except: Option<Uuid>) -> Result<(), ApiError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM clients WHERE lower(company_name) = lower($1) AND deleted_at IS NULL \
             AND ($2::uuid IS NULL OR id <> $2)",
        )
        .bind(name)
        .bind(except)
        .fetch_one(&self.pool)
        .await?;

        if count > 0 {
            return Err(ApiError::conflict(format!("A client named '{}' already exists", name)));
        }
        Ok(())
    }

    pub async fn create(&self, input: CreateClient) -> Result<Client, ApiError> {
        let client = input.into_client(Utc::now())?;
        self.ensure_name_free(&client.company_name, None).await?;

        let sql = format!(
            "INSERT INTO clients (id, company_name, industry, contact_name, contact_email, contact_phone, address, \
             website, status, notes, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING {}",
            CLIENT_COLUMNS
        );
        let created = sqlx::query_as::<_, Client>(&sql)
            .bind(client.id)
            .bind(&client.company_name)
            .bind(&client.industry)
            .bind(&client.contact_name)
            .bind(&client.contact_email)
            .bind(&client.contact_phone)
            .bind(&client.address)
            .bind(&client.website)
            .bind(client.status)
            .bind(&client.notes)
            .bind(client.created_at)
            .bind(client.updated_at)
            .fetch_one(&self.pool)
            .await?;

        info!("Created client {} '{}'", created.id, created.company_name);
        Ok(created)
    }

    pub async fn update(&self, id: Uuid, patch: UpdateClient) -> Result<Client, ApiError> {
        let mut client = self.get(id).await?;
        if patch.apply(&mut client)? {
            self.ensure_name_free(&client.company_name, Some(id)).await?;
        }

        let sql = format!(
            "UPDATE clients SET company_name = $2, industry = $3, contact_name = $4, contact_email = $5, \
             contact_phone = $6, address = $7, website = $8, status = $9, notes = $10, updated_at = $11 \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {}",
            CLIENT_COLUMNS
        );
        Ok(sqlx::query_as::<_, Client>(&sql)
            .bind(client.id)
            .bind(&client.company_name)
            .bind(&client.industry)
            .bind(&client.contact_name)
            .bind(&client.contact_email)
            .bind(&client.contact_phone)
            .bind(&client.address)
            .bind(&client.website)
            .bind(client.status)
            .bind(&client.notes)
            .bind(client.updated_at)
            .fetch_one(&self.pool)
            .await?)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ApiError> {
        let result = sqlx::query("UPDATE clients SET deleted_at = now(), updated_at = now() WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::not_found(format!("Client {} not found", id)));
        }
        info!("Soft deleted client {}", id);
        Ok(())
    }

    pub async fn restore(&self, id: Uuid) -> Result<Client, ApiError> {
        let sql = format!("SELECT {} FROM clients WHERE id = $1 AND deleted_at IS NOT NULL", CLIENT_COLUMNS);
        let deleted = sqlx::query_as::<_, Client>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Deleted client {} not found", id)))?;

        self.ensure_name_free(&deleted.company_name, Some(id)).await?;

        let sql = format!(
            "UPDATE clients SET deleted_at = NULL, updated_at = now() WHERE id = $1 RETURNING {}",
            CLIENT_COLUMNS
        );
        let client = sqlx::query_as::<_, Client>(&sql).bind(id).fetch_one(&self.pool).await?;
        info!("Restored client {} '{}'", client.id, client.company_name);
        Ok(client)
    }

    pub async fn overview(&self, id: Uuid, include_financials: bool) -> Result<ClientOverview, ApiError> {
        let client = self.get(id).await?;

        let sql = format!(
            "SELECT {} FROM contracts WHERE client_id = $1 AND deleted_at IS NULL ORDER BY end_date DESC, id",
            CONTRACT_COLUMNS
        );
        let contracts = sqlx::query_as::<_, Contract>(&sql).bind(id).fetch_all(&self.pool).await?;

        let team = TeamService::new(self.pool.clone()).members(id, false).await?;

        let sql = format!(
            "SELECT {} FROM client_hardware_assignments WHERE client_id = $1 AND status = 'active' \
             ORDER BY assigned_date DESC, id",
            ASSIGNMENT_COLUMNS
        );
        let hardware = sqlx::query_as::<_, ClientHardwareAssignment>(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await?;

        let financials = if include_financials {
            let query = SummaryQuery { client_id: Some(id), ..Default::default() };
            Some(FinancialService::new(self.pool.clone()).summary(&query).await?)
        } else {
            None
        };

        Ok(ClientOverview { client, contracts, team, hardware, financials })
    }
}
