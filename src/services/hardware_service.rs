use chrono::Utc;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::database::models::hardware::{
    AssignHardware, AssignmentFilter, CreateHardwareAsset, HardwareFilter, ReplaceHardware, ReplacedAssignment,
    ReturnHardware, UpdateHardwareAsset,
};
use crate::database::models::{ClientHardwareAssignment, HardwareAsset, HardwareStatus};
use crate::database::query::{like_pattern, ListParams, Page, SortDirection};
use crate::error::ApiError;
use crate::validation::optional_text;

pub const ASSET_COLUMNS: &str = "id, asset_tag, serial_number, name, asset_type, manufacturer, model, status, \
     purchase_date, purchase_cost, warranty_expiry_date, location, notes, created_at, updated_at, deleted_at";
pub const ASSIGNMENT_COLUMNS: &str = "id, hardware_asset_id, client_id, service_scope_id, status, assigned_date, \
     returned_date, replaced_by_assignment_id, notes, created_at, updated_at";
const SORTABLE: &[&str] = &["asset_tag", "name", "asset_type", "status", "purchase_date", "warranty_expiry_date", "created_at"];

#[derive(Debug, Serialize)]
pub struct AssetHistory {
    pub asset: HardwareAsset,
    pub assignments: Vec<ClientHardwareAssignment>,
}

pub struct HardwareService {
    pool: PgPool,
}

impl HardwareService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, params: &ListParams, filter: &HardwareFilter) -> Result<Page<HardwareAsset>, ApiError> {
        let pagination = params.pagination()?;
        let order = params.order_by(SORTABLE, ("asset_tag", SortDirection::Asc))?;
        let search = filter.search.as_deref().filter(|s| !s.trim().is_empty()).map(like_pattern);

        let predicate = "deleted_at IS NULL \
             AND ($1::hardware_status IS NULL OR status = $1) \
             AND ($2::hardware_type IS NULL OR asset_type = $2) \
             AND ($3::text IS NULL OR asset_tag ILIKE $3 OR name ILIKE $3 OR serial_number ILIKE $3 \
                  OR manufacturer ILIKE $3 OR model ILIKE $3)";

        let (total,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM hardware_assets WHERE {}", predicate))
            .bind(filter.status)
            .bind(filter.asset_type)
            .bind(&search)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {} FROM hardware_assets WHERE {} ORDER BY {} LIMIT $4 OFFSET $5",
            ASSET_COLUMNS, predicate, order
        );
        let assets = sqlx::query_as::<_, HardwareAsset>(&sql)
            .bind(filter.status)
            .bind(filter.asset_type)
            .bind(&search)
            .bind(pagination.limit)
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(assets, total, pagination))
    }

    pub async fn get(&self, id: Uuid) -> Result<HardwareAsset, ApiError> {
        let sql = format!("SELECT {} FROM hardware_assets WHERE id = $1 AND deleted_at IS NULL", ASSET_COLUMNS);
        sqlx::query_as::<_, HardwareAsset>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| asset_not_found(id))
    }

    pub async fn create(&self, input: CreateHardwareAsset) -> Result<HardwareAsset, ApiError> {
        let asset = input.into_asset(Utc::now())?;

        let sql = format!(
            "INSERT INTO hardware_assets (id, asset_tag, serial_number, name, asset_type, manufacturer, model, status, \
             purchase_date, purchase_cost, warranty_expiry_date, location, notes, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) RETURNING {}",
            ASSET_COLUMNS
        );
        let created = sqlx::query_as::<_, HardwareAsset>(&sql)
            .bind(asset.id)
            .bind(&asset.asset_tag)
            .bind(&asset.serial_number)
            .bind(&asset.name)
            .bind(asset.asset_type)
            .bind(&asset.manufacturer)
            .bind(&asset.model)
            .bind(asset.status)
            .bind(asset.purchase_date)
            .bind(asset.purchase_cost)
            .bind(asset.warranty_expiry_date)
            .bind(&asset.location)
            .bind(&asset.notes)
            .bind(asset.created_at)
            .bind(asset.updated_at)
            .fetch_one(&self.pool)
            .await?;

        info!("Created hardware asset {} ({})", created.id, created.asset_tag);
        Ok(created)
    }

    /// Locks the asset like the assignment flows do, so a concurrent assign or return cannot be reverted
    pub async fn update(&self, id: Uuid, patch: UpdateHardwareAsset) -> Result<HardwareAsset, ApiError> {
        let mut tx = self.pool.begin().await?;
        let mut asset = lock_asset(&mut tx, id).await?;
        let status_change = patch.status_change(asset.status);
        patch.apply(&mut asset)?;

        let sql = format!(
            "UPDATE hardware_assets SET asset_tag = $2, serial_number = $3, name = $4, asset_type = $5, \
             manufacturer = $6, model = $7, status = COALESCE($8::hardware_status, status), purchase_date = $9, purchase_cost = $10, \
             warranty_expiry_date = $11, location = $12, notes = $13, updated_at = $14 \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {}",
            ASSET_COLUMNS
        );
        let updated = sqlx::query_as::<_, HardwareAsset>(&sql)
            .bind(asset.id)
            .bind(&asset.asset_tag)
            .bind(&asset.serial_number)
            .bind(&asset.name)
            .bind(asset.asset_type)
            .bind(&asset.manufacturer)
            .bind(&asset.model)
            .bind(status_change)
            .bind(asset.purchase_date)
            .bind(asset.purchase_cost)
            .bind(asset.warranty_expiry_date)
            .bind(&asset.location)
            .bind(&asset.notes)
            .bind(asset.updated_at)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(updated)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await?;
        lock_asset(&mut tx, id).await?;

        if active_assignment_for(&mut tx, id).await?.is_some() {
            return Err(ApiError::bad_request("Hardware asset is currently assigned; return it first"));
        }

        sqlx::query("UPDATE hardware_assets SET deleted_at = now(), updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!("Soft deleted hardware asset {}", id);
        Ok(())
    }

    pub async fn history(&self, id: Uuid) -> Result<AssetHistory, ApiError> {
        let asset = self.get(id).await?;
        let sql = format!(
            "SELECT {} FROM client_hardware_assignments WHERE hardware_asset_id = $1 \
             ORDER BY assigned_date DESC, created_at DESC",
            ASSIGNMENT_COLUMNS
        );
        let assignments = sqlx::query_as::<_, ClientHardwareAssignment>(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await?;
        Ok(AssetHistory { asset, assignments })
    }

    pub async fn list_assignments(
        &self,
        params: &ListParams,
        filter: &AssignmentFilter,
    ) -> Result<Page<ClientHardwareAssignment>, ApiError> {
        let pagination = params.pagination()?;
        let order = params.order_by(&["assigned_date", "returned_date", "status", "created_at"], ("assigned_date", SortDirection::Desc))?;

        let predicate = "($1::uuid IS NULL OR client_id = $1) \
             AND ($2::uuid IS NULL OR hardware_asset_id = $2) \
             AND ($3::assignment_status IS NULL OR status = $3)";

        let (total,): (i64,) =
            sqlx::query_as(&format!("SELECT COUNT(*) FROM client_hardware_assignments WHERE {}", predicate))
                .bind(filter.client_id)
                .bind(filter.hardware_asset_id)
                .bind(filter.status)
                .fetch_one(&self.pool)
                .await?;

        let sql = format!(
            "SELECT {} FROM client_hardware_assignments WHERE {} ORDER BY {} LIMIT $4 OFFSET $5",
            ASSIGNMENT_COLUMNS, predicate, order
        );
        let items = sqlx::query_as::<_, ClientHardwareAssignment>(&sql)
            .bind(filter.client_id)
            .bind(filter.hardware_asset_id)
            .bind(filter.status)
            .bind(pagination.limit)
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(items, total, pagination))
    }

    pub async fn get_assignment(&self, id: Uuid) -> Result<ClientHardwareAssignment, ApiError> {
        let sql = format!("SELECT {} FROM client_hardware_assignments WHERE id = $1", ASSIGNMENT_COLUMNS);
        sqlx::query_as::<_, ClientHardwareAssignment>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| assignment_not_found(id))
    }

    pub async fn assign(&self, input: AssignHardware) -> Result<ClientHardwareAssignment, ApiError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let asset = lock_asset(&mut tx, input.hardware_asset_id).await?;
        ensure_in_stock(&asset)?;
        if active_assignment_for(&mut tx, asset.id).await?.is_some() {
            return Err(ApiError::bad_request(format!("Hardware asset {} is already assigned", asset.asset_tag)));
        }

        let (clients,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM clients WHERE id = $1 AND deleted_at IS NULL")
            .bind(input.client_id)
            .fetch_one(&mut *tx)
            .await?;
        if clients == 0 {
            return Err(ApiError::not_found(format!("Client {} not found", input.client_id)));
        }

        if let Some(scope_id) = input.service_scope_id {
            let owner: Option<(Uuid,)> = sqlx::query_as(
                "SELECT c.client_id FROM service_scopes s JOIN contracts c ON c.id = s.contract_id \
                 WHERE s.id = $1 AND c.deleted_at IS NULL",
            )
            .bind(scope_id)
            .fetch_optional(&mut *tx)
            .await?;
            let (owner,) = owner.ok_or_else(|| ApiError::not_found(format!("Service scope {} not found", scope_id)))?;
            if owner != input.client_id {
                return Err(ApiError::invalid_field(
                    "service_scope_id",
                    "Service scope does not belong to one of this client's contracts",
                ));
            }
        }

        let assignment = ClientHardwareAssignment::new(
            asset.id,
            input.client_id,
            input.service_scope_id,
            input.assigned_date.unwrap_or_else(|| now.date_naive()),
            input.notes,
            now,
        );
        let created = insert_assignment(&mut tx, &assignment).await?;
        set_asset_status(&mut tx, asset.id, HardwareStatus::InUse).await?;

        tx.commit().await?;
        info!("Assigned hardware {} to client {}", asset.asset_tag, created.client_id);
        Ok(created)
    }

    pub async fn return_assignment(&self, id: Uuid, input: ReturnHardware) -> Result<ClientHardwareAssignment, ApiError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let assignment = lock_assignment(&mut tx, id).await?;
        assignment.ensure_active()?;
        lock_asset(&mut tx, assignment.hardware_asset_id).await?;

        let returned_date = input.returned_date.unwrap_or_else(|| now.date_naive());
        if returned_date < assignment.assigned_date {
            return Err(ApiError::invalid_field("returned_date", "Cannot be before the assigned date"));
        }
        let notes = optional_text(input.notes).or(assignment.notes);

        let sql = format!(
            "UPDATE client_hardware_assignments SET status = 'returned', returned_date = $2, notes = $3, \
             updated_at = $4 WHERE id = $1 RETURNING {}",
            ASSIGNMENT_COLUMNS
        );
        let returned = sqlx::query_as::<_, ClientHardwareAssignment>(&sql)
            .bind(id)
            .bind(returned_date)
            .bind(&notes)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;
        set_asset_status(&mut tx, returned.hardware_asset_id, HardwareStatus::InStock).await?;

        tx.commit().await?;
        info!("Returned hardware assignment {}", id);
        Ok(returned)
    }

    pub async fn replace_assignment(&self, id: Uuid, input: ReplaceHardware) -> Result<ReplacedAssignment, ApiError> {
        let now = Utc::now();
        let today = now.date_naive();
        let mut tx = self.pool.begin().await?;

        let previous = lock_assignment(&mut tx, id).await?;
        previous.ensure_active()?;
        if previous.hardware_asset_id == input.replacement_asset_id {
            return Err(ApiError::invalid_field(
                "replacement_asset_id",
                "Replacement must be a different asset",
            ));
        }

        lock_asset(&mut tx, previous.hardware_asset_id).await?;
        let replacement_asset = lock_asset(&mut tx, input.replacement_asset_id).await?;
        ensure_in_stock(&replacement_asset)?;
        if active_assignment_for(&mut tx, replacement_asset.id).await?.is_some() {
            return Err(ApiError::bad_request(format!(
                "Hardware asset {} is already assigned",
                replacement_asset.asset_tag
            )));
        }

        let replacement = ClientHardwareAssignment::new(
            replacement_asset.id,
            previous.client_id,
            previous.service_scope_id,
            today,
            input.notes,
            now,
        );
        let replacement = insert_assignment(&mut tx, &replacement).await?;

        let sql = format!(
            "UPDATE client_hardware_assignments SET status = 'replaced', returned_date = $2, \
             replaced_by_assignment_id = $3, updated_at = $4 WHERE id = $1 RETURNING {}",
            ASSIGNMENT_COLUMNS
        );
        let previous = sqlx::query_as::<_, ClientHardwareAssignment>(&sql)
            .bind(id)
            .bind(today.max(previous.assigned_date))
            .bind(replacement.id)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

        set_asset_status(&mut tx, previous.hardware_asset_id, HardwareStatus::InStock).await?;
        set_asset_status(&mut tx, replacement_asset.id, HardwareStatus::InUse).await?;

        tx.commit().await?;
        info!(
            "Replaced hardware assignment {} with {} ({})",
            previous.id, replacement.id, replacement_asset.asset_tag
        );
        Ok(ReplacedAssignment { previous, replacement })
    }
}

fn asset_not_found(id: Uuid) -> ApiError {
    ApiError::not_found(format!("Hardware asset {} not found", id))
}

fn assignment_not_found(id: Uuid) -> ApiError {
    ApiError::not_found(format!("Hardware assignment {} not found", id))
}

fn ensure_in_stock(asset: &HardwareAsset) -> Result<(), ApiError> {
    if asset.status != HardwareStatus::InStock {
        return Err(ApiError::bad_request(format!(
            "Hardware asset {} is {:?}, not in stock",
            asset.asset_tag, asset.status
        )));
    }
    Ok(())
}

async fn lock_asset(conn: &mut PgConnection, id: Uuid) -> Result<HardwareAsset, ApiError> {
    let sql = format!(
        "SELECT {} FROM hardware_assets WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
        ASSET_COLUMNS
    );
    sqlx::query_as::<_, HardwareAsset>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| asset_not_found(id))
}

async fn lock_assignment(conn: &mut PgConnection, id: Uuid) -> Result<ClientHardwareAssignment, ApiError> {
    let sql = format!(
        "SELECT {} FROM client_hardware_assignments WHERE id = $1 FOR UPDATE",
        ASSIGNMENT_COLUMNS
    );
    sqlx::query_as::<_, ClientHardwareAssignment>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| assignment_not_found(id))
}

async fn active_assignment_for(conn: &mut PgConnection, asset_id: Uuid) -> Result<Option<Uuid>, ApiError> {
    let row: Option<(Uuid,)> = sqlx::query_as(
        "SELECT id FROM client_hardware_assignments WHERE hardware_asset_id = $1 AND status = 'active'",
    )
    .bind(asset_id)
    .fetch_optional(conn)
    .await?;
    Ok(row.map(|(id,)| id))
}

async fn set_asset_status(conn: &mut PgConnection, id: Uuid, status: HardwareStatus) -> Result<(), ApiError> {
    sqlx::query("UPDATE hardware_assets SET status = $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(status)
        .execute(conn)
        .await?;
    Ok(())
}

async fn insert_assignment(
    conn: &mut PgConnection,
    assignment: &ClientHardwareAssignment,
) -> Result<ClientHardwareAssignment, ApiError> {
    let sql = format!(
        "INSERT INTO client_hardware_assignments (id, hardware_asset_id, client_id, service_scope_id, status, \
         assigned_date, returned_date, replaced_by_assignment_id, notes, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING {}",
        ASSIGNMENT_COLUMNS
    );
    Ok(sqlx::query_as::<_, ClientHardwareAssignment>(&sql)
        .bind(assignment.id)
        .bind(assignment.hardware_asset_id)
        .bind(assignment.client_id)
        .bind(assignment.service_scope_id)
        .bind(assignment.status)
        .bind(assignment.assigned_date)
        .bind(assignment.returned_date)
        .bind(assignment.replaced_by_assignment_id)
        .bind(&assignment.notes)
        .bind(assignment.created_at)
        .bind(assignment.updated_at)
        .fetch_one(conn)
        .await?)
}
