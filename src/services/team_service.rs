use chrono::Utc;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::database::models::team::{CreateTeamAssignment, TeamMember, UpdateTeamAssignment};
use crate::database::models::{ClientTeamAssignment, TeamRole};
use crate::error::ApiError;

const ASSIGNMENT_COLUMNS: &str =
    "id, client_id, user_id, assignment_role, is_active, assigned_date, end_date, notes, created_at, updated_at";

pub struct TeamService {
    pool: PgPool,
}

impl TeamService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
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

    /// One active member per client and role
    async fn ensure_role_free(&self, client_id: Uuid, role: TeamRole, except: Option<Uuid>) -> Result<(), ApiError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM client_team_assignments \
             WHERE client_id = $1 AND assignment_role = $2 AND is_active AND ($3::uuid IS NULL OR id <> $3)",
        )
        .bind(client_id)
        .bind(role)
        .bind(except)
        .fetch_one(&self.pool)
        .await?;

        if count > 0 {
            return Err(ApiError::conflict(format!(
                "Client already has an active {:?} assignment",
                role
            )));
        }
        Ok(())
    }

    pub async fn members(&self, client_id: Uuid, include_inactive: bool) -> Result<Vec<TeamMember>, ApiError> {
        Ok(sqlx::query_as::<_, TeamMember>(
            r#"
            SELECT a.id, a.client_id, a.user_id, a.assignment_role, a.is_active, a.assigned_date, a.end_date,
                   a.notes, u.email, u.first_name, u.last_name
            FROM client_team_assignments a
            JOIN users u ON u.id = a.user_id
            WHERE a.client_id = $1 AND ($2 OR a.is_active)
            ORDER BY a.is_active DESC, a.assignment_role, a.assigned_date DESC
            "#,
        )
        .bind(client_id)
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn list(&self, client_id: Uuid, include_inactive: bool) -> Result<Vec<TeamMember>, ApiError> {
        self.ensure_client(client_id).await?;
        self.members(client_id, include_inactive).await
    }

    pub async fn get(&self, id: Uuid) -> Result<ClientTeamAssignment, ApiError> {
        let sql = format!("SELECT {} FROM client_team_assignments WHERE id = $1", ASSIGNMENT_COLUMNS);
        sqlx::query_as::<_, ClientTeamAssignment>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Team assignment {} not found", id)))
    }

    pub async fn create(&self, client_id: Uuid, input: CreateTeamAssignment) -> Result<ClientTeamAssignment, ApiError> {
        self.ensure_client(client_id).await?;

        let user: Option<(bool,)> = sqlx::query_as("SELECT is_active FROM users WHERE id = $1")
            .bind(input.user_id)
            .fetch_optional(&self.pool)
            .await?;
        match user {
            None => return Err(ApiError::not_found(format!("User {} not found", input.user_id))),
            Some((false,)) => {
                return Err(ApiError::invalid_field("user_id", "Inactive users cannot be assigned to clients"))
            }
            Some((true,)) => {}
        }

        let assignment = input.into_assignment(client_id, Utc::now());
        self.ensure_role_free(client_id, assignment.assignment_role, None).await?;

        let sql = format!(
            "INSERT INTO client_team_assignments (id, client_id, user_id, assignment_role, is_active, assigned_date, \
             end_date, notes, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {}",
            ASSIGNMENT_COLUMNS
        );
        let created = sqlx::query_as::<_, ClientTeamAssignment>(&sql)
            .bind(assignment.id)
            .bind(assignment.client_id)
            .bind(assignment.user_id)
            .bind(assignment.assignment_role)
            .bind(assignment.is_active)
            .bind(assignment.assigned_date)
            .bind(assignment.end_date)
            .bind(&assignment.notes)
            .bind(assignment.created_at)
            .bind(assignment.updated_at)
            .fetch_one(&self.pool)
            .await?;

        info!(
            "Assigned user {} to client {} as {:?}",
            created.user_id, created.client_id, created.assignment_role
        );
        Ok(created)
    }

    pub async fn update(&self, id: Uuid, patch: UpdateTeamAssignment) -> Result<ClientTeamAssignment, ApiError> {
        let mut assignment = self.get(id).await?;
        if patch.apply(&mut assignment) && assignment.is_active {
            self.ensure_role_free(assignment.client_id, assignment.assignment_role, Some(id)).await?;
        }

        let sql = format!(
            "UPDATE client_team_assignments SET assignment_role = $2, notes = $3, updated_at = $4 \
             WHERE id = $1 RETURNING {}",
            ASSIGNMENT_COLUMNS
        );
        Ok(sqlx::query_as::<_, ClientTeamAssignment>(&sql)
            .bind(id)
            .bind(assignment.assignment_role)
            .bind(&assignment.notes)
            .bind(assignment.updated_at)
            .fetch_one(&self.pool)
            .await?)
    }

    pub async fn deactivate(&self, id: Uuid) -> Result<ClientTeamAssignment, ApiError> {
        let assignment = self.get(id).await?;
        if !assignment.is_active {
            return Err(ApiError::bad_request("Team assignment is already inactive"));
        }

        let today = Utc::now().date_naive();
        let sql = format!(
            "UPDATE client_team_assignments SET is_active = false, end_date = $2, updated_at = now() \
             WHERE id = $1 RETURNING {}",
            ASSIGNMENT_COLUMNS
        );
        let updated = sqlx::query_as::<_, ClientTeamAssignment>(&sql)
            .bind(id)
            .bind(today.max(assignment.assigned_date))
            .fetch_one(&self.pool)
            .await?;

        info!("Deactivated team assignment {}", id);
        Ok(updated)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ApiError> {
        let result = sqlx::query("DELETE FROM client_team_assignments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::not_found(format!("Team assignment {} not found", id)));
        }
        info!("Deleted team assignment {}", id);
        Ok(())
    }
}
