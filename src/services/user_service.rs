use chrono::Utc;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::auth::password::{hash_password, validate_password_strength, verify_password};
use crate::auth::Role;
use crate::database::models::team::UserClientAssignment;
use crate::database::models::user::{ChangePassword, CreateUser, UpdateUser};
use crate::database::models::User;
use crate::database::query::{like_pattern, ListParams, Page, SortDirection};
use crate::error::ApiError;
use crate::validation::{required_text, validate_email};

const USER_COLUMNS: &str =
    "id, email, password_hash, first_name, last_name, role, is_active, last_login_at, created_at, updated_at";
const SORTABLE: &[&str] = &["email", "first_name", "last_name", "role", "created_at", "last_login_at"];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

pub struct UserService {
    pool: PgPool,
}

impl UserService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, params: &ListParams, filter: &UserFilter) -> Result<Page<User>, ApiError> {
        let pagination = params.pagination()?;
        let order = params.order_by(SORTABLE, ("email", SortDirection::Asc))?;
        let search = filter.search.as_deref().filter(|s| !s.trim().is_empty()).map(like_pattern);

        let predicate = "($1::user_role IS NULL OR role = $1) \
             AND ($2::boolean IS NULL OR is_active = $2) \
             AND ($3::text IS NULL OR email ILIKE $3 OR first_name ILIKE $3 OR last_name ILIKE $3)";

        let (total,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM users WHERE {}", predicate))
            .bind(filter.role)
            .bind(filter.is_active)
            .bind(&search)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {} FROM users WHERE {} ORDER BY {} LIMIT $4 OFFSET $5",
            USER_COLUMNS, predicate, order
        );
        let users = sqlx::query_as::<_, User>(&sql)
            .bind(filter.role)
            .bind(filter.is_active)
            .bind(&search)
            .bind(pagination.limit)
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(users, total, pagination))
    }

    pub async fn get(&self, id: Uuid) -> Result<User, ApiError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("User {} not found", id)))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        let sql = format!("SELECT {} FROM users WHERE lower(email) = lower($1)", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn ensure_email_free(&self, email: &str, except: Option<Uuid>) -> Result<(), ApiError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM users WHERE lower(email) = lower($1) AND ($2::uuid IS NULL OR id <> $2)")
                .bind(email)
                .bind(except)
                .fetch_one(&self.pool)
                .await?;
        if count > 0 {
            return Err(ApiError::conflict(format!("A user with email '{}' already exists", email)));
        }
        Ok(())
    }

    pub async fn create(&self, input: CreateUser) -> Result<User, ApiError> {
        let email = input.email.trim().to_string();
        validate_email("email", &email)?;
        validate_password_strength(&input.password).map_err(|msg| ApiError::invalid_field("password", msg))?;
        let first_name = required_text("first_name", &input.first_name, 100)?;
        let last_name = required_text("last_name", &input.last_name, 100)?;

        self.ensure_email_free(&email, None).await?;
        let password_hash = hash_password(&input.password)?;

        let sql = format!(
            "INSERT INTO users (id, email, password_hash, first_name, last_name, role, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6, true) RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&email)
            .bind(&password_hash)
            .bind(&first_name)
            .bind(&last_name)
            .bind(input.role)
            .fetch_one(&self.pool)
            .await?;

        info!("Created user {} with role {}", user.id, user.role);
        Ok(user)
    }

    pub async fn update(&self, id: Uuid, patch: UpdateUser, acting_user: Uuid) -> Result<User, ApiError> {
        let mut user = self.get(id).await?;

        if id == acting_user {
            if patch.is_active == Some(false) {
                return Err(ApiError::bad_request("You cannot deactivate your own account"));
            }
            if patch.role.is_some_and(|r| r != user.role) {
                return Err(ApiError::bad_request("You cannot change your own role"));
            }
        }

        if let Some(email) = patch.email {
            let email = email.trim().to_string();
            validate_email("email", &email)?;
            if !email.eq_ignore_ascii_case(&user.email) {
                self.ensure_email_free(&email, Some(id)).await?;
            }
            user.email = email;
        }
        if let Some(first) = patch.first_name {
            user.first_name = required_text("first_name", &first, 100)?;
        }
        if let Some(last) = patch.last_name {
            user.last_name = required_text("last_name", &last, 100)?;
        }
        if let Some(role) = patch.role {
            user.role = role;
        }
        if let Some(active) = patch.is_active {
            user.is_active = active;
        }

        let sql = format!(
            "UPDATE users SET email = $2, first_name = $3, last_name = $4, role = $5, is_active = $6, \
             updated_at = now() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(&user.email)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(user.role)
            .bind(user.is_active)
            .fetch_one(&self.pool)
            .await?)
    }

    pub async fn deactivate(&self, id: Uuid, acting_user: Uuid) -> Result<User, ApiError> {
        if id == acting_user {
            return Err(ApiError::bad_request("You cannot deactivate your own account"));
        }
        self.get(id).await?;

        let sql = format!(
            "UPDATE users SET is_active = false, updated_at = now() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql).bind(id).fetch_one(&self.pool).await?;
        info!("Deactivated user {}", user.id);
        Ok(user)
    }

    pub async fn change_password(&self, id: Uuid, input: ChangePassword) -> Result<(), ApiError> {
        let user = self.get(id).await?;
        if !verify_password(&input.current_password, &user.password_hash)? {
            return Err(ApiError::invalid_field("current_password", "Current password is incorrect"));
        }
        validate_password_strength(&input.new_password).map_err(|msg| ApiError::invalid_field("new_password", msg))?;

        let hash = hash_password(&input.new_password)?;
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(hash)
            .execute(&self.pool)
            .await?;
        info!("Password changed for user {}", id);
        Ok(())
    }

    pub async fn record_login(&self, id: Uuid) -> Result<(), ApiError> {
        sqlx::query("UPDATE users SET last_login_at = $2 WHERE id = $1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Active client assignments of one user
    pub async fn client_assignments(&self, user_id: Uuid) -> Result<Vec<UserClientAssignment>, ApiError> {
        self.get(user_id).await?;
        Ok(sqlx::query_as::<_, UserClientAssignment>(
            r#"
            SELECT a.id AS assignment_id, a.client_id, c.company_name, a.assignment_role, a.assigned_date
            FROM client_team_assignments a
            JOIN clients c ON c.id = a.client_id
            WHERE a.user_id = $1 AND a.is_active AND c.deleted_at IS NULL
            ORDER BY c.company_name, a.assignment_role
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }
}
