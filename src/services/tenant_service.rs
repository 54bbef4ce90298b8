use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::Tenant;

#[derive(Debug, thiserror::Error)]
pub enum TenantError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Database manager error: {0}")]
    DatabaseManager(#[from] DatabaseError),
    #[error("Tenant already exists: {0}")]
    AlreadyExists(String),
    #[error("Tenant not found: {0}")]
    NotFound(String),
    #[error("Invalid tenant name: {0}")]
    InvalidName(String),
}

const TENANT_COLUMNS: &str = "id, name, database, is_active, created_at, updated_at, deleted_at";

pub struct TenantService {
    main_pool: PgPool,
}

impl TenantService {
    pub async fn new() -> Result<Self, TenantError> {
        let main_pool = DatabaseManager::main_pool().await?;
        Ok(Self { main_pool })
    }

    /// Provision a tenant: create its database, migrate it, register it
    pub async fn create_tenant(&self, tenant_name: &str) -> Result<Tenant, TenantError> {
        Self::validate_tenant_name(tenant_name)?;

        if self.tenant_exists(tenant_name).await? {
            return Err(TenantError::AlreadyExists(tenant_name.to_string()));
        }

        let tenant_db = Self::database_name_for(tenant_name);
        if DatabaseManager::database_exists(&tenant_db).await? {
            // left behind by an earlier attempt that failed before registration
            warn!("Database {} already exists; reusing it for tenant '{}'", tenant_db, tenant_name);
        } else {
            DatabaseManager::create_database(&tenant_db).await?;
        }

        DatabaseManager::migrate_tenant(&tenant_db).await?;
        let tenant = self.register_tenant(tenant_name, &tenant_db).await?;

        info!("Created tenant '{}' ({})", tenant.name, tenant.database);
        Ok(tenant)
    }

    /// Hash tenant name to consistent database name
    pub fn database_name_for(name: &str) -> String {
        let hash = Sha256::digest(name.as_bytes());
        let hash_str = format!("{:x}", hash);

        // First 16 hex characters keep the name well under the identifier limit
        format!("tenant_{}", &hash_str[..16])
    }

    fn validate_tenant_name(name: &str) -> Result<(), TenantError> {
        if name.chars().count() < 2 {
            return Err(TenantError::InvalidName("Tenant name must be at least 2 characters".to_string()));
        }

        if name.chars().count() > 100 {
            return Err(TenantError::InvalidName("Tenant name must be at most 100 characters".to_string()));
        }

        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(TenantError::InvalidName(
                "Tenant name can only contain letters, numbers, hyphens, and underscores".to_string(),
            ));
        }

        Ok(())
    }

    async fn tenant_exists(&self, tenant_name: &str) -> Result<bool, TenantError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tenants WHERE name = $1 AND deleted_at IS NULL")
            .bind(tenant_name)
            .fetch_one(&self.main_pool)
            .await?;

        Ok(count > 0)
    }

    async fn register_tenant(&self, tenant_name: &str, tenant_db: &str) -> Result<Tenant, TenantError> {
        let sql = format!(
            "INSERT INTO tenants (id, name, database, is_active) VALUES ($1, $2, $3, true) RETURNING {}",
            TENANT_COLUMNS
        );
        let tenant = sqlx::query_as::<_, Tenant>(&sql)
            .bind(Uuid::new_v4())
            .bind(tenant_name)
            .bind(tenant_db)
            .fetch_one(&self.main_pool)
            .await?;
        Ok(tenant)
    }

    pub async fn list_tenants(&self) -> Result<Vec<Tenant>, TenantError> {
        let sql = format!(
            "SELECT {} FROM tenants WHERE deleted_at IS NULL ORDER BY name",
            TENANT_COLUMNS
        );
        Ok(sqlx::query_as::<_, Tenant>(&sql).fetch_all(&self.main_pool).await?)
    }

    pub async fn get_tenant(&self, tenant_name: &str) -> Result<Tenant, TenantError> {
        self.find_tenant(tenant_name)
            .await?
            .ok_or_else(|| TenantError::NotFound(tenant_name.to_string()))
    }

    /// Tenant by name, including deactivated ones
    pub async fn find_tenant(&self, tenant_name: &str) -> Result<Option<Tenant>, TenantError> {
        let sql = format!(
            "SELECT {} FROM tenants WHERE name = $1 AND deleted_at IS NULL",
            TENANT_COLUMNS
        );
        Ok(sqlx::query_as::<_, Tenant>(&sql)
            .bind(tenant_name)
            .fetch_optional(&self.main_pool)
            .await?)
    }

    /// Re-run tenant migrations against an existing tenant
    pub async fn migrate_tenant(&self, tenant_name: &str) -> Result<Tenant, TenantError> {
        let tenant = self.get_tenant(tenant_name).await?;
        DatabaseManager::migrate_tenant(&tenant.database).await?;
        Ok(tenant)
    }

    /// Migrate every tenant, collecting per-tenant failures instead of stopping
    pub async fn migrate_all(&self) -> Result<Vec<(Tenant, Result<(), TenantError>)>, TenantError> {
        let mut results = Vec::new();
        for tenant in self.list_tenants().await? {
            let outcome = DatabaseManager::migrate_tenant(&tenant.database)
                .await
                .map_err(TenantError::from);
            if let Err(e) = &outcome {
                warn!("Migration failed for tenant '{}': {}", tenant.name, e);
            }
            results.push((tenant, outcome));
        }
        Ok(results)
    }

    /// Block logins and API access; the database is kept
    pub async fn deactivate_tenant(&self, tenant_name: &str) -> Result<Tenant, TenantError> {
        let sql = format!(
            "UPDATE tenants SET is_active = false, updated_at = now() \
             WHERE name = $1 AND deleted_at IS NULL RETURNING {}",
            TENANT_COLUMNS
        );
        let tenant = sqlx::query_as::<_, Tenant>(&sql)
            .bind(tenant_name)
            .fetch_optional(&self.main_pool)
            .await?
            .ok_or_else(|| TenantError::NotFound(tenant_name.to_string()))?;

        info!("Deactivated tenant '{}'", tenant.name);
        Ok(tenant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_names_are_stable_and_valid() {
        let a = TenantService::database_name_for("acme-soc");
        assert_eq!(a, TenantService::database_name_for("acme-soc"));
        assert_ne!(a, TenantService::database_name_for("globex"));
        assert_eq!(a.len(), "tenant_".len() + 16);
        assert!(a["tenant_".len()..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn tenant_names_are_validated() {
        assert!(TenantService::validate_tenant_name("acme_soc-1").is_ok());
        assert!(TenantService::validate_tenant_name("a").is_err());
        assert!(TenantService::validate_tenant_name("acme soc").is_err());
        assert!(TenantService::validate_tenant_name("acme;drop").is_err());
        assert!(TenantService::validate_tenant_name(&"x".repeat(101)).is_err());
    }
}
