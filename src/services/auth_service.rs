use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::password::{verify_against_dummy, verify_password};
use crate::auth::{self, Claims, Role};
use crate::database::manager::DatabaseManager;
use crate::database::models::{Tenant, User};
use crate::error::ApiError;
use crate::services::tenant_service::TenantService;
use crate::services::user_service::UserService;

// Same message for every credential failure so callers cannot discover tenants or emails
const INVALID_CREDENTIALS: &str = "Invalid tenant, email or password";

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub tenant: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub expires_in: i64,
    pub user: SessionUser,
}

impl TokenResponse {
    fn issue(tenant: &Tenant, user: &User) -> Result<Self, ApiError> {
        let claims = Claims::new(
            tenant.name.clone(),
            tenant.database.clone(),
            user.email.clone(),
            user.role,
            user.id,
        );
        let token = auth::generate_jwt(&claims)?;

        Ok(Self {
            token,
            expires_in: claims.expires_in(),
            user: SessionUser {
                id: user.id,
                email: user.email.clone(),
                first_name: user.first_name.clone(),
                last_name: user.last_name.clone(),
                role: user.role,
                tenant: tenant.name.clone(),
            },
        })
    }
}

pub struct AuthService;

impl AuthService {
    pub async fn login(tenant_name: &str, request: &LoginRequest) -> Result<TokenResponse, ApiError> {
        let tenants = TenantService::new().await?;
        let tenant = match tenants.find_tenant(tenant_name).await? {
            Some(tenant) => tenant,
            None => {
                verify_against_dummy(&request.password);
                warn!("Login rejected: unknown tenant '{}'", tenant_name);
                return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
            }
        };

        let pool = DatabaseManager::tenant_pool(&tenant.database).await?;
        let users = UserService::new(pool);

        let user = match users.find_by_email(&request.email).await? {
            Some(user) => user,
            None => {
                verify_against_dummy(&request.password);
                warn!("Login rejected: unknown user in tenant '{}'", tenant.name);
                return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
            }
        };

        if !verify_password(&request.password, &user.password_hash)? {
            warn!("Login rejected: bad password for user {} in tenant '{}'", user.id, tenant.name);
            return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
        }

        if !tenant.is_active {
            return Err(ApiError::forbidden(format!("Tenant '{}' is deactivated", tenant.name)));
        }
        if !user.is_active {
            return Err(ApiError::forbidden("User account is deactivated"));
        }

        users.record_login(user.id).await?;
        info!("User {} logged in to tenant '{}'", user.id, tenant.name);

        TokenResponse::issue(&tenant, &user)
    }

    /// Reissue a token for a still-valid one, picking up the user's current role
    pub async fn refresh(claims: &Claims) -> Result<TokenResponse, ApiError> {
        let tenants = TenantService::new().await?;
        let tenant = tenants
            .find_tenant(&claims.tenant)
            .await?
            .filter(|t| t.database == claims.database)
            .ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))?;

        if !tenant.is_active {
            return Err(ApiError::forbidden(format!("Tenant '{}' is deactivated", tenant.name)));
        }

        let pool = DatabaseManager::tenant_pool(&tenant.database).await?;
        let user = UserService::new(pool)
            .get(claims.user_id)
            .await
            .map_err(|e| match e {
                ApiError::NotFound(_) => ApiError::unauthorized("Invalid or expired token"),
                other => other,
            })?;

        if !user.is_active {
            return Err(ApiError::forbidden("User account is deactivated"));
        }

        TokenResponse::issue(&tenant, &user)
    }
}
