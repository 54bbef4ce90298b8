// handlers/protected/integrations - Data source admin and query execution
//
// Source and query management is admin only. Executing queries is open to
// every authenticated role.

pub mod data;
pub mod query;
pub mod source;

pub use data::*;
pub use query::*;
pub use source::*;

use sqlx::PgPool;

use crate::integrations::TenantScope;
use crate::middleware::ValidatedTenant;
use crate::services::integration_service::IntegrationService;

fn service(pool: PgPool, tenant: &ValidatedTenant) -> IntegrationService {
    IntegrationService::new(
        pool,
        TenantScope {
            tenant: tenant.name.clone(),
            database: tenant.database.clone(),
        },
    )
}
