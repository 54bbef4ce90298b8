use clap::Subcommand;
use serde_json::json;

use crate::auth::Role;
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::database::models::user::CreateUser;
use crate::database::DatabaseManager;
use crate::services::tenant_service::TenantService;
use crate::services::user_service::UserService;

#[derive(Subcommand)]
pub enum UserCommands {
    #[command(about = "Create a user inside a tenant")]
    Create {
        #[arg(help = "Tenant name")]
        tenant: String,

        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,

        #[arg(long, help = "admin, manager, account_manager, project_manager, engineer or viewer")]
        role: Role,

        #[arg(long, default_value = "")]
        first_name: String,

        #[arg(long, default_value = "")]
        last_name: String,
    },
}

pub async fn handle(cmd: UserCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        UserCommands::Create {
            tenant,
            email,
            password,
            role,
            first_name,
            last_name,
        } => {
            let tenant = TenantService::new().await?.get_tenant(&tenant).await?;
            let pool = DatabaseManager::tenant_pool(&tenant.database).await?;

            // names fall back to the email's local part
            let local = email.split('@').next().unwrap_or_default().to_string();
            let first_name = if first_name.trim().is_empty() { local } else { first_name };
            let last_name = if last_name.trim().is_empty() { "-".to_string() } else { last_name };

            let user = UserService::new(pool)
                .create(CreateUser {
                    email,
                    password,
                    first_name,
                    last_name,
                    role,
                })
                .await?;

            output_success(
                &output_format,
                &format!("Created {} user {} in tenant '{}'", user.role, user.email, tenant.name),
                Some(json!({ "user": user })),
            )
        }
    }
}
