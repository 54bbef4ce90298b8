use clap::{ArgGroup, Subcommand};
use serde_json::json;

use crate::auth::password::validate_password_strength;
use crate::auth::Role;
use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::database::models::user::CreateUser;
use crate::database::DatabaseManager;
use crate::services::tenant_service::TenantService;
use crate::services::user_service::UserService;
use crate::validation::validate_email;

#[derive(Subcommand)]
pub enum TenantCommands {
    #[command(about = "Create a tenant database and its first admin user")]
    Create {
        #[arg(help = "Tenant name (letters, digits, '-' and '_')")]
        name: String,

        #[arg(long, help = "Email of the initial admin user")]
        admin_email: String,

        #[arg(long, help = "Password of the initial admin user")]
        admin_password: String,

        #[arg(long, default_value = "Tenant")]
        first_name: String,

        #[arg(long, default_value = "Admin")]
        last_name: String,
    },

    #[command(about = "List tenants")]
    List,

    #[command(about = "Apply tenant migrations to one tenant or all of them")]
    #[command(group(ArgGroup::new("target").required(true).args(["name", "all"])))]
    Migrate {
        #[arg(help = "Tenant name")]
        name: Option<String>,

        #[arg(long, help = "Migrate every registered tenant")]
        all: bool,
    },

    #[command(about = "Block logins and API access for a tenant")]
    Deactivate {
        #[arg(help = "Tenant name")]
        name: String,
    },
}

pub async fn handle(cmd: TenantCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let service = TenantService::new().await?;

    match cmd {
        TenantCommands::Create {
            name,
            admin_email,
            admin_password,
            first_name,
            last_name,
        } => {
            // check the admin up front so a bad password does not leave an orphan tenant
            validate_email("admin_email", &admin_email)?;
            validate_password_strength(&admin_password).map_err(anyhow::Error::msg)?;

            let tenant = service.create_tenant(&name).await?;
            let pool = DatabaseManager::tenant_pool(&tenant.database).await?;
            let admin = UserService::new(pool)
                .create(CreateUser {
                    email: admin_email,
                    password: admin_password,
                    first_name,
                    last_name,
                    role: Role::Admin,
                })
                .await?;

            output_success(
                &output_format,
                &format!("Tenant '{}' created with admin {}", tenant.name, admin.email),
                Some(json!({ "tenant": tenant, "admin": admin })),
            )
        }
        TenantCommands::List => {
            let tenants = service.list_tenants().await?;
            if tenants.is_empty() {
                return output_empty_collection(&output_format, "tenants", "No tenants registered");
            }

            output_collection(
                &output_format,
                "tenants",
                &tenants,
                &format!("{:<24} {:<24} {:<8} {}", "NAME", "DATABASE", "ACTIVE", "CREATED"),
                |t| {
                    format!(
                        "{:<24} {:<24} {:<8} {}",
                        t.name,
                        t.database,
                        if t.is_active { "yes" } else { "no" },
                        t.created_at.format("%Y-%m-%d %H:%M")
                    )
                },
            )
        }
        TenantCommands::Migrate { name: Some(name), .. } => {
            let tenant = service.migrate_tenant(&name).await?;
            output_success(
                &output_format,
                &format!("Migrated tenant '{}' ({})", tenant.name, tenant.database),
                Some(json!({ "tenant": tenant.name })),
            )
        }
        TenantCommands::Migrate { name: None, .. } => {
            let results = service.migrate_all().await?;
            let failed: Vec<String> = results
                .iter()
                .filter_map(|(t, outcome)| outcome.as_ref().err().map(|e| format!("{}: {}", t.name, e)))
                .collect();

            output_success(
                &output_format,
                &format!("Migrated {} of {} tenant(s)", results.len() - failed.len(), results.len()),
                Some(json!({ "failed": failed })),
            )?;
            if !failed.is_empty() {
                anyhow::bail!("{} tenant migration(s) failed:\n{}", failed.len(), failed.join("\n"));
            }
            Ok(())
        }
        TenantCommands::Deactivate { name } => {
            let tenant = service.deactivate_tenant(&name).await?;
            output_success(
                &output_format,
                &format!("Tenant '{}' deactivated", tenant.name),
                Some(json!({ "tenant": tenant.name })),
            )
        }
    }
}
