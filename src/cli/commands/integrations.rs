use anyhow::Context;
use clap::Subcommand;
use serde_json::json;
use std::path::PathBuf;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::database::DatabaseManager;
use crate::integrations::{import, TenantScope};
use crate::services::integration_service::IntegrationService;
use crate::services::tenant_service::TenantService;

#[derive(Subcommand)]
pub enum IntegrationCommands {
    #[command(about = "Create or update data sources and queries from a YAML file")]
    Import {
        #[arg(help = "Tenant name")]
        tenant: String,

        #[arg(help = "Path to the YAML definitions")]
        file: PathBuf,
    },
}

pub async fn handle(cmd: IntegrationCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        IntegrationCommands::Import { tenant, file } => {
            let yaml = std::fs::read_to_string(&file).with_context(|| format!("failed to read {}", file.display()))?;
            let definitions = import::parse(&yaml)?;

            let tenant = TenantService::new().await?.get_tenant(&tenant).await?;
            let pool = DatabaseManager::tenant_pool(&tenant.database).await?;
            let scope = TenantScope {
                tenant: tenant.name.clone(),
                database: tenant.database.clone(),
            };

            let report = IntegrationService::new(pool, scope).import(definitions).await?;

            let message = format!(
                "Imported into '{}': {} source(s) created, {} updated; {} query(ies) created, {} updated",
                tenant.name,
                report.sources_created.len(),
                report.sources_updated.len(),
                report.queries_created.len(),
                report.queries_updated.len()
            );
            output_success(&output_format, &message, Some(json!({ "report": report })))
        }
    }
}
