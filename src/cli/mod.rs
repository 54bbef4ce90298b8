pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "mssp")]
#[command(about = "MSSP CLI - provisioning and maintenance for the MSSP API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run system database migrations")]
    Migrate,

    #[command(about = "Tenant provisioning")]
    Tenant {
        #[command(subcommand)]
        cmd: commands::tenant::TenantCommands,
    },

    #[command(about = "Tenant user management")]
    User {
        #[command(subcommand)]
        cmd: commands::user::UserCommands,
    },

    #[command(about = "External data source configuration")]
    Integrations {
        #[command(subcommand)]
        cmd: commands::integrations::IntegrationCommands,
    },

    #[command(about = "Print a fresh base64 encoded credential encryption key")]
    Keygen,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Migrate => commands::migrate::handle(output_format).await,
        Commands::Tenant { cmd } => commands::tenant::handle(cmd, output_format).await,
        Commands::User { cmd } => commands::user::handle(cmd, output_format).await,
        Commands::Integrations { cmd } => commands::integrations::handle(cmd, output_format).await,
        Commands::Keygen => commands::keygen::handle(output_format),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_tenant_create() {
        let cli = Cli::try_parse_from([
            "mssp",
            "--json",
            "tenant",
            "create",
            "acme",
            "--admin-email",
            "ops@acme.io",
            "--admin-password",
            "correct-horse",
        ])
        .unwrap();
        assert!(matches!(OutputFormat::from_cli(&cli), OutputFormat::Json));
        assert!(matches!(
            cli.command,
            Commands::Tenant { cmd: commands::tenant::TenantCommands::Create { .. } }
        ));
    }

    #[test]
    fn tenant_migrate_takes_name_or_all() {
        assert!(Cli::try_parse_from(["mssp", "tenant", "migrate", "--all"]).is_ok());
        assert!(Cli::try_parse_from(["mssp", "tenant", "migrate", "acme"]).is_ok());
        assert!(Cli::try_parse_from(["mssp", "tenant", "migrate"]).is_err());
        assert!(Cli::try_parse_from(["mssp", "tenant", "migrate", "acme", "--all"]).is_err());
    }
}
