//! maintenance: diagnóstico e reparo dos dados entre empresas.
//!
//! ```bash
//! # Lista as inconsistências (JSON)
//! maintenance report
//!
//! # Mostra o que seria corrigido, sem gravar
//! maintenance repair
//!
//! # Aplica as correções
//! maintenance repair --apply
//! ```

use std::time::Duration;

use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use messenger_commerce::{db::MaintenanceRepository, services::maintenance::MaintenanceService};

#[derive(Parser)]
#[command(name = "maintenance")]
#[command(about = "🔧 Diagnóstico e reparo dos dados do messenger-commerce", long_about = None)]
struct Cli {
    /// URL do banco de dados
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lista conversas, mensagens, produtos e páginas inconsistentes
    Report,
    /// Corrige as inconsistências numa única transação
    Repair {
        /// Grava as correções (sem isso, só simula)
        #[arg(long)]
        apply: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(Duration::from_secs(3))
        .connect(&cli.database_url)
        .await?;
    let service = MaintenanceService::new(MaintenanceRepository::new(pool));

    match cli.command {
        Commands::Report => {
            let report = service.report().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if report.is_clean() {
                tracing::info!("✅ Nenhuma inconsistência encontrada");
            }
        }
        Commands::Repair { apply } => {
            let summary = service.repair(apply).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            if !apply && summary.total() > 0 {
                tracing::info!("Rode novamente com --apply para gravar as correções");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn repair_is_a_dry_run_by_default() {
        let cli = Cli::try_parse_from(["maintenance", "--database-url", "postgres://x", "repair"]).unwrap();
        assert!(matches!(cli.command, Commands::Repair { apply: false }));

        let cli =
            Cli::try_parse_from(["maintenance", "--database-url", "postgres://x", "repair", "--apply"]).unwrap();
        assert!(matches!(cli.command, Commands::Repair { apply: true }));
    }
}
