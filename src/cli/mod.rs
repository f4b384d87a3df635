pub mod commands;
pub mod utils;

use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::app::Components;
use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "logos")]
#[command(about = "Logos CLI - company database administration")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Company database management")]
    Tenant {
        #[command(subcommand)]
        cmd: commands::tenant::TenantCommands,
    },
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

pub async fn run(cli: Cli, config: &AppConfig) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let components = Components::connect(config).await?;

    let result = match cli.command {
        Commands::Tenant { cmd } => {
            commands::tenant::handle(cmd, &components.provisioner, &output_format).await
        }
    };

    // Drain pools even when the command failed
    components
        .lifecycle(Duration::from_secs(config.api.shutdown_timeout))
        .shutdown()
        .await;
    result
}
