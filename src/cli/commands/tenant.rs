use anyhow::anyhow;
use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::database::CreateOutcome;
use crate::services::TenantProvisioner;

#[derive(Subcommand)]
pub enum TenantCommands {
    #[command(about = "List all company databases")]
    List,

    #[command(about = "Create a company database and apply the schema")]
    Create {
        #[arg(help = "Company name")]
        name: String,
    },

    #[command(about = "Check whether a company database exists")]
    Exists {
        #[arg(help = "Company name")]
        name: String,
    },

    #[command(about = "Show existence and schema status of a company database")]
    Status {
        #[arg(help = "Company name")]
        name: String,
    },

    #[command(about = "Drop a company database (irreversible)")]
    Delete {
        #[arg(help = "Company name")]
        name: String,

        #[arg(long, help = "Confirm dropping the database and all its data")]
        force: bool,
    },
}

pub async fn handle(
    cmd: TenantCommands,
    provisioner: &TenantProvisioner,
    output_format: &OutputFormat,
) -> anyhow::Result<()> {
    match cmd {
        TenantCommands::List => {
            let databases = provisioner.list_all_tenant_databases().await?;

            if databases.is_empty() {
                return output_empty_collection(output_format, "tenants", "No company databases found");
            }

            match output_format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&json!({ "tenants": databases }))?);
                }
                OutputFormat::Text => {
                    println!("{:<30} {:<40} {}", "TENANT", "DATABASE", "SIZE");
                    println!("{}", "-".repeat(84));
                    for db in &databases {
                        let size = db.size_bytes.map(format_bytes).unwrap_or_else(|| "-".to_string());
                        println!("{:<30} {:<40} {}", db.tenant_key, db.database_name, size);
                    }
                }
            }
            Ok(())
        }
        TenantCommands::Create { name } => {
            let key = provisioner.key(&name)?;
            let (database, outcome) = provisioner.provision_key(&key).await?;
            let created = outcome == CreateOutcome::Created;

            let message = if created {
                format!("Created company database '{}'", database)
            } else {
                format!("Company database '{}' already exists", database)
            };
            output_success(
                output_format,
                &message,
                Some(json!({ "database_name": database, "created": created })),
            )
        }
        TenantCommands::Exists { name } => {
            let key = provisioner.key(&name)?;
            let database = provisioner.naming().database_name(&key);
            let exists = provisioner.exists(key.as_str()).await?;

            match output_format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&json!({
                            "tenant_key": key,
                            "database_name": database,
                            "exists": exists
                        }))?
                    );
                }
                OutputFormat::Text => {
                    let verdict = if exists { "exists" } else { "does not exist" };
                    println!("{} {}", database, verdict);
                }
            }
            Ok(())
        }
        TenantCommands::Status { name } => {
            let status = provisioner.status(&name).await?;

            match output_format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&status)?),
                OutputFormat::Text => {
                    println!("Database: {}", status.database_name);
                    println!("Exists:   {}", status.exists);
                    if status.exists {
                        if status.missing_tables.is_empty() {
                            println!("Schema:   complete");
                        } else {
                            println!("Schema:   missing {}", status.missing_tables.join(", "));
                        }
                    }
                }
            }
            Ok(())
        }
        TenantCommands::Delete { name, force } => {
            let key = provisioner.key(&name)?;
            let database = provisioner.naming().database_name(&key);
            if !force {
                return Err(anyhow!(
                    "Refusing to drop '{}' without --force; this deletes all company data",
                    database
                ));
            }

            provisioner.delete(key.as_str()).await?;
            output_success(
                output_format,
                &format!("Dropped company database '{}'", database),
                Some(json!({ "database_name": database })),
            )
        }
    }
}
