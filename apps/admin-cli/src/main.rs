//! # pos-admin
//!
//! CLI glue around the three core subsystems, for operators who need to
//! provision a tenant, trigger a stock snapshot out of band, or inspect a
//! terminal counter without going through the HTTP surface — the precedent
//! here is `titan-db`'s `seed` binary, a standalone entry point living
//! alongside the library crates it drives rather than behind the HTTP app.
//!
//! Exit codes follow spec §6: `0` on success, non-zero on configuration or
//! connection error (and on a command-specific failure, e.g. an unknown
//! terminal).

use clap::{Parser, Subcommand};
use pos_core::validation::validate_tenant_id;
use pos_storage::StorageGateway;
use pos_stock::{ScheduleFrequency, SnapshotSchedule};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "pos-admin", about = "Operator CLI for the POS platform's core subsystems")]
struct Cli {
    /// MongoDB connection string. Falls back to MONGODB_URI if unset.
    #[arg(long, env = "MONGODB_URI")]
    mongodb_uri: String,

    /// Logical database name prefix. Falls back to DB_NAME_PREFIX if unset.
    #[arg(long, env = "DB_NAME_PREFIX", default_value = "pos")]
    db_name_prefix: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Creates a tenant's logical storage namespace and indexes (spec §4.1:
    /// "on first tenant-registration the gateway creates collections and
    /// indexes"). Idempotent — safe to re-run against an existing tenant.
    ProvisionTenant {
        /// One uppercase letter followed by four digits, e.g. A1234.
        tenant_id: String,
    },

    /// Triggers an immediate stock snapshot for a tenant, bypassing the
    /// hourly scheduler gate (spec §4.6.3).
    Snapshot {
        tenant_id: String,
        /// Store codes to snapshot, or "all" to enumerate every store.
        #[arg(long, default_value = "all")]
        stores: Vec<String>,
        #[arg(long, default_value_t = 90)]
        retention_days: i64,
    },

    /// Prints a terminal counter's current value without advancing it.
    InspectCounter {
        terminal_id: String,
        counter_type: String,
    },

    /// Re-creates the stock-snapshot TTL index after a retention change
    /// (spec §8 scenario 6: "Schedule retention changes 30→7 ... the
    /// snapshot collection's TTL is re-created").
    SetSnapshotRetention { tenant_id: String, retention_days: i64 },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).with_target(false).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let cli = Cli::parse();
    let exit_code = run(cli).await;
    std::process::exit(exit_code);
}

async fn run(cli: Cli) -> i32 {
    match run_command(&cli).await {
        Ok(()) => 0,
        Err(e) => {
            error!(error = %e, "command failed");
            1
        }
    }
}

async fn run_command(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    match &cli.command {
        Command::ProvisionTenant { tenant_id } => {
            validate_tenant_id(tenant_id)?;
            let storage = StorageGateway::connect(&cli.mongodb_uri, &cli.db_name_prefix, tenant_id).await?;
            storage.register_tenant().await?;
            storage.register_commons().await?;
            info!(tenant_id = %tenant_id, "tenant provisioned");
            Ok(())
        }

        Command::Snapshot { tenant_id, stores, retention_days } => {
            validate_tenant_id(tenant_id)?;
            let storage = StorageGateway::connect(&cli.mongodb_uri, &cli.db_name_prefix, tenant_id).await?;
            let schedule = SnapshotSchedule {
                tenant_id: tenant_id.clone(),
                frequency: ScheduleFrequency::Daily,
                hour: 0,
                minute: 0,
                stores: stores.clone(),
                retention_days: *retention_days,
            };
            let snapshot = pos_stock::snapshot_now(&storage, &schedule).await?;
            info!(tenant_id = %tenant_id, entries = snapshot.entries.len(), "snapshot complete");
            Ok(())
        }

        Command::InspectCounter { terminal_id, counter_type } => {
            // `terminal_id` is `tenant-store-no` (`Terminal::terminal_id`),
            // so the tenant is its first dash-separated component; counters
            // live in that tenant's own database, not in commons (only
            // delivery-status and subscriber-dedupe are cross-tenant).
            let tenant_id = terminal_id.split('-').next().filter(|s| !s.is_empty()).ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("terminal_id '{terminal_id}' is not in tenant-store-no form"))
            })?;
            let storage = StorageGateway::connect(&cli.mongodb_uri, &cli.db_name_prefix, tenant_id).await?;
            let filter = bson::doc! { "terminal_id": terminal_id, "counter_type": counter_type };
            match storage.get("terminal_counters", filter).await? {
                Some(doc) => {
                    let value = doc.get_i64("value").unwrap_or(0);
                    println!("{terminal_id}/{counter_type} = {value}");
                    Ok(())
                }
                None => {
                    println!("{terminal_id}/{counter_type} has not been advanced yet");
                    Ok(())
                }
            }
        }

        Command::SetSnapshotRetention { tenant_id, retention_days } => {
            validate_tenant_id(tenant_id)?;
            let storage = StorageGateway::connect(&cli.mongodb_uri, &cli.db_name_prefix, tenant_id).await?;
            pos_stock::apply_retention_change(&storage, *retention_days).await?;
            info!(tenant_id = %tenant_id, retention_days, "snapshot TTL index re-created");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_provision_tenant() {
        let cli = Cli::parse_from(["pos-admin", "--mongodb-uri", "mongodb://localhost", "provision-tenant", "A1234"]);
        match cli.command {
            Command::ProvisionTenant { tenant_id } => assert_eq!(tenant_id, "A1234"),
            _ => panic!("expected ProvisionTenant"),
        }
    }

    #[test]
    fn cli_parses_snapshot_with_default_stores() {
        let cli = Cli::parse_from(["pos-admin", "--mongodb-uri", "mongodb://localhost", "snapshot", "A1234"]);
        match cli.command {
            Command::Snapshot { tenant_id, stores, retention_days } => {
                assert_eq!(tenant_id, "A1234");
                assert_eq!(stores, vec!["all".to_string()]);
                assert_eq!(retention_days, 90);
            }
            _ => panic!("expected Snapshot"),
        }
    }
}
