use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pdns_mirror::config::Settings;
use pdns_mirror::database;
use pdns_mirror::database::models::EntityType;
use pdns_mirror::remote::capabilities::CapabilityTable;
use pdns_mirror::remote::client::RemoteAdminClient;
use pdns_mirror::remote::types::Operation;
use pdns_mirror::store::PgEntityStore;
use pdns_mirror::sync::ReconciliationEngine;

#[derive(Parser, Debug)]
#[command(name = "pdns-mirror")]
#[command(about = "Local mirror and name-to-id resolution for a PowerDNS Admin API", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config/server.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply database migrations and exit
    Migrate,
    /// Reconcile the local mirror with the remote admin API
    Sync {
        /// Entity types to sync; defaults to every listable type
        #[arg(short, long, value_enum)]
        entity: Vec<EntityType>,
    },
    /// Resolve a name to its remote-assigned identifier
    Resolve {
        #[arg(value_enum)]
        entity: EntityType,
        name: String,
    },
    /// Delete an entity remotely by name, then drop the local row
    Delete {
        #[arg(value_enum)]
        entity: EntityType,
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdns_mirror=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    // Load configuration
    let settings = Settings::load(&args.config)?;
    settings.validate()?;

    // Initialize database
    let db_pool = database::init_pool(&settings.database).await?;

    if let Command::Migrate = args.command {
        info!("Running database migrations...");
        database::run_migrations(&db_pool).await?;
        info!("Migrations completed successfully");
        return Ok(());
    }

    let client = RemoteAdminClient::new(&settings.remote)?;
    let store = PgEntityStore::new(db_pool);
    let capabilities = CapabilityTable::with_overrides(&settings.capabilities);
    let engine = ReconciliationEngine::new(Arc::new(client), Arc::new(store), capabilities);

    match args.command {
        Command::Migrate => unreachable!(),
        Command::Sync { entity } => {
            let results = if entity.is_empty() {
                engine.sync_all().await
            } else {
                let mut results = Vec::new();
                for entity in entity {
                    let result = engine.sync(entity).await;
                    results.push((entity, result));
                }
                results
            };

            let mut failed = false;
            for (entity, result) in results {
                match result {
                    Ok(report) => println!("{}", serde_json::to_string_pretty(&report)?),
                    Err(err) => {
                        failed = true;
                        warn!("Sync of {} failed: {}", entity, err);
                    }
                }
            }
            if failed {
                anyhow::bail!("one or more sync passes failed");
            }
        }
        Command::Resolve { entity, name } => {
            let remote_id = engine.resolve_remote_id(entity, &name).await?;
            println!("{}", remote_id);
        }
        Command::Delete { entity, name } => {
            let response = engine
                .call_by_name(entity, &name, Operation::Delete, None)
                .await?;
            println!("{} {}", response.status_code, response.raw_body);
            if !response.is_success() {
                anyhow::bail!("remote delete of {} '{}' did not succeed", entity, name);
            }
        }
    }

    Ok(())
}
