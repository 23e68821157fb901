mod import;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "fuelfinder-cli")]
#[command(about = "UK Fuel Finder ingestion command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Run one fetch cycle and persist the results
    Import {
        /// Only fetch stations
        #[arg(long, conflicts_with = "prices")]
        stations: bool,

        /// Only fetch prices
        #[arg(long)]
        prices: bool,
    },
    /// Show the stored fetch watermarks
    Watermarks,
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check the database connection
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("fuelfinder-cli: no command given; see --help");
        return Ok(());
    };

    let config = fuelfinder_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = fuelfinder_db::PoolConfig::from_app_config(&config);
    let pool = fuelfinder_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Db {
            command: DbCommands::Ping,
        } => {
            fuelfinder_db::health_check(&pool).await?;
            println!("database reachable");
        }
        Commands::Db {
            command: DbCommands::Migrate,
        } => {
            let applied = fuelfinder_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
        }
        Commands::Import { stations, prices } => {
            fuelfinder_db::run_migrations(&pool).await?;
            let resources = import::Resources::from_flags(stations, prices);
            import::run_import(&pool, &config, resources).await?;
        }
        Commands::Watermarks => {
            let rows = fuelfinder_db::list_watermarks(&pool).await?;
            if rows.is_empty() {
                println!("no fetch cycle has completed yet");
            }
            for row in rows {
                println!("{:<10} {}", row.resource, row.watermark.to_rfc3339());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests;
