//! Reaper: trims runs whose most recent activity predates a TTL, along
//! with their arrivals and estimates.

use chrono::Duration;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use railsink::config::DB_POOL_MAX_CONNECTIONS;
use railsink::db::time::EasternTime;
use railsink::db::{PgRepository, Repository};
use railsink::errors::AppError;

#[derive(Debug, Parser)]
#[command(name = "railsink-reaper", about = "Deletes stale runs from Postgres")]
struct Options {
    #[arg(long, env = "POSTGRES_CONNECTION_STRING")]
    postgres_connection_string: String,

    /// Runs idle for longer than this many minutes are deleted.
    #[arg(long, env = "RUN_TTL_MINUTES")]
    run_ttl_minutes: i64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "railsink=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let opts = Options::parse();
    tracing::info!("starting postgres run reaper");

    if let Err(err) = run(opts).await {
        tracing::error!("fatal: {}", err);
        std::process::exit(1);
    }
}

async fn run(opts: Options) -> Result<(), AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(DB_POOL_MAX_CONNECTIONS)
        .connect(&opts.postgres_connection_string)
        .await?;

    let repo = PgRepository::new(pool);
    repo.ensure_tables(false).await?;

    let threshold = EasternTime::now() - Duration::minutes(opts.run_ttl_minutes);
    let counts = repo.delete_stale_runs(threshold).await?;

    println!("Success:");
    println!("Estimates dropped: {}", counts.estimates);
    println!("Arrivals dropped: {}", counts.arrivals);
    println!("Runs dropped: {}", counts.runs);
    Ok(())
}
