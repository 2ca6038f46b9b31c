//! Bulk loader: replays a directory of archived feed responses through
//! the Postgres reconstruction path.

use std::path::Path;
use std::sync::Arc;

use chrono::Duration;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use railsink::config::DB_POOL_MAX_CONNECTIONS;
use railsink::db::upsert::Upserter;
use railsink::db::{PgRepository, Repository};
use railsink::errors::AppError;
use railsink::services::bulk::DirectoryDumper;
use railsink::sinks::postgres::PostgresSink;

#[derive(Debug, Parser)]
#[command(
    name = "railsink-loader",
    about = "Loads archived feed responses into Postgres"
)]
struct Options {
    /// Directory of archived JSON files to load.
    #[arg(long, env = "DATA_LOCATION")]
    data_location: String,

    #[arg(long, env = "POSTGRES_CONNECTION_STRING")]
    postgres_connection_string: String,

    /// Skip files whose names sort before this one.
    #[arg(long, env = "START_AT_ALPHABETICALLY", default_value = "")]
    start_at_alphabetically: String,
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
    tracing::info!("starting postgres loader");

    if let Err(err) = run(opts).await {
        tracing::error!("fatal: {}", err);
        std::process::exit(1);
    }
    println!("Success!");
}

async fn run(opts: Options) -> Result<(), AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(DB_POOL_MAX_CONNECTIONS)
        .connect(&opts.postgres_connection_string)
        .await?;

    let repo = PgRepository::new(pool);
    repo.ensure_tables(false).await?;

    let upserter = Upserter::new(Arc::new(repo), Duration::hours(1));
    let sink = Arc::new(PostgresSink::new(upserter, None));

    DirectoryDumper::new(sink)
        .dump_directory(
            Path::new(&opts.data_location),
            &opts.start_at_alphabetically,
        )
        .await
}
