//! Poller daemon: periodically scrapes the train and bus feeds and fans
//! each response out to the configured sinks.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use railsink::config::{build_sink, Options};
use railsink::errors::AppError;
use railsink::marta::FeedClient;
use railsink::services::breaker::CircuitBreaker;
use railsink::services::worker::{WorkList, Worker};

/// Seconds an open circuit waits before half-opening.
const BREAKER_WAIT_SECS: u64 = 60;

/// Poll cycles tallied by the breaker's rolling window.
const BREAKER_WINDOW_SIZE: usize = 5;

#[tokio::main]
async fn main() {
    let opts = Options::parse();

    let default_filter = if opts.debug {
        "railsink=debug"
    } else {
        "railsink=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("starting scrape and dump");

    if let Err(err) = run(opts).await {
        tracing::error!("fatal: {}", err);
        std::process::exit(1);
    }
}

async fn run(opts: Options) -> Result<(), AppError> {
    let api_key = opts.resolve_api_key()?;
    let work_config = opts.work_config()?;
    let aws = aws_config::load_from_env().await;

    let mut work_list = WorkList::new();
    if let Some(config) = &work_config.train_dumper {
        let sink = build_sink(config, &aws).await?;
        work_list = work_list.add_work(Arc::new(FeedClient::trains(&api_key)), sink);
    }
    if let Some(config) = &work_config.bus_dumper {
        let sink = build_sink(config, &aws).await?;
        work_list = work_list.add_work(Arc::new(FeedClient::buses(&api_key)), sink);
    }
    if work_list.work().is_empty() {
        return Err(AppError::ConfigInvalid(
            "no dumpers configured: provide a config file or sink flags".into(),
        ));
    }

    let breaker = CircuitBreaker::new(
        Duration::from_secs(BREAKER_WAIT_SECS),
        BREAKER_WINDOW_SIZE,
    );
    let worker = Worker::new(work_list, Duration::from_secs(opts.poll_time_in_seconds))
        .with_breaker(breaker);

    let shutdown = CancellationToken::new();
    let (err_tx, mut err_rx) = mpsc::channel(1);
    let handle = worker.poll(shutdown.clone(), err_tx);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received, shutting down");
            shutdown.cancel();
            let _ = handle.await;
            Ok(())
        }
        err = err_rx.recv() => {
            shutdown.cancel();
            let _ = handle.await;
            match err {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }
}
