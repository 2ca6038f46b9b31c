//! Periodic scrape-and-dump worker.
//!
//! One background task visits the registered (source, sink) pairs in
//! order each cycle, then sleeps `poll_interval`. Without a circuit
//! breaker the first cycle error is pushed on the error channel and the
//! task exits; with one, ordinary failures and open-circuit rejections
//! are absorbed and only the breaker's terminal system failure exits.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::errors::AppError;
use crate::marta::SnapshotSource;
use crate::services::breaker::{BreakerError, CircuitBreaker};
use crate::sinks::Sink;

/// One (source, sink) pairing to be polled.
pub struct ScrapeDump {
    pub scraper: Arc<dyn SnapshotSource>,
    pub sink: Arc<dyn Sink>,
}

/// Registration-ordered list of scrape/dump work.
#[derive(Default)]
pub struct WorkList {
    work: Vec<ScrapeDump>,
}

impl WorkList {
    pub fn new() -> Self {
        WorkList::default()
    }

    pub fn add_work(mut self, scraper: Arc<dyn SnapshotSource>, sink: Arc<dyn Sink>) -> Self {
        self.work.push(ScrapeDump { scraper, sink });
        self
    }

    pub fn work(&self) -> &[ScrapeDump] {
        &self.work
    }
}

pub struct Worker {
    work_list: WorkList,
    poll_interval: std::time::Duration,
    breaker: Option<CircuitBreaker>,
}

impl Worker {
    pub fn new(work_list: WorkList, poll_interval: std::time::Duration) -> Self {
        Worker {
            work_list,
            poll_interval,
            breaker: None,
        }
    }

    pub fn with_breaker(mut self, breaker: CircuitBreaker) -> Self {
        self.breaker = Some(breaker);
        self
    }

    /// Launch the polling task. Cancelling `shutdown` stops it at the next
    /// loop boundary (or mid-sleep); a fatal error is sent on `err_tx`
    /// before the task exits.
    pub fn poll(self, shutdown: CancellationToken, err_tx: mpsc::Sender<AppError>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown, err_tx))
    }

    async fn run(mut self, shutdown: CancellationToken, err_tx: mpsc::Sender<AppError>) {
        tracing::info!("starting to poll");
        loop {
            if shutdown.is_cancelled() {
                tracing::info!("exiting poll");
                return;
            }

            match self.breaker.as_mut() {
                None => {
                    if let Err(err) = scrape_and_dump(&self.work_list).await {
                        let _ = err_tx.send(err).await;
                        return;
                    }
                }
                Some(breaker) => {
                    let work_list = &self.work_list;
                    match breaker.run(|| scrape_and_dump(work_list)).await {
                        Ok(()) => {}
                        Err(BreakerError::OpenCircuit) => {
                            tracing::warn!("circuit open, skipping cycle");
                        }
                        Err(err @ BreakerError::SystemFailure) => {
                            let _ = err_tx.send(err.into()).await;
                            return;
                        }
                    }
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("exiting poll");
                    return;
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}

/// One poll cycle: scrape each source and hand the body to its sink under
/// a fresh `{prefix}/{utc now}.json` path.
async fn scrape_and_dump(work_list: &WorkList) -> Result<(), AppError> {
    tracing::debug!("scrape and dumping");
    for sd in work_list.work() {
        let body = sd.scraper.fetch().await?;
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let path = format!("{}/{}.json", sd.scraper.prefix(), now);
        sd.sink.dump(body, &path).await?;
    }
    Ok(())
}
