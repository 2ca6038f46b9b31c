//! MARTA realtime-arrivals feed client.
//!
//! The feed is a JSON array of string-typed snapshot records, one per
//! (train, upcoming station) pair. The client exposes the response body as
//! an opaque byte stream — only the Postgres sink ever reads its
//! structure; the archival sinks copy it through verbatim.

use async_trait::async_trait;
use futures::TryStreamExt;
use serde::Deserialize;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;

use crate::errors::AppError;

pub const MARTA_BASE_URL: &str = "http://developer.itsmarta.com";
pub const REALTIME_TRAIN_ENDPOINT: &str =
    "/RealtimeTrain/RestServiceNextTrain/GetRealtimeArrivals";
pub const BUS_ENDPOINT: &str = "/BRDRestService/RestBusSchedule/GetAllSchedules";

pub const TRAIN_OUTPUT_PREFIX: &str = "train-data";
pub const BUS_OUTPUT_PREFIX: &str = "bus-data";

/// HTTP request timeout for feed calls (seconds).
const FEED_HTTP_TIMEOUT_SECS: u64 = 30;

/// One observation of one train's next arrival at one station at one
/// moment. Every field arrives as a string; `EVENT_TIME` is
/// `M/D/YYYY h:mm:ss AM/PM` and `NEXT_ARR` is `h:mm:ss AM/PM`, both
/// wall-clock Eastern.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "DESTINATION", default)]
    pub destination: String,
    #[serde(rename = "DIRECTION", default)]
    pub direction: String,
    #[serde(rename = "EVENT_TIME", default)]
    pub event_time: String,
    #[serde(rename = "LINE", default)]
    pub line: String,
    #[serde(rename = "NEXT_ARR", default)]
    pub next_arrival: String,
    #[serde(rename = "STATION", default)]
    pub station: String,
    #[serde(rename = "TRAIN_ID", default)]
    pub train_id: String,
    #[serde(rename = "WAITING_SECONDS", default)]
    pub waiting_seconds: String,
    #[serde(rename = "WAITING_TIME", default)]
    pub waiting_time: String,
}

impl Snapshot {
    /// The train is in (or just left) the station: `WAITING_TIME` is
    /// "ARRIVED" or "BOARDING". Any other value means the numeric ETA in
    /// `NEXT_ARR` is authoritative.
    pub fn has_arrived(&self) -> bool {
        matches!(
            self.waiting_time.trim().to_uppercase().as_str(),
            "ARRIVED" | "BOARDING"
        )
    }

    /// The train is pulling in. Neither an estimate nor an arrival moment:
    /// the transition is recorded by the next ARRIVED snapshot.
    pub fn is_arriving(&self) -> bool {
        self.waiting_time.trim().to_uppercase() == "ARRIVING"
    }

    /// Short description for log and error context.
    pub fn describe(&self) -> String {
        format!(
            "train `{}` ({} {}) at `{}` at `{}`",
            self.train_id, self.direction, self.line, self.station, self.event_time
        )
    }
}

/// A streaming feed response body.
pub type SnapshotBody = Box<dyn AsyncRead + Send + Unpin>;

/// Anything that can produce a batch of raw snapshot bytes plus the output
/// prefix its archives should be filed under.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch(&self) -> Result<SnapshotBody, AppError>;

    /// Prefix for sink paths, e.g. `train-data`.
    fn prefix(&self) -> &str;
}

/// HTTP client for one feed endpoint.
#[derive(Debug, Clone)]
pub struct FeedClient {
    client: reqwest::Client,
    base_url: String,
    endpoint: String,
    api_key: String,
    output_prefix: String,
}

impl FeedClient {
    pub fn new(base_url: &str, endpoint: &str, api_key: &str, output_prefix: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(FEED_HTTP_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client");
        FeedClient {
            client,
            base_url: base_url.to_string(),
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            output_prefix: output_prefix.to_string(),
        }
    }

    /// Client for the realtime train arrivals endpoint.
    pub fn trains(api_key: &str) -> Self {
        FeedClient::new(
            MARTA_BASE_URL,
            REALTIME_TRAIN_ENDPOINT,
            api_key,
            TRAIN_OUTPUT_PREFIX,
        )
    }

    /// Client for the bus schedule endpoint.
    pub fn buses(api_key: &str) -> Self {
        FeedClient::new(MARTA_BASE_URL, BUS_ENDPOINT, api_key, BUS_OUTPUT_PREFIX)
    }
}

#[async_trait]
impl SnapshotSource for FeedClient {
    async fn fetch(&self) -> Result<SnapshotBody, AppError> {
        let url = format!("{}{}", self.base_url, self.endpoint);
        let response = self
            .client
            .get(&url)
            .query(&[("apikey", self.api_key.as_str())])
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::SourceHttp(status));
        }

        let stream = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
        Ok(Box::new(StreamReader::new(Box::pin(stream))))
    }

    fn prefix(&self) -> &str {
        &self.output_prefix
    }
}
