//! DynamoDB table sink.
//!
//! Unlike the archival sinks this one digests the response: each snapshot
//! becomes an item keyed by `{station}_{destination}` with sort key
//! `{rfc3339 event time}_{train_id}` and a 30-day TTL, written in pages of
//! 25 (the BatchWriteItem limit).

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, PutRequest, WriteRequest};
use chrono::Utc;
use tokio::io::AsyncReadExt;

use crate::db::time::EasternTime;
use crate::errors::AppError;
use crate::marta::{Snapshot, SnapshotBody};
use crate::sinks::Sink;

/// BatchWriteItem accepts at most this many requests per call.
const BATCH_WRITE_PAGE_SIZE: usize = 25;

/// How long digested items live in the table (seconds).
const ITEM_TTL_SECS: i64 = 30 * 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct DynamoSink {
    client: aws_sdk_dynamodb::Client,
    table: String,
}

impl DynamoSink {
    pub fn new(client: aws_sdk_dynamodb::Client, table: &str) -> Self {
        DynamoSink {
            client,
            table: table.to_string(),
        }
    }
}

/// Flatten one snapshot into a DynamoDB item. The event time must parse,
/// since the sort key embeds its RFC3339 form.
fn snapshot_to_item(rec: &Snapshot) -> Result<HashMap<String, AttributeValue>, AppError> {
    let event_time = EasternTime::parse_feed_datetime(&rec.event_time)?;
    let ttl = Utc::now().timestamp() + ITEM_TTL_SECS;

    let mut item = HashMap::new();
    item.insert(
        "primary_key".to_string(),
        AttributeValue::S(format!("{}_{}", rec.station, rec.destination)),
    );
    item.insert(
        "sort_key".to_string(),
        AttributeValue::S(format!("{}_{}", event_time, rec.train_id)),
    );
    item.insert("ttl".to_string(), AttributeValue::N(ttl.to_string()));

    item.insert("DESTINATION".to_string(), AttributeValue::S(rec.destination.clone()));
    item.insert("DIRECTION".to_string(), AttributeValue::S(rec.direction.clone()));
    item.insert("EVENT_TIME".to_string(), AttributeValue::S(rec.event_time.clone()));
    item.insert("LINE".to_string(), AttributeValue::S(rec.line.clone()));
    item.insert("NEXT_ARR".to_string(), AttributeValue::S(rec.next_arrival.clone()));
    item.insert("STATION".to_string(), AttributeValue::S(rec.station.clone()));
    item.insert("TRAIN_ID".to_string(), AttributeValue::S(rec.train_id.clone()));
    item.insert(
        "WAITING_SECONDS".to_string(),
        AttributeValue::S(rec.waiting_seconds.clone()),
    );
    item.insert(
        "WAITING_TIME".to_string(),
        AttributeValue::S(rec.waiting_time.clone()),
    );
    Ok(item)
}

#[async_trait]
impl Sink for DynamoSink {
    async fn dump(&self, mut body: SnapshotBody, _path: &str) -> Result<(), AppError> {
        let mut buffer = Vec::new();
        body.read_to_end(&mut buffer).await?;

        let records: Vec<Snapshot> = serde_json::from_slice(&buffer)
            .map_err(|e| AppError::InputParse(format!("snapshot batch: {}", e)))?;

        let mut requests = Vec::with_capacity(records.len());
        for rec in &records {
            let put = PutRequest::builder()
                .set_item(Some(snapshot_to_item(rec)?))
                .build()
                .map_err(|e| AppError::sink("failed to build dynamo put request", e))?;
            requests.push(WriteRequest::builder().put_request(put).build());
        }

        for page in requests.chunks(BATCH_WRITE_PAGE_SIZE) {
            self.client
                .batch_write_item()
                .request_items(self.table.clone(), page.to_vec())
                .send()
                .await
                .map_err(|e| {
                    AppError::sink(&format!("failed to batch-write to table `{}`", self.table), e)
                })?;
        }

        tracing::debug!("wrote {} items to dynamo table {}", records.len(), self.table);
        Ok(())
    }
}
