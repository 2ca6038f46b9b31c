//! Postgres sink: the entry point of the relational reconstruction path.
//!
//! Decodes a snapshot batch, groups it by train, classifies each train's
//! station sequence once, resolves catalog IDs at most once per distinct
//! name, and replays every record through the upserter. A bad record is
//! logged and skipped — it never aborts the batch.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;

use crate::classify::{classify_sequence, Classification};
use crate::db::upsert::Upserter;
use crate::errors::AppError;
use crate::marta::{Snapshot, SnapshotBody};
use crate::services::alias::{AliasResolver, DIRECTION_KIND, LINE_KIND, STATION_KIND};
use crate::sinks::Sink;
use crate::taxonomy::{Direction, Line, Station};

pub struct PostgresSink {
    upserter: Upserter,
    aliases: Option<Arc<dyn AliasResolver>>,
}

impl PostgresSink {
    pub fn new(upserter: Upserter, aliases: Option<Arc<dyn AliasResolver>>) -> Self {
        PostgresSink { upserter, aliases }
    }

    /// Resolve one (kind, name) to a catalog ID through the per-batch
    /// cache. Resolution failures degrade to `None` — the record is still
    /// written, just without the catalog link.
    async fn resolve_id(
        &self,
        cache: &mut HashMap<(String, String), Option<i32>>,
        kind: &str,
        name: &str,
    ) -> Option<i32> {
        let resolver = self.aliases.as_ref()?;
        if name.is_empty() {
            return None;
        }

        let key = (kind.to_string(), name.to_string());
        if let Some(cached) = cache.get(&key) {
            return *cached;
        }

        let id = match resolver.find_named_element(kind, name).await {
            Ok(id) => Some(id),
            Err(err) => {
                tracing::warn!("failed to resolve {} `{}`: {}", kind, name, err);
                None
            }
        };
        cache.insert(key, id);
        id
    }
}

#[async_trait]
impl Sink for PostgresSink {
    async fn dump(&self, mut body: SnapshotBody, _path: &str) -> Result<(), AppError> {
        let mut buffer = Vec::new();
        body.read_to_end(&mut buffer).await?;

        let records: Vec<Snapshot> = serde_json::from_slice(&buffer)
            .map_err(|e| AppError::InputParse(format!("snapshot batch: {}", e)))?;

        // Group by train, preserving first-seen order so replay order
        // matches the feed.
        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<Snapshot>> = HashMap::new();
        for rec in records {
            let group = groups.entry(rec.train_id.clone()).or_default();
            if group.is_empty() {
                order.push(rec.train_id.clone());
            }
            group.push(rec);
        }

        let mut id_cache: HashMap<(String, String), Option<i32>> = HashMap::new();

        for train_id in &order {
            let group = &groups[train_id];
            let sequence: Vec<Station> = group
                .iter()
                .filter_map(|rec| Station::parse(&rec.station))
                .collect();
            let reported = Classification::new(
                Line::parse(&group[0].line),
                Direction::parse(&group[0].direction),
            );
            let corrected = classify_sequence(&sequence, reported);

            for rec in group {
                let corrected_line = corrected
                    .line
                    .map(|l| l.as_str().to_string())
                    .unwrap_or_else(|| rec.line.clone());
                let corrected_direction = corrected
                    .direction
                    .map(|d| d.as_str().to_string())
                    .unwrap_or_else(|| rec.direction.clone());

                let line_id = self.resolve_id(&mut id_cache, LINE_KIND, &corrected_line).await;
                let direction_id = self
                    .resolve_id(&mut id_cache, DIRECTION_KIND, &corrected_direction)
                    .await;
                let station_id = self
                    .resolve_id(&mut id_cache, STATION_KIND, &rec.station)
                    .await;

                if let Err(err) = self
                    .upserter
                    .add_record(
                        rec,
                        &corrected_line,
                        &corrected_direction,
                        line_id,
                        direction_id,
                        station_id,
                    )
                    .await
                {
                    tracing::warn!("failed to upsert {}: {}", rec.describe(), err);
                }
            }
        }

        Ok(())
    }
}
