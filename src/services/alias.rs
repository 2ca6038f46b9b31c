//! Fuzzy lookup of catalog IDs from display names.
//!
//! Third-rail deployments keep a companion catalog whose `aliases` table
//! maps display-name variants to stable numeric IDs. The whole table is
//! fetched at most once a day and matched in memory; concurrent refetches
//! may race, which costs one extra round-trip and nothing else.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use sqlx::PgPool;

use crate::errors::AppError;

pub const LINE_KIND: &str = "line";
pub const DIRECTION_KIND: &str = "direction";
pub const STATION_KIND: &str = "station";

/// Refetch the alias table this often.
const ALIAS_CACHE_TTL_SECS: u64 = 24 * 60 * 60;

/// Jaro-Winkler floor below which a candidate is not considered a match.
const MIN_SIMILARITY: f64 = 0.6;

/// One alias row: a display-name variant for a catalog element.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Alias {
    pub named_element_type: String,
    pub named_element_id: i32,
    pub alias: String,
}

/// Resolves rough display names to catalog IDs.
#[async_trait]
pub trait AliasResolver: Send + Sync {
    async fn find_named_element(&self, kind: &str, rough_name: &str) -> Result<i32, AppError>;
}

/// Database-backed [`AliasResolver`] with a daily in-memory cache.
pub struct AliasLookup {
    pool: PgPool,
    cache: Cache<(), Arc<HashMap<String, Vec<Alias>>>>,
}

impl AliasLookup {
    pub fn new(pool: PgPool) -> Self {
        AliasLookup {
            pool,
            cache: Cache::builder()
                .max_capacity(1)
                .time_to_live(Duration::from_secs(ALIAS_CACHE_TTL_SECS))
                .build(),
        }
    }

    /// The full alias table grouped by kind, from cache or a fresh fetch.
    async fn aliases(&self) -> Result<Arc<HashMap<String, Vec<Alias>>>, AppError> {
        if let Some(grouped) = self.cache.get(&()).await {
            return Ok(grouped);
        }

        let rows: Vec<Alias> = sqlx::query_as(
            "SELECT named_element_type, named_element_id, alias FROM aliases",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<String, Vec<Alias>> = HashMap::new();
        for alias in rows {
            grouped
                .entry(alias.named_element_type.clone())
                .or_default()
                .push(alias);
        }

        let grouped = Arc::new(grouped);
        self.cache.insert((), grouped.clone()).await;
        Ok(grouped)
    }
}

#[async_trait]
impl AliasResolver for AliasLookup {
    async fn find_named_element(&self, kind: &str, rough_name: &str) -> Result<i32, AppError> {
        let grouped = self.aliases().await?;
        let candidates = grouped.get(kind).map(Vec::as_slice).unwrap_or(&[]);
        best_match(candidates, rough_name)
            .map(|alias| alias.named_element_id)
            .ok_or_else(|| AppError::AliasNotFound {
                kind: kind.to_string(),
                name: rough_name.to_string(),
            })
    }
}

/// Uppercase, strip a trailing "STATION", trim.
fn normalize(name: &str) -> String {
    let upper = name.trim().to_uppercase();
    upper
        .strip_suffix("STATION")
        .unwrap_or(&upper)
        .trim()
        .to_string()
}

/// The most similar alias by Jaro-Winkler over normalized names, if any
/// clears the similarity floor.
fn best_match<'a>(candidates: &'a [Alias], rough_name: &str) -> Option<&'a Alias> {
    let query = normalize(rough_name);
    candidates
        .iter()
        .map(|alias| (strsim::jaro_winkler(&query, &normalize(&alias.alias)), alias))
        .filter(|(score, _)| *score >= MIN_SIMILARITY)
        .max_by(|(a, _), (b, _)| a.total_cmp(b))
        .map(|(_, alias)| alias)
}
