//! Poller configuration: command-line/environment flags plus the
//! recursive dumper tree.
//!
//! The dumper tree normally comes from a JSON document (`CONFIG_PATH`);
//! without one, a default worklist is assembled from whichever flat sink
//! flags were provided.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::Duration;
use clap::Parser;
use serde::Deserialize;
use sqlx::postgres::PgPoolOptions;

use crate::db::upsert::Upserter;
use crate::db::{PgRepository, Repository};
use crate::errors::AppError;
use crate::services::alias::{AliasLookup, AliasResolver};
use crate::sinks::dynamo::DynamoSink;
use crate::sinks::file::FileSink;
use crate::sinks::postgres::PostgresSink;
use crate::sinks::round_robin::RoundRobinSink;
use crate::sinks::s3::S3Sink;
use crate::sinks::Sink;

/// Maximum number of connections in a sink's database pool.
pub const DB_POOL_MAX_CONNECTIONS: u32 = 5;

/// Idle-timeout after which a silent train starts a new run.
const RUN_LIFETIME_HOURS: i64 = 1;

/// Command-line/environment options of the poller.
#[derive(Debug, Parser)]
#[command(name = "railsink", about = "Polls the MARTA realtime feeds and dumps them to sinks")]
pub struct Options {
    /// Local path to write archives under.
    #[arg(long, env = "OUTPUT_LOCATION")]
    pub output_location: Option<String>,

    /// DynamoDB table to digest train snapshots into.
    #[arg(long, env = "DYNAMO_TABLE_NAME")]
    pub dynamo_table_name: Option<String>,

    /// S3 bucket to archive raw responses into.
    #[arg(long, env = "S3_BUCKET_NAME")]
    pub s3_bucket_name: Option<String>,

    /// MARTA API key.
    #[arg(long, env = "MARTA_API_KEY")]
    pub marta_api_key: Option<String>,

    /// File containing the MARTA API key.
    #[arg(long, env = "MARTA_API_KEY_FILE")]
    pub marta_api_key_file: Option<String>,

    /// Seconds to sleep between poll cycles.
    #[arg(long, env = "POLL_TIME_IN_SECONDS")]
    pub poll_time_in_seconds: u64,

    /// Lower the log filter to debug.
    #[arg(long, env = "DEBUG")]
    pub debug: bool,

    /// Path to a JSON dumper-tree config; overrides the flat sink flags.
    #[arg(long, env = "CONFIG_PATH")]
    pub config_path: Option<String>,
}

impl Options {
    /// The API key, directly or from the key file.
    pub fn resolve_api_key(&self) -> Result<String, AppError> {
        if let Some(key) = &self.marta_api_key {
            return Ok(key.clone());
        }
        if let Some(path) = &self.marta_api_key_file {
            let key = std::fs::read_to_string(path).map_err(|e| {
                AppError::ConfigInvalid(format!("failed to read api key file `{}`: {}", path, e))
            })?;
            return Ok(key.trim().to_string());
        }
        Err(AppError::ConfigInvalid(
            "either MARTA_API_KEY or MARTA_API_KEY_FILE must be provided".into(),
        ))
    }

    /// The work config: parsed from `CONFIG_PATH` when given, otherwise
    /// assembled from the flat sink flags.
    pub fn work_config(&self) -> Result<WorkConfig, AppError> {
        match &self.config_path {
            Some(path) => WorkConfig::from_file(path),
            None => Ok(WorkConfig::default_from_flags(self)),
        }
    }
}

/// Top-level config: one optional dumper tree per feed.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WorkConfig {
    #[serde(default)]
    pub bus_dumper: Option<DumpConfig>,
    #[serde(default)]
    pub train_dumper: Option<DumpConfig>,
}

/// One dumper in the tree, discriminated by `kind`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind")]
pub enum DumpConfig {
    #[serde(rename = "ROUND_ROBIN")]
    RoundRobin { components: Vec<DumpConfig> },

    #[serde(rename = "FILE")]
    File { local_output_location: String },

    #[serde(rename = "S3")]
    S3 { s3_bucket_name: String },

    #[serde(rename = "DYNAMODB")]
    DynamoDb { dynamo_table_name: String },

    #[serde(rename = "POSTGRES")]
    Postgres {
        postgres_connection_string: String,
        #[serde(default)]
        third_rail_context: bool,
    },
}

impl WorkConfig {
    pub fn from_file(path: &str) -> Result<WorkConfig, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::ConfigInvalid(format!("failed to read config file `{}`: {}", path, e))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| AppError::ConfigInvalid(format!("failed to parse config `{}`: {}", path, e)))
    }

    /// The default worklist when no config file is given: trains fan out
    /// to [S3, FILE, DYNAMODB], buses to [S3, FILE] — each component only
    /// when its flag was provided.
    pub fn default_from_flags(opts: &Options) -> WorkConfig {
        let train = flag_components(opts, true);
        let bus = flag_components(opts, false);
        WorkConfig {
            train_dumper: (!train.is_empty()).then_some(DumpConfig::RoundRobin { components: train }),
            bus_dumper: (!bus.is_empty()).then_some(DumpConfig::RoundRobin { components: bus }),
        }
    }
}

fn flag_components(opts: &Options, include_dynamo: bool) -> Vec<DumpConfig> {
    let mut components = Vec::new();
    if let Some(bucket) = &opts.s3_bucket_name {
        components.push(DumpConfig::S3 {
            s3_bucket_name: bucket.clone(),
        });
    }
    if let Some(root) = &opts.output_location {
        components.push(DumpConfig::File {
            local_output_location: root.clone(),
        });
    }
    if include_dynamo {
        if let Some(table) = &opts.dynamo_table_name {
            components.push(DumpConfig::DynamoDb {
                dynamo_table_name: table.clone(),
            });
        }
    }
    components
}

/// Build the sink a [`DumpConfig`] describes. Boxed because round-robin
/// configs recurse.
pub fn build_sink<'a>(
    config: &'a DumpConfig,
    aws: &'a aws_config::SdkConfig,
) -> Pin<Box<dyn Future<Output = Result<Arc<dyn Sink>, AppError>> + Send + 'a>> {
    Box::pin(async move {
        match config {
            DumpConfig::RoundRobin { components } => {
                if components.is_empty() {
                    return Err(AppError::ConfigInvalid(
                        "ROUND_ROBIN dumper requires at least one component".into(),
                    ));
                }
                let mut children = Vec::with_capacity(components.len());
                for component in components {
                    children.push(build_sink(component, aws).await?);
                }
                Ok(Arc::new(RoundRobinSink::new(children)) as Arc<dyn Sink>)
            }
            DumpConfig::File {
                local_output_location,
            } => Ok(Arc::new(FileSink::new(local_output_location)) as Arc<dyn Sink>),
            DumpConfig::S3 { s3_bucket_name } => Ok(Arc::new(S3Sink::new(
                aws_sdk_s3::Client::new(aws),
                s3_bucket_name,
            )) as Arc<dyn Sink>),
            DumpConfig::DynamoDb { dynamo_table_name } => Ok(Arc::new(DynamoSink::new(
                aws_sdk_dynamodb::Client::new(aws),
                dynamo_table_name,
            )) as Arc<dyn Sink>),
            DumpConfig::Postgres {
                postgres_connection_string,
                third_rail_context,
            } => {
                let pool = PgPoolOptions::new()
                    .max_connections(DB_POOL_MAX_CONNECTIONS)
                    .connect(postgres_connection_string)
                    .await?;
                let repo = PgRepository::new(pool.clone());
                repo.ensure_tables(*third_rail_context).await?;

                let aliases: Option<Arc<dyn AliasResolver>> = third_rail_context
                    .then(|| Arc::new(AliasLookup::new(pool)) as Arc<dyn AliasResolver>);
                let upserter =
                    Upserter::new(Arc::new(repo), Duration::hours(RUN_LIFETIME_HOURS));
                Ok(Arc::new(PostgresSink::new(upserter, aliases)) as Arc<dyn Sink>)
            }
        }
    })
}
