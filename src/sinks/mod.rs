//! Destinations for raw feed responses.
//!
//! A sink receives an opaque byte stream plus a suggested path
//! (`{prefix}/{rfc3339}.json`) and may interpret the path as a file
//! location, an object key, or ignore it entirely (the Postgres sink
//! does). The round-robin sink fans one body out to several children.

pub mod dynamo;
pub mod file;
pub mod postgres;
pub mod round_robin;
pub mod s3;

use async_trait::async_trait;

use crate::errors::AppError;
use crate::marta::SnapshotBody;

/// A destination for one raw feed response.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn dump(&self, body: SnapshotBody, path: &str) -> Result<(), AppError>;
}
