//! S3 object-store sink.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use tokio::io::AsyncReadExt;

use crate::errors::AppError;
use crate::marta::SnapshotBody;
use crate::sinks::Sink;

/// Uploads each response as an object keyed by the sink path.
#[derive(Debug, Clone)]
pub struct S3Sink {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Sink {
    pub fn new(client: aws_sdk_s3::Client, bucket: &str) -> Self {
        S3Sink {
            client,
            bucket: bucket.to_string(),
        }
    }
}

#[async_trait]
impl Sink for S3Sink {
    async fn dump(&self, mut body: SnapshotBody, path: &str) -> Result<(), AppError> {
        let mut buffer = Vec::new();
        body.read_to_end(&mut buffer).await?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .body(ByteStream::from(buffer))
            .send()
            .await
            .map_err(|e| AppError::sink(&format!("failed to upload s3://{}/{}", self.bucket, path), e))?;

        tracing::debug!("uploaded s3://{}/{}", self.bucket, path);
        Ok(())
    }
}
