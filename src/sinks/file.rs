//! Local-filesystem sink.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::errors::AppError;
use crate::marta::SnapshotBody;
use crate::sinks::Sink;

/// Writes each response to `{root}/{path}`, creating directories as
/// needed.
#[derive(Debug, Clone)]
pub struct FileSink {
    root: PathBuf,
}

impl FileSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileSink { root: root.into() }
    }
}

#[async_trait]
impl Sink for FileSink {
    async fn dump(&self, mut body: SnapshotBody, path: &str) -> Result<(), AppError> {
        let location = self.root.join(path);
        if let Some(parent) = location.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(&location).await?;
        let written = tokio::io::copy(&mut body, &mut file).await?;
        tracing::debug!("wrote {} bytes to {}", written, location.display());
        Ok(())
    }
}
