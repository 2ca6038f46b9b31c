//! Bulk replay of archived feed responses through a sink.
//!
//! Archive file names are RFC3339 timestamps, so lexicographic order is
//! chronological order.

use std::path::Path;
use std::sync::Arc;

use crate::errors::AppError;
use crate::sinks::Sink;

/// Pipes every file in a directory through a sink, oldest first.
pub struct DirectoryDumper {
    sink: Arc<dyn Sink>,
}

impl DirectoryDumper {
    pub fn new(sink: Arc<dyn Sink>) -> Self {
        DirectoryDumper { sink }
    }

    /// Dump all files in `dir`, skipping subdirectories and any file whose
    /// name sorts before `start_at` (an empty `start_at` includes
    /// everything). The first error aborts; completed files are not
    /// rewound.
    pub async fn dump_directory(&self, dir: &Path, start_at: &str) -> Result<(), AppError> {
        let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| {
            AppError::Sink(format!("failed to open directory `{}`: {}", dir.display(), e))
        })?;

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                continue;
            }
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();

        for name in names {
            if name.as_str() < start_at {
                continue;
            }
            self.dump_file(&dir.join(&name), &name).await?;
        }

        Ok(())
    }

    /// Dump a single file, using its bare name as the sink path.
    pub async fn dump_file(&self, path: &Path, name: &str) -> Result<(), AppError> {
        let file = tokio::fs::File::open(path).await.map_err(|e| {
            AppError::Sink(format!("failed to open file `{}`: {}", path.display(), e))
        })?;

        tracing::info!("loading {}", name);
        self.sink
            .dump(Box::new(file), name)
            .await
            .map_err(|e| AppError::Sink(format!("failed to dump file `{}`: {}", name, e)))
    }
}
