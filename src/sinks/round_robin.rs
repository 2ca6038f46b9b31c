//! Fan-out sink: buffer one input and replay it to each child in
//! registration order.
//!
//! The body is buffered in memory rather than teed through pipes so that
//! no child's consumption rate can stall another's; the buffer is bounded
//! by the input size and lives only for the call.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;

use crate::errors::AppError;
use crate::marta::SnapshotBody;
use crate::sinks::Sink;

pub struct RoundRobinSink {
    children: Vec<Arc<dyn Sink>>,
}

impl RoundRobinSink {
    pub fn new(children: Vec<Arc<dyn Sink>>) -> Self {
        RoundRobinSink { children }
    }
}

#[async_trait]
impl Sink for RoundRobinSink {
    /// Replays the buffered body to every child with the same path. The
    /// first child error is returned and no further children are called.
    async fn dump(&self, mut body: SnapshotBody, path: &str) -> Result<(), AppError> {
        let mut buffer = Vec::new();
        body.read_to_end(&mut buffer).await?;

        for child in &self.children {
            let replay: SnapshotBody = Box::new(std::io::Cursor::new(buffer.clone()));
            child.dump(replay, path).await?;
        }
        Ok(())
    }
}
