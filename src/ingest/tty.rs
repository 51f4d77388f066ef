//! Serial device line source
//!
//! Reads newline-delimited payloads from the device node (the port itself is
//! expected to be configured out-of-band). EOF is reported as "no data" so
//! the ingestion loop backs off and retries rather than terminating.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};

use super::{LineSource, TransportError};

/// Line source over a character device (or any file-like transport).
pub struct TtyLineSource {
    lines: Lines<BufReader<File>>,
    read_timeout: Duration,
}

impl TtyLineSource {
    /// Open the device node for buffered line reads.
    pub async fn open(
        path: impl AsRef<Path>,
        read_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let file = File::open(path.as_ref()).await?;
        tracing::info!(device = %path.as_ref().display(), "device transport opened");
        Ok(Self {
            lines: BufReader::new(file).lines(),
            read_timeout,
        })
    }
}

#[async_trait]
impl LineSource for TtyLineSource {
    async fn read_line(&mut self) -> Result<String, TransportError> {
        match tokio::time::timeout(self.read_timeout, self.lines.next_line()).await {
            Err(_) => Err(TransportError::Timeout),
            Ok(Ok(Some(line))) => Ok(line),
            Ok(Ok(None)) => Ok(String::new()),
            Ok(Err(e)) => Err(TransportError::Io(e)),
        }
    }
}
