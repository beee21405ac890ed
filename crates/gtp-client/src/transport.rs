//! Line transport abstractions for engine pipes
//!
//! Provides LineReader/LineWriter traits so the session can run over a child
//! process's stdio, in-memory pipes, or anything else that moves bytes.

use async_trait::async_trait;
use gtp_core::{GtpError, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// Trait for reading lines from the engine
#[async_trait]
pub trait LineReader: Send {
    /// Read one line without its terminator, or `None` at end of stream
    async fn read_line(&mut self) -> Result<Option<String>>;
}

/// Trait for writing to the engine
#[async_trait]
pub trait LineWriter: Send {
    /// Write the whole buffer in one call and flush it
    async fn write_all(&mut self, data: &[u8]) -> Result<()>;
}

/// Buffered line reader over any async byte stream
pub struct PipeReader<R>(BufReader<R>);

impl<R: AsyncRead + Unpin + Send> PipeReader<R> {
    pub fn new(inner: R) -> Self {
        Self(BufReader::new(inner))
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> LineReader for PipeReader<R> {
    async fn read_line(&mut self) -> Result<Option<String>> {
        let mut buf = Vec::new();
        let n = self
            .0
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|e| GtpError::Io(format!("Engine read failed: {}", e)))?;

        if n == 0 {
            return Ok(None);
        }

        // Engines are not required to emit valid UTF-8
        let line = String::from_utf8_lossy(&buf);
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

/// Writer over any async byte sink
pub struct PipeWriter<W>(W);

impl<W: AsyncWrite + Unpin + Send> PipeWriter<W> {
    pub fn new(inner: W) -> Self {
        Self(inner)
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> LineWriter for PipeWriter<W> {
    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.0
            .write_all(data)
            .await
            .map_err(|e| GtpError::Io(format!("Engine write failed: {}", e)))?;

        self.0
            .flush()
            .await
            .map_err(|e| GtpError::Io(format!("Engine flush failed: {}", e)))?;

        Ok(())
    }
}
