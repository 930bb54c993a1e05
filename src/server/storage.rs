//! Persistent log store for ReplayLog

use crate::config::ServerConfig;
use crate::{ReplayLogError, Result};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Append-only file holding every payload received so far
///
/// No locking: the server runs at most one session at a time.
#[derive(Debug, Clone)]
pub struct LogStore {
    path: PathBuf,
    chunk_size: usize,
}

fn store_error(action: &str, path: &Path, err: std::io::Error) -> ReplayLogError {
    ReplayLogError::Store(format!("{} {}: {}", action, path.display(), err))
}

impl LogStore {
    /// Create a store for the configured data file
    pub fn new(config: &ServerConfig) -> Self {
        Self::with_path(&config.storage.data_file, config.server.buffer_size)
    }

    /// Create a store at an explicit path, replaying in `chunk_size` pieces
    pub fn with_path<P: AsRef<Path>>(path: P, chunk_size: usize) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            chunk_size: chunk_size.max(1),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append bytes, creating the file on first use
    pub async fn append(&self, bytes: &[u8]) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .mode(0o644)
            .open(&self.path)
            .await
            .map_err(|e| store_error("open for append", &self.path, e))?;

        // write_all reports a short write as WriteZero
        file.write_all(bytes)
            .await
            .map_err(|e| store_error("append to", &self.path, e))?;
        file.flush()
            .await
            .map_err(|e| store_error("flush", &self.path, e))?;

        Ok(())
    }

    /// Stream the whole file into `sink`, returning the byte count
    pub async fn read_all<W>(&self, sink: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut file = File::open(&self.path)
            .await
            .map_err(|e| store_error("open for reading", &self.path, e))?;

        let mut buf = vec![0u8; self.chunk_size];
        let mut total = 0u64;
        loop {
            let n = file
                .read(&mut buf)
                .await
                .map_err(|e| store_error("read from", &self.path, e))?;
            if n == 0 {
                break;
            }
            sink.write_all(&buf[..n]).await?;
            total += n as u64;
        }
        sink.flush().await?;

        Ok(total)
    }

    /// Whole file as a byte vector
    pub async fn contents(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.read_all(&mut out).await?;
        Ok(out)
    }

    /// Remove the backing file
    pub fn delete(&self) -> Result<()> {
        std::fs::remove_file(&self.path).map_err(|e| store_error("remove", &self.path, e))?;
        debug!(path = %self.path.display(), "Log store removed");
        Ok(())
    }
}
