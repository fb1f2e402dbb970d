//! File journal: append-only event log and per-incident error artifacts

use std::path::{Path, PathBuf};

use chrono::Local;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Local ISO-8601 timestamp used as line prefix and artifact name
pub fn timestamp() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// Human-readable event log (device transitions, mode changes, bad records)
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `<timestamp>: <message>` lines. Write failures are logged, not returned.
    pub async fn append(&self, messages: &[String]) {
        if messages.is_empty() {
            return;
        }

        let stamp = timestamp();
        let mut buf = String::new();
        for message in messages {
            buf.push_str(&stamp);
            buf.push_str(": ");
            buf.push_str(message);
            buf.push('\n');
        }

        if let Err(e) = self.write(buf.as_bytes()).await {
            tracing::error!(
                "[Journal] Failed to append to {}: {}",
                self.path.display(),
                e
            );
        }
    }

    async fn write(&self, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(bytes).await?;
        file.flush().await
    }
}

/// Directory of `<timestamp>__<uuid>.txt` files, one per failed cycle
#[derive(Debug, Clone)]
pub struct ErrorArchive {
    dir: PathBuf,
}

impl ErrorArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write one artifact. Returns its path, or None if it could not be written.
    pub async fn record(&self, detail: &str) -> Option<PathBuf> {
        let filename = format!("{}__{}.txt", timestamp(), Uuid::new_v4().simple());
        let path = self.dir.join(filename);

        match self.write(&path, detail).await {
            Ok(()) => {
                tracing::warn!("[Journal] Error logged to file: {}", path.display());
                Some(path)
            }
            Err(e) => {
                tracing::error!(
                    "[Journal] An exception occurred while trying to write an error to {}: {}",
                    path.display(),
                    e
                );
                None
            }
        }
    }

    async fn write(&self, path: &Path, detail: &str) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir).await?;
        fs::write(path, format!("ERROR LOG: {}\n", detail)).await
    }
}
