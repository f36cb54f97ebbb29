//! Append-only log persistence (newline-delimited JSON)

use std::path::{Path, PathBuf};

use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::warn;

use super::model::LogRecord;
use crate::Result;

/// Durable log store backed by a JSONL file
///
/// The durable append is the only log write with a consistency
/// guarantee; fan-out to live subscribers happens after it.
pub struct LogStore {
    records_path: PathBuf,
}

impl LogStore {
    pub async fn new(root_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root_dir).await?;
        let records_path = root_dir.join("logs.jsonl");

        if fs::metadata(&records_path).await.is_err() {
            fs::File::create(&records_path).await?;
        }

        Ok(Self { records_path })
    }

    /// Append a record to the log
    pub async fn append(&self, record: &LogRecord) -> Result<()> {
        let encoded = serde_json::to_string(record)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.records_path)
            .await?;

        file.write_all(encoded.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;

        Ok(())
    }

    /// Load all records for an agent, oldest first
    ///
    /// Malformed lines are skipped with a warning.
    pub async fn load_for_agent(&self, agent_id: &str) -> Result<Vec<LogRecord>> {
        Self::load_filtered(&self.records_path, agent_id).await
    }

    async fn load_filtered(path: &Path, agent_id: &str) -> Result<Vec<LogRecord>> {
        let file = fs::File::open(path).await?;
        let mut reader = BufReader::new(file).lines();
        let mut records = Vec::new();

        while let Some(line) = reader.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<LogRecord>(&line) {
                Ok(record) => {
                    if record.agent_id == agent_id {
                        records.push(record);
                    }
                }
                Err(err) => warn!(
                    "Ignoring malformed log record in {}: {}",
                    path.display(),
                    err
                ),
            }
        }

        Ok(records)
    }
}
