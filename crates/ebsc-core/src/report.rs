use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackupStatus {
    Succeeded,
    Failed,
}

/// One row of the run report: what happened to a single environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnvironmentRecord {
    pub ts: String,
    pub application: String,
    pub environment: String,
    pub environment_id: String,
    pub status: BackupStatus,
    pub bytes: u64,
    pub sha256: String,
    pub local_path: String,
    pub error: String,
}

/// Tab-separated summary written next to the archive.
pub struct RunReport {
    path: PathBuf,
}

impl RunReport {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_records(&self, records: &[EnvironmentRecord]) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_path(&self.path)
            .with_context(|| format!("failed to create run report: {}", self.path.display()))?;
        if records.is_empty() {
            writer
                .write_record([
                    "ts",
                    "application",
                    "environment",
                    "environment_id",
                    "status",
                    "bytes",
                    "sha256",
                    "local_path",
                    "error",
                ])
                .context("failed to write run report header")?;
        }
        for record in records {
            writer
                .serialize(record)
                .context("failed to write run report row")?;
        }
        writer.flush().context("failed to flush run report")?;
        Ok(())
    }

    pub fn read_records(&self) -> Result<Vec<EnvironmentRecord>> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .from_path(&self.path)
            .with_context(|| format!("failed to read run report: {}", self.path.display()))?;
        let mut records = Vec::new();
        for result in reader.deserialize() {
            let record: EnvironmentRecord = result.context("failed to parse run report row")?;
            records.push(record);
        }
        Ok(records)
    }
}
